//! Clinic storage.
//!
//! Same sealing/digest discipline as organizations; the address column is
//! additionally covered by a trigram index for the directory search.

use sqlx_core::query_as::query_as;
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use carelink_core::{Clinic, generate_id};
use carelink_crypto::{FieldCipher, gov_id_digest};

use crate::{PgPool, StorageResult, map_unique_violation};

type ClinicTuple = (
    Uuid,
    String,
    Option<String>,
    Option<String>,
    OffsetDateTime,
    OffsetDateTime,
);

const SELECT_COLUMNS: &str = "id, name, address, gov_id, created_at, updated_at";

/// Fields accepted when creating a clinic.
#[derive(Debug, Clone)]
pub struct NewClinic {
    pub name: String,
    pub address: Option<String>,
    pub gov_id: Option<String>,
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct ClinicPatch {
    pub name: Option<String>,
    pub address: Option<String>,
    pub gov_id: Option<String>,
}

/// List filters. `scope_ids` restricts to the caller's accessible clinics.
#[derive(Debug, Clone, Default)]
pub struct ClinicFilter {
    pub name: Option<String>,
    pub gov_id: Option<String>,
    pub scope_ids: Option<Vec<Uuid>>,
}

/// Clinic storage operations.
pub struct ClinicStorage<'a> {
    pool: &'a PgPool,
    cipher: &'a FieldCipher,
}

impl<'a> ClinicStorage<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool, cipher: &'a FieldCipher) -> Self {
        Self { pool, cipher }
    }

    fn from_tuple(&self, row: ClinicTuple) -> Clinic {
        Clinic {
            id: row.0,
            name: row.1,
            address: row.2,
            gov_id: row.3.map(|v| self.cipher.open_lenient(&v)),
            created_at: row.4,
            updated_at: row.5,
        }
    }

    /// Lists clinics with filters and pagination, newest first.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: &ClinicFilter,
        limit: i64,
        offset: i64,
    ) -> StorageResult<(Vec<Clinic>, i64)> {
        let digest = filter.gov_id.as_deref().map(gov_id_digest);

        let rows: Vec<ClinicTuple> = query_as(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM clinics
            WHERE ($1::text IS NULL OR name ILIKE '%' || $1 || '%')
              AND ($2::text IS NULL OR gov_id_digest = $2)
              AND ($3::uuid[] IS NULL OR id = ANY($3))
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#
        ))
        .bind(&filter.name)
        .bind(&digest)
        .bind(&filter.scope_ids)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        let (total,): (i64,) = query_as(
            r#"
            SELECT count(*)
            FROM clinics
            WHERE ($1::text IS NULL OR name ILIKE '%' || $1 || '%')
              AND ($2::text IS NULL OR gov_id_digest = $2)
              AND ($3::uuid[] IS NULL OR id = ANY($3))
            "#,
        )
        .bind(&filter.name)
        .bind(&digest)
        .bind(&filter.scope_ids)
        .fetch_one(self.pool)
        .await?;

        Ok((rows.into_iter().map(|r| self.from_tuple(r)).collect(), total))
    }

    /// Finds a clinic by its ID.
    pub async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<Clinic>> {
        let row: Option<ClinicTuple> =
            query_as(&format!("SELECT {SELECT_COLUMNS} FROM clinics WHERE id = $1"))
                .bind(id)
                .fetch_optional(self.pool)
                .await?;

        Ok(row.map(|r| self.from_tuple(r)))
    }

    /// Creates a clinic, sealing its gov-ID.
    #[instrument(skip(self, new), fields(name = %new.name))]
    pub async fn create(&self, new: NewClinic) -> StorageResult<Clinic> {
        let sealed = new.gov_id.as_deref().map(|v| self.cipher.seal(v)).transpose()?;
        let digest = new.gov_id.as_deref().map(gov_id_digest);

        let row: ClinicTuple = query_as(&format!(
            r#"
            INSERT INTO clinics (id, name, address, gov_id, gov_id_digest)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(generate_id())
        .bind(&new.name)
        .bind(&new.address)
        .bind(&sealed)
        .bind(&digest)
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_unique_violation(e, format!("Clinic '{}' already exists", new.name)))?;

        Ok(self.from_tuple(row))
    }

    /// Applies a partial update. Returns `None` when the row is missing.
    #[instrument(skip(self, patch))]
    pub async fn update(&self, id: Uuid, patch: ClinicPatch) -> StorageResult<Option<Clinic>> {
        let sealed = patch
            .gov_id
            .as_deref()
            .map(|v| self.cipher.seal(v))
            .transpose()?;
        let digest = patch.gov_id.as_deref().map(gov_id_digest);

        let row: Option<ClinicTuple> = query_as(&format!(
            r#"
            UPDATE clinics
            SET name = COALESCE($2, name),
                address = COALESCE($3, address),
                gov_id = COALESCE($4, gov_id),
                gov_id_digest = COALESCE($5, gov_id_digest),
                updated_at = now()
            WHERE id = $1
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&patch.name)
        .bind(&patch.address)
        .bind(&sealed)
        .bind(&digest)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|r| self.from_tuple(r)))
    }

    /// Hard delete. Access rows cascade. Returns the deleted ID, or `None`
    /// when the row is missing.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> StorageResult<Option<Uuid>> {
        let row: Option<(Uuid,)> = query_as("DELETE FROM clinics WHERE id = $1 RETURNING id")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(|(deleted,)| deleted))
    }

    /// Returns whether the clinic exists. Used before attaching doctors.
    pub async fn exists(&self, id: Uuid) -> StorageResult<bool> {
        let row: Option<(Uuid,)> = query_as("SELECT id FROM clinics WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row.is_some())
    }
}
