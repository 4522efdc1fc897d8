//! Organization (payer) storage.
//!
//! Government-ID values are sealed before insert and opened leniently on
//! every read. Equality filtering uses the deterministic digest column, not
//! the ciphertext.

use sqlx_core::query_as::query_as;
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use carelink_core::{Organization, OrganizationStatus, Plan, generate_id};
use carelink_crypto::{FieldCipher, gov_id_digest};

use crate::{PgPool, StorageResult, map_unique_violation};

type OrganizationTuple = (
    Uuid,
    String,
    String,
    i32,
    Option<String>,
    OffsetDateTime,
    OffsetDateTime,
);

const SELECT_COLUMNS: &str = "id, name, status, plan, gov_id, created_at, updated_at";

/// Fields accepted when creating an organization.
#[derive(Debug, Clone)]
pub struct NewOrganization {
    pub name: String,
    pub status: OrganizationStatus,
    pub plan: Plan,
    pub gov_id: Option<String>,
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct OrganizationPatch {
    pub name: Option<String>,
    pub status: Option<OrganizationStatus>,
    pub plan: Option<Plan>,
    pub gov_id: Option<String>,
}

impl OrganizationPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.status.is_none() && self.plan.is_none() && self.gov_id.is_none()
    }
}

/// List filters. `scope_ids` restricts results to the caller's accessible
/// organizations; `None` means unscoped (super admin).
#[derive(Debug, Clone, Default)]
pub struct OrganizationFilter {
    pub name: Option<String>,
    pub gov_id: Option<String>,
    pub status: Option<OrganizationStatus>,
    pub scope_ids: Option<Vec<Uuid>>,
}

/// Organization storage operations.
pub struct OrganizationStorage<'a> {
    pool: &'a PgPool,
    cipher: &'a FieldCipher,
}

impl<'a> OrganizationStorage<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool, cipher: &'a FieldCipher) -> Self {
        Self { pool, cipher }
    }

    fn from_tuple(&self, row: OrganizationTuple) -> StorageResult<Organization> {
        Ok(Organization {
            id: row.0,
            name: row.1,
            status: OrganizationStatus::parse(&row.2)?,
            plan: Plan::from_code(row.3)?,
            gov_id: row.4.map(|v| self.cipher.open_lenient(&v)),
            created_at: row.5,
            updated_at: row.6,
        })
    }

    /// Lists organizations with filters and pagination, newest first.
    /// Returns the page and the unpaginated total.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: &OrganizationFilter,
        limit: i64,
        offset: i64,
    ) -> StorageResult<(Vec<Organization>, i64)> {
        let digest = filter.gov_id.as_deref().map(gov_id_digest);
        let status = filter.status.map(|s| s.as_str());

        let rows: Vec<OrganizationTuple> = query_as(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM organizations
            WHERE ($1::text IS NULL OR name ILIKE '%' || $1 || '%')
              AND ($2::text IS NULL OR gov_id_digest = $2)
              AND ($3::text IS NULL OR status = $3)
              AND ($4::uuid[] IS NULL OR id = ANY($4))
            ORDER BY created_at DESC
            LIMIT $5 OFFSET $6
            "#
        ))
        .bind(&filter.name)
        .bind(&digest)
        .bind(status)
        .bind(&filter.scope_ids)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        let (total,): (i64,) = query_as(
            r#"
            SELECT count(*)
            FROM organizations
            WHERE ($1::text IS NULL OR name ILIKE '%' || $1 || '%')
              AND ($2::text IS NULL OR gov_id_digest = $2)
              AND ($3::text IS NULL OR status = $3)
              AND ($4::uuid[] IS NULL OR id = ANY($4))
            "#,
        )
        .bind(&filter.name)
        .bind(&digest)
        .bind(status)
        .bind(&filter.scope_ids)
        .fetch_one(self.pool)
        .await?;

        let list = rows
            .into_iter()
            .map(|row| self.from_tuple(row))
            .collect::<StorageResult<Vec<_>>>()?;

        Ok((list, total))
    }

    /// Finds an organization by its ID.
    pub async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<Organization>> {
        let row: Option<OrganizationTuple> = query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM organizations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(|r| self.from_tuple(r)).transpose()
    }

    /// Creates an organization, sealing its gov-ID.
    #[instrument(skip(self, new), fields(name = %new.name))]
    pub async fn create(&self, new: NewOrganization) -> StorageResult<Organization> {
        let sealed = new.gov_id.as_deref().map(|v| self.cipher.seal(v)).transpose()?;
        let digest = new.gov_id.as_deref().map(gov_id_digest);

        let row: OrganizationTuple = query_as(&format!(
            r#"
            INSERT INTO organizations (id, name, status, plan, gov_id, gov_id_digest)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(generate_id())
        .bind(&new.name)
        .bind(new.status.as_str())
        .bind(new.plan.code())
        .bind(&sealed)
        .bind(&digest)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            map_unique_violation(e, format!("Organization '{}' already exists", new.name))
        })?;

        self.from_tuple(row)
    }

    /// Applies a partial update. Returns `None` when the row is missing.
    #[instrument(skip(self, patch))]
    pub async fn update(
        &self,
        id: Uuid,
        patch: OrganizationPatch,
    ) -> StorageResult<Option<Organization>> {
        let sealed = patch
            .gov_id
            .as_deref()
            .map(|v| self.cipher.seal(v))
            .transpose()?;
        let digest = patch.gov_id.as_deref().map(gov_id_digest);
        let status = patch.status.map(|s| s.as_str());
        let plan = patch.plan.map(|p| p.code());

        let row: Option<OrganizationTuple> = query_as(&format!(
            r#"
            UPDATE organizations
            SET name = COALESCE($2, name),
                status = COALESCE($3, status),
                plan = COALESCE($4, plan),
                gov_id = COALESCE($5, gov_id),
                gov_id_digest = COALESCE($6, gov_id_digest),
                updated_at = now()
            WHERE id = $1
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&patch.name)
        .bind(status)
        .bind(plan)
        .bind(&sealed)
        .bind(&digest)
        .fetch_optional(self.pool)
        .await?;

        row.map(|r| self.from_tuple(r)).transpose()
    }

    /// Hard delete. Access rows cascade. Returns the deleted ID, or `None`
    /// when the row is missing.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> StorageResult<Option<Uuid>> {
        let row: Option<(Uuid,)> = query_as("DELETE FROM organizations WHERE id = $1 RETURNING id")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(|(deleted,)| deleted))
    }

    /// Returns whether the organization exists. Used before attaching
    /// beneficiaries to it.
    pub async fn exists(&self, id: Uuid) -> StorageResult<bool> {
        let row: Option<(Uuid,)> = query_as("SELECT id FROM organizations WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_is_empty() {
        assert!(OrganizationPatch::default().is_empty());
        let patch = OrganizationPatch {
            name: Some("Acme Health".to_string()),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }
}
