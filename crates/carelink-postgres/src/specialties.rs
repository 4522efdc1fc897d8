//! Specialty taxonomy storage. The taxonomy is fixed and seeded at schema
//! bootstrap; this module only reads it.

use sqlx_core::query_as::query_as;
use uuid::Uuid;

use carelink_core::Specialty;

use crate::{PgPool, StorageResult};

/// Specialty storage operations.
pub struct SpecialtyStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> SpecialtyStorage<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Lists the full taxonomy, alphabetically.
    pub async fn list(&self) -> StorageResult<Vec<Specialty>> {
        let rows: Vec<(Uuid, String, String)> =
            query_as("SELECT id, name, slug FROM specialties ORDER BY name")
                .fetch_all(self.pool)
                .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name, slug)| Specialty { id, name, slug })
            .collect())
    }

    /// Resolves slugs to specialty IDs. Unknown slugs are silently dropped,
    /// so an all-unknown filter yields an empty ID set (matching nothing).
    pub async fn find_ids_by_slugs(&self, slugs: &[String]) -> StorageResult<Vec<Uuid>> {
        if slugs.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<(Uuid,)> =
            query_as("SELECT id FROM specialties WHERE slug = ANY($1)")
                .bind(slugs)
                .fetch_all(self.pool)
                .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Returns how many of the given IDs exist. Doctor writes use this to
    /// reject unknown specialty IDs up front.
    pub async fn count_existing(&self, ids: &[Uuid]) -> StorageResult<i64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let (count,): (i64,) =
            query_as("SELECT count(*) FROM specialties WHERE id = ANY($1)")
                .bind(ids)
                .fetch_one(self.pool)
                .await?;

        Ok(count)
    }
}
