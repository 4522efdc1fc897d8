//! Public clinic directory search.
//!
//! Free-text address matching is trigram similarity (`pg_trgm`); results are
//! ranked by similarity when an address is given and by recency otherwise.
//! Specialty facets keep only clinics with at least one doctor holding a
//! matching specialty.

use sqlx_core::query_as::query_as;
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use carelink_core::Specialty;
use serde::Serialize;

use crate::{PgPool, StorageResult};

/// Search facets. `specialty_ids: Some(vec![])` means a specialty filter was
/// requested but resolved to no known IDs, which must match nothing; `None`
/// means no specialty filter at all.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub address: Option<String>,
    pub specialty_ids: Option<Vec<Uuid>>,
}

/// One directory result: the clinic plus its aggregated specialty set and
/// its ranking score.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub specialties: Vec<Specialty>,
    pub relevance: f32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

type SearchTuple = (
    Uuid,
    String,
    Option<String>,
    f32,
    serde_json::Value,
    OffsetDateTime,
);

/// Directory search operations.
pub struct DirectorySearch<'a> {
    pool: &'a PgPool,
    min_similarity: f32,
}

impl<'a> DirectorySearch<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool, min_similarity: f32) -> Self {
        Self {
            pool,
            min_similarity,
        }
    }

    /// Runs the search and returns the page plus the unpaginated total.
    #[instrument(skip(self))]
    pub async fn search(
        &self,
        filter: &SearchFilter,
        limit: i64,
        offset: i64,
    ) -> StorageResult<(Vec<SearchHit>, i64)> {
        let rows: Vec<SearchTuple> = query_as(
            r#"
            SELECT c.id, c.name, c.address,
                   CASE
                       WHEN $1::text IS NULL THEN 1.0::real
                       ELSE similarity(c.address, $1)
                   END AS relevance,
                   COALESCE(
                       json_agg(DISTINCT jsonb_build_object(
                           'id', s.id, 'name', s.name, 'slug', s.slug))
                           FILTER (WHERE s.id IS NOT NULL),
                       '[]'::json
                   ) AS specialties,
                   c.created_at
            FROM clinics c
            LEFT JOIN profile_clinic_access pca ON pca.clinic_id = c.id
            LEFT JOIN profile_specialties ps ON ps.profile_id = pca.profile_id
            LEFT JOIN specialties s ON s.id = ps.specialty_id
            WHERE ($1::text IS NULL OR similarity(c.address, $1) > $2)
              AND ($3::uuid[] IS NULL OR EXISTS (
                    SELECT 1
                    FROM profile_clinic_access pca2
                    JOIN profile_specialties ps2 ON ps2.profile_id = pca2.profile_id
                    WHERE pca2.clinic_id = c.id AND ps2.specialty_id = ANY($3)))
            GROUP BY c.id
            ORDER BY relevance DESC, c.created_at DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(&filter.address)
        .bind(self.min_similarity)
        .bind(&filter.specialty_ids)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        let (total,): (i64,) = query_as(
            r#"
            SELECT count(*)
            FROM clinics c
            WHERE ($1::text IS NULL OR similarity(c.address, $1) > $2)
              AND ($3::uuid[] IS NULL OR EXISTS (
                    SELECT 1
                    FROM profile_clinic_access pca2
                    JOIN profile_specialties ps2 ON ps2.profile_id = pca2.profile_id
                    WHERE pca2.clinic_id = c.id AND ps2.specialty_id = ANY($3)))
            "#,
        )
        .bind(&filter.address)
        .bind(self.min_similarity)
        .bind(&filter.specialty_ids)
        .fetch_one(self.pool)
        .await?;

        let list = rows
            .into_iter()
            .map(|(id, name, address, relevance, specialties, created_at)| {
                Ok(SearchHit {
                    id,
                    name,
                    address,
                    specialties: serde_json::from_value(specialties)?,
                    relevance,
                    created_at,
                })
            })
            .collect::<StorageResult<Vec<_>>>()?;

        Ok((list, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_specialty_filter_distinct_from_absent() {
        // An absent filter matches everything; a present-but-empty one must
        // match nothing. The two cases bind differently.
        let absent = SearchFilter::default();
        assert!(absent.specialty_ids.is_none());

        let empty = SearchFilter {
            specialty_ids: Some(Vec::new()),
            ..Default::default()
        };
        assert_eq!(empty.specialty_ids.as_deref(), Some(&[][..]));
    }

    #[test]
    fn test_search_hit_serializes_camel_case() {
        let hit = SearchHit {
            id: Uuid::new_v4(),
            name: "Vida Clinic".to_string(),
            address: Some("12 Harbor St".to_string()),
            specialties: Vec::new(),
            relevance: 0.42,
            created_at: OffsetDateTime::UNIX_EPOCH,
        };
        let json = serde_json::to_value(&hit).unwrap();
        assert!(json.get("createdAt").is_some());
        assert!(json.get("relevance").is_some());
    }
}
