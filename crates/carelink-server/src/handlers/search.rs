//! Public clinic directory search. No authentication required.

use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};
use serde::Deserialize;

use carelink_api::{ApiError, PageParams, PageResponse};
use carelink_postgres::{DirectorySearch, SpecialtyStorage};
use carelink_postgres::search::SearchFilter;

use super::storage_error;
use crate::state::AppState;

/// `specialty` accepts a comma-separated list of slugs, e.g.
/// `?specialty=cardiology,neurology`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub address: Option<String>,
    pub specialty: Option<String>,
}

impl SearchQuery {
    fn specialty_slugs(&self) -> Option<Vec<String>> {
        let raw = self.specialty.as_deref()?;
        let slugs: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if slugs.is_empty() { None } else { Some(slugs) }
    }
}

pub async fn search(
    State(state): State<AppState>,
    Query(q): Query<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let address = q
        .address
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string);

    // A requested-but-unresolvable specialty filter must match nothing, so
    // an empty resolved ID set is kept as Some(vec![]).
    let specialty_ids = match q.specialty_slugs() {
        Some(slugs) => Some(
            SpecialtyStorage::new(&state.pool)
                .find_ids_by_slugs(&slugs)
                .await
                .map_err(storage_error)?,
        ),
        None => None,
    };

    let filter = SearchFilter {
        address,
        specialty_ids,
    };

    let page = PageParams::from_query(
        q.page,
        q.limit.or(Some(state.config.search.default_limit)),
    );
    let (limit, offset) = page.clamp();
    let limit = limit.min(state.config.search.max_limit as i64);

    let (list, total) =
        DirectorySearch::new(&state.pool, state.config.search.min_similarity)
            .search(&filter, limit, offset)
            .await
            .map_err(storage_error)?;

    Ok(Json(PageResponse::new(list, total, page)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(specialty: Option<&str>) -> SearchQuery {
        SearchQuery {
            page: None,
            limit: None,
            address: None,
            specialty: specialty.map(str::to_string),
        }
    }

    #[test]
    fn test_specialty_slugs_split_and_trimmed() {
        let q = query(Some("cardiology, neurology ,"));
        assert_eq!(
            q.specialty_slugs(),
            Some(vec!["cardiology".to_string(), "neurology".to_string()])
        );
    }

    #[test]
    fn test_absent_or_blank_specialty_is_none() {
        assert!(query(None).specialty_slugs().is_none());
        assert!(query(Some("")).specialty_slugs().is_none());
        assert!(query(Some(" , ")).specialty_slugs().is_none());
    }
}
