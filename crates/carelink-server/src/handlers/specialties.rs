//! Specialty taxonomy listing. Public read surface.

use axum::{Json, extract::State, response::IntoResponse};

use carelink_api::ApiError;
use carelink_postgres::SpecialtyStorage;

use super::storage_error;
use crate::state::AppState;

pub async fn list(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let specialties = SpecialtyStorage::new(&state.pool)
        .list()
        .await
        .map_err(storage_error)?;

    Ok(Json(specialties))
}
