//! The caller's own profile.

use axum::{Json, response::IntoResponse};

use carelink_api::ApiError;

use crate::extract::CurrentUser;

/// Returns the resolved caller context: profile fields plus the access-ID
/// lists the ability engine works from.
pub async fn me(CurrentUser(user): CurrentUser) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(user))
}
