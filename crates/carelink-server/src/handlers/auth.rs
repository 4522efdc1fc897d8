//! Sign-in and sign-out.
//!
//! Sign-in verifies the password, mints a random session token and hands it
//! to the client as an HttpOnly cookie; only the token's hash is persisted.
//! Both failure modes (unknown email, wrong password) produce the same 401.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, HeaderValue, header::SET_COOKIE},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use time::{Duration, OffsetDateTime};

use carelink_api::ApiError;
use carelink_postgres::{
    AccountStorage, SessionStorage, generate_session_token, hash_session_token, verify_password,
};

use super::storage_error;
use crate::extract::cookie_value;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SignInBody {
    pub email: String,
    pub password: String,
}

fn session_cookie(state: &AppState, token: &str, max_age_secs: i64) -> Result<HeaderValue, ApiError> {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        state.config.auth.cookie_name, token, max_age_secs
    );
    if state.config.auth.secure_cookies {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
        .map_err(|_| ApiError::internal("Failed to build session cookie"))
}

pub async fn sign_in(
    State(state): State<AppState>,
    Json(body): Json<SignInBody>,
) -> Result<impl IntoResponse, ApiError> {
    let account = AccountStorage::new(&state.pool)
        .find_by_email(body.email.trim())
        .await
        .map_err(storage_error)?;

    let account = match account {
        Some(a) if verify_password(&body.password, &a.password_hash) => a,
        _ => return Err(ApiError::unauthorized("Invalid email or password")),
    };

    let ttl = state.config.auth.session_ttl_secs as i64;
    let token = generate_session_token();
    let expires_at = OffsetDateTime::now_utc() + Duration::seconds(ttl);

    SessionStorage::new(&state.pool)
        .create(account.id, &hash_session_token(&token), expires_at)
        .await
        .map_err(storage_error)?;

    tracing::info!(account_id = %account.id, "Sign-in succeeded");

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, session_cookie(&state, &token, ttl)?);

    Ok((headers, Json(json!({ "success": true }))))
}

pub async fn sign_out(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = cookie_value(&headers, &state.config.auth.cookie_name) {
        SessionStorage::new(&state.pool)
            .revoke(&hash_session_token(&token))
            .await
            .map_err(storage_error)?;
    }

    // Expire the cookie client-side regardless of whether a session existed.
    let mut response_headers = HeaderMap::new();
    response_headers.insert(SET_COOKIE, session_cookie(&state, "", 0)?);

    Ok((response_headers, Json(json!({ "success": true }))))
}
