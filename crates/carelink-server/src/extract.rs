//! Session-cookie authentication extractor.
//!
//! `CurrentUser` rejects with 401 when the cookie is missing, the session is
//! expired, or no profile is linked to the account. Public surfaces like the
//! directory search simply take no user.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header::COOKIE, request::Parts},
};

use carelink_api::ApiError;
use carelink_core::UserContext;
use carelink_postgres::{ProfileStorage, SessionStorage, hash_session_token};

use crate::state::AppState;

/// Reads one cookie value out of the request's `Cookie` headers.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.to_string())
}

/// The authenticated caller. Rejects unauthenticated requests with 401.
pub struct CurrentUser(pub UserContext);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);

        let token = cookie_value(&parts.headers, &state.config.auth.cookie_name)
            .ok_or_else(|| ApiError::unauthorized("Missing session cookie"))?;

        let token_hash = hash_session_token(&token);
        let session = SessionStorage::new(&state.pool)
            .find_active(&token_hash)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Session lookup failed");
                ApiError::internal("Session lookup failed")
            })?
            .ok_or_else(|| ApiError::unauthorized("Session expired or unknown"))?;

        let user = ProfileStorage::new(&state.pool, &state.cipher)
            .user_context(session.account_id)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Profile lookup failed");
                ApiError::internal("Profile lookup failed")
            })?
            .ok_or_else(|| ApiError::unauthorized("No profile linked to this account"))?;

        Ok(CurrentUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_cookie_value_parses_multiple_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; carelink_session=abc123; lang=en"),
        );

        assert_eq!(
            cookie_value(&headers, "carelink_session").as_deref(),
            Some("abc123")
        );
        assert_eq!(cookie_value(&headers, "theme").as_deref(), Some("dark"));
        assert!(cookie_value(&headers, "missing").is_none());
    }

    #[test]
    fn test_cookie_value_ignores_name_prefix_collisions() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("carelink_session_old=zzz"));
        assert!(cookie_value(&headers, "carelink_session").is_none());
    }
}
