//! Shared HTTP API surface: error mapping and pagination envelopes.

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Hard ceiling on page sizes, matching the public API contract.
pub const MAX_PAGE_LIMIT: u32 = 100;

/// High-level API errors to be mapped to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad-request",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not-found",
            ApiError::Conflict(_) => "conflict",
            ApiError::Internal(_) => "internal",
        }
    }

    fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(m)
            | ApiError::Unauthorized(m)
            | ApiError::Forbidden(m)
            | ApiError::NotFound(m)
            | ApiError::Conflict(m)
            | ApiError::Internal(m) => m,
        }
    }
}

/// JSON body emitted for every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.message().to_string(),
            },
        };

        let bytes = serde_json::to_vec(&body).unwrap_or_else(|_| {
            br#"{"error":{"code":"internal","message":"serialization failure"}}"#.to_vec()
        });

        let mut builder = axum::http::Response::builder().status(status);
        builder = builder.header(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        builder
            .body(axum::body::Body::from(bytes))
            .unwrap_or_else(|_| {
                axum::http::Response::builder()
                    .status(StatusCode::INTERNAL_SERVER_ERROR)
                    .body(axum::body::Body::from("{}"))
                    .expect("build fallback response")
            })
    }
}

// =============================================================================
// Pagination
// =============================================================================

/// Zero-based page/limit query parameters shared by all list endpoints.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    20
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: 0,
            limit: default_limit(),
        }
    }
}

impl PageParams {
    /// Builds params from raw query values, applying defaults. Query structs
    /// keep `page`/`limit` as `Option<u32>` because flattening this struct
    /// breaks under urlencoded deserialization.
    pub fn from_query(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(0),
            limit: limit.unwrap_or_else(default_limit),
        }
    }

    /// Clamps the limit to the API ceiling and returns (limit, offset).
    pub fn clamp(&self) -> (i64, i64) {
        let limit = self.limit.min(MAX_PAGE_LIMIT).max(1) as i64;
        let offset = limit * self.page as i64;
        (limit, offset)
    }
}

/// Paginated list envelope: `{ list, total, page, limit }`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PageResponse<T> {
    pub list: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
}

impl<T> PageResponse<T> {
    pub fn new(list: Vec<T>, total: i64, params: PageParams) -> Self {
        Self {
            list,
            total,
            page: params.page,
            limit: params.limit.min(MAX_PAGE_LIMIT),
        }
    }
}

/// Body returned by delete endpoints.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteReceipt {
    pub success: bool,
    pub deleted_id: Uuid,
}

impl DeleteReceipt {
    pub fn new(deleted_id: Uuid) -> Self {
        Self {
            success: true,
            deleted_id,
        }
    }
}

/// One dashboard stat: a total plus the delta against the previous month.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: i64,
    pub change: i64,
    pub change_type: ChangeType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Positive,
    Negative,
}

impl StatEntry {
    /// Shape a stat from raw counts: current value against last month's.
    pub fn from_counts(kind: impl Into<String>, value: i64, previous: i64) -> Self {
        let diff = value - previous;
        Self {
            kind: kind.into(),
            value,
            change: diff.abs(),
            change_type: if diff >= 0 {
                ChangeType::Positive
            } else {
                ChangeType::Negative
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[test]
    fn into_response_sets_status_and_content_type() {
        let resp = ApiError::bad_request("Invalid parameter").into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let content_type = resp.headers().get(header::CONTENT_TYPE).unwrap();
        assert_eq!(content_type, &HeaderValue::from_static("application/json"));
    }

    #[test]
    fn error_status_mapping() {
        assert_eq!(
            ApiError::not_found("x").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(ApiError::conflict("x").status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::unauthorized("x").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::forbidden("x").status_code(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn page_params_clamp_limit() {
        let params = PageParams {
            page: 2,
            limit: 500,
        };
        let (limit, offset) = params.clamp();
        assert_eq!(limit, 100);
        assert_eq!(offset, 200);
    }

    #[test]
    fn page_params_floor_limit() {
        let params = PageParams { page: 0, limit: 0 };
        let (limit, offset) = params.clamp();
        assert_eq!(limit, 1);
        assert_eq!(offset, 0);
    }

    #[test]
    fn stat_entry_positive_and_negative() {
        let up = StatEntry::from_counts("total_clinics", 12, 8);
        assert_eq!(up.change, 4);
        assert_eq!(up.change_type, ChangeType::Positive);

        let down = StatEntry::from_counts("total_clinics", 5, 9);
        assert_eq!(down.change, 4);
        assert_eq!(down.change_type, ChangeType::Negative);
    }
}
