//! HTTP handlers. Every authenticated handler checks the caller's ability
//! before touching storage.

pub mod auth;
pub mod beneficiaries;
pub mod clinics;
pub mod doctors;
pub mod organizations;
pub mod profile;
pub mod search;
pub mod specialties;
pub mod stats;

use carelink_ability::Denied;
use carelink_api::ApiError;
use carelink_postgres::StorageError;

/// Maps storage failures onto API errors. Client-class errors keep their
/// message; everything else is logged and collapsed to a generic 500.
pub(crate) fn storage_error(e: StorageError) -> ApiError {
    match e {
        StorageError::NotFound(m) => ApiError::not_found(m),
        StorageError::Conflict(m) => ApiError::conflict(m),
        other => {
            tracing::error!(error = %other, "Storage operation failed");
            ApiError::internal("Storage operation failed")
        }
    }
}

pub(crate) fn denied(d: Denied) -> ApiError {
    ApiError::forbidden(d.message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_mapping() {
        assert!(matches!(
            storage_error(StorageError::not_found("Organization x")),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            storage_error(StorageError::conflict("duplicate email")),
            ApiError::Conflict(_)
        ));
        assert!(matches!(
            storage_error(StorageError::credential("hashing failed")),
            ApiError::Internal(_)
        ));
    }
}
