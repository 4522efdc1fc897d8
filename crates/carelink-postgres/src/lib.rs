//! PostgreSQL storage backend for the Carelink server.
//!
//! Provides persistent storage for:
//!
//! - Organizations (payers) and their beneficiary profiles
//! - Clinics, doctor profiles and the specialty taxonomy
//! - The public clinic directory search (trigram-ranked)
//! - Accounts and sessions for cookie authentication
//! - The admin dashboard summary counts
//!
//! All SQL is hand-written; rows come back as tuples and are converted into
//! domain types at the storage boundary. Government-ID columns are sealed
//! with the field cipher before they reach a query and opened leniently on
//! every read path.

pub mod accounts;
pub mod clinics;
pub mod organizations;
pub mod pool;
pub mod profiles;
pub mod schema;
pub mod search;
pub mod sessions;
pub mod specialties;
pub mod stats;

use sqlx_core::pool::Pool;
use sqlx_postgres::Postgres;

/// PostgreSQL connection pool type alias.
pub type PgPool = Pool<Postgres>;

pub use accounts::{AccountStorage, ensure_admin, hash_password, verify_password};
pub use clinics::ClinicStorage;
pub use organizations::OrganizationStorage;
pub use pool::create_pool;
pub use profiles::{BeneficiaryStorage, DoctorStorage, ProfileStorage};
pub use schema::ensure_schema;
pub use search::DirectorySearch;
pub use sessions::{SessionStorage, generate_session_token, hash_session_token};
pub use specialties::SpecialtyStorage;
pub use stats::StatsStorage;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx_core::Error),

    /// Requested row was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Row already exists (unique constraint violation).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored value could not be mapped to a domain type.
    #[error("Invalid stored data: {0}")]
    Domain(#[from] carelink_core::CoreError),

    /// Field encryption failed.
    #[error("Encryption error: {0}")]
    Crypto(#[from] carelink_crypto::CryptoError),

    /// Password hashing or verification failed.
    #[error("Credential error: {0}")]
    Credential(String),
}

impl StorageError {
    /// Create a `NotFound` error.
    #[must_use]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(resource.into())
    }

    /// Create a `Conflict` error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Create a `Credential` error.
    #[must_use]
    pub fn credential(message: impl Into<String>) -> Self {
        Self::Credential(message.into())
    }

    /// Returns `true` if this is a `NotFound` error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns `true` if this is a `Conflict` error.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Returns `true` if this is a client error (4xx equivalent).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Conflict(_))
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Maps a unique-constraint violation onto `Conflict`, leaving every other
/// database error untouched. Write paths rely on this instead of pre-flight
/// existence checks.
pub(crate) fn map_unique_violation(
    e: sqlx_core::Error,
    message: impl Into<String>,
) -> StorageError {
    if let sqlx_core::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return StorageError::conflict(message);
    }
    StorageError::from(e)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_not_found() {
        let err = StorageError::not_found("Organization abc123");
        assert!(err.is_not_found());
        assert!(err.is_client_error());
        assert_eq!(err.to_string(), "Not found: Organization abc123");
    }

    #[test]
    fn test_storage_error_conflict() {
        let err = StorageError::conflict("Profile with email 'a@b.c' already exists");
        assert!(err.is_conflict());
        assert!(err.is_client_error());
    }

    #[test]
    fn test_database_error_is_not_client_error() {
        let err = StorageError::from(sqlx_core::Error::PoolClosed);
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_map_unique_violation_passthrough() {
        // A non-database error is never turned into a conflict.
        let err = map_unique_violation(sqlx_core::Error::PoolClosed, "duplicate");
        assert!(!err.is_conflict());
    }
}
