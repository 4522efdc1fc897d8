//! Session storage.
//!
//! Session tokens are 256-bit random values handed to the client in an
//! HttpOnly cookie. Only the SHA-256 of the token is stored, so a leaked
//! database dump cannot be replayed as cookies.

use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use carelink_core::generate_id;

use crate::{PgPool, StorageResult};

/// Session record.
#[derive(Debug, Clone)]
pub struct SessionRow {
    pub id: Uuid,
    pub account_id: Uuid,
    pub expires_at: OffsetDateTime,
    pub created_at: OffsetDateTime,
}

impl SessionRow {
    fn from_tuple(row: (Uuid, Uuid, OffsetDateTime, OffsetDateTime)) -> Self {
        Self {
            id: row.0,
            account_id: row.1,
            expires_at: row.2,
            created_at: row.3,
        }
    }
}

/// Generates a fresh session token: 32 random bytes, hex-encoded.
pub fn generate_session_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// The at-rest form of a session token.
pub fn hash_session_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Session storage operations.
pub struct SessionStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> SessionStorage<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Creates a session for an account. The caller passes the token hash,
    /// never the raw token.
    #[instrument(skip(self, token_hash))]
    pub async fn create(
        &self,
        account_id: Uuid,
        token_hash: &str,
        expires_at: OffsetDateTime,
    ) -> StorageResult<SessionRow> {
        let row: (Uuid, Uuid, OffsetDateTime, OffsetDateTime) = query_as(
            r#"
            INSERT INTO sessions (id, account_id, token_hash, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, account_id, expires_at, created_at
            "#,
        )
        .bind(generate_id())
        .bind(account_id)
        .bind(token_hash)
        .bind(expires_at)
        .fetch_one(self.pool)
        .await?;

        Ok(SessionRow::from_tuple(row))
    }

    /// Finds a non-expired session by token hash.
    pub async fn find_active(&self, token_hash: &str) -> StorageResult<Option<SessionRow>> {
        let row: Option<(Uuid, Uuid, OffsetDateTime, OffsetDateTime)> = query_as(
            r#"
            SELECT id, account_id, expires_at, created_at
            FROM sessions
            WHERE token_hash = $1 AND expires_at > now()
            "#,
        )
        .bind(token_hash)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(SessionRow::from_tuple))
    }

    /// Revokes a session by token hash. Revoking an unknown token is not an
    /// error.
    #[instrument(skip(self, token_hash))]
    pub async fn revoke(&self, token_hash: &str) -> StorageResult<()> {
        query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(token_hash)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Deletes every expired session. Returns how many were removed.
    pub async fn purge_expired(&self) -> StorageResult<u64> {
        let result = query("DELETE FROM sessions WHERE expires_at <= now()")
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_are_unique_and_hex() {
        let a = generate_session_token();
        let b = generate_session_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_token_hash_is_deterministic() {
        let token = generate_session_token();
        assert_eq!(hash_session_token(&token), hash_session_token(&token));
        assert_ne!(hash_session_token(&token), token);
        assert_eq!(hash_session_token(&token).len(), 64);
    }
}
