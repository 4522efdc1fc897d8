//! Account storage and password hashing.
//!
//! Accounts are the authentication identities behind profiles. Passwords
//! are stored as argon2id hashes; verification never reveals whether the
//! email or the password was wrong.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use carelink_core::generate_id;

use crate::{PgPool, StorageError, StorageResult, map_unique_violation};

/// Account record.
#[derive(Debug, Clone)]
pub struct AccountRow {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub created_at: OffsetDateTime,
}

impl AccountRow {
    fn from_tuple(row: (Uuid, String, String, OffsetDateTime)) -> Self {
        Self {
            id: row.0,
            email: row.1,
            password_hash: row.2,
            created_at: row.3,
        }
    }
}

/// Hashes a password with argon2id and a fresh random salt.
pub fn hash_password(password: &str) -> StorageResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| StorageError::credential(format!("Password hashing failed: {e}")))
}

/// Verifies a password against a stored argon2 hash. An unparsable hash
/// counts as a failed verification, not an error.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Account storage operations.
pub struct AccountStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> AccountStorage<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Finds an account by email.
    pub async fn find_by_email(&self, email: &str) -> StorageResult<Option<AccountRow>> {
        let row: Option<(Uuid, String, String, OffsetDateTime)> = query_as(
            "SELECT id, email, password_hash, created_at FROM accounts WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(AccountRow::from_tuple))
    }
}

/// Seeds a super-admin account and its linked profile if the email is not
/// taken yet. Returns whether anything was created. There is no public
/// sign-up surface, so the first operator identity comes from here.
#[instrument(skip(pool, password))]
pub async fn ensure_admin(
    pool: &PgPool,
    email: &str,
    password: &str,
    name: &str,
) -> StorageResult<bool> {
    if AccountStorage::new(pool).find_by_email(email).await?.is_some() {
        return Ok(false);
    }

    let password_hash = hash_password(password)?;
    let account_id = generate_id();

    let mut tx = pool.begin().await?;

    query("INSERT INTO accounts (id, email, password_hash) VALUES ($1, $2, $3)")
        .bind(account_id)
        .bind(email)
        .bind(&password_hash)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            map_unique_violation(e, format!("Account with email '{email}' already exists"))
        })?;

    query(
        "INSERT INTO profiles (id, account_id, name, email, role) \
         VALUES ($1, $2, $3, $4, 'super_admin')",
    )
    .bind(generate_id())
    .bind(account_id)
    .bind(name)
    .bind(email)
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        map_unique_violation(e, format!("Profile with email '{email}' already exists"))
    })?;

    tx.commit().await?;

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_round_trip() {
        let hash = hash_password("correct horse battery staple").unwrap();
        assert!(verify_password("correct horse battery staple", &hash));
        assert!(!verify_password("wrong password", &hash));
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_password("same").unwrap();
        let b = hash_password("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_unparsable_hash_fails_closed() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }
}
