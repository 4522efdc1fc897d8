//! Schema bootstrap.
//!
//! Tables and indexes are created idempotently at startup. The `pg_trgm`
//! extension backs the directory search's address similarity ranking, so it
//! is created here as well.

use sqlx_core::query::query;
use tracing::{debug, info, instrument};

use crate::{PgPool, StorageResult};

const SCHEMA_STATEMENTS: &[&str] = &[
    "CREATE EXTENSION IF NOT EXISTS pg_trgm",
    r#"
    CREATE TABLE IF NOT EXISTS organizations (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'active',
        plan INTEGER NOT NULL DEFAULT 0,
        gov_id TEXT,
        gov_id_digest TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS clinics (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        address TEXT,
        gov_id TEXT,
        gov_id_digest TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS specialties (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        slug TEXT NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS accounts (
        id UUID PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS profiles (
        id UUID PRIMARY KEY,
        account_id UUID REFERENCES accounts(id) ON DELETE SET NULL,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        role TEXT NOT NULL,
        plan INTEGER NOT NULL DEFAULT 0,
        status TEXT NOT NULL DEFAULT 'active',
        gov_id TEXT,
        gov_id_digest TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS profile_organization_access (
        profile_id UUID NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
        organization_id UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
        PRIMARY KEY (profile_id, organization_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS profile_clinic_access (
        profile_id UUID NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
        clinic_id UUID NOT NULL REFERENCES clinics(id) ON DELETE CASCADE,
        PRIMARY KEY (profile_id, clinic_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS profile_specialties (
        profile_id UUID NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
        specialty_id UUID NOT NULL REFERENCES specialties(id) ON DELETE CASCADE,
        PRIMARY KEY (profile_id, specialty_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sessions (
        id UUID PRIMARY KEY,
        account_id UUID NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
        token_hash TEXT NOT NULL UNIQUE,
        expires_at TIMESTAMPTZ NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_clinics_address_trgm ON clinics USING gin (address gin_trgm_ops)",
    "CREATE INDEX IF NOT EXISTS idx_organizations_gov_id_digest ON organizations (gov_id_digest)",
    "CREATE INDEX IF NOT EXISTS idx_profiles_gov_id_digest ON profiles (gov_id_digest)",
    "CREATE INDEX IF NOT EXISTS idx_profiles_role ON profiles (role)",
    "CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions (expires_at)",
];

/// The fixed specialty taxonomy, seeded once as (name, slug).
const SPECIALTY_TAXONOMY: &[(&str, &str)] = &[
    ("Cardiology", "cardiology"),
    ("Dermatology", "dermatology"),
    ("General Practice", "general-practice"),
    ("Gynecology", "gynecology"),
    ("Neurology", "neurology"),
    ("Ophthalmology", "ophthalmology"),
    ("Orthopedics", "orthopedics"),
    ("Pediatrics", "pediatrics"),
    ("Psychiatry", "psychiatry"),
];

/// Creates all tables, indexes and the trigram extension, then seeds the
/// specialty taxonomy. Every statement is idempotent.
#[instrument(skip(pool))]
pub async fn ensure_schema(pool: &PgPool) -> StorageResult<()> {
    for statement in SCHEMA_STATEMENTS {
        query(statement).execute(pool).await?;
    }
    debug!(
        statements = SCHEMA_STATEMENTS.len(),
        "Schema statements applied"
    );

    for (name, slug) in SPECIALTY_TAXONOMY {
        query(
            r#"
            INSERT INTO specialties (id, name, slug)
            VALUES ($1, $2, $3)
            ON CONFLICT (slug) DO NOTHING
            "#,
        )
        .bind(carelink_core::generate_id())
        .bind(name)
        .bind(slug)
        .execute(pool)
        .await?;
    }

    info!("Database schema ready");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_slugs_are_unique() {
        let mut slugs: Vec<&str> = SPECIALTY_TAXONOMY.iter().map(|(_, s)| *s).collect();
        slugs.sort_unstable();
        slugs.dedup();
        assert_eq!(slugs.len(), SPECIALTY_TAXONOMY.len());
    }

    #[test]
    fn test_every_table_statement_is_idempotent() {
        for stmt in SCHEMA_STATEMENTS {
            assert!(
                stmt.contains("IF NOT EXISTS"),
                "statement is not idempotent: {stmt}"
            );
        }
    }
}
