//! Profile storage: beneficiaries, doctors and the caller's own context.
//!
//! Beneficiaries and doctors are both projections over the `profiles` table
//! plus their access join rows. Multi-table writes (create, specialty
//! reconciliation) run inside a single transaction.

use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use carelink_core::{
    Beneficiary, Doctor, OrganizationStatus, Plan, Profile, Role, Specialty, UserContext,
    generate_id,
};
use carelink_crypto::{FieldCipher, gov_id_digest};

use crate::{PgPool, StorageError, StorageResult, map_unique_violation};

type ProfileTuple = (
    Uuid,
    Option<Uuid>,
    String,
    String,
    String,
    i32,
    String,
    Option<String>,
    OffsetDateTime,
    OffsetDateTime,
);

const PROFILE_COLUMNS: &str = "p.id, p.account_id, p.name, p.email, p.role, p.plan, p.status, \
                               p.gov_id, p.created_at, p.updated_at";

fn profile_from_tuple(cipher: &FieldCipher, row: ProfileTuple) -> StorageResult<Profile> {
    Ok(Profile {
        id: row.0,
        account_id: row.1,
        name: row.2,
        email: row.3,
        role: Role::parse(&row.4)?,
        plan: Plan::from_code(row.5)?,
        status: OrganizationStatus::parse(&row.6)?,
        gov_id: row.7.map(|v| cipher.open_lenient(&v)),
        created_at: row.8,
        updated_at: row.9,
    })
}

/// Computes the insert/delete sets that turn `current` into `requested`.
/// IDs present in both sets are left untouched.
pub fn specialty_diff(current: &[Uuid], requested: &[Uuid]) -> (Vec<Uuid>, Vec<Uuid>) {
    let to_insert: Vec<Uuid> = requested
        .iter()
        .filter(|id| !current.contains(id))
        .copied()
        .collect();
    let to_delete: Vec<Uuid> = current
        .iter()
        .filter(|id| !requested.contains(id))
        .copied()
        .collect();
    (to_insert, to_delete)
}

// =============================================================================
// Beneficiaries
// =============================================================================

type BeneficiaryTuple = (
    Uuid,
    Option<Uuid>,
    String,
    String,
    String,
    i32,
    String,
    Option<String>,
    OffsetDateTime,
    OffsetDateTime,
    Option<Uuid>,
);

/// Fields accepted when creating a beneficiary.
#[derive(Debug, Clone)]
pub struct NewBeneficiary {
    pub name: String,
    pub email: String,
    pub plan: Plan,
    pub status: OrganizationStatus,
    pub gov_id: Option<String>,
    pub organization_id: Option<Uuid>,
}

/// Partial update; `None` fields are left untouched. A present
/// `organization_id` moves the beneficiary to that organization.
#[derive(Debug, Clone, Default)]
pub struct BeneficiaryPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub plan: Option<Plan>,
    pub status: Option<OrganizationStatus>,
    pub gov_id: Option<String>,
    pub organization_id: Option<Uuid>,
}

/// List filters. `scope_org_ids` restricts to the caller's organizations.
#[derive(Debug, Clone, Default)]
pub struct BeneficiaryFilter {
    pub name: Option<String>,
    pub gov_id: Option<String>,
    pub status: Option<OrganizationStatus>,
    pub organization_id: Option<Uuid>,
    pub scope_org_ids: Option<Vec<Uuid>>,
}

const BENEFICIARY_ORG_SUBQUERY: &str = "(SELECT poa.organization_id \
     FROM profile_organization_access poa \
     WHERE poa.profile_id = p.id \
     LIMIT 1) AS organization_id";

/// Beneficiary storage operations.
pub struct BeneficiaryStorage<'a> {
    pool: &'a PgPool,
    cipher: &'a FieldCipher,
}

impl<'a> BeneficiaryStorage<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool, cipher: &'a FieldCipher) -> Self {
        Self { pool, cipher }
    }

    fn from_tuple(&self, row: BeneficiaryTuple) -> StorageResult<Beneficiary> {
        let organization_id = row.10;
        let profile = profile_from_tuple(
            self.cipher,
            (
                row.0, row.1, row.2, row.3, row.4, row.5, row.6, row.7, row.8, row.9,
            ),
        )?;
        Ok(Beneficiary {
            profile,
            organization_id,
        })
    }

    /// Lists beneficiaries with filters and pagination, newest first.
    /// Organization filters use EXISTS and the owner comes from a scalar
    /// subquery, so extra access rows never fan a profile out into
    /// duplicate result rows.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: &BeneficiaryFilter,
        limit: i64,
        offset: i64,
    ) -> StorageResult<(Vec<Beneficiary>, i64)> {
        let digest = filter.gov_id.as_deref().map(gov_id_digest);
        let status = filter.status.map(|s| s.as_str());

        let rows: Vec<BeneficiaryTuple> = query_as(&format!(
            r#"
            SELECT {PROFILE_COLUMNS}, {BENEFICIARY_ORG_SUBQUERY}
            FROM profiles p
            WHERE p.role = 'beneficiary'
              AND ($1::text IS NULL OR p.name ILIKE '%' || $1 || '%')
              AND ($2::text IS NULL OR p.gov_id_digest = $2)
              AND ($3::text IS NULL OR p.status = $3)
              AND ($4::uuid IS NULL OR EXISTS (
                    SELECT 1 FROM profile_organization_access poa
                    WHERE poa.profile_id = p.id AND poa.organization_id = $4))
              AND ($5::uuid[] IS NULL OR EXISTS (
                    SELECT 1 FROM profile_organization_access poa
                    WHERE poa.profile_id = p.id AND poa.organization_id = ANY($5)))
            ORDER BY p.created_at DESC
            LIMIT $6 OFFSET $7
            "#
        ))
        .bind(&filter.name)
        .bind(&digest)
        .bind(status)
        .bind(filter.organization_id)
        .bind(&filter.scope_org_ids)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        let (total,): (i64,) = query_as(
            r#"
            SELECT count(*)
            FROM profiles p
            WHERE p.role = 'beneficiary'
              AND ($1::text IS NULL OR p.name ILIKE '%' || $1 || '%')
              AND ($2::text IS NULL OR p.gov_id_digest = $2)
              AND ($3::text IS NULL OR p.status = $3)
              AND ($4::uuid IS NULL OR EXISTS (
                    SELECT 1 FROM profile_organization_access poa
                    WHERE poa.profile_id = p.id AND poa.organization_id = $4))
              AND ($5::uuid[] IS NULL OR EXISTS (
                    SELECT 1 FROM profile_organization_access poa
                    WHERE poa.profile_id = p.id AND poa.organization_id = ANY($5)))
            "#,
        )
        .bind(&filter.name)
        .bind(&digest)
        .bind(status)
        .bind(filter.organization_id)
        .bind(&filter.scope_org_ids)
        .fetch_one(self.pool)
        .await?;

        let list = rows
            .into_iter()
            .map(|row| self.from_tuple(row))
            .collect::<StorageResult<Vec<_>>>()?;

        Ok((list, total))
    }

    /// Finds a beneficiary by profile ID.
    pub async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<Beneficiary>> {
        let row: Option<BeneficiaryTuple> = query_as(&format!(
            r#"
            SELECT {PROFILE_COLUMNS}, {BENEFICIARY_ORG_SUBQUERY}
            FROM profiles p
            WHERE p.role = 'beneficiary' AND p.id = $1
            "#
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(|r| self.from_tuple(r)).transpose()
    }

    /// Creates the profile and its organization-access row in one
    /// transaction. Duplicate email maps to `Conflict`.
    #[instrument(skip(self, new), fields(email = %new.email))]
    pub async fn create(&self, new: NewBeneficiary) -> StorageResult<Beneficiary> {
        let sealed = new.gov_id.as_deref().map(|v| self.cipher.seal(v)).transpose()?;
        let digest = new.gov_id.as_deref().map(gov_id_digest);

        let mut tx = self.pool.begin().await?;

        let row: ProfileTuple = query_as(&format!(
            r#"
            INSERT INTO profiles (id, name, email, role, plan, status, gov_id, gov_id_digest)
            VALUES ($1, $2, $3, 'beneficiary', $4, $5, $6, $7)
            RETURNING {PROFILE_COLUMNS_BARE}
            "#,
            PROFILE_COLUMNS_BARE = PROFILE_COLUMNS.replace("p.", "")
        ))
        .bind(generate_id())
        .bind(&new.name)
        .bind(&new.email)
        .bind(new.plan.code())
        .bind(new.status.as_str())
        .bind(&sealed)
        .bind(&digest)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            map_unique_violation(e, format!("Profile with email '{}' already exists", new.email))
        })?;

        if let Some(org_id) = new.organization_id {
            query(
                "INSERT INTO profile_organization_access (profile_id, organization_id) \
                 VALUES ($1, $2)",
            )
            .bind(row.0)
            .bind(org_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        let profile = profile_from_tuple(self.cipher, row)?;
        Ok(Beneficiary {
            profile,
            organization_id: new.organization_id,
        })
    }

    /// Applies a partial update, moving the access row when a new
    /// organization is given. Returns `None` when the row is missing.
    #[instrument(skip(self, patch))]
    pub async fn update(
        &self,
        id: Uuid,
        patch: BeneficiaryPatch,
    ) -> StorageResult<Option<Beneficiary>> {
        let sealed = patch
            .gov_id
            .as_deref()
            .map(|v| self.cipher.seal(v))
            .transpose()?;
        let digest = patch.gov_id.as_deref().map(gov_id_digest);
        let status = patch.status.map(|s| s.as_str());
        let plan = patch.plan.map(|p| p.code());

        let mut tx = self.pool.begin().await?;

        let row: Option<ProfileTuple> = query_as(&format!(
            r#"
            UPDATE profiles
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                plan = COALESCE($4, plan),
                status = COALESCE($5, status),
                gov_id = COALESCE($6, gov_id),
                gov_id_digest = COALESCE($7, gov_id_digest),
                updated_at = now()
            WHERE id = $1 AND role = 'beneficiary'
            RETURNING {PROFILE_COLUMNS_BARE}
            "#,
            PROFILE_COLUMNS_BARE = PROFILE_COLUMNS.replace("p.", "")
        ))
        .bind(id)
        .bind(&patch.name)
        .bind(&patch.email)
        .bind(plan)
        .bind(status)
        .bind(&sealed)
        .bind(&digest)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, "Profile email already in use"))?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };

        if let Some(org_id) = patch.organization_id {
            query("DELETE FROM profile_organization_access WHERE profile_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            query(
                "INSERT INTO profile_organization_access (profile_id, organization_id) \
                 VALUES ($1, $2)",
            )
            .bind(id)
            .bind(org_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.find_by_id(row.0).await
    }

    /// Hard delete. Access rows cascade.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> StorageResult<Option<Uuid>> {
        let row: Option<(Uuid,)> = query_as(
            "DELETE FROM profiles WHERE id = $1 AND role = 'beneficiary' RETURNING id",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|(deleted,)| deleted))
    }
}

// =============================================================================
// Doctors
// =============================================================================

type DoctorTuple = (
    Uuid,
    Option<Uuid>,
    String,
    String,
    String,
    i32,
    String,
    Option<String>,
    OffsetDateTime,
    OffsetDateTime,
    Option<Uuid>,
    serde_json::Value,
);

/// Fields accepted when creating a doctor.
#[derive(Debug, Clone)]
pub struct NewDoctor {
    pub name: String,
    pub email: String,
    pub gov_id: Option<String>,
    pub clinic_id: Option<Uuid>,
    pub specialty_ids: Vec<Uuid>,
}

/// Partial update; a present `specialty_ids` replaces the doctor's specialty
/// set via diff-and-apply.
#[derive(Debug, Clone, Default)]
pub struct DoctorPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub gov_id: Option<String>,
    pub clinic_id: Option<Uuid>,
    pub specialty_ids: Option<Vec<Uuid>>,
}

/// List filters. `scope_clinic_ids` restricts to the caller's clinics.
#[derive(Debug, Clone, Default)]
pub struct DoctorFilter {
    pub name: Option<String>,
    pub specialty_id: Option<Uuid>,
    pub clinic_id: Option<Uuid>,
    pub scope_clinic_ids: Option<Vec<Uuid>>,
}

// Clinic placement comes from a scalar subquery rather than a join, so a
// profile with several access rows still projects to one result row.
const DOCTOR_SELECT: &str = r#"
    SELECT p.id, p.account_id, p.name, p.email, p.role, p.plan, p.status,
           p.gov_id, p.created_at, p.updated_at,
           (SELECT pca.clinic_id
              FROM profile_clinic_access pca
              WHERE pca.profile_id = p.id
              LIMIT 1) AS clinic_id,
           COALESCE(
               json_agg(json_build_object('id', s.id, 'name', s.name, 'slug', s.slug))
                   FILTER (WHERE s.id IS NOT NULL),
               '[]'::json
           ) AS specialties
    FROM profiles p
    LEFT JOIN profile_specialties ps ON ps.profile_id = p.id
    LEFT JOIN specialties s ON s.id = ps.specialty_id
"#;

/// Doctor storage operations.
pub struct DoctorStorage<'a> {
    pool: &'a PgPool,
    cipher: &'a FieldCipher,
}

impl<'a> DoctorStorage<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool, cipher: &'a FieldCipher) -> Self {
        Self { pool, cipher }
    }

    fn from_tuple(&self, row: DoctorTuple) -> StorageResult<Doctor> {
        let clinic_id = row.10;
        let specialties: Vec<Specialty> = serde_json::from_value(row.11)?;
        let profile = profile_from_tuple(
            self.cipher,
            (
                row.0, row.1, row.2, row.3, row.4, row.5, row.6, row.7, row.8, row.9,
            ),
        )?;
        Ok(Doctor {
            profile,
            clinic_id,
            specialties,
        })
    }

    /// Lists doctors with filters and pagination, newest first. Specialty,
    /// clinic and scope filters all use EXISTS so they never distort the
    /// aggregated specialty list or duplicate a profile.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: &DoctorFilter,
        limit: i64,
        offset: i64,
    ) -> StorageResult<(Vec<Doctor>, i64)> {
        let rows: Vec<DoctorTuple> = query_as(&format!(
            r#"
            {DOCTOR_SELECT}
            WHERE p.role = 'doctor'
              AND ($1::text IS NULL OR p.name ILIKE '%' || $1 || '%')
              AND ($2::uuid IS NULL OR EXISTS (
                    SELECT 1 FROM profile_specialties psx
                    WHERE psx.profile_id = p.id AND psx.specialty_id = $2))
              AND ($3::uuid IS NULL OR EXISTS (
                    SELECT 1 FROM profile_clinic_access pcx
                    WHERE pcx.profile_id = p.id AND pcx.clinic_id = $3))
              AND ($4::uuid[] IS NULL OR EXISTS (
                    SELECT 1 FROM profile_clinic_access pcx
                    WHERE pcx.profile_id = p.id AND pcx.clinic_id = ANY($4)))
            GROUP BY p.id
            ORDER BY p.created_at DESC
            LIMIT $5 OFFSET $6
            "#
        ))
        .bind(&filter.name)
        .bind(filter.specialty_id)
        .bind(filter.clinic_id)
        .bind(&filter.scope_clinic_ids)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        let (total,): (i64,) = query_as(
            r#"
            SELECT count(*)
            FROM profiles p
            WHERE p.role = 'doctor'
              AND ($1::text IS NULL OR p.name ILIKE '%' || $1 || '%')
              AND ($2::uuid IS NULL OR EXISTS (
                    SELECT 1 FROM profile_specialties psx
                    WHERE psx.profile_id = p.id AND psx.specialty_id = $2))
              AND ($3::uuid IS NULL OR EXISTS (
                    SELECT 1 FROM profile_clinic_access pcx
                    WHERE pcx.profile_id = p.id AND pcx.clinic_id = $3))
              AND ($4::uuid[] IS NULL OR EXISTS (
                    SELECT 1 FROM profile_clinic_access pcx
                    WHERE pcx.profile_id = p.id AND pcx.clinic_id = ANY($4)))
            "#,
        )
        .bind(&filter.name)
        .bind(filter.specialty_id)
        .bind(filter.clinic_id)
        .bind(&filter.scope_clinic_ids)
        .fetch_one(self.pool)
        .await?;

        let list = rows
            .into_iter()
            .map(|row| self.from_tuple(row))
            .collect::<StorageResult<Vec<_>>>()?;

        Ok((list, total))
    }

    /// Finds a doctor by profile ID, with their aggregated specialties.
    pub async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<Doctor>> {
        let row: Option<DoctorTuple> = query_as(&format!(
            r#"
            {DOCTOR_SELECT}
            WHERE p.role = 'doctor' AND p.id = $1
            GROUP BY p.id
            "#
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(|r| self.from_tuple(r)).transpose()
    }

    /// Creates the profile, its clinic-access row and its specialty rows in
    /// one transaction. Duplicate email maps to `Conflict`.
    #[instrument(skip(self, new), fields(email = %new.email))]
    pub async fn create(&self, new: NewDoctor) -> StorageResult<Doctor> {
        let sealed = new.gov_id.as_deref().map(|v| self.cipher.seal(v)).transpose()?;
        let digest = new.gov_id.as_deref().map(gov_id_digest);

        let mut tx = self.pool.begin().await?;

        let row: ProfileTuple = query_as(&format!(
            r#"
            INSERT INTO profiles (id, name, email, role, gov_id, gov_id_digest)
            VALUES ($1, $2, $3, 'doctor', $4, $5)
            RETURNING {PROFILE_COLUMNS_BARE}
            "#,
            PROFILE_COLUMNS_BARE = PROFILE_COLUMNS.replace("p.", "")
        ))
        .bind(generate_id())
        .bind(&new.name)
        .bind(&new.email)
        .bind(&sealed)
        .bind(&digest)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            map_unique_violation(e, format!("Profile with email '{}' already exists", new.email))
        })?;

        if let Some(clinic_id) = new.clinic_id {
            query(
                "INSERT INTO profile_clinic_access (profile_id, clinic_id) VALUES ($1, $2)",
            )
            .bind(row.0)
            .bind(clinic_id)
            .execute(&mut *tx)
            .await?;
        }

        if !new.specialty_ids.is_empty() {
            query(
                "INSERT INTO profile_specialties (profile_id, specialty_id) \
                 SELECT $1, unnest($2::uuid[])",
            )
            .bind(row.0)
            .bind(&new.specialty_ids)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.find_by_id(row.0)
            .await?
            .ok_or_else(|| StorageError::not_found(format!("Doctor {}", row.0)))
    }

    /// Applies a partial update. A present specialty set is reconciled by
    /// diff: added IDs are inserted, removed IDs deleted, the intersection
    /// left untouched. Returns `None` when the row is missing.
    #[instrument(skip(self, patch))]
    pub async fn update(&self, id: Uuid, patch: DoctorPatch) -> StorageResult<Option<Doctor>> {
        let sealed = patch
            .gov_id
            .as_deref()
            .map(|v| self.cipher.seal(v))
            .transpose()?;
        let digest = patch.gov_id.as_deref().map(gov_id_digest);

        let mut tx = self.pool.begin().await?;

        let row: Option<(Uuid,)> = query_as(
            r#"
            UPDATE profiles
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                gov_id = COALESCE($4, gov_id),
                gov_id_digest = COALESCE($5, gov_id_digest),
                updated_at = now()
            WHERE id = $1 AND role = 'doctor'
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(&patch.name)
        .bind(&patch.email)
        .bind(&sealed)
        .bind(&digest)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, "Profile email already in use"))?;

        if row.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }

        if let Some(clinic_id) = patch.clinic_id {
            query("DELETE FROM profile_clinic_access WHERE profile_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            query(
                "INSERT INTO profile_clinic_access (profile_id, clinic_id) VALUES ($1, $2)",
            )
            .bind(id)
            .bind(clinic_id)
            .execute(&mut *tx)
            .await?;
        }

        if let Some(requested) = &patch.specialty_ids {
            let current: Vec<(Uuid,)> =
                query_as("SELECT specialty_id FROM profile_specialties WHERE profile_id = $1")
                    .bind(id)
                    .fetch_all(&mut *tx)
                    .await?;
            let current: Vec<Uuid> = current.into_iter().map(|(sid,)| sid).collect();

            let (to_insert, to_delete) = specialty_diff(&current, requested);

            if !to_delete.is_empty() {
                query(
                    "DELETE FROM profile_specialties \
                     WHERE profile_id = $1 AND specialty_id = ANY($2)",
                )
                .bind(id)
                .bind(&to_delete)
                .execute(&mut *tx)
                .await?;
            }
            if !to_insert.is_empty() {
                query(
                    "INSERT INTO profile_specialties (profile_id, specialty_id) \
                     SELECT $1, unnest($2::uuid[])",
                )
                .bind(id)
                .bind(&to_insert)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;

        self.find_by_id(id).await
    }

    /// Hard delete. Access and specialty rows cascade.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> StorageResult<Option<Uuid>> {
        let row: Option<(Uuid,)> =
            query_as("DELETE FROM profiles WHERE id = $1 AND role = 'doctor' RETURNING id")
                .bind(id)
                .fetch_optional(self.pool)
                .await?;

        Ok(row.map(|(deleted,)| deleted))
    }
}

// =============================================================================
// Caller context
// =============================================================================

/// Lookups that turn an authenticated account into a [`UserContext`].
pub struct ProfileStorage<'a> {
    pool: &'a PgPool,
    cipher: &'a FieldCipher,
}

impl<'a> ProfileStorage<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool, cipher: &'a FieldCipher) -> Self {
        Self { pool, cipher }
    }

    /// Finds the profile linked to an account.
    pub async fn find_by_account(&self, account_id: Uuid) -> StorageResult<Option<Profile>> {
        let row: Option<ProfileTuple> = query_as(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles p WHERE p.account_id = $1"
        ))
        .bind(account_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(|r| profile_from_tuple(self.cipher, r)).transpose()
    }

    /// Organization IDs the profile has access to.
    pub async fn org_access_ids(&self, profile_id: Uuid) -> StorageResult<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> = query_as(
            "SELECT organization_id FROM profile_organization_access WHERE profile_id = $1",
        )
        .bind(profile_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Clinic IDs the profile has access to.
    pub async fn clinic_access_ids(&self, profile_id: Uuid) -> StorageResult<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> =
            query_as("SELECT clinic_id FROM profile_clinic_access WHERE profile_id = $1")
                .bind(profile_id)
                .fetch_all(self.pool)
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Assembles the full caller context for an account, or `None` when no
    /// profile is linked to it.
    #[instrument(skip(self))]
    pub async fn user_context(&self, account_id: Uuid) -> StorageResult<Option<UserContext>> {
        let Some(profile) = self.find_by_account(account_id).await? else {
            return Ok(None);
        };

        let org_access_ids = self.org_access_ids(profile.id).await?;
        let clinic_access_ids = self.clinic_access_ids(profile.id).await?;

        Ok(Some(UserContext {
            profile_id: profile.id,
            role: profile.role,
            name: profile.name,
            email: profile.email,
            org_access_ids,
            clinic_access_ids,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_specialty_diff_basic() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();

        let (to_insert, to_delete) = specialty_diff(&[a, b], &[b, c]);
        assert_eq!(to_insert, vec![c]);
        assert_eq!(to_delete, vec![a]);
    }

    #[test]
    fn test_specialty_diff_no_change() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let (to_insert, to_delete) = specialty_diff(&[a, b], &[b, a]);
        assert!(to_insert.is_empty());
        assert!(to_delete.is_empty());
    }

    #[test]
    fn test_specialty_diff_clear_all() {
        let a = Uuid::new_v4();

        let (to_insert, to_delete) = specialty_diff(&[a], &[]);
        assert!(to_insert.is_empty());
        assert_eq!(to_delete, vec![a]);
    }

    #[test]
    fn test_specialty_diff_from_empty() {
        let a = Uuid::new_v4();

        let (to_insert, to_delete) = specialty_diff(&[], &[a]);
        assert_eq!(to_insert, vec![a]);
        assert!(to_delete.is_empty());
    }

    #[test]
    fn test_access_rows_are_read_through_subqueries() {
        // Joining an access table would fan a profile with several access
        // rows out into duplicate list rows while the count stays at one.
        assert!(!DOCTOR_SELECT.contains("JOIN profile_clinic_access"));
        assert!(BENEFICIARY_ORG_SUBQUERY.contains("LIMIT 1"));
    }
}
