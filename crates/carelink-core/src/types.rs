//! Domain records for the healthcare network.
//!
//! These are the canonical shapes handed across the storage and HTTP layers.
//! Government-ID fields (`gov_id`) hold either the decrypted plaintext (read
//! paths) or the `"<iv>:<ciphertext>"` column format (persistence paths);
//! the crypto layer owns the distinction.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::CoreError;

/// Role assigned to a profile. Drives the ability engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Beneficiary,
    OrganizationAdmin,
    ClinicAdmin,
    Doctor,
    SuperAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Beneficiary => "beneficiary",
            Self::OrganizationAdmin => "organization_admin",
            Self::ClinicAdmin => "clinic_admin",
            Self::Doctor => "doctor",
            Self::SuperAdmin => "super_admin",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "beneficiary" => Ok(Self::Beneficiary),
            "organization_admin" => Ok(Self::OrganizationAdmin),
            "clinic_admin" => Ok(Self::ClinicAdmin),
            "doctor" => Ok(Self::Doctor),
            "super_admin" => Ok(Self::SuperAdmin),
            other => Err(CoreError::invalid_role(other)),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subscription plan. Stored as an integer code in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    #[default]
    Silver,
    Gold,
}

impl Plan {
    pub fn code(&self) -> i32 {
        match self {
            Self::Silver => 0,
            Self::Gold => 1,
        }
    }

    pub fn from_code(code: i32) -> Result<Self, CoreError> {
        match code {
            0 => Ok(Self::Silver),
            1 => Ok(Self::Gold),
            other => Err(CoreError::InvalidPlan(other)),
        }
    }
}

/// Payment standing of an organization or profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrganizationStatus {
    #[default]
    Active,
    Defaulting,
    GracePeriod,
    Suspended,
}

impl OrganizationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Defaulting => "defaulting",
            Self::GracePeriod => "grace_period",
            Self::Suspended => "suspended",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "active" => Ok(Self::Active),
            "defaulting" => Ok(Self::Defaulting),
            "grace_period" => Ok(Self::GracePeriod),
            "suspended" => Ok(Self::Suspended),
            other => Err(CoreError::invalid_status(other)),
        }
    }
}

/// Payer entity. Owns zero-or-more beneficiary profiles via the
/// profile_organization_access join table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub status: OrganizationStatus,
    pub plan: Plan,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gov_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Care-delivery site. Owns zero-or-more doctor profiles via the
/// profile_clinic_access join table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clinic {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gov_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Medical specialization taxonomy entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Specialty {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

/// Person record, distinct from the authentication identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<Uuid>,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub plan: Plan,
    pub status: OrganizationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gov_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Beneficiary projection: a profile plus its owning organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Beneficiary {
    #[serde(flatten)]
    pub profile: Profile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<Uuid>,
}

/// Doctor projection: a profile plus its clinic and specialty set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Doctor {
    #[serde(flatten)]
    pub profile: Profile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clinic_id: Option<Uuid>,
    pub specialties: Vec<Specialty>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        for role in [
            Role::Beneficiary,
            Role::OrganizationAdmin,
            Role::ClinicAdmin,
            Role::Doctor,
            Role::SuperAdmin,
        ] {
            assert_eq!(Role::parse(role.as_str()).unwrap(), role);
        }
        assert!(Role::parse("root").is_err());
    }

    #[test]
    fn test_plan_codes() {
        assert_eq!(Plan::from_code(0).unwrap(), Plan::Silver);
        assert_eq!(Plan::from_code(1).unwrap(), Plan::Gold);
        assert!(Plan::from_code(7).is_err());
        assert_eq!(Plan::Gold.code(), 1);
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(
            OrganizationStatus::parse("grace_period").unwrap(),
            OrganizationStatus::GracePeriod
        );
        assert!(OrganizationStatus::parse("dormant").is_err());
    }

    #[test]
    fn test_role_serde_uses_snake_case() {
        let json = serde_json::to_string(&Role::OrganizationAdmin).unwrap();
        assert_eq!(json, "\"organization_admin\"");
    }
}
