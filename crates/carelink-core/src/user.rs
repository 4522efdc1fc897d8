//! The authenticated caller as seen by the authorization layer.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::Role;

/// Resolved request identity: the caller's profile plus the ID lists the
/// ability engine evaluates set-membership against.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserContext {
    pub profile_id: Uuid,
    pub role: Role,
    pub name: String,
    pub email: String,
    /// Organizations this user administers.
    pub org_access_ids: Vec<Uuid>,
    /// Clinics this user administers.
    pub clinic_access_ids: Vec<Uuid>,
}

impl UserContext {
    pub fn is_super_admin(&self) -> bool {
        self.role == Role::SuperAdmin
    }

    pub fn has_org_access(&self, organization_id: Uuid) -> bool {
        self.org_access_ids.contains(&organization_id)
    }

    pub fn has_clinic_access(&self, clinic_id: Uuid) -> bool {
        self.clinic_access_ids.contains(&clinic_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> UserContext {
        UserContext {
            profile_id: Uuid::new_v4(),
            role,
            name: "Test".to_string(),
            email: "test@example.com".to_string(),
            org_access_ids: vec![],
            clinic_access_ids: vec![],
        }
    }

    #[test]
    fn test_super_admin_flag() {
        assert!(user(Role::SuperAdmin).is_super_admin());
        assert!(!user(Role::OrganizationAdmin).is_super_admin());
    }

    #[test]
    fn test_access_membership() {
        let org = Uuid::new_v4();
        let mut u = user(Role::OrganizationAdmin);
        assert!(!u.has_org_access(org));
        u.org_access_ids.push(org);
        assert!(u.has_org_access(org));
    }
}
