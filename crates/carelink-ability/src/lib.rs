//! Ability engine: the computed allow/deny rule set for one caller.
//!
//! Rules form an explicit policy table keyed by (action, subject) and
//! evaluated against ID-set membership. Deny rules override allows; the
//! default decision is deny. There is no rule DSL: every grant the system
//! can make is spelled out in [`Ability::for_user`].

use std::collections::HashSet;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use carelink_core::{Role, UserContext};

/// Operation being attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Manage,
    Create,
    Read,
    Update,
    Delete,
}

/// Resource the action targets.
///
/// For organizations and clinics, a `None` instance ID is a type-level
/// query ("may this user read organizations at all?"), used by list
/// endpoints before scoping the query to the caller's accessible IDs; an
/// instance always carries its own ID. A beneficiary is scoped by a foreign
/// key that can be missing, so its type-level form is the separate
/// [`Subject::Beneficiaries`] variant and `Beneficiary(None)` means the
/// owning organization is unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    Organization(Option<Uuid>),
    Clinic(Option<Uuid>),
    /// The beneficiary collection, for list gating.
    Beneficiaries,
    /// One beneficiary, scoped by its owning organization. `None` means the
    /// owner is unknown (the organization was deleted and the access row
    /// cascaded away); ID-set grants never cover it.
    Beneficiary(Option<Uuid>),
    Doctor,
    Profile,
}

impl Subject {
    fn kind(&self) -> &'static str {
        match self {
            Self::Organization(_) => "Organization",
            Self::Clinic(_) => "Clinic",
            Self::Beneficiaries | Self::Beneficiary(_) => "Beneficiary",
            Self::Doctor => "Doctor",
            Self::Profile => "Profile",
        }
    }
}

/// Structured reason attached to a denied check.
#[derive(Debug, Clone, Error, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("{message}")]
pub struct Denied {
    pub code: String,
    pub message: String,
}

impl Denied {
    fn no_matching_rule(action: Action, subject: &Subject) -> Self {
        Self {
            code: "no-matching-rule".to_string(),
            message: format!(
                "No rule grants {:?} on {}",
                action,
                subject.kind()
            ),
        }
    }

    fn explicit(action: Action, subject: &Subject) -> Self {
        Self {
            code: "explicitly-denied".to_string(),
            message: format!("{:?} on {} is explicitly denied", action, subject.kind()),
        }
    }

    fn anonymous() -> Self {
        Self {
            code: "unauthenticated".to_string(),
            message: "No authenticated user".to_string(),
        }
    }
}

/// Which instances of a subject a rule covers.
#[derive(Debug, Clone)]
enum Scope {
    /// Every instance.
    Any,
    /// Instances whose scoping ID is in the set. Matches type-level
    /// queries unconditionally, mirroring condition-carrying allow rules.
    In(HashSet<Uuid>),
}

impl Scope {
    /// Match for subjects whose `None` means a type-level query. Those pass
    /// `In` unconditionally, mirroring condition-carrying allow rules.
    fn matches(&self, instance: Option<Uuid>) -> bool {
        match (self, instance) {
            (Self::Any, _) => true,
            (Self::In(_), None) => true,
            (Self::In(ids), Some(id)) => ids.contains(&id),
        }
    }

    /// Instance match where the scoping ID may be absent. An unknown scope
    /// never satisfies an ID-set rule.
    fn matches_instance(&self, instance: Option<Uuid>) -> bool {
        match (self, instance) {
            (Self::Any, _) => true,
            (Self::In(_), None) => false,
            (Self::In(ids), Some(id)) => ids.contains(&id),
        }
    }
}

/// Subjects a single rule applies to.
#[derive(Debug, Clone)]
enum Target {
    All,
    Organization(Scope),
    Clinic(Scope),
    Beneficiary(Scope),
    Doctor,
}

impl Target {
    fn matches(&self, subject: &Subject) -> bool {
        match (self, subject) {
            (Self::All, _) => true,
            (Self::Organization(scope), Subject::Organization(id)) => scope.matches(*id),
            (Self::Clinic(scope), Subject::Clinic(id)) => scope.matches(*id),
            (Self::Beneficiary(_), Subject::Beneficiaries) => true,
            (Self::Beneficiary(scope), Subject::Beneficiary(org_id)) => {
                scope.matches_instance(*org_id)
            }
            (Self::Doctor, Subject::Doctor) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Effect {
    Allow,
    Deny,
}

#[derive(Debug, Clone)]
struct Rule {
    effect: Effect,
    /// `Manage` matches every action.
    action: Action,
    target: Target,
}

impl Rule {
    fn matches(&self, action: Action, subject: &Subject) -> bool {
        (self.action == Action::Manage || self.action == action) && self.target.matches(subject)
    }
}

/// The computed rule set for one caller.
#[derive(Debug, Clone)]
pub struct Ability {
    rules: Vec<Rule>,
}

impl Ability {
    /// Denies everything. The ability of an absent or anonymous caller.
    pub fn none() -> Self {
        Self { rules: Vec::new() }
    }

    /// Builds the rule table for an authenticated user.
    pub fn for_user(user: &UserContext) -> Self {
        let mut rules = Vec::new();

        if user.role == Role::SuperAdmin {
            rules.push(Rule {
                effect: Effect::Allow,
                action: Action::Manage,
                target: Target::All,
            });
            return Self { rules };
        }

        if !user.org_access_ids.is_empty() {
            let ids: HashSet<Uuid> = user.org_access_ids.iter().copied().collect();
            rules.push(Rule {
                effect: Effect::Allow,
                action: Action::Read,
                target: Target::Organization(Scope::In(ids.clone())),
            });
            rules.push(Rule {
                effect: Effect::Allow,
                action: Action::Update,
                target: Target::Organization(Scope::In(ids.clone())),
            });
            rules.push(Rule {
                effect: Effect::Allow,
                action: Action::Manage,
                target: Target::Beneficiary(Scope::In(ids)),
            });
            // Organization admins never remove their payer.
            rules.push(Rule {
                effect: Effect::Deny,
                action: Action::Delete,
                target: Target::Organization(Scope::Any),
            });
        }

        if !user.clinic_access_ids.is_empty() {
            let ids: HashSet<Uuid> = user.clinic_access_ids.iter().copied().collect();
            rules.push(Rule {
                effect: Effect::Allow,
                action: Action::Read,
                target: Target::Clinic(Scope::In(ids.clone())),
            });
            rules.push(Rule {
                effect: Effect::Allow,
                action: Action::Update,
                target: Target::Clinic(Scope::In(ids)),
            });
            // Managing a clinic grants doctor management; list queries are
            // still filtered to the caller's clinics.
            rules.push(Rule {
                effect: Effect::Allow,
                action: Action::Manage,
                target: Target::Doctor,
            });
            rules.push(Rule {
                effect: Effect::Deny,
                action: Action::Delete,
                target: Target::Clinic(Scope::Any),
            });
            rules.push(Rule {
                effect: Effect::Deny,
                action: Action::Create,
                target: Target::Clinic(Scope::Any),
            });
        }

        Self { rules }
    }

    /// Returns whether the action is permitted. Deny rules win over allows;
    /// no matching rule means denied.
    pub fn can(&self, action: Action, subject: Subject) -> bool {
        self.check(action, subject).is_ok()
    }

    /// Like [`Self::can`], but reports why access was refused.
    pub fn check(&self, action: Action, subject: Subject) -> Result<(), Denied> {
        if self.rules.is_empty() {
            return Err(Denied::anonymous());
        }

        if self
            .rules
            .iter()
            .any(|r| r.effect == Effect::Deny && r.matches(action, &subject))
        {
            return Err(Denied::explicit(action, &subject));
        }

        if self
            .rules
            .iter()
            .any(|r| r.effect == Effect::Allow && r.matches(action, &subject))
        {
            return Ok(());
        }

        Err(Denied::no_matching_rule(action, &subject))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carelink_core::Role;

    fn user(role: Role, orgs: Vec<Uuid>, clinics: Vec<Uuid>) -> UserContext {
        UserContext {
            profile_id: Uuid::new_v4(),
            role,
            name: "Test".to_string(),
            email: "test@example.com".to_string(),
            org_access_ids: orgs,
            clinic_access_ids: clinics,
        }
    }

    #[test]
    fn super_admin_manages_everything() {
        let ability = Ability::for_user(&user(Role::SuperAdmin, vec![], vec![]));
        let id = Uuid::new_v4();

        for action in [
            Action::Manage,
            Action::Create,
            Action::Read,
            Action::Update,
            Action::Delete,
        ] {
            assert!(ability.can(action, Subject::Organization(Some(id))));
            assert!(ability.can(action, Subject::Clinic(None)));
            assert!(ability.can(action, Subject::Doctor));
            assert!(ability.can(action, Subject::Beneficiary(Some(id))));
            assert!(ability.can(action, Subject::Profile));
        }
    }

    #[test]
    fn org_admin_scoped_to_own_organizations() {
        let org_a = Uuid::new_v4();
        let org_b = Uuid::new_v4();
        let ability = Ability::for_user(&user(Role::OrganizationAdmin, vec![org_a], vec![]));

        assert!(ability.can(Action::Read, Subject::Organization(Some(org_a))));
        assert!(ability.can(Action::Update, Subject::Organization(Some(org_a))));
        assert!(!ability.can(Action::Read, Subject::Organization(Some(org_b))));
        assert!(!ability.can(Action::Update, Subject::Organization(Some(org_b))));

        // Explicit deny: payers are never deleted by their admins.
        let denied = ability
            .check(Action::Delete, Subject::Organization(Some(org_a)))
            .unwrap_err();
        assert_eq!(denied.code, "explicitly-denied");

        // Unscoped create on organizations is not granted.
        assert!(!ability.can(Action::Create, Subject::Organization(None)));
    }

    #[test]
    fn org_admin_manages_scoped_beneficiaries() {
        let org_a = Uuid::new_v4();
        let org_b = Uuid::new_v4();
        let ability = Ability::for_user(&user(Role::OrganizationAdmin, vec![org_a], vec![]));

        assert!(ability.can(Action::Create, Subject::Beneficiary(Some(org_a))));
        assert!(ability.can(Action::Delete, Subject::Beneficiary(Some(org_a))));
        assert!(!ability.can(Action::Delete, Subject::Beneficiary(Some(org_b))));
        // Collection-level query passes; the list is then scoped by the handler.
        assert!(ability.can(Action::Read, Subject::Beneficiaries));
    }

    #[test]
    fn unknown_owner_is_not_covered_by_scoped_grants() {
        let org_a = Uuid::new_v4();
        let ability = Ability::for_user(&user(Role::OrganizationAdmin, vec![org_a], vec![]));

        // A beneficiary whose owning organization was hard-deleted carries
        // no scoping ID; no org admin's grant reaches it.
        assert!(!ability.can(Action::Read, Subject::Beneficiary(None)));
        assert!(!ability.can(Action::Update, Subject::Beneficiary(None)));
        assert!(!ability.can(Action::Delete, Subject::Beneficiary(None)));

        // Collection gating and super admins are unaffected.
        assert!(ability.can(Action::Read, Subject::Beneficiaries));
        let root = Ability::for_user(&user(Role::SuperAdmin, vec![], vec![]));
        assert!(root.can(Action::Delete, Subject::Beneficiary(None)));
    }

    #[test]
    fn clinic_admin_rules() {
        let clinic_a = Uuid::new_v4();
        let clinic_b = Uuid::new_v4();
        let ability = Ability::for_user(&user(Role::ClinicAdmin, vec![], vec![clinic_a]));

        assert!(ability.can(Action::Read, Subject::Clinic(Some(clinic_a))));
        assert!(ability.can(Action::Update, Subject::Clinic(Some(clinic_a))));
        assert!(!ability.can(Action::Read, Subject::Clinic(Some(clinic_b))));

        assert!(!ability.can(Action::Delete, Subject::Clinic(Some(clinic_a))));
        assert!(!ability.can(Action::Create, Subject::Clinic(None)));

        assert!(ability.can(Action::Manage, Subject::Doctor));
        assert!(ability.can(Action::Delete, Subject::Doctor));
    }

    #[test]
    fn empty_access_denies_everything() {
        let ability = Ability::for_user(&user(Role::Beneficiary, vec![], vec![]));

        assert!(!ability.can(Action::Read, Subject::Organization(None)));
        assert!(!ability.can(Action::Read, Subject::Clinic(None)));
        assert!(!ability.can(Action::Manage, Subject::Doctor));
        assert!(!ability.can(Action::Read, Subject::Beneficiaries));
    }

    #[test]
    fn anonymous_is_denied_with_reason() {
        let ability = Ability::none();
        let denied = ability
            .check(Action::Read, Subject::Clinic(None))
            .unwrap_err();
        assert_eq!(denied.code, "unauthenticated");
    }

    #[test]
    fn type_level_read_passes_for_scoped_admin() {
        let org = Uuid::new_v4();
        let ability = Ability::for_user(&user(Role::OrganizationAdmin, vec![org], vec![]));
        // List endpoints ask the type-level question first.
        assert!(ability.can(Action::Read, Subject::Organization(None)));
    }
}
