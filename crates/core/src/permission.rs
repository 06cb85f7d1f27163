//! # Permission Module
//!
//! Closed set of (Resource × Action) pairs, access roles, and the legacy
//! tier allow-list. Anything not explicitly granted is denied.

use crate::error::{CoreError, CoreResult};
use crate::tier::Tier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Protected area of the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Dashboard,
    Users,
    Financials,
    Qrs,
    Customers,
    Roles,
    Settings,
}

impl Resource {
    pub const ALL: [Resource; 7] = [
        Resource::Dashboard,
        Resource::Users,
        Resource::Financials,
        Resource::Qrs,
        Resource::Customers,
        Resource::Roles,
        Resource::Settings,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Dashboard => "dashboard",
            Resource::Users => "users",
            Resource::Financials => "financials",
            Resource::Qrs => "qrs",
            Resource::Customers => "customers",
            Resource::Roles => "roles",
            Resource::Settings => "settings",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "dashboard" => Some(Resource::Dashboard),
            "users" => Some(Resource::Users),
            "financials" => Some(Resource::Financials),
            "qrs" => Some(Resource::Qrs),
            "customers" => Some(Resource::Customers),
            "roles" => Some(Resource::Roles),
            "settings" => Some(Resource::Settings),
            _ => None,
        }
    }

    pub fn parse(s: &str) -> CoreResult<Self> {
        Self::from_str(s).ok_or_else(|| CoreError::unknown("resource", s))
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Operation on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    View,
    Create,
    Edit,
    Delete,
    Export,
    Activate,
    Approve,
}

impl Action {
    pub const ALL: [Action; 7] = [
        Action::View,
        Action::Create,
        Action::Edit,
        Action::Delete,
        Action::Export,
        Action::Activate,
        Action::Approve,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Create => "create",
            Action::Edit => "edit",
            Action::Delete => "delete",
            Action::Export => "export",
            Action::Activate => "activate",
            Action::Approve => "approve",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "view" => Some(Action::View),
            "create" => Some(Action::Create),
            "edit" => Some(Action::Edit),
            "delete" => Some(Action::Delete),
            "export" => Some(Action::Export),
            "activate" => Some(Action::Activate),
            "approve" => Some(Action::Approve),
            _ => None,
        }
    }

    pub fn parse(s: &str) -> CoreResult<Self> {
        Self::from_str(s).ok_or_else(|| CoreError::unknown("action", s))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Permission {
    pub resource: Resource,
    pub action: Action,
}

impl Permission {
    pub fn new(resource: Resource, action: Action) -> Self {
        Self { resource, action }
    }

    /// Every (resource, action) pair.
    pub fn all() -> impl Iterator<Item = Permission> {
        Resource::ALL
            .into_iter()
            .flat_map(|resource| Action::ALL.into_iter().map(move |action| Self::new(resource, action)))
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource, self.action)
    }
}

/// Named set of grants, orthogonal to tier.
///
/// System roles ship with the schema and can never be edited or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessRole {
    pub id: String,
    pub name: String,
    pub is_system: bool,
    pub permissions: BTreeSet<Permission>,
    pub created_at: DateTime<Utc>,
}

impl AccessRole {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            is_system: false,
            permissions: BTreeSet::new(),
            created_at: Utc::now(),
        }
    }

    /// Generate a role ID: ROLE_XXXXXXXX
    pub fn generate_id() -> String {
        format!("ROLE_{}", uuid::Uuid::new_v4().simple().to_string()[..8].to_uppercase())
    }

    pub fn with_permission(mut self, resource: Resource, action: Action) -> Self {
        self.permissions.insert(Permission::new(resource, action));
        self
    }

    pub fn grants(&self, resource: Resource, action: Action) -> bool {
        self.permissions.contains(&Permission::new(resource, action))
    }

    /// Actions granted on one resource.
    pub fn actions_on(&self, resource: Resource) -> Vec<Action> {
        self.permissions
            .iter()
            .filter(|p| p.resource == resource)
            .map(|p| p.action)
            .collect()
    }
}

/// Resources reachable through the legacy tier allow-list.
///
/// Admins have no legacy access at all: they must hold a role.
pub fn legacy_allows(tier: Tier, resource: Resource) -> bool {
    match tier {
        Tier::Admin => false,
        Tier::Distributor => matches!(
            resource,
            Resource::Users | Resource::Financials | Resource::Qrs | Resource::Customers
        ),
        Tier::Retailer => matches!(resource, Resource::Qrs | Resource::Customers),
    }
}

/// Why a check was denied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// Admin-tier account without a role
    NoAccessRole,
    /// Assigned role does not grant the pair
    NotGranted { role_id: String },
    /// Legacy tier list excludes the resource
    TierNotAllowed { tier: Tier },
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::NoAccessRole => write!(f, "no access role assigned"),
            DenyReason::NotGranted { role_id } => write!(f, "not granted by role {}", role_id),
            DenyReason::TierNotAllowed { tier } => write!(f, "not available to {} tier", tier),
        }
    }
}

/// Outcome of a permission check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionDecision {
    Allowed,
    Denied(DenyReason),
}

impl PermissionDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, PermissionDecision::Allowed)
    }

    fn from_bool(allowed: bool, reason: impl FnOnce() -> DenyReason) -> Self {
        if allowed {
            PermissionDecision::Allowed
        } else {
            PermissionDecision::Denied(reason())
        }
    }

    /// Decide from a tier and its (optional) role.
    ///
    /// Precedence: an assigned role always decides. Without one, admins are
    /// denied and the other tiers fall back to the legacy allow-list.
    pub fn decide(
        tier: Tier,
        role: Option<&AccessRole>,
        resource: Resource,
        action: Action,
    ) -> Self {
        match (tier, role) {
            (_, Some(role)) => Self::from_bool(role.grants(resource, action), || {
                DenyReason::NotGranted {
                    role_id: role.id.clone(),
                }
            }),
            (Tier::Admin, None) => PermissionDecision::Denied(DenyReason::NoAccessRole),
            (Tier::Distributor | Tier::Retailer, None) => {
                Self::from_bool(legacy_allows(tier, resource), || DenyReason::TierNotAllowed {
                    tier,
                })
            }
        }
    }
}

impl fmt::Display for PermissionDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionDecision::Allowed => write!(f, "allowed"),
            PermissionDecision::Denied(reason) => write!(f, "denied: {}", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_action_parse() {
        assert_eq!(Resource::from_str("QRS"), Some(Resource::Qrs));
        assert_eq!(Action::from_str("approve"), Some(Action::Approve));
        assert!(Resource::parse("billing").is_err());
        assert!(Action::parse("").is_err());
        assert_eq!(Permission::all().count(), 49);
    }

    #[test]
    fn test_legacy_allow_list() {
        assert!(legacy_allows(Tier::Distributor, Resource::Financials));
        assert!(!legacy_allows(Tier::Distributor, Resource::Roles));
        assert!(legacy_allows(Tier::Retailer, Resource::Qrs));
        assert!(!legacy_allows(Tier::Retailer, Resource::Users));
        for resource in Resource::ALL {
            assert!(!legacy_allows(Tier::Admin, resource));
        }
    }

    #[test]
    fn test_admin_without_role_denied_everywhere() {
        for p in Permission::all() {
            let decision = PermissionDecision::decide(Tier::Admin, None, p.resource, p.action);
            assert_eq!(decision, PermissionDecision::Denied(DenyReason::NoAccessRole));
        }
    }

    #[test]
    fn test_role_decides_for_admin() {
        let role = AccessRole::new("ROLE_FIN", "Finance")
            .with_permission(Resource::Financials, Action::View)
            .with_permission(Resource::Financials, Action::Approve);

        let allowed =
            PermissionDecision::decide(Tier::Admin, Some(&role), Resource::Financials, Action::View);
        assert!(allowed.is_allowed());

        let denied =
            PermissionDecision::decide(Tier::Admin, Some(&role), Resource::Users, Action::View);
        assert_eq!(
            denied,
            PermissionDecision::Denied(DenyReason::NotGranted {
                role_id: "ROLE_FIN".to_string()
            })
        );
        assert_eq!(role.actions_on(Resource::Financials).len(), 2);
    }

    #[test]
    fn test_role_overrides_tier_fallback() {
        let role = AccessRole::new("ROLE_VIEW", "Viewer").with_permission(Resource::Qrs, Action::View);

        let legacy = PermissionDecision::decide(Tier::Retailer, None, Resource::Qrs, Action::Activate);
        assert!(legacy.is_allowed());

        let overridden =
            PermissionDecision::decide(Tier::Retailer, Some(&role), Resource::Qrs, Action::Activate);
        assert!(!overridden.is_allowed());
    }

    #[test]
    fn test_decision_display() {
        let denied = PermissionDecision::Denied(DenyReason::NoAccessRole);
        assert_eq!(denied.to_string(), "denied: no access role assigned");
    }
}
