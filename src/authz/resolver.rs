use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use uuid::Uuid;

use super::permission::Permission;
use super::role::Role;

/// Per-user grant or revoke of a single permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideKind {
    Grant,
    Revoke,
}

impl OverrideKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OverrideKind::Grant => "grant",
            OverrideKind::Revoke => "revoke",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "grant" => Some(OverrideKind::Grant),
            "revoke" => Some(OverrideKind::Revoke),
            _ => None,
        }
    }
}

/// Where an effective permission came from. A permission is granted either by
/// a role or by an explicit override, never "both".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionSource {
    Role,
    Override,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EffectivePermission {
    pub permission: Permission,
    pub source: PermissionSource,
}

/// The authorization context for one user, passed explicitly into every
/// resolution call. Built from the identity store by a [`super::PrincipalSource`].
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: Uuid,
    pub roles: HashSet<Role>,
    /// At most one override per permission; the write path upserts.
    pub overrides: BTreeMap<Permission, OverrideKind>,
}

impl Principal {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            roles: HashSet::new(),
            overrides: BTreeMap::new(),
        }
    }

    pub fn with_roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.roles = roles.into_iter().collect();
        self
    }

    pub fn with_override(mut self, permission: Permission, kind: OverrideKind) -> Self {
        self.overrides.insert(permission, kind);
        self
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Effective-permission check.
    ///
    /// Precedence: an explicit revoke always wins, an explicit grant is
    /// honored even absent any role, otherwise any held role that maps to the
    /// permission grants it.
    pub fn has_permission(&self, permission: Permission) -> bool {
        match self.overrides.get(&permission) {
            Some(OverrideKind::Revoke) => {
                tracing::debug!(
                    user_id = %self.user_id,
                    permission = %permission,
                    "denied by revoke override"
                );
                false
            }
            Some(OverrideKind::Grant) => {
                tracing::debug!(
                    user_id = %self.user_id,
                    permission = %permission,
                    "allowed by grant override"
                );
                true
            }
            None => {
                let allowed = self.roles.iter().any(|role| role.grants(permission));
                tracing::debug!(
                    user_id = %self.user_id,
                    permission = %permission,
                    allowed,
                    "resolved from roles"
                );
                allowed
            }
        }
    }

    /// Enumerate every granted permission with its provenance, in stable
    /// permission order. Read-only display data; duplicate role grants
    /// collapse into a single entry.
    pub fn summarize_permissions(&self) -> Vec<EffectivePermission> {
        Permission::all()
            .filter_map(|permission| {
                let source = match self.overrides.get(&permission) {
                    Some(OverrideKind::Revoke) => return None,
                    Some(OverrideKind::Grant) => PermissionSource::Override,
                    None if self.roles.iter().any(|role| role.grants(permission)) => PermissionSource::Role,
                    None => return None,
                };
                Some(EffectivePermission { permission, source })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::permission::{Action, Module};

    fn perm(module: Module, action: Action) -> Permission {
        Permission::new(module, action)
    }

    #[test]
    fn no_roles_no_overrides_means_no_permissions() {
        let principal = Principal::new(Uuid::new_v4());
        for permission in Permission::all() {
            assert!(!principal.has_permission(permission));
        }
        assert!(principal.summarize_permissions().is_empty());
    }

    #[test]
    fn revoke_override_beats_role_grant() {
        let target = perm(Module::Attendance, Action::Manage);
        let principal = Principal::new(Uuid::new_v4())
            .with_roles([Role::Admin])
            .with_override(target, OverrideKind::Revoke);

        assert!(!principal.has_permission(target));
        // Unrelated role grants are untouched.
        assert!(principal.has_permission(perm(Module::Hr, Action::Manage)));
        assert!(principal
            .summarize_permissions()
            .iter()
            .all(|e| e.permission != target));
    }

    #[test]
    fn grant_override_works_without_any_role() {
        let target = perm(Module::Policy, Action::Manage);
        let principal = Principal::new(Uuid::new_v4()).with_override(target, OverrideKind::Grant);

        assert!(principal.has_permission(target));
        let summary = principal.summarize_permissions();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].source, PermissionSource::Override);
    }

    #[test]
    fn overlapping_roles_collapse_to_one_entry() {
        let principal = Principal::new(Uuid::new_v4()).with_roles([Role::Admin, Role::Member]);
        let target = perm(Module::Okr, Action::View);

        let matches: Vec<_> = principal
            .summarize_permissions()
            .into_iter()
            .filter(|e| e.permission == target)
            .collect();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].source, PermissionSource::Role);
    }

    #[test]
    fn repeated_revoke_is_idempotent() {
        let target = perm(Module::Kpi, Action::View);
        let once = Principal::new(Uuid::new_v4())
            .with_roles([Role::Member])
            .with_override(target, OverrideKind::Revoke);
        let twice = once.clone().with_override(target, OverrideKind::Revoke);

        assert_eq!(once.has_permission(target), twice.has_permission(target));
        assert_eq!(once.summarize_permissions(), twice.summarize_permissions());
    }

    #[test]
    fn role_grants_carry_role_provenance() {
        let principal = Principal::new(Uuid::new_v4()).with_roles([Role::Member]);
        let summary = principal.summarize_permissions();

        assert!(!summary.is_empty());
        assert!(summary.iter().all(|e| e.source == PermissionSource::Role));
    }
}
