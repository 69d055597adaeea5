use std::fmt;
use std::str::FromStr;

use serde::de;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::AppError;

use super::permission::{Action, Module, Permission};

/// Named bundle of permissions assignable to a user.
///
/// The role set is closed and the role -> permission mapping is static
/// reference data; end users never edit it. Per-user adjustments go through
/// permission overrides instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    SuperAdmin,
    Admin,
    Member,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::SuperAdmin, Role::Admin, Role::Member];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::Admin => "admin",
            Role::Member => "member",
        }
    }

    /// Permissions granted by this role before overrides are applied.
    pub fn permissions(self) -> Vec<Permission> {
        match self {
            // Super admins hold the whole universe, rbac administration included.
            Role::SuperAdmin => Permission::all().collect(),
            // Admins manage every business module but cannot change the
            // permission system itself.
            Role::Admin => Permission::all()
                .filter(|p| !(p.module == Module::Rbac && p.action == Action::Manage))
                .collect(),
            // Plain users see their own corner of the app, read-only.
            Role::Member => [Module::Attendance, Module::Okr, Module::Kpi, Module::Performance, Module::Policy]
                .into_iter()
                .map(|m| Permission::new(m, Action::View))
                .collect(),
        }
    }

    pub fn grants(self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| AppError::validation(format!("unknown role '{s}'")))
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(|err: AppError| de::Error::custom(err.to_string()))
    }
}
