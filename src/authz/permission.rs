use std::fmt;
use std::str::FromStr;

use serde::de;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::AppError;

/// Named subsystem a capability belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Module {
    Attendance,
    Hr,
    Okr,
    Kpi,
    Performance,
    Policy,
    Rbac,
}

impl Module {
    pub const ALL: [Module; 7] = [
        Module::Attendance,
        Module::Hr,
        Module::Okr,
        Module::Kpi,
        Module::Performance,
        Module::Policy,
        Module::Rbac,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Module::Attendance => "attendance",
            Module::Hr => "hr",
            Module::Okr => "okr",
            Module::Kpi => "kpi",
            Module::Performance => "performance",
            Module::Policy => "policy",
            Module::Rbac => "rbac",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
    View,
    Manage,
}

impl Action {
    pub const ALL: [Action; 2] = [Action::View, Action::Manage];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Manage => "manage",
        }
    }
}

/// One grantable capability: a (module, action) pair.
///
/// The universe of permissions is closed; the string form `module.action`
/// (e.g. `attendance.manage`) is what the store and the API use, and parsing
/// anything outside the universe is a validation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Permission {
    pub module: Module,
    pub action: Action,
}

impl Permission {
    pub const fn new(module: Module, action: Action) -> Self {
        Self { module, action }
    }

    /// Every permission in the universe, in stable order.
    pub fn all() -> impl Iterator<Item = Permission> {
        Module::ALL
            .into_iter()
            .flat_map(|module| Action::ALL.into_iter().map(move |action| Permission::new(module, action)))
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.module.as_str(), self.action.as_str())
    }
}

impl FromStr for Permission {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (module_str, action_str) = s
            .split_once('.')
            .ok_or_else(|| AppError::validation(format!("unknown permission '{s}'")))?;

        let module = Module::ALL
            .into_iter()
            .find(|m| m.as_str() == module_str)
            .ok_or_else(|| AppError::validation(format!("unknown permission module '{module_str}'")))?;

        let action = Action::ALL
            .into_iter()
            .find(|a| a.as_str() == action_str)
            .ok_or_else(|| AppError::validation(format!("unknown permission action '{action_str}'")))?;

        Ok(Permission::new(module, action))
    }
}

impl Serialize for Permission {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Permission {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(|err: AppError| de::Error::custom(err.to_string()))
    }
}
