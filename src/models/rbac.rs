use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::authz::{OverrideKind, Permission, PermissionSource, Role};
use crate::errors::AppError;
use crate::events::{Loggable, Severity};

// =============================================================================
// ROLE ASSIGNMENT
// =============================================================================

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoleAssignment {
    pub user_id: Uuid,
    #[schema(value_type = String, example = "admin")]
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl Loggable for RoleAssignment {
    fn entity_type() -> &'static str {
        "role_assignment"
    }
    fn subject_id(&self) -> Uuid {
        self.user_id
    }
    fn severity(&self) -> Severity {
        Severity::Critical
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignRoleRequest {
    #[schema(value_type = String, example = "admin")]
    pub role: Role,
}

// =============================================================================
// PERMISSION OVERRIDE
// =============================================================================

/// The only mutable permission entity: an explicit per-user grant or revoke,
/// with audit metadata.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PermissionOverride {
    pub id: Uuid,
    pub user_id: Uuid,
    #[schema(value_type = String, example = "attendance.manage")]
    pub permission: Permission,
    #[schema(value_type = String, example = "revoke")]
    pub kind: OverrideKind,
    pub granted_by: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for PermissionOverride {
    fn entity_type() -> &'static str {
        "permission_override"
    }
    fn subject_id(&self) -> Uuid {
        self.user_id
    }
    fn severity(&self) -> Severity {
        Severity::Critical
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbPermissionOverride {
    pub id: String,
    pub user_id: String,
    pub permission: String,
    pub kind: String,
    pub granted_by: String,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbPermissionOverride> for PermissionOverride {
    type Error = AppError;

    fn try_from(value: DbPermissionOverride) -> Result<Self, Self::Error> {
        let parse_id = |s: &str| {
            Uuid::parse_str(s).map_err(|_| AppError::internal(format!("malformed id '{s}' in override row")))
        };
        Ok(PermissionOverride {
            id: parse_id(&value.id)?,
            user_id: parse_id(&value.user_id)?,
            permission: value.permission.parse()?,
            kind: OverrideKind::parse(&value.kind)
                .ok_or_else(|| AppError::internal(format!("malformed override kind '{}'", value.kind)))?,
            granted_by: parse_id(&value.granted_by)?,
            note: value.note,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GrantOverrideRequest {
    #[schema(value_type = String, example = "attendance.manage")]
    pub permission: Permission,
    #[schema(example = "covering for team lead during leave")]
    pub note: Option<String>,
}

// =============================================================================
// EFFECTIVE PERMISSIONS (computed, not persisted)
// =============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct EffectivePermissionsResponse {
    pub user_id: Uuid,
    #[schema(value_type = Vec<String>)]
    pub roles: Vec<Role>,
    pub permissions: Vec<EffectivePermissionView>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EffectivePermissionView {
    #[schema(value_type = String, example = "attendance.manage")]
    pub permission: Permission,
    /// Provenance of the grant: "role" or "override".
    #[schema(value_type = String, example = "role")]
    pub source: PermissionSource,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PermissionCheckResponse {
    #[schema(value_type = String, example = "attendance.manage")]
    pub permission: Permission,
    pub allowed: bool,
}
