use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::errors::AppResult;

use super::permission::Permission;
use super::resolver::{OverrideKind, Principal};
use super::role::Role;

/// Builds the authorization context for a user from the identity store.
///
/// The resolver itself is pure; this seam is the only I/O on the permission
/// path and is pluggable so the core stays testable without a database.
#[async_trait]
pub trait PrincipalSource: Send + Sync {
    async fn load(&self, user_id: Uuid) -> AppResult<Principal>;
}

#[derive(Clone)]
pub struct DbPrincipalSource {
    pool: SqlitePool,
}

impl DbPrincipalSource {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PrincipalSource for DbPrincipalSource {
    async fn load(&self, user_id: Uuid) -> AppResult<Principal> {
        let role_rows = sqlx::query("SELECT role FROM user_roles WHERE user_id = ?")
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        let roles: Vec<Role> = role_rows
            .iter()
            .filter_map(|row| {
                let name: String = row.get("role");
                match name.parse::<Role>() {
                    Ok(role) => Some(role),
                    Err(_) => {
                        tracing::warn!(user_id = %user_id, role = %name, "ignoring unknown role in store");
                        None
                    }
                }
            })
            .collect();

        let override_rows = sqlx::query("SELECT permission, kind FROM permission_overrides WHERE user_id = ?")
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        let mut principal = Principal::new(user_id).with_roles(roles);
        for row in &override_rows {
            let permission: String = row.get("permission");
            let kind: String = row.get("kind");
            match (permission.parse::<Permission>(), OverrideKind::parse(&kind)) {
                (Ok(permission), Some(kind)) => {
                    principal = principal.with_override(permission, kind);
                }
                _ => {
                    tracing::warn!(
                        user_id = %user_id,
                        permission = %permission,
                        kind = %kind,
                        "ignoring malformed override row"
                    );
                }
            }
        }

        Ok(principal)
    }
}
