pub mod auth;
pub mod cycles;
pub mod health;
pub mod kpi;
pub mod rbac;

use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{Permission, Principal};
use crate::errors::{AppError, AppResult};

/// Load the caller's principal and gate on one permission.
pub(crate) async fn require_permission(
    state: &AppState,
    user_id: Uuid,
    permission: Permission,
) -> AppResult<Principal> {
    let principal = state.principals.load(user_id).await?;
    if !principal.has_permission(permission) {
        return Err(AppError::forbidden(format!("requires {permission}")));
    }
    Ok(principal)
}
