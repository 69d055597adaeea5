//! RBAC admin API.
//!
//! Role assignments and permission overrides for a user. Reads need only a
//! valid session; writes require `rbac.manage`. Every mutation lands in the
//! audit trail with Critical severity.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{Action, Module, OverrideKind, Permission, Role};
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity, RequestContext};
use crate::jwt::AuthUser;
use crate::models::rbac::*;
use crate::routes::require_permission;
use crate::utils::utc_now;

const RBAC_MANAGE: Permission = Permission::new(Module::Rbac, Action::Manage);

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/permissions", get(list_permissions))
        .route("/users/:user_id/roles", get(get_user_roles).post(assign_role))
        .route("/users/:user_id/roles/:role", delete(remove_role))
        .route("/users/:user_id/overrides", get(list_overrides).post(grant_override))
        .route("/users/:user_id/overrides/:permission", delete(revoke_override))
        .route("/users/:user_id/effective-permissions", get(effective_permissions))
        .route("/users/:user_id/check/:permission", get(check_permission))
}

// =============================================================================
// PERMISSION UNIVERSE
// =============================================================================

/// List every grantable permission
#[utoipa::path(
    get,
    path = "/rbac/permissions",
    tag = "RBAC",
    responses((status = 200, description = "The closed permission universe", body = Vec<String>)),
    security(("bearerAuth" = []))
)]
pub async fn list_permissions(_auth: AuthUser) -> Json<Vec<String>> {
    Json(Permission::all().map(|p| p.to_string()).collect())
}

// =============================================================================
// ROLE ASSIGNMENTS
// =============================================================================

/// Roles held by a user
#[utoipa::path(
    get,
    path = "/rbac/users/{user_id}/roles",
    tag = "RBAC",
    params(("user_id" = Uuid, Path, description = "User ID")),
    responses((status = 200, description = "Assigned roles", body = Vec<String>)),
    security(("bearerAuth" = []))
)]
pub async fn get_user_roles(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<Vec<Role>>> {
    let principal = state.principals.load(user_id).await?;
    let mut roles: Vec<Role> = principal.roles.into_iter().collect();
    roles.sort();
    Ok(Json(roles))
}

/// Assign a role to a user
#[utoipa::path(
    post,
    path = "/rbac/users/{user_id}/roles",
    tag = "RBAC",
    params(("user_id" = Uuid, Path, description = "User ID")),
    request_body = AssignRoleRequest,
    responses(
        (status = 201, description = "Role assigned"),
        (status = 422, description = "Unknown user or role"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn assign_role(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(user_id): Path<Uuid>,
    Json(req): Json<AssignRoleRequest>,
) -> AppResult<StatusCode> {
    require_permission(&state, auth.user_id, RBAC_MANAGE).await?;
    ensure_user_exists(&state.pool, user_id).await?;

    let now = utc_now();
    sqlx::query("INSERT OR IGNORE INTO user_roles (user_id, role, created_at) VALUES (?, ?, ?)")
        .bind(user_id.to_string())
        .bind(req.role.as_str())
        .bind(now)
        .execute(&state.pool)
        .await?;

    let assignment = RoleAssignment {
        user_id,
        role: req.role,
        created_at: now,
    };
    log_activity(
        &state.event_bus,
        "assigned",
        Some(auth.user_id),
        &assignment,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(StatusCode::CREATED)
}

/// Remove a role from a user
#[utoipa::path(
    delete,
    path = "/rbac/users/{user_id}/roles/{role}",
    tag = "RBAC",
    params(
        ("user_id" = Uuid, Path, description = "User ID"),
        ("role" = String, Path, description = "Role name"),
    ),
    responses((status = 204, description = "Role removed")),
    security(("bearerAuth" = []))
)]
pub async fn remove_role(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path((user_id, role)): Path<(Uuid, String)>,
) -> AppResult<StatusCode> {
    require_permission(&state, auth.user_id, RBAC_MANAGE).await?;
    let role: Role = role.parse()?;

    sqlx::query("DELETE FROM user_roles WHERE user_id = ? AND role = ?")
        .bind(user_id.to_string())
        .bind(role.as_str())
        .execute(&state.pool)
        .await?;

    let assignment = RoleAssignment {
        user_id,
        role,
        created_at: utc_now(),
    };
    log_activity(
        &state.event_bus,
        "revoked",
        Some(auth.user_id),
        &assignment,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// PERMISSION OVERRIDES
// =============================================================================

/// Overrides recorded for a user
#[utoipa::path(
    get,
    path = "/rbac/users/{user_id}/overrides",
    tag = "RBAC",
    params(("user_id" = Uuid, Path, description = "User ID")),
    responses((status = 200, description = "Grant/revoke overrides", body = Vec<PermissionOverride>)),
    security(("bearerAuth" = []))
)]
pub async fn list_overrides(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<Vec<PermissionOverride>>> {
    let rows = sqlx::query_as::<_, DbPermissionOverride>(
        "SELECT id, user_id, permission, kind, granted_by, note, created_at, updated_at \
         FROM permission_overrides WHERE user_id = ? ORDER BY permission",
    )
    .bind(user_id.to_string())
    .fetch_all(&state.pool)
    .await?;

    let overrides = rows
        .into_iter()
        .map(PermissionOverride::try_from)
        .collect::<Result<_, _>>()?;
    Ok(Json(overrides))
}

/// Grant a permission directly to a user
#[utoipa::path(
    post,
    path = "/rbac/users/{user_id}/overrides",
    tag = "RBAC",
    params(("user_id" = Uuid, Path, description = "User ID")),
    request_body = GrantOverrideRequest,
    responses(
        (status = 201, description = "Grant recorded", body = PermissionOverride),
        (status = 422, description = "Unknown user or permission"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn grant_override(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(user_id): Path<Uuid>,
    Json(req): Json<GrantOverrideRequest>,
) -> AppResult<(StatusCode, Json<PermissionOverride>)> {
    require_permission(&state, auth.user_id, RBAC_MANAGE).await?;
    ensure_user_exists(&state.pool, user_id).await?;

    let record = upsert_override(
        &state.pool,
        user_id,
        req.permission,
        OverrideKind::Grant,
        auth.user_id,
        req.note,
    )
    .await?;

    log_activity(
        &state.event_bus,
        "granted",
        Some(auth.user_id),
        &record,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((StatusCode::CREATED, Json(record)))
}

/// Revoke a permission from a user
///
/// Role-derived grants cannot be deleted, only shadowed: this writes a
/// revoke-type override that takes precedence. Revoking a permission the user
/// never held succeeds and is idempotent.
#[utoipa::path(
    delete,
    path = "/rbac/users/{user_id}/overrides/{permission}",
    tag = "RBAC",
    params(
        ("user_id" = Uuid, Path, description = "User ID"),
        ("permission" = String, Path, description = "Permission, e.g. attendance.manage"),
    ),
    responses(
        (status = 204, description = "Revoke recorded"),
        (status = 422, description = "Unknown user or permission"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn revoke_override(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path((user_id, permission)): Path<(Uuid, String)>,
) -> AppResult<StatusCode> {
    require_permission(&state, auth.user_id, RBAC_MANAGE).await?;
    ensure_user_exists(&state.pool, user_id).await?;
    let permission: Permission = permission.parse()?;

    let record = upsert_override(&state.pool, user_id, permission, OverrideKind::Revoke, auth.user_id, None).await?;

    log_activity(
        &state.event_bus,
        "revoked",
        Some(auth.user_id),
        &record,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// EFFECTIVE PERMISSIONS (computed)
// =============================================================================

/// Effective permissions with provenance
#[utoipa::path(
    get,
    path = "/rbac/users/{user_id}/effective-permissions",
    tag = "RBAC",
    params(("user_id" = Uuid, Path, description = "User ID")),
    responses((status = 200, description = "Effective permissions", body = EffectivePermissionsResponse)),
    security(("bearerAuth" = []))
)]
pub async fn effective_permissions(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<EffectivePermissionsResponse>> {
    let principal = state.principals.load(user_id).await?;

    let mut roles: Vec<Role> = principal.roles.iter().copied().collect();
    roles.sort();

    let permissions = principal
        .summarize_permissions()
        .into_iter()
        .map(|e| EffectivePermissionView {
            permission: e.permission,
            source: e.source,
        })
        .collect();

    Ok(Json(EffectivePermissionsResponse {
        user_id,
        roles,
        permissions,
    }))
}

/// Check one permission for a user
#[utoipa::path(
    get,
    path = "/rbac/users/{user_id}/check/{permission}",
    tag = "RBAC",
    params(
        ("user_id" = Uuid, Path, description = "User ID"),
        ("permission" = String, Path, description = "Permission, e.g. attendance.manage"),
    ),
    responses((status = 200, description = "Resolution result", body = PermissionCheckResponse)),
    security(("bearerAuth" = []))
)]
pub async fn check_permission(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path((user_id, permission)): Path<(Uuid, String)>,
) -> AppResult<Json<PermissionCheckResponse>> {
    let permission: Permission = permission.parse()?;
    let principal = state.principals.load(user_id).await?;

    Ok(Json(PermissionCheckResponse {
        permission,
        allowed: principal.has_permission(permission),
    }))
}

// =============================================================================
// HELPERS
// =============================================================================

async fn ensure_user_exists(pool: &SqlitePool, user_id: Uuid) -> AppResult<()> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE id = ? AND deleted_at IS NULL")
        .bind(user_id.to_string())
        .fetch_one(pool)
        .await?;

    if count == 0 {
        return Err(AppError::validation(format!("user {user_id} does not exist")));
    }
    Ok(())
}

/// Single atomic upsert: at most one override per (user, permission), and the
/// latest write decides its kind.
async fn upsert_override(
    pool: &SqlitePool,
    user_id: Uuid,
    permission: Permission,
    kind: OverrideKind,
    granted_by: Uuid,
    note: Option<String>,
) -> AppResult<PermissionOverride> {
    let id = Uuid::new_v4();
    let now = utc_now();

    sqlx::query(
        "INSERT INTO permission_overrides (id, user_id, permission, kind, granted_by, note, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT (user_id, permission) DO UPDATE SET \
           kind = excluded.kind, granted_by = excluded.granted_by, note = excluded.note, updated_at = excluded.updated_at",
    )
    .bind(id.to_string())
    .bind(user_id.to_string())
    .bind(permission.to_string())
    .bind(kind.as_str())
    .bind(granted_by.to_string())
    .bind(&note)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    let row = sqlx::query_as::<_, DbPermissionOverride>(
        "SELECT id, user_id, permission, kind, granted_by, note, created_at, updated_at \
         FROM permission_overrides WHERE user_id = ? AND permission = ?",
    )
    .bind(user_id.to_string())
    .bind(permission.to_string())
    .fetch_one(pool)
    .await?;

    row.try_into()
}
