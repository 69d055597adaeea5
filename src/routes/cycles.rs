use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{Action, Module, Permission};
use crate::errors::{AppError, AppResult};
use crate::events::log_activity;
use crate::jwt::AuthUser;
use crate::models::cycle::{CycleCreateRequest, CycleStatusRequest, DbPerformanceCycle, PerformanceCycle};
use crate::routes::require_permission;
use crate::utils::utc_now;

const PERFORMANCE_MANAGE: Permission = Permission::new(Module::Performance, Action::Manage);

#[utoipa::path(
    post,
    path = "/cycles",
    tag = "Cycles",
    request_body = CycleCreateRequest,
    responses(
        (status = 201, description = "Cycle created", body = PerformanceCycle),
        (status = 422, description = "Invalid date range"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_cycle(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CycleCreateRequest>,
) -> AppResult<(StatusCode, Json<PerformanceCycle>)> {
    require_permission(&state, auth.user_id, PERFORMANCE_MANAGE).await?;

    if req.ends_on < req.starts_on {
        return Err(AppError::validation("cycle must not end before it starts"));
    }

    let id = Uuid::new_v4();
    let now = utc_now();

    sqlx::query(
        "INSERT INTO performance_cycles (id, name, starts_on, ends_on, status, created_at, updated_at) \
         VALUES (?, ?, ?, ?, 'planning', ?, ?)",
    )
    .bind(id.to_string())
    .bind(&req.name)
    .bind(req.starts_on)
    .bind(req.ends_on)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let cycle = fetch_cycle(&state, id).await?;
    log_activity(&state.event_bus, "created", Some(auth.user_id), &cycle, None);

    Ok((StatusCode::CREATED, Json(cycle)))
}

#[utoipa::path(
    get,
    path = "/cycles",
    tag = "Cycles",
    responses((status = 200, description = "All performance cycles", body = Vec<PerformanceCycle>)),
    security(("bearerAuth" = []))
)]
pub async fn list_cycles(State(state): State<AppState>, _auth: AuthUser) -> AppResult<Json<Vec<PerformanceCycle>>> {
    let rows = sqlx::query_as::<_, DbPerformanceCycle>(
        "SELECT id, name, starts_on, ends_on, status, created_at, updated_at \
         FROM performance_cycles ORDER BY starts_on DESC",
    )
    .fetch_all(&state.pool)
    .await?;

    let cycles = rows.into_iter().map(PerformanceCycle::try_from).collect::<Result<_, _>>()?;
    Ok(Json(cycles))
}

#[utoipa::path(
    get,
    path = "/cycles/{cycle_id}",
    tag = "Cycles",
    params(("cycle_id" = Uuid, Path, description = "Cycle ID")),
    responses(
        (status = 200, description = "Cycle details", body = PerformanceCycle),
        (status = 404, description = "Cycle not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_cycle(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<PerformanceCycle>> {
    Ok(Json(fetch_cycle(&state, id).await?))
}

#[utoipa::path(
    put,
    path = "/cycles/{cycle_id}/status",
    tag = "Cycles",
    params(("cycle_id" = Uuid, Path, description = "Cycle ID")),
    request_body = CycleStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = PerformanceCycle),
        (status = 409, description = "Illegal status transition"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_cycle_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<CycleStatusRequest>,
) -> AppResult<Json<PerformanceCycle>> {
    require_permission(&state, auth.user_id, PERFORMANCE_MANAGE).await?;

    let cycle = fetch_cycle(&state, id).await?;
    if !cycle.status.can_transition_to(req.status) {
        return Err(AppError::conflict(format!(
            "cannot move cycle from {} to {}",
            cycle.status.as_str(),
            req.status.as_str()
        )));
    }

    sqlx::query("UPDATE performance_cycles SET status = ?, updated_at = ? WHERE id = ?")
        .bind(req.status.as_str())
        .bind(utc_now())
        .bind(id.to_string())
        .execute(&state.pool)
        .await?;

    let updated = fetch_cycle(&state, id).await?;
    log_activity(&state.event_bus, "status_changed", Some(auth.user_id), &updated, None);

    Ok(Json(updated))
}

pub(crate) async fn fetch_cycle(state: &AppState, id: Uuid) -> AppResult<PerformanceCycle> {
    let row = sqlx::query_as::<_, DbPerformanceCycle>(
        "SELECT id, name, starts_on, ends_on, status, created_at, updated_at \
         FROM performance_cycles WHERE id = ?",
    )
    .bind(id.to_string())
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::not_found("cycle not found"))?;

    row.try_into()
}
