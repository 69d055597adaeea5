//! KPI assignment lifecycle and scoring endpoints.
//!
//! Assignments move `assigned -> in_progress -> submitted -> evaluated`.
//! Employees report their own actuals; managers evaluate, which is the only
//! place a final score is computed and persisted.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{Action, Module, Permission};
use crate::errors::{AppError, AppResult};
use crate::events::log_activity;
use crate::jwt::AuthUser;
use crate::models::cycle::CycleStatus;
use crate::models::kpi::*;
use crate::routes::cycles::fetch_cycle;
use crate::routes::require_permission;
use crate::scoring;
use crate::scoring::{PerformanceTier, ProgressStatus};
use crate::utils::utc_now;

const KPI_MANAGE: Permission = Permission::new(Module::Kpi, Action::Manage);
const KPI_VIEW: Permission = Permission::new(Module::Kpi, Action::View);

// =============================================================================
// ASSIGNMENTS
// =============================================================================

#[utoipa::path(
    post,
    path = "/cycles/{cycle_id}/kpis",
    tag = "KPI",
    params(("cycle_id" = Uuid, Path, description = "Cycle ID")),
    request_body = KpiCreateRequest,
    responses(
        (status = 201, description = "Assignment created", body = KpiAssignment),
        (status = 409, description = "Cycle is closed"),
        (status = 422, description = "Invalid target, weight, or employee"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_kpi(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(cycle_id): Path<Uuid>,
    Json(req): Json<KpiCreateRequest>,
) -> AppResult<(StatusCode, Json<KpiAssignment>)> {
    require_permission(&state, auth.user_id, KPI_MANAGE).await?;

    let cycle = fetch_cycle(&state, cycle_id).await?;
    if cycle.status == CycleStatus::Closed {
        return Err(AppError::conflict("cannot assign KPIs in a closed cycle"));
    }

    if req.target_value < 0.0 {
        return Err(AppError::validation("target value must be non-negative"));
    }
    if !(0.0..=100.0).contains(&req.weight_pct) {
        return Err(AppError::validation("weight must be between 0 and 100 percent"));
    }
    ensure_employee_exists(&state.pool, req.employee_id).await?;

    let id = Uuid::new_v4();
    let now = utc_now();

    sqlx::query(
        "INSERT INTO kpi_assignments (id, employee_id, cycle_id, work_group, target_value, unit, weight_pct, status, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, 'assigned', ?, ?)",
    )
    .bind(id.to_string())
    .bind(req.employee_id.to_string())
    .bind(cycle_id.to_string())
    .bind(&req.work_group)
    .bind(req.target_value)
    .bind(&req.unit)
    .bind(req.weight_pct)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let assignment = fetch_assignment(&state.pool, id).await?;
    log_activity(&state.event_bus, "created", Some(auth.user_id), &assignment, None);

    Ok((StatusCode::CREATED, Json(assignment)))
}

#[utoipa::path(
    get,
    path = "/cycles/{cycle_id}/kpis",
    tag = "KPI",
    params(("cycle_id" = Uuid, Path, description = "Cycle ID")),
    responses((status = 200, description = "Assignments in the cycle", body = Vec<KpiAssignment>)),
    security(("bearerAuth" = []))
)]
pub async fn list_kpis(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(cycle_id): Path<Uuid>,
) -> AppResult<Json<Vec<KpiAssignment>>> {
    let rows = sqlx::query_as::<_, DbKpiAssignment>(
        "SELECT id, employee_id, cycle_id, work_group, target_value, unit, weight_pct, status, created_at, updated_at \
         FROM kpi_assignments WHERE cycle_id = ? ORDER BY created_at",
    )
    .bind(cycle_id.to_string())
    .fetch_all(&state.pool)
    .await?;

    let assignments = rows.into_iter().map(KpiAssignment::try_from).collect::<Result<_, _>>()?;
    Ok(Json(assignments))
}

#[utoipa::path(
    get,
    path = "/kpis/{id}",
    tag = "KPI",
    params(("id" = Uuid, Path, description = "Assignment ID")),
    responses(
        (status = 200, description = "Assignment details", body = KpiAssignment),
        (status = 404, description = "Assignment not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_kpi(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<KpiAssignment>> {
    Ok(Json(fetch_assignment(&state.pool, id).await?))
}

/// Employee marks an assignment as started.
#[utoipa::path(
    put,
    path = "/kpis/{id}/start",
    tag = "KPI",
    params(("id" = Uuid, Path, description = "Assignment ID")),
    responses(
        (status = 200, description = "Assignment in progress", body = KpiAssignment),
        (status = 409, description = "Assignment already past the assigned state"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn start_kpi(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<KpiAssignment>> {
    let assignment = fetch_assignment(&state.pool, id).await?;
    if assignment.employee_id != auth.user_id {
        return Err(AppError::forbidden("only the assigned employee can start this KPI"));
    }
    if assignment.status != AssignmentStatus::Assigned {
        return Err(AppError::conflict("assignment is already past the assigned state"));
    }

    update_status(&state.pool, id, AssignmentStatus::InProgress).await?;
    let updated = fetch_assignment(&state.pool, id).await?;
    log_activity(&state.event_bus, "started", Some(auth.user_id), &updated, None);

    Ok(Json(updated))
}

// =============================================================================
// REPORT SUBMISSION
// =============================================================================

/// Employee submits the achieved actual against the target.
#[utoipa::path(
    post,
    path = "/kpis/{id}/report",
    tag = "KPI",
    params(("id" = Uuid, Path, description = "Assignment ID")),
    request_body = ReportSubmitRequest,
    responses(
        (status = 201, description = "Report recorded", body = PerformanceReport),
        (status = 409, description = "Already submitted or evaluated"),
        (status = 422, description = "Negative actual value"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn submit_report(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ReportSubmitRequest>,
) -> AppResult<(StatusCode, Json<PerformanceReport>)> {
    let assignment = fetch_assignment(&state.pool, id).await?;
    if assignment.employee_id != auth.user_id {
        return Err(AppError::forbidden("only the assigned employee can report on this KPI"));
    }
    if !matches!(assignment.status, AssignmentStatus::Assigned | AssignmentStatus::InProgress) {
        return Err(AppError::conflict("assignment has already been submitted"));
    }
    if req.actual_value < 0.0 {
        return Err(AppError::validation("actual value must be non-negative"));
    }

    let report_id = Uuid::new_v4();
    let now = utc_now();

    let mut tx = state.pool.begin().await?;
    sqlx::query(
        "INSERT INTO performance_reports (id, assignment_id, actual_value, note, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(report_id.to_string())
    .bind(id.to_string())
    .bind(req.actual_value)
    .bind(&req.note)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    sqlx::query("UPDATE kpi_assignments SET status = 'submitted', updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    let report = fetch_report(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::internal("report missing after insert"))?;
    log_activity(&state.event_bus, "reported", Some(auth.user_id), &report, None);

    Ok((StatusCode::CREATED, Json(report)))
}

// =============================================================================
// EVALUATION
// =============================================================================

/// Manager records the evaluation; the final score is derived here and
/// nowhere else.
#[utoipa::path(
    post,
    path = "/kpis/{id}/evaluation",
    tag = "KPI",
    params(("id" = Uuid, Path, description = "Assignment ID")),
    request_body = EvaluateRequest,
    responses(
        (status = 201, description = "Evaluation recorded", body = PerformanceEvaluation),
        (status = 404, description = "No submitted report to evaluate"),
        (status = 409, description = "Assignment not in submitted state"),
        (status = 422, description = "Quality rating out of range"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn evaluate(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<EvaluateRequest>,
) -> AppResult<(StatusCode, Json<PerformanceEvaluation>)> {
    require_permission(&state, auth.user_id, KPI_MANAGE).await?;

    let assignment = fetch_assignment(&state.pool, id).await?;
    if assignment.status != AssignmentStatus::Submitted {
        return Err(AppError::conflict("assignment must be submitted before evaluation"));
    }

    let report = fetch_report(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::not_found("no report submitted for this assignment"))?;

    // The credited quantity score defaults to the reported completion; the
    // evaluator may overrule it.
    let quantity_score = match req.quantity_score {
        Some(score) => {
            if score < 0.0 {
                return Err(AppError::validation("quantity score must be non-negative"));
            }
            score
        }
        None => scoring::completion_percentage(report.actual_value, assignment.target_value)?,
    };

    // Validation happens before any write; a bad rating leaves no partial state.
    let final_score = scoring::final_score(quantity_score, req.quality_rating)?;

    let evaluation_id = Uuid::new_v4();
    let now = utc_now();

    let mut tx = state.pool.begin().await?;
    sqlx::query(
        "INSERT INTO performance_evaluations (id, assignment_id, evaluator_id, quantity_score, quality_rating, final_score, comment, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(evaluation_id.to_string())
    .bind(id.to_string())
    .bind(auth.user_id.to_string())
    .bind(quantity_score)
    .bind(req.quality_rating)
    .bind(final_score)
    .bind(&req.comment)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    sqlx::query("UPDATE kpi_assignments SET status = 'evaluated', updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    let evaluation = PerformanceEvaluation {
        id: evaluation_id,
        assignment_id: id,
        evaluator_id: auth.user_id,
        quantity_score,
        quality_rating: req.quality_rating,
        final_score,
        tier: PerformanceTier::from_score(final_score),
        comment: req.comment,
        created_at: now,
    };
    log_activity(&state.event_bus, "evaluated", Some(auth.user_id), &evaluation, None);

    Ok((StatusCode::CREATED, Json(evaluation)))
}

// =============================================================================
// CYCLE SUMMARY (analytics rollup)
// =============================================================================

#[utoipa::path(
    get,
    path = "/cycles/{cycle_id}/kpis/summary",
    tag = "KPI",
    params(("cycle_id" = Uuid, Path, description = "Cycle ID")),
    responses((status = 200, description = "Per-assignment scoring rollup", body = KpiCycleSummary)),
    security(("bearerAuth" = []))
)]
pub async fn cycle_summary(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(cycle_id): Path<Uuid>,
) -> AppResult<Json<KpiCycleSummary>> {
    require_permission(&state, auth.user_id, KPI_VIEW).await?;
    fetch_cycle(&state, cycle_id).await?;

    let rows = sqlx::query_as::<_, DbKpiAssignment>(
        "SELECT id, employee_id, cycle_id, work_group, target_value, unit, weight_pct, status, created_at, updated_at \
         FROM kpi_assignments WHERE cycle_id = ? ORDER BY created_at",
    )
    .bind(cycle_id.to_string())
    .fetch_all(&state.pool)
    .await?;

    let mut entries = Vec::with_capacity(rows.len());
    for row in rows {
        let assignment: KpiAssignment = row.try_into()?;
        let report = fetch_report(&state.pool, assignment.id).await?;
        let evaluation = fetch_evaluation(&state.pool, assignment.id).await?;

        let completion = match &report {
            Some(r) => Some(scoring::completion_percentage(r.actual_value, assignment.target_value)?),
            None => None,
        };

        entries.push(KpiSummaryEntry {
            assignment_id: assignment.id,
            employee_id: assignment.employee_id,
            work_group: assignment.work_group,
            status: assignment.status,
            target_value: assignment.target_value,
            unit: assignment.unit,
            actual_value: report.map(|r| r.actual_value),
            completion_percentage: completion,
            progress_status: ProgressStatus::from_completion(completion.unwrap_or(0.0)),
            final_score: evaluation.as_ref().map(|e| e.final_score),
            tier: evaluation.as_ref().map(|e| e.tier),
        });
    }

    Ok(Json(KpiCycleSummary { cycle_id, entries }))
}

// =============================================================================
// HELPERS
// =============================================================================

async fn ensure_employee_exists(pool: &SqlitePool, employee_id: Uuid) -> AppResult<()> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE id = ? AND deleted_at IS NULL")
        .bind(employee_id.to_string())
        .fetch_one(pool)
        .await?;

    if count == 0 {
        return Err(AppError::validation(format!("employee {employee_id} does not exist")));
    }
    Ok(())
}

async fn fetch_assignment(pool: &SqlitePool, id: Uuid) -> AppResult<KpiAssignment> {
    let row = sqlx::query_as::<_, DbKpiAssignment>(
        "SELECT id, employee_id, cycle_id, work_group, target_value, unit, weight_pct, status, created_at, updated_at \
         FROM kpi_assignments WHERE id = ?",
    )
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("assignment not found"))?;

    row.try_into()
}

async fn fetch_report(pool: &SqlitePool, assignment_id: Uuid) -> AppResult<Option<PerformanceReport>> {
    let row = sqlx::query_as::<_, DbPerformanceReport>(
        "SELECT id, assignment_id, actual_value, note, created_at FROM performance_reports WHERE assignment_id = ?",
    )
    .bind(assignment_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.map(PerformanceReport::try_from).transpose()
}

async fn fetch_evaluation(pool: &SqlitePool, assignment_id: Uuid) -> AppResult<Option<PerformanceEvaluation>> {
    let row = sqlx::query_as::<_, DbPerformanceEvaluation>(
        "SELECT id, assignment_id, evaluator_id, quantity_score, quality_rating, final_score, comment, created_at \
         FROM performance_evaluations WHERE assignment_id = ?",
    )
    .bind(assignment_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.map(PerformanceEvaluation::try_from).transpose()
}

async fn update_status(pool: &SqlitePool, id: Uuid, status: AssignmentStatus) -> AppResult<()> {
    sqlx::query("UPDATE kpi_assignments SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(utc_now())
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}
