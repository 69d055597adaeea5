use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`

use hr_ops::create_app;

async fn setup() -> Result<(TempDir, Router, SqlitePool)> {
    let dir = tempfile::tempdir().context("failed to create tempdir")?;
    let db_path = dir.path().join("test.db");
    let opts = SqliteConnectOptions::new().filename(&db_path).create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(
        std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"),
    )
    .await?;
    migrator.run(&pool).await?;

    std::env::set_var("JWT_SECRET", "test-secret");
    let app = create_app(pool.clone()).await?;
    Ok((dir, app, pool))
}

async fn register(app: &Router, name: &str, email: &str) -> Result<(String, String)> {
    let req = Request::builder()
        .method("POST")
        .uri("/auth/register")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"name": name, "email": email, "password": "password123"}).to_string(),
        ))?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let bytes = body::to_bytes(resp.into_body(), 1_048_576).await?;
    let v: Value = serde_json::from_slice(&bytes)?;
    Ok((
        v["token"].as_str().context("missing token")?.to_string(),
        v["user"]["id"].as_str().context("missing user id")?.to_string(),
    ))
}

async fn send_json(app: &Router, method: &str, uri: &str, token: &str, body: Value) -> Result<(StatusCode, Value)> {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(body.to_string()))?;
    let resp = app.clone().oneshot(req).await?;
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), 1_048_576).await?;
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes)? };
    Ok((status, value))
}

async fn get_json(app: &Router, uri: &str, token: &str) -> Result<(StatusCode, Value)> {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())?;
    let resp = app.clone().oneshot(req).await?;
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), 1_048_576).await?;
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes)? };
    Ok((status, value))
}

/// Full lifecycle: assign -> start -> report -> evaluate -> analytics rollup.
#[tokio::test]
async fn kpi_lifecycle_and_scoring() -> Result<()> {
    let (_dir, app, pool) = setup().await?;

    let (manager_token, manager_id) = register(&app, "Lan", "lan@example.com").await?;
    sqlx::query("INSERT INTO user_roles (user_id, role, created_at) VALUES (?, 'admin', datetime('now'))")
        .bind(&manager_id)
        .execute(&pool)
        .await?;
    let (employee_token, employee_id) = register(&app, "Minh", "minh@example.com").await?;

    // Cycle planning.
    let (status, cycle) = send_json(
        &app,
        "POST",
        "/cycles",
        &manager_token,
        json!({"name": "Q3 2026", "starts_on": "2026-07-01", "ends_on": "2026-09-30"}),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    let cycle_id = cycle["id"].as_str().context("missing cycle id")?.to_string();

    // Manager assigns 200 orders at 30% salary weight.
    let (status, kpi) = send_json(
        &app,
        "POST",
        &format!("/cycles/{cycle_id}/kpis"),
        &manager_token,
        json!({
            "employee_id": employee_id,
            "work_group": "sales-north",
            "target_value": 200.0,
            "unit": "orders",
            "weight_pct": 30.0
        }),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(kpi["status"], "assigned");
    let kpi_id = kpi["id"].as_str().context("missing kpi id")?.to_string();

    // Employee starts, then reports 210 achieved.
    let (status, started) = send_json(&app, "PUT", &format!("/kpis/{kpi_id}/start"), &employee_token, json!({})).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(started["status"], "in_progress");

    let (status, report) = send_json(
        &app,
        "POST",
        &format!("/kpis/{kpi_id}/report"),
        &employee_token,
        json!({"actual_value": 210.0, "note": "peak season"}),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(report["actual_value"], 210.0);

    // A second report conflicts.
    let (status, _) = send_json(
        &app,
        "POST",
        &format!("/kpis/{kpi_id}/report"),
        &employee_token,
        json!({"actual_value": 215.0}),
    )
    .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    // Out-of-range quality rating fails validation and writes nothing.
    let (status, _) = send_json(
        &app,
        "POST",
        &format!("/kpis/{kpi_id}/evaluation"),
        &manager_token,
        json!({"quality_rating": 11}),
    )
    .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let (_, still_submitted) = get_json(&app, &format!("/kpis/{kpi_id}"), &manager_token).await?;
    assert_eq!(still_submitted["status"], "submitted");

    // Valid evaluation: quantity defaults to 210/200 = 105%, quality 9.
    let (status, evaluation) = send_json(
        &app,
        "POST",
        &format!("/kpis/{kpi_id}/evaluation"),
        &manager_token,
        json!({"quality_rating": 9, "comment": "strong quarter"}),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(evaluation["quantity_score"], 105.0);
    assert_eq!(evaluation["final_score"], 97.5);
    assert_eq!(evaluation["tier"], "excellent");

    let (_, evaluated) = get_json(&app, &format!("/kpis/{kpi_id}"), &manager_token).await?;
    assert_eq!(evaluated["status"], "evaluated");

    // Dashboard rollup reflects the same numbers.
    let (status, summary) = get_json(&app, &format!("/cycles/{cycle_id}/kpis/summary"), &manager_token).await?;
    assert_eq!(status, StatusCode::OK);
    let entry = &summary["entries"][0];
    assert_eq!(entry["completion_percentage"], 105.0);
    assert_eq!(entry["progress_status"], "completed");
    assert_eq!(entry["final_score"], 97.5);
    assert_eq!(entry["tier"], "excellent");

    Ok(())
}

#[tokio::test]
async fn only_assigned_employee_can_report() -> Result<()> {
    let (_dir, app, pool) = setup().await?;

    let (manager_token, manager_id) = register(&app, "Lan", "lan2@example.com").await?;
    sqlx::query("INSERT INTO user_roles (user_id, role, created_at) VALUES (?, 'admin', datetime('now'))")
        .bind(&manager_id)
        .execute(&pool)
        .await?;
    let (_e1, employee_id) = register(&app, "Minh", "minh2@example.com").await?;
    let (intruder_token, _e2) = register(&app, "Khac", "khac@example.com").await?;

    let (_, cycle) = send_json(
        &app,
        "POST",
        "/cycles",
        &manager_token,
        json!({"name": "Q4 2026", "starts_on": "2026-10-01", "ends_on": "2026-12-31"}),
    )
    .await?;
    let cycle_id = cycle["id"].as_str().unwrap().to_string();

    let (_, kpi) = send_json(
        &app,
        "POST",
        &format!("/cycles/{cycle_id}/kpis"),
        &manager_token,
        json!({
            "employee_id": employee_id,
            "work_group": "support",
            "target_value": 50.0,
            "unit": "tickets",
            "weight_pct": 20.0
        }),
    )
    .await?;
    let kpi_id = kpi["id"].as_str().unwrap().to_string();

    let (status, _) = send_json(
        &app,
        "POST",
        &format!("/kpis/{kpi_id}/report"),
        &intruder_token,
        json!({"actual_value": 10.0}),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn assignment_validation_and_closed_cycles() -> Result<()> {
    let (_dir, app, pool) = setup().await?;

    let (manager_token, manager_id) = register(&app, "Lan", "lan3@example.com").await?;
    sqlx::query("INSERT INTO user_roles (user_id, role, created_at) VALUES (?, 'admin', datetime('now'))")
        .bind(&manager_id)
        .execute(&pool)
        .await?;
    let (_t, employee_id) = register(&app, "Minh", "minh3@example.com").await?;

    let (_, cycle) = send_json(
        &app,
        "POST",
        "/cycles",
        &manager_token,
        json!({"name": "Q1 2027", "starts_on": "2027-01-01", "ends_on": "2027-03-31"}),
    )
    .await?;
    let cycle_id = cycle["id"].as_str().unwrap().to_string();

    // Negative target is rejected.
    let (status, _) = send_json(
        &app,
        "POST",
        &format!("/cycles/{cycle_id}/kpis"),
        &manager_token,
        json!({
            "employee_id": employee_id,
            "work_group": "sales",
            "target_value": -5.0,
            "unit": "orders",
            "weight_pct": 10.0
        }),
    )
    .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    // Unknown employee is rejected.
    let ghost = uuid::Uuid::new_v4();
    let (status, _) = send_json(
        &app,
        "POST",
        &format!("/cycles/{cycle_id}/kpis"),
        &manager_token,
        json!({
            "employee_id": ghost,
            "work_group": "sales",
            "target_value": 10.0,
            "unit": "orders",
            "weight_pct": 10.0
        }),
    )
    .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    // Close the cycle (planning -> active -> closed), then assignment conflicts.
    let (status, _) = send_json(
        &app,
        "PUT",
        &format!("/cycles/{cycle_id}/status"),
        &manager_token,
        json!({"status": "active"}),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send_json(
        &app,
        "PUT",
        &format!("/cycles/{cycle_id}/status"),
        &manager_token,
        json!({"status": "closed"}),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send_json(
        &app,
        "POST",
        &format!("/cycles/{cycle_id}/kpis"),
        &manager_token,
        json!({
            "employee_id": employee_id,
            "work_group": "sales",
            "target_value": 10.0,
            "unit": "orders",
            "weight_pct": 10.0
        }),
    )
    .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    // Reopening a closed cycle is an illegal transition.
    let (status, _) = send_json(
        &app,
        "PUT",
        &format!("/cycles/{cycle_id}/status"),
        &manager_token,
        json!({"status": "active"}),
    )
    .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    Ok(())
}
