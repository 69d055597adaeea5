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
    let token = v["token"].as_str().context("missing token")?.to_string();
    let user_id = v["user"]["id"].as_str().context("missing user id")?.to_string();
    Ok((token, user_id))
}

async fn give_role(pool: &SqlitePool, user_id: &str, role: &str) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO user_roles (user_id, role, created_at) VALUES (?, ?, datetime('now'))")
        .bind(user_id)
        .bind(role)
        .execute(pool)
        .await?;
    Ok(())
}

async fn check(app: &Router, token: &str, user_id: &str, permission: &str) -> Result<bool> {
    let req = Request::builder()
        .method("GET")
        .uri(format!("/rbac/users/{user_id}/check/{permission}"))
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), 1_048_576).await?;
    let v: Value = serde_json::from_slice(&bytes)?;
    v["allowed"].as_bool().context("missing allowed flag")
}

async fn effective(app: &Router, token: &str, user_id: &str) -> Result<Vec<(String, String)>> {
    let req = Request::builder()
        .method("GET")
        .uri(format!("/rbac/users/{user_id}/effective-permissions"))
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), 1_048_576).await?;
    let v: Value = serde_json::from_slice(&bytes)?;
    Ok(v["permissions"]
        .as_array()
        .context("missing permissions array")?
        .iter()
        .map(|e| {
            (
                e["permission"].as_str().unwrap_or_default().to_string(),
                e["source"].as_str().unwrap_or_default().to_string(),
            )
        })
        .collect())
}

#[tokio::test]
async fn revoke_shadows_role_grant() -> Result<()> {
    let (_dir, app, pool) = setup().await?;

    let (admin_token, admin_id) = register(&app, "Root", "root@example.com").await?;
    give_role(&pool, &admin_id, "super_admin").await?;
    let (_user_token, user_id) = register(&app, "Binh", "binh@example.com").await?;
    give_role(&pool, &user_id, "admin").await?;

    // Role-derived grant is effective.
    assert!(check(&app, &admin_token, &user_id, "attendance.manage").await?);

    // Admin revokes it: a revoke override shadows the role grant.
    let req = Request::builder()
        .method("DELETE")
        .uri(format!("/rbac/users/{user_id}/overrides/attendance.manage"))
        .header("authorization", format!("Bearer {admin_token}"))
        .body(Body::empty())?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    assert!(!check(&app, &admin_token, &user_id, "attendance.manage").await?);

    // The summary no longer lists the permission either.
    let perms = effective(&app, &admin_token, &user_id).await?;
    assert!(perms.iter().all(|(p, _)| p != "attendance.manage"));
    // Unrelated role grants survive.
    assert!(perms.iter().any(|(p, s)| p == "hr.manage" && s == "role"));

    Ok(())
}

#[tokio::test]
async fn grant_works_without_any_role() -> Result<()> {
    let (_dir, app, pool) = setup().await?;

    let (admin_token, admin_id) = register(&app, "Root", "root@example.com").await?;
    give_role(&pool, &admin_id, "super_admin").await?;
    let (_t, user_id) = register(&app, "Chi", "chi@example.com").await?;
    // Strip the default member role so the user holds no roles at all.
    sqlx::query("DELETE FROM user_roles WHERE user_id = ?")
        .bind(&user_id)
        .execute(&pool)
        .await?;

    assert!(effective(&app, &admin_token, &user_id).await?.is_empty());
    assert!(!check(&app, &admin_token, &user_id, "policy.manage").await?);

    let req = Request::builder()
        .method("POST")
        .uri(format!("/rbac/users/{user_id}/overrides"))
        .header("authorization", format!("Bearer {admin_token}"))
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"permission": "policy.manage", "note": "policy drafting taskforce"}).to_string(),
        ))?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::CREATED);

    assert!(check(&app, &admin_token, &user_id, "policy.manage").await?);
    let perms = effective(&app, &admin_token, &user_id).await?;
    assert_eq!(perms, vec![("policy.manage".to_string(), "override".to_string())]);

    Ok(())
}

#[tokio::test]
async fn revoke_is_idempotent_even_for_never_held_permissions() -> Result<()> {
    let (_dir, app, pool) = setup().await?;

    let (admin_token, admin_id) = register(&app, "Root", "root@example.com").await?;
    give_role(&pool, &admin_id, "super_admin").await?;
    let (_t, user_id) = register(&app, "Dung", "dung@example.com").await?;

    // The member role never granted hr.manage; revoking it still succeeds.
    for _ in 0..2 {
        let req = Request::builder()
            .method("DELETE")
            .uri(format!("/rbac/users/{user_id}/overrides/hr.manage"))
            .header("authorization", format!("Bearer {admin_token}"))
            .body(Body::empty())?;
        let resp = app.clone().oneshot(req).await?;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }

    // Exactly one override row exists after both calls.
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(1) FROM permission_overrides WHERE user_id = ? AND permission = 'hr.manage'")
            .bind(&user_id)
            .fetch_one(&pool)
            .await?;
    assert_eq!(count, 1);
    assert!(!check(&app, &admin_token, &user_id, "hr.manage").await?);

    Ok(())
}

#[tokio::test]
async fn grant_validates_user_and_permission() -> Result<()> {
    let (_dir, app, pool) = setup().await?;

    let (admin_token, admin_id) = register(&app, "Root", "root@example.com").await?;
    give_role(&pool, &admin_id, "super_admin").await?;
    let (_t, user_id) = register(&app, "Em", "em@example.com").await?;

    // Unknown permission string.
    let req = Request::builder()
        .method("POST")
        .uri(format!("/rbac/users/{user_id}/overrides"))
        .header("authorization", format!("Bearer {admin_token}"))
        .header("content-type", "application/json")
        .body(Body::from(json!({"permission": "payroll.approve"}).to_string()))?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    // Unknown user id.
    let ghost = uuid::Uuid::new_v4();
    let req = Request::builder()
        .method("POST")
        .uri(format!("/rbac/users/{ghost}/overrides"))
        .header("authorization", format!("Bearer {admin_token}"))
        .header("content-type", "application/json")
        .body(Body::from(json!({"permission": "hr.view"}).to_string()))?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    Ok(())
}

#[tokio::test]
async fn writes_require_rbac_manage() -> Result<()> {
    let (_dir, app, _pool) = setup().await?;

    // A plain member (default role) cannot grant overrides.
    let (member_token, _member_id) = register(&app, "An", "an@example.com").await?;
    let (_t, other_id) = register(&app, "Hoa", "hoa@example.com").await?;

    let req = Request::builder()
        .method("POST")
        .uri(format!("/rbac/users/{other_id}/overrides"))
        .header("authorization", format!("Bearer {member_token}"))
        .header("content-type", "application/json")
        .body(Body::from(json!({"permission": "hr.view"}).to_string()))?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    Ok(())
}
