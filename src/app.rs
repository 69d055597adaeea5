use std::sync::Arc;

use axum::http::Method;
use axum::routing::{get, post, put};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::authz::{DbPrincipalSource, PrincipalSource};
use crate::errors::AppError;
use crate::events::{self, EventBus};
use crate::jwt::JwtConfig;
use crate::routes::{auth, cycles, health, kpi, rbac};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub event_bus: EventBus,
    pub principals: Arc<dyn PrincipalSource>,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig, event_bus: EventBus) -> Self {
        let principals = Arc::new(DbPrincipalSource::new(pool.clone()));
        Self {
            pool,
            jwt: Arc::new(jwt),
            event_bus,
            principals,
        }
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;

    let (event_bus, rx) = events::init_event_bus();
    tokio::spawn(events::start_activity_listener(rx, pool.clone()));

    let state = AppState::new(pool, jwt_config, event_bus);

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        .route("/logout", post(auth::logout));

    let cycle_routes = Router::new()
        .route("/", get(cycles::list_cycles).post(cycles::create_cycle))
        .route("/:cycle_id", get(cycles::get_cycle))
        .route("/:cycle_id/status", put(cycles::update_cycle_status))
        .route("/:cycle_id/kpis", get(kpi::list_kpis).post(kpi::create_kpi))
        .route("/:cycle_id/kpis/summary", get(kpi::cycle_summary));

    let kpi_routes = Router::new()
        .route("/:id", get(kpi::get_kpi))
        .route("/:id/start", put(kpi::start_kpi))
        .route("/:id/report", post(kpi::submit_report))
        .route("/:id/evaluation", post(kpi::evaluate));

    let app = Router::new()
        .route("/api/health", get(health::health))
        .nest("/auth", auth_routes)
        .nest("/rbac", rbac::routes())
        .nest("/cycles", cycle_routes)
        .nest("/kpis", kpi_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(app)
}
