use axum::Router;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::models;
use crate::routes;
use crate::scoring;

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::health::health,
        routes::auth::register,
        routes::auth::login,
        routes::auth::me,
        routes::auth::logout,
        routes::rbac::list_permissions,
        routes::rbac::get_user_roles,
        routes::rbac::assign_role,
        routes::rbac::remove_role,
        routes::rbac::list_overrides,
        routes::rbac::grant_override,
        routes::rbac::revoke_override,
        routes::rbac::effective_permissions,
        routes::rbac::check_permission,
        routes::cycles::create_cycle,
        routes::cycles::list_cycles,
        routes::cycles::get_cycle,
        routes::cycles::update_cycle_status,
        routes::kpi::create_kpi,
        routes::kpi::list_kpis,
        routes::kpi::get_kpi,
        routes::kpi::start_kpi,
        routes::kpi::submit_report,
        routes::kpi::evaluate,
        routes::kpi::cycle_summary,
    ),
    components(
        schemas(
            models::user::User,
            models::user::AuthResponse,
            models::user::LoginRequest,
            models::user::RegisterRequest,
            models::rbac::RoleAssignment,
            models::rbac::AssignRoleRequest,
            models::rbac::PermissionOverride,
            models::rbac::GrantOverrideRequest,
            models::rbac::EffectivePermissionsResponse,
            models::rbac::EffectivePermissionView,
            models::rbac::PermissionCheckResponse,
            models::cycle::PerformanceCycle,
            models::cycle::CycleStatus,
            models::cycle::CycleCreateRequest,
            models::cycle::CycleStatusRequest,
            models::kpi::KpiAssignment,
            models::kpi::AssignmentStatus,
            models::kpi::KpiCreateRequest,
            models::kpi::PerformanceReport,
            models::kpi::ReportSubmitRequest,
            models::kpi::PerformanceEvaluation,
            models::kpi::EvaluateRequest,
            models::kpi::KpiSummaryEntry,
            models::kpi::KpiCycleSummary,
            scoring::PerformanceTier,
            scoring::ProgressStatus,
            routes::health::HealthResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Authentication endpoints"),
        (name = "RBAC", description = "Roles, permission overrides, effective permissions"),
        (name = "Cycles", description = "Performance cycle planning"),
        (name = "KPI", description = "KPI assignments, reports, evaluations, analytics"),
        (name = "Health", description = "Service health")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearerAuth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn build_openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> Router {
    Router::new().merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", doc))
}
