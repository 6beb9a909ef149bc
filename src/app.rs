use std::sync::Arc;

use axum::http::Method;
use axum::routing::{get, post, put};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::authz::{CatalogConfig, Principal, RbacRegistry};
use crate::errors::AppError;
use crate::jwt::JwtConfig;
use crate::routes::{audit, auth, categories, health, organizations, roles, statuses, tasks, users};
use crate::services::ServiceContext;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub rbac: Arc<RbacRegistry>,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig, rbac: RbacRegistry) -> Self {
        Self {
            pool,
            jwt: Arc::new(jwt),
            rbac: Arc::new(rbac),
        }
    }

    /// Pins the current catalog snapshot for the duration of one request.
    pub fn context<'a>(&'a self, principal: &'a Principal) -> ServiceContext<'a> {
        ServiceContext::new(&self.pool, self.rbac.snapshot(), principal)
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let catalog = CatalogConfig::from_env()?;
    create_app_with_catalog(pool, &catalog).await
}

pub async fn create_app_with_catalog(pool: SqlitePool, catalog: &CatalogConfig) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    let registry = RbacRegistry::new(catalog)?;
    let state = AppState::new(pool, jwt_config, registry);

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/me", get(auth::me));

    let task_routes = Router::new()
        .route("/", get(tasks::list_tasks).post(tasks::create_task))
        .route(
            "/:id",
            get(tasks::get_task).put(tasks::update_task).delete(tasks::delete_task),
        );

    let user_routes = Router::new()
        .route("/", get(users::list_users).post(users::create_user))
        .route("/:id", put(users::update_user))
        .route("/:id/reset-password", post(users::reset_password));

    let organization_routes = Router::new()
        .route("/", get(organizations::list_organizations).post(organizations::create_organization))
        .route("/:id", put(organizations::update_organization));

    let role_routes = Router::new()
        .route("/", get(roles::list_roles))
        .route("/reload", post(roles::reload_roles));

    let router = Router::new()
        .route("/api/health", get(health::health))
        .nest("/auth", auth_routes)
        .nest("/tasks", task_routes)
        .nest("/users", user_routes)
        .nest("/organizations", organization_routes)
        .nest("/roles", role_routes)
        .route("/audit-log", get(audit::list_audit_log))
        .route("/categories", get(categories::list_categories).post(categories::create_category))
        .route("/statuses", get(statuses::list_statuses))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(router)
}
