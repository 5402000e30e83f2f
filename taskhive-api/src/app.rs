/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use taskhive_api::{app::{build_router, AppState}, config::Config};
/// use taskhive_shared::{db::pool::create_pool, store::PgStore};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = create_pool(config.database.pool_config()).await?;
/// let state = AppState::new(Arc::new(PgStore::new(pool)), config);
/// let app = build_router(state);
/// # Ok(())
/// # }
/// ```

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post},
    Router,
};
use taskhive_shared::services::{IdentitySettings, ServiceSettings, Services};
use taskhive_shared::store::SharedStore;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{
    config::Config,
    middleware::{auth::require_auth, security::SecurityHeadersLayer},
    routes,
};

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Core services
    pub services: Services,

    /// Backing store, used directly only by the health check
    pub store: SharedStore,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Wires the core services to `store` using `config`
    pub fn new(store: SharedStore, config: Config) -> Self {
        let settings = ServiceSettings {
            identity: IdentitySettings::new(config.jwt.secret.clone()),
            invite_code_max_attempts: config.invite_code_max_attempts,
        };
        let services = Services::new(store.clone(), settings);

        Self::with_services(store, services, config)
    }

    /// Uses pre-built services
    pub fn with_services(store: SharedStore, services: Services, config: Config) -> Self {
        Self {
            services,
            store,
            config: Arc::new(config),
        }
    }
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.allows_any_origin() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

/// Builds the complete Axum router with all routes and middleware
///
/// ```text
/// /
/// ├── GET /health
/// └── /v1/
///     ├── /auth/            register, login (public); me
///     ├── /users/           profile, stats
///     ├── /organizations/   CRUD, join, members, leave, tasks
///     └── /tasks/           CRUD, assign, status
/// ```
pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/auth/register", post(routes::auth::register))
        .route("/auth/login", post(routes::auth::login));

    let protected = Router::new()
        .route("/auth/me", get(routes::auth::me))
        .route(
            "/users/profile",
            get(routes::users::get_profile).put(routes::users::update_profile),
        )
        .route("/users/stats", get(routes::users::stats))
        .route(
            "/organizations",
            post(routes::organizations::create_organization)
                .get(routes::organizations::list_organizations),
        )
        .route("/organizations/join", post(routes::organizations::join_organization))
        .route(
            "/organizations/:org_id",
            get(routes::organizations::get_organization)
                .put(routes::organizations::update_organization)
                .delete(routes::organizations::delete_organization),
        )
        .route(
            "/organizations/:org_id/members",
            get(routes::organizations::list_members),
        )
        .route(
            "/organizations/:org_id/members/:user_id",
            delete(routes::organizations::remove_member),
        )
        .route(
            "/organizations/:org_id/leave",
            post(routes::organizations::leave_organization),
        )
        .route(
            "/organizations/:org_id/tasks",
            get(routes::tasks::list_tasks),
        )
        .route("/tasks", post(routes::tasks::create_task))
        .route(
            "/tasks/:task_id",
            get(routes::tasks::get_task)
                .put(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        .route("/tasks/:task_id/assign", post(routes::tasks::assign_task))
        .route("/tasks/:task_id/status", patch(routes::tasks::update_status))
        .layer(from_fn_with_state(state.clone(), require_auth));

    let v1_routes = public.merge(protected);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&state.config))
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}
