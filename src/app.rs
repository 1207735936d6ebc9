use std::sync::Arc;

use axum::http::Method;
use axum::routing::{get, post, put};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::backend::SqliteBackend;
use crate::config::AppConfig;
use crate::errors::AppError;
use crate::events::{init_event_bus, start_audit_listener, EventBus};
use crate::jwt::JwtConfig;
use crate::routes::{admin, auth, dashboard, forms, health, pages};
use crate::session::{ProfileLoader, SessionRegistry};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub backend: Arc<SqliteBackend>,
    pub jwt: Arc<JwtConfig>,
    pub sessions: SessionRegistry,
    pub events: EventBus,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Wires the backend, the audit listener and the session registry.
    /// Must be called inside a tokio runtime.
    pub fn new(pool: SqlitePool, jwt: JwtConfig, config: AppConfig) -> Self {
        let backend = Arc::new(SqliteBackend::new(pool.clone()));

        let (events, audit_rx) = init_event_bus();
        tokio::spawn(start_audit_listener(audit_rx, backend.clone()));

        let loader = ProfileLoader::new(backend.clone(), events.clone(), config.profile_retry);
        let sessions = SessionRegistry::new(backend.clone(), loader, events.clone());
        tokio::spawn(sessions.clone().sweep_expired(config.session_sweep_interval));

        Self {
            pool,
            backend,
            jwt: Arc::new(jwt),
            sessions,
            events,
            config: Arc::new(config),
        }
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    let config = AppConfig::from_env()?;
    let state = AppState::new(pool, jwt_config, config);

    Ok(router(state))
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/password-recovery", post(auth::request_password_recovery))
        .route("/recover", post(auth::recover))
        .route("/password", put(auth::update_password))
        .route("/refresh", post(auth::refresh))
        .route("/session", get(auth::session));

    // Every route here sits behind the admin guard via the `AdminArea` extractor.
    let admin_routes = Router::new()
        .route("/", get(admin::overview))
        .route("/users", get(admin::list_users))
        .route("/users/:id/status", put(admin::change_user_status))
        .route("/donations", get(admin::list_donations))
        .route("/submissions", get(admin::list_submissions))
        .route("/logs", get(admin::list_logs));

    Router::new()
        .route("/api/health", get(health::health))
        .nest("/auth", auth_routes)
        .route("/login", get(pages::login_page))
        .route("/registro", get(pages::register_page))
        .route("/verificar-email", get(pages::verify_email_page))
        .route("/panel", get(dashboard::panel))
        .nest("/admin", admin_routes)
        .route("/contacto", post(forms::submit_contact))
        .route("/colaborar", post(forms::submit_volunteer))
        .route("/donar", post(forms::submit_donation))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
