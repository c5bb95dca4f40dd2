//! Colabora - REST backend connecting NGOs, volunteers and collaborators.

pub mod activity;
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod models;
pub mod openapi;
pub mod pagination;
pub mod schema;
pub mod telemetry;
pub mod validation;
pub mod workflow;

use axum::{
    http::StatusCode,
    middleware as axum_middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};

use diesel::r2d2::{self, ConnectionManager};
use diesel::PgConnection;
use std::sync::Arc;
use std::time::Duration;

use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use auth::jwt::JwtConfig;
use auth::password::PasswordPolicy;
use config::Environment;
use error::ApiError;
use integrations::{LookupClient, Mailer};
use middleware::{auth_middleware, metrics_middleware, request_id_middleware};
use telemetry::MetricsState;

pub type DbPool = r2d2::Pool<ConnectionManager<PgConnection>>;

pub const API_PREFIX: &str = "/api/v1";

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub jwt_config: Arc<JwtConfig>,
    pub password_policy: PasswordPolicy,
    pub password_hash_cost: u32,
    pub password_reset_expiry_mins: i64,
    pub environment: Environment,
    pub mailer: Mailer,
    pub lookup: LookupClient,
    pub metrics: MetricsState,
    pub frontend_url: Arc<str>,
}

impl AppState {
    pub fn new(db_pool: DbPool, config: &Config) -> Self {
        let jwt_config = JwtConfig::from_env(
            config.jwt.access_token_expiry_secs,
            config.jwt.issuer.clone(),
            config.jwt.audience.clone(),
        );
        Self::with_jwt_config(db_pool, config, jwt_config)
    }

    pub fn with_jwt_config(db_pool: DbPool, config: &Config, jwt_config: JwtConfig) -> Self {
        Self {
            db_pool,
            jwt_config: Arc::new(jwt_config),
            password_policy: PasswordPolicy::new(config.security.min_password_length),
            password_hash_cost: config.security.password_hash_cost,
            password_reset_expiry_mins: config.security.password_reset_expiry_mins,
            environment: config.server.environment.clone(),
            mailer: Mailer::new(config.mail.clone()),
            lookup: LookupClient::new(config.lookup.clone()),
            metrics: MetricsState::new(config.telemetry.metrics_enabled),
            frontend_url: Arc::from(config.frontend_url.trim_end_matches('/')),
        }
    }
}

fn public_api(state: &AppState) -> Router {
    use handlers::{auth, lookups, ongs, projects, search, users};

    Router::new()
        .route("/login", post(auth::login))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password))
        .route("/users", post(users::create_user))
        .route("/ongs", post(ongs::create_ong).get(ongs::list_ongs))
        .route("/ongs/{id}", get(ongs::get_ong))
        .route("/ongs/{id}/projects", get(ongs::list_ong_projects))
        .route("/projects", get(projects::list_projects))
        .route("/projects/{id}", get(projects::get_project))
        .route("/search-results", get(search::search))
        .route("/filters", get(search::filters))
        .route("/lookups/cnpj/{cnpj}", get(lookups::lookup_cnpj))
        .route("/lookups/cep/{cep}", get(lookups::lookup_cep))
        .with_state(state.clone())
}

fn protected_api(state: &AppState) -> Router {
    use handlers::{
        activities, auth, contributions, invites, ongs, posts, projects, users,
        volunteer_requests,
    };

    Router::new()
        .route("/me", get(auth::me))
        .route("/users", get(users::list_users))
        .route(
            "/users/{id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route("/users/{id}/contributions", get(users::list_user_contributions))
        .route("/ongs/{id}", put(ongs::update_ong).delete(ongs::delete_ong))
        .route("/ongs/{id}/collaborators", get(ongs::list_collaborators))
        .route(
            "/ongs/{id}/collaborators/{user_id}",
            delete(ongs::remove_collaborator),
        )
        .route("/projects", post(projects::create_project))
        .route(
            "/projects/{id}",
            put(projects::update_project).delete(projects::delete_project),
        )
        .route("/projects/{id}/volunteers", get(projects::list_volunteers))
        .route(
            "/projects/{id}/volunteer-requests",
            post(volunteer_requests::request_volunteer),
        )
        .route(
            "/volunteer-requests",
            get(volunteer_requests::list_volunteer_requests),
        )
        .route(
            "/volunteer-requests/{id}",
            put(volunteer_requests::respond_to_volunteer_request)
                .delete(volunteer_requests::cancel_volunteer_request),
        )
        .route("/posts", post(posts::create_post).get(posts::list_posts))
        .route("/posts/{id}", get(posts::get_post).delete(posts::delete_post))
        .route(
            "/posts/{id}/likes",
            post(posts::like_post).delete(posts::unlike_post),
        )
        .route(
            "/posts/{id}/comments",
            post(posts::create_comment).get(posts::list_comments),
        )
        .route("/comments/{id}", delete(posts::delete_comment))
        .route("/activities", get(activities::list_activities))
        .route("/activities/me", get(activities::list_my_activities))
        .route(
            "/contributions",
            post(contributions::create_contribution).get(contributions::list_contributions),
        )
        .route(
            "/contributions/{id}",
            get(contributions::get_contribution).delete(contributions::delete_contribution),
        )
        .route(
            "/contributions/{id}/feedback",
            put(contributions::give_feedback),
        )
        .route(
            "/invites",
            post(invites::create_invite).get(invites::list_invites),
        )
        .route(
            "/invites/{id}",
            put(invites::respond_to_invite).delete(invites::withdraw_invite),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state.clone())
}

pub fn create_router(state: AppState, config: &Config) -> Router {
    let cors = build_cors_layer(config);
    let body_limit = RequestBodyLimitLayer::new(config.server.max_body_size);

    #[allow(deprecated)]
    let timeout = TimeoutLayer::new(Duration::from_secs(config.server.request_timeout_secs));

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let health_routes = Router::new()
        .route("/health", get(handlers::health::health_check_simple))
        .route("/health/status", get(handlers::health::health_check))
        .route("/health/ready", get(handlers::health::ready_check))
        .route("/health/live", get(handlers::health::live_check))
        .with_state(state.clone())
        .route(
            "/metrics",
            get(telemetry::metrics::metrics_handler).with_state(state.metrics.clone()),
        );

    let api = Router::new()
        .merge(public_api(&state))
        .merge(protected_api(&state));

    Router::new()
        .merge(openapi::swagger_router())
        .merge(health_routes)
        .nest(API_PREFIX, api)
        .fallback(fallback_handler)
        .layer(axum_middleware::from_fn(metrics_middleware))
        .layer(axum_middleware::from_fn(request_id_middleware))
        .layer(trace_layer)
        .layer(timeout)
        .layer(body_limit)
        .layer(cors)
}

async fn fallback_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ApiError::new("Rota não encontrada", "NOT_FOUND")),
    )
}

fn build_cors_layer(config: &Config) -> CorsLayer {
    use axum::http::{header::HeaderName, HeaderValue, Method};

    let cors = &config.cors;
    let wildcard = cors.allowed_origins.is_empty() || cors.allowed_origins.iter().any(|o| o == "*");

    let methods: Vec<Method> = cors
        .allowed_methods
        .iter()
        .filter_map(|m| m.parse().ok())
        .collect();
    let headers: Vec<HeaderName> = cors
        .allowed_headers
        .iter()
        .filter_map(|h| h.parse().ok())
        .collect();
    let origins: Vec<HeaderValue> = cors
        .allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    let layer = match (wildcard, cors.allow_credentials) {
        // credentials forbid a literal `*`, so echo the caller's origin
        (true, true) => CorsLayer::new().allow_origin(tower_http::cors::AllowOrigin::mirror_request()),
        (true, false) => CorsLayer::new().allow_origin(Any),
        (false, _) => CorsLayer::new().allow_origin(origins),
    };

    layer
        .allow_methods(methods)
        .allow_headers(headers)
        .allow_credentials(cors.allow_credentials)
        .max_age(Duration::from_secs(cors.max_age_secs))
}

pub fn create_db_pool(config: &Config) -> Result<DbPool, r2d2::PoolError> {
    let manager = ConnectionManager::<PgConnection>::new(&config.database.url);
    r2d2::Pool::builder()
        .max_size(config.database.max_connections)
        .min_idle(Some(config.database.min_connections))
        .connection_timeout(Duration::from_secs(config.database.connection_timeout_secs))
        .idle_timeout(Some(Duration::from_secs(config.database.idle_timeout_secs)))
        .build(manager)
}

pub fn init_tracing(config: &Config) {
    telemetry::init_telemetry(config);
}

pub use config::Config;
pub use telemetry::tracing::shutdown_telemetry;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    #[test]
    fn test_cors_layer_variants() {
        let mut config = Config::default_for_testing();
        let _ = build_cors_layer(&config);

        config.cors.allow_credentials = true;
        let _ = build_cors_layer(&config);

        config.cors.allowed_origins = vec!["https://colabora.org".to_string()];
        let _ = build_cors_layer(&config);
    }
}
