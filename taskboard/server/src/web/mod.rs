use axum::Json;
use axum::Router;
use axum::http::header::AUTHORIZATION;
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};
use std::iter::once;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::sensitive_headers::SetSensitiveRequestHeadersLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::auth::api::v1::AuthApiState;
use crate::auth::{
    AuthState, DisabledGoogleVerifier, FilteredMakeSpan, GoogleTokenInfoVerifier, GoogleVerifier,
};
use crate::config::Config;
use crate::task::TaskState;

pub mod api;
pub mod middleware;

use middleware::WwwAuthenticateLayer;

/// Picks the Google verifier for the configured client ID.
fn google_verifier(config: &Config) -> Arc<dyn GoogleVerifier + Send + Sync> {
    match &config.google_client_id {
        Some(client_id) if !client_id.is_empty() => {
            Arc::new(GoogleTokenInfoVerifier::new(client_id.clone()))
        }
        _ => {
            tracing::warn!("GOOGLE_CLIENT_ID is not set, Google login is disabled");
            Arc::new(DisabledGoogleVerifier)
        }
    }
}

/// Builds the complete application router.
pub fn app(auth_state: Arc<AuthApiState>, task_state: Arc<TaskState>) -> Router {
    Router::new()
        .route("/health", axum::routing::get(health_check_handler))
        .route("/api-docs/openapi.json", axum::routing::get(openapi_handler))
        .merge(api::create_api_router(auth_state, task_state))
        .layer(
            ServiceBuilder::new()
                .layer(SetSensitiveRequestHeadersLayer::new(once(AUTHORIZATION)))
                .layer(TraceLayer::new_for_http().make_span_with(FilteredMakeSpan))
                .layer(CorsLayer::permissive())
                .layer(WwwAuthenticateLayer::new()),
        )
}

/// Wires the application state around an open database connection.
pub fn app_with_db(config: &Config, db: DatabaseConnection) -> Router {
    let db = Arc::new(db);
    let auth_state = Arc::new(AuthApiState {
        auth: Arc::new(AuthState::from_config(config)),
        db: db.clone(),
        google: google_verifier(config),
    });
    let task_state = Arc::new(TaskState { db });
    app(auth_state, task_state)
}

#[tracing::instrument(skip(config))]
pub async fn start_web_server(config: Config) -> anyhow::Result<()> {
    let server_address = format!("0.0.0.0:{}", &config.port);
    let listener = tokio::net::TcpListener::bind(&server_address).await?;
    tracing::info!("Web server running on http://{}", server_address);

    let db = Database::connect(&config.db_url).await?;
    migration::Migrator::up(&db, None).await?;
    tracing::info!("Database migrations applied successfully");

    let app = app_with_db(&config, db);

    axum::serve(listener, app).await?;
    Ok(())
}

#[tracing::instrument]
pub async fn health_check_handler() -> &'static str {
    "OK"
}

pub async fn openapi_handler() -> Json<utoipa::openapi::OpenApi> {
    Json(api::ApiDoc::openapi())
}
