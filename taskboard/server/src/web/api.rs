use std::sync::Arc;

use axum::{
    Json, Router,
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};

use crate::auth::{self, AuthError, api::v1::AuthApiState};
use crate::task::{TaskServiceError, TaskState};
use crate::user::UserServiceError;

/// JSON body returned for every failed API request.
#[derive(Serialize, Deserialize, Debug, ToSchema, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Machine readable error code
    pub error: String,
    /// Human readable description, safe to show to end users
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: &str, message: impl Into<String>) -> Self {
        Self {
            error: error.to_string(),
            message: message.into(),
        }
    }
}

/// Error type shared by all JSON API handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication required to access this resource")]
    Unauthorized,
    #[error("{0}")]
    InvalidCredentials(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    /// The identity provider refused the presented credential.
    #[error("{0}")]
    Identity(String),
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = match &self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::InvalidCredentials(_) => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::Identity(_) => (StatusCode::UNAUTHORIZED, "IDENTITY_PROVIDER_ERROR"),
            ApiError::Database(_) | ApiError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Request failed: {}", self);
            "An unexpected error occurred while processing your request. Please try again later."
                .to_string()
        } else {
            self.to_string()
        };

        (status, Json(ErrorResponse::new(code, message))).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => ApiError::InvalidCredentials(err.to_string()),
            AuthError::InvalidToken => ApiError::Unauthorized,
            AuthError::GoogleLoginDisabled | AuthError::IdentityProvider(_) => {
                ApiError::Identity(err.to_string())
            }
            AuthError::Jwt(_) | AuthError::PasswordHash(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<TaskServiceError> for ApiError {
    fn from(err: TaskServiceError) -> Self {
        match err {
            TaskServiceError::TaskNotFound(_) => ApiError::NotFound("Task not found".to_string()),
            TaskServiceError::Validation(message) => ApiError::Validation(message),
            TaskServiceError::Database(db_err) => ApiError::Database(db_err),
        }
    }
}

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::DuplicateEmail(_) => ApiError::Conflict(err.to_string()),
            UserServiceError::UserNotFound(_) => ApiError::NotFound("User not found".to_string()),
            UserServiceError::InvalidCredentials => ApiError::InvalidCredentials(err.to_string()),
            UserServiceError::InvalidProfile(message) => ApiError::Validation(message),
            UserServiceError::Database(db_err) => ApiError::Database(db_err),
            UserServiceError::Auth(auth_err) => ApiError::from(auth_err),
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::auth::api::v1::google_login_handler,
        crate::auth::api::v1::login_handler,
        crate::auth::api::v1::refresh_handler,
        crate::auth::api::v1::logout_handler,
        crate::auth::api::v1::verify_handler,
        crate::user::api::v1::register_handler,
        crate::user::api::v1::get_me_handler,
        crate::user::api::v1::update_me_handler,
        crate::task::api::v1::list_tasks_handler,
        crate::task::api::v1::task_stats_handler,
        crate::task::api::v1::get_task_handler,
        crate::task::api::v1::create_task_handler,
        crate::task::api::v1::update_task_handler,
        crate::task::api::v1::delete_task_handler,
    ),
    components(schemas(ErrorResponse)),
    modifiers(&BearerSecurity),
    tags(
        (name = "Auth", description = "Session issuing and verification"),
        (name = "Users", description = "Account registration and profile"),
        (name = "Tasks", description = "Task management")
    )
)]
pub struct ApiDoc;

struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
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

/// Creates the API routes for JSON API endpoints, nested under `/api`.
pub fn create_api_router(auth_state: Arc<AuthApiState>, task_state: Arc<TaskState>) -> Router {
    let public_routes = auth::api::v1::create_api_router(auth_state.clone())
        .merge(crate::user::api::v1::create_registration_router(auth_state.clone()));

    let protected_routes = crate::task::api::v1::create_api_router(task_state)
        .merge(crate::user::api::v1::create_profile_router(auth_state.clone()))
        .route_layer(from_fn(auth::api::v1::require_auth_middleware));

    let api_routes = public_routes.merge(protected_routes);
    Router::new()
        .nest("/api", api_routes)
        .layer(ServiceBuilder::new().layer(from_fn_with_state(
            auth_state.auth.clone(),
            auth::api::v1::auth_user_middleware,
        )))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn response_parts(error: ApiError) -> (StatusCode, ErrorResponse) {
        let response = error.into_response();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn validation_message_is_passed_through() {
        let (status, body) =
            response_parts(ApiError::Validation("Title is required".to_string())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            ErrorResponse::new("VALIDATION_ERROR", "Title is required")
        );
    }

    #[tokio::test]
    async fn internal_errors_are_not_leaked() {
        let (status, body) =
            response_parts(ApiError::Internal("connection pool exhausted".to_string())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "INTERNAL_ERROR");
        assert!(!body.message.contains("pool"));
    }

    #[tokio::test]
    async fn missing_task_maps_to_not_found() {
        let err = ApiError::from(TaskServiceError::TaskNotFound(uuid::Uuid::nil().to_string()));
        let (status, body) = response_parts(err).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, ErrorResponse::new("NOT_FOUND", "Task not found"));
    }

    #[tokio::test]
    async fn invalid_token_maps_to_unauthorized() {
        let (status, body) = response_parts(ApiError::from(AuthError::InvalidToken)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.error, "UNAUTHORIZED");
    }

    #[test]
    fn openapi_document_lists_task_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/tasks"));
        assert!(doc.paths.paths.contains_key("/api/tasks/{id}"));
        assert!(doc.paths.paths.contains_key("/api/auth/refresh"));
    }
}
