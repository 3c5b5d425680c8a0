use crate::auth::CurrentUser;
use crate::auth::api::v1::{AuthApiState, session_response};
use crate::user::UserService;
use crate::web::api::{ApiError, ErrorResponse};
use axum::{
    Extension, Router,
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use std::sync::Arc;
use taskboard_core::{AuthResponse, ProfileUpdate, Registration, User};

/// Handler for POST /api/users - Registers an account and starts a session.
#[tracing::instrument(skip(state, registration))]
#[utoipa::path(
    post,
    path = "/api/users",
    request_body = Registration,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Invalid registration", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse)
    ),
    tag = "Users"
)]
pub async fn register_handler(
    State(state): State<Arc<AuthApiState>>,
    Json(registration): Json<Registration>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let account = UserService::new(&state.db).register(registration).await?;
    let response = session_response(&state, account)?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Handler for GET /api/users/me
#[tracing::instrument(skip(state, current_user), fields(user_id = %current_user.id))]
#[utoipa::path(
    get,
    path = "/api/users/me",
    responses(
        (status = 200, description = "The signed-in user", body = User),
        (status = 401, description = "Missing or invalid access token", body = ErrorResponse),
        (status = 404, description = "Account no longer exists", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "Users"
)]
pub async fn get_me_handler(
    State(state): State<Arc<AuthApiState>>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Json<User>, ApiError> {
    let account = UserService::new(&state.db)
        .get_user_by_id(current_user.id)
        .await?;
    Ok(Json(User::from(account)))
}

/// Handler for PATCH /api/users/me - Updates the display name.
#[tracing::instrument(skip(state, current_user), fields(user_id = %current_user.id))]
#[utoipa::path(
    patch,
    path = "/api/users/me",
    request_body = ProfileUpdate,
    responses(
        (status = 200, description = "Profile updated", body = User),
        (status = 400, description = "Invalid profile", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "Users"
)]
pub async fn update_me_handler(
    State(state): State<Arc<AuthApiState>>,
    Extension(current_user): Extension<CurrentUser>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<User>, ApiError> {
    let account = UserService::new(&state.db)
        .update_name(current_user.id, &update.name)
        .await?;
    Ok(Json(User::from(account)))
}

/// Public registration route.
pub fn create_registration_router(state: Arc<AuthApiState>) -> Router {
    Router::new()
        .route("/users", post(register_handler))
        .with_state(state)
}

/// Profile routes for the signed-in user.
pub fn create_profile_router(state: Arc<AuthApiState>) -> Router {
    Router::new()
        .route("/users/me", get(get_me_handler).patch(update_me_handler))
        .with_state(state)
}
