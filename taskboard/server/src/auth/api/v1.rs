use crate::auth::{AuthState, CurrentUser, GoogleVerifier, TokenKind};
use crate::entities::user;
use crate::user::{UserService, UserServiceError};
use crate::web::api::{ApiError, ErrorResponse};
use axum::{
    Json, Router,
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::post,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use taskboard_core::{
    AuthResponse, Credentials, GoogleLogin, RefreshRequest, User, VerifyRequest, VerifyResponse,
};

/// Shared state for the authentication and account routes.
#[derive(Clone)]
pub struct AuthApiState {
    pub auth: Arc<AuthState>,
    pub db: Arc<DatabaseConnection>,
    pub google: Arc<dyn GoogleVerifier + Send + Sync>,
}

/// Issues a fresh token pair for the account and wraps it with the public user.
pub fn session_response(
    state: &AuthApiState,
    account: user::Model,
) -> Result<AuthResponse, ApiError> {
    let tokens = state.auth.issue_session(&CurrentUser::from(&account))?;
    Ok(AuthResponse {
        token: tokens.access_token,
        user: User::from(account),
        refresh_token: Some(tokens.refresh_token),
    })
}

fn account_gone_is_unauthorized(err: UserServiceError) -> ApiError {
    match err {
        UserServiceError::UserNotFound(_) => ApiError::Unauthorized,
        other => ApiError::from(other),
    }
}

/// Creates the `/auth` routes.
pub fn create_api_router(state: Arc<AuthApiState>) -> Router {
    Router::new()
        .route("/auth/google", post(google_login_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/refresh", post(refresh_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/auth/verify", post(verify_handler))
        .with_state(state)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// API authentication middleware that extracts the current user from Authorization Bearer header.
/// Sets the CurrentUser extension if a valid access token is found. Refresh tokens are ignored.
pub async fn auth_user_middleware(
    State(state): State<Arc<AuthState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = bearer_token(&headers) {
        match state.verify_token(token, TokenKind::Access) {
            Ok(current_user) => {
                request.extensions_mut().insert(current_user);
            }
            Err(err) => tracing::debug!("Ignoring bearer token: {}", err),
        }
    }

    next.run(request).await
}

/// Middleware that ensures the current user is authenticated.
/// Returns UNAUTHORIZED if the CurrentUser extension is not found in the request.
/// This middleware should be applied after auth_user_middleware.
pub async fn require_auth_middleware(request: Request, next: Next) -> Response {
    if request.extensions().get::<CurrentUser>().is_none() {
        return ApiError::Unauthorized.into_response();
    }

    next.run(request).await
}

/// Handler for POST /api/auth/google - Exchanges a Google ID token for a session.
#[tracing::instrument(skip(state, payload))]
#[utoipa::path(
    post,
    path = "/api/auth/google",
    request_body = GoogleLogin,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 401, description = "Google rejected the token", body = ErrorResponse)
    ),
    tag = "Auth"
)]
pub async fn google_login_handler(
    State(state): State<Arc<AuthApiState>>,
    Json(payload): Json<GoogleLogin>,
) -> Result<Json<AuthResponse>, ApiError> {
    let profile = state.google.verify(&payload.token).await?;
    let account = UserService::new(&state.db)
        .find_or_create_google_user(profile)
        .await?;
    Ok(Json(session_response(&state, account)?))
}

/// Handler for POST /api/auth/login - Signs in with email and password.
#[tracing::instrument(skip(state, payload))]
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = Credentials,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 401, description = "Invalid email or password", body = ErrorResponse)
    ),
    tag = "Auth"
)]
pub async fn login_handler(
    State(state): State<Arc<AuthApiState>>,
    Json(payload): Json<Credentials>,
) -> Result<Json<AuthResponse>, ApiError> {
    let account = UserService::new(&state.db)
        .authenticate(&payload.email, &payload.password)
        .await?;
    Ok(Json(session_response(&state, account)?))
}

/// Handler for POST /api/auth/refresh - Trades a refresh token for a new token pair.
#[tracing::instrument(skip(state, payload))]
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Session renewed", body = AuthResponse),
        (status = 401, description = "Refresh token invalid or expired", body = ErrorResponse)
    ),
    tag = "Auth"
)]
pub async fn refresh_handler(
    State(state): State<Arc<AuthApiState>>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let current_user = state
        .auth
        .verify_token(&payload.refresh_token, TokenKind::Refresh)?;
    let account = UserService::new(&state.db)
        .get_user_by_id(current_user.id)
        .await
        .map_err(account_gone_is_unauthorized)?;
    Ok(Json(session_response(&state, account)?))
}

/// Handler for POST /api/auth/logout. Tokens are stateless, so the client discards them.
#[tracing::instrument]
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses((status = 204, description = "Signed out")),
    tag = "Auth"
)]
pub async fn logout_handler() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// Handler for POST /api/auth/verify - Resolves an access token to its user.
#[tracing::instrument(skip(state, payload))]
#[utoipa::path(
    post,
    path = "/api/auth/verify",
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "Token is valid", body = VerifyResponse),
        (status = 401, description = "Token invalid or expired", body = ErrorResponse)
    ),
    tag = "Auth"
)]
pub async fn verify_handler(
    State(state): State<Arc<AuthApiState>>,
    Json(payload): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let current_user = state.auth.verify_token(&payload.token, TokenKind::Access)?;
    let account = UserService::new(&state.db)
        .get_user_by_id(current_user.id)
        .await
        .map_err(account_gone_is_unauthorized)?;
    Ok(Json(VerifyResponse {
        user: User::from(account),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn extracts_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));
    }
}
