use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use taskboard_core::{
    AuthResponse, Credentials, GoogleLogin, NewTask, ProfileUpdate, RefreshRequest, Registration,
    Task, TaskPatch, TaskQuery, TaskStats, User, VerifyRequest, VerifyResponse,
};

use super::{AuthApi, TaskApi, UserApi};
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::store::AuthStore;

/// HTTP client for the taskboard API.
///
/// Every request carries the stored bearer token. A 401 on a regular request triggers one
/// token refresh and one replay of that request. When the refresh fails the session is
/// expired and the caller gets [`ApiError::SessionExpired`].
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    auth: AuthStore,
}

impl ApiClient {
    pub fn new(config: &ClientConfig, auth: AuthStore) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    pub fn auth(&self) -> &AuthStore {
        &self.auth
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn error_from(response: Response) -> ApiError {
        let status = response.status();
        let body = response.bytes().await.unwrap_or_default();
        ApiError::from_status(status, &body)
    }

    /// Sends a request built by `build`, renewing the session at most once on a 401
    /// when `refreshable` is set.
    async fn execute<F>(
        &self,
        method: Method,
        path: &str,
        refreshable: bool,
        build: F,
    ) -> Result<Response, ApiError>
    where
        F: Fn(RequestBuilder) -> RequestBuilder,
    {
        let mut retried = false;
        loop {
            let mut request = build(self.http.request(method.clone(), self.url(path)));
            if let Some(token) = self.auth.access_token() {
                request = request.bearer_auth(token);
            }

            let response = request.send().await?;
            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }
            if status == StatusCode::UNAUTHORIZED && refreshable && !retried {
                tracing::debug!("{} {} returned 401, renewing session", method, path);
                retried = true;
                self.refresh_session().await?;
                continue;
            }
            return Err(Self::error_from(response).await);
        }
    }

    async fn send_json<T, F>(
        &self,
        method: Method,
        path: &str,
        refreshable: bool,
        build: F,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        F: Fn(RequestBuilder) -> RequestBuilder,
    {
        let response = self.execute(method, path, refreshable, build).await?;
        Ok(response.json::<T>().await?)
    }

    async fn post_refresh(&self, refresh_token: &str) -> Result<AuthResponse, ApiError> {
        let body = RefreshRequest {
            refresh_token: refresh_token.to_string(),
        };
        let response = self
            .http
            .post(self.url("/api/auth/refresh"))
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        Ok(response.json::<AuthResponse>().await?)
    }

    /// Trades the stored refresh token for a new session.
    async fn refresh_session(&self) -> Result<(), ApiError> {
        let Some(refresh_token) = self.auth.refresh_token() else {
            self.auth.expire_session();
            return Err(ApiError::SessionExpired);
        };

        match self.post_refresh(&refresh_token).await {
            Ok(response) => {
                self.auth.apply_session(&response);
                Ok(())
            }
            Err(err) => {
                tracing::warn!("Session refresh failed: {}", err);
                self.auth.expire_session();
                Err(ApiError::SessionExpired)
            }
        }
    }
}

#[async_trait]
impl TaskApi for ApiClient {
    #[tracing::instrument(skip(self))]
    async fn list_tasks(&self, query: &TaskQuery) -> Result<Vec<Task>, ApiError> {
        let pairs = query.to_query_pairs();
        self.send_json(Method::GET, "/api/tasks", true, |request| {
            request.query(&pairs)
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn get_task(&self, id: &str) -> Result<Task, ApiError> {
        let path = format!("/api/tasks/{}", id);
        self.send_json(Method::GET, &path, true, |request| request)
            .await
    }

    #[tracing::instrument(skip(self, task), fields(title = %task.title))]
    async fn create_task(&self, task: &NewTask) -> Result<Task, ApiError> {
        self.send_json(Method::POST, "/api/tasks", true, |request| {
            request.json(task)
        })
        .await
    }

    #[tracing::instrument(skip(self, patch))]
    async fn update_task(&self, id: &str, patch: &TaskPatch) -> Result<Task, ApiError> {
        let path = format!("/api/tasks/{}", id);
        self.send_json(Method::PUT, &path, true, |request| request.json(patch))
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn delete_task(&self, id: &str) -> Result<(), ApiError> {
        let path = format!("/api/tasks/{}", id);
        self.execute(Method::DELETE, &path, true, |request| request)
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn task_stats(&self) -> Result<TaskStats, ApiError> {
        self.send_json(Method::GET, "/api/tasks/stats", true, |request| request)
            .await
    }
}

#[async_trait]
impl AuthApi for ApiClient {
    #[tracing::instrument(skip_all)]
    async fn login_with_google(&self, credential: &GoogleLogin) -> Result<AuthResponse, ApiError> {
        self.send_json(Method::POST, "/api/auth/google", false, |request| {
            request.json(credential)
        })
        .await
    }

    #[tracing::instrument(skip_all, fields(email = %credentials.email))]
    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, ApiError> {
        self.send_json(Method::POST, "/api/auth/login", false, |request| {
            request.json(credentials)
        })
        .await
    }

    #[tracing::instrument(skip_all, fields(email = %registration.email))]
    async fn register(&self, registration: &Registration) -> Result<AuthResponse, ApiError> {
        self.send_json(Method::POST, "/api/users", false, |request| {
            request.json(registration)
        })
        .await
    }

    #[tracing::instrument(skip_all)]
    async fn refresh(&self, refresh_token: &str) -> Result<AuthResponse, ApiError> {
        self.post_refresh(refresh_token).await
    }

    #[tracing::instrument(skip(self))]
    async fn logout(&self) -> Result<(), ApiError> {
        self.execute(Method::POST, "/api/auth/logout", false, |request| request)
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip_all)]
    async fn verify(&self, token: &str) -> Result<User, ApiError> {
        let body = VerifyRequest {
            token: token.to_string(),
        };
        let response: VerifyResponse = self
            .send_json(Method::POST, "/api/auth/verify", false, |request| {
                request.json(&body)
            })
            .await?;
        Ok(response.user)
    }
}

#[async_trait]
impl UserApi for ApiClient {
    #[tracing::instrument(skip(self))]
    async fn current_user(&self) -> Result<User, ApiError> {
        self.send_json(Method::GET, "/api/users/me", true, |request| request)
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, ApiError> {
        self.send_json(Method::PATCH, "/api/users/me", true, |request| {
            request.json(update)
        })
        .await
    }
}
