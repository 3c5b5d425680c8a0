//! Remote API seams used by the stores.

use async_trait::async_trait;
use mockall::automock;
use taskboard_core::{
    AuthResponse, Credentials, GoogleLogin, NewTask, ProfileUpdate, Registration, Task, TaskPatch,
    TaskQuery, TaskStats, User,
};

use crate::error::ApiError;

pub mod client;

pub use client::ApiClient;

#[automock]
#[async_trait]
pub trait TaskApi {
    async fn list_tasks(&self, query: &TaskQuery) -> Result<Vec<Task>, ApiError>;
    async fn get_task(&self, id: &str) -> Result<Task, ApiError>;
    async fn create_task(&self, task: &NewTask) -> Result<Task, ApiError>;
    async fn update_task(&self, id: &str, patch: &TaskPatch) -> Result<Task, ApiError>;
    async fn delete_task(&self, id: &str) -> Result<(), ApiError>;
    async fn task_stats(&self) -> Result<TaskStats, ApiError>;
}

#[automock]
#[async_trait]
pub trait AuthApi {
    async fn login_with_google(&self, credential: &GoogleLogin) -> Result<AuthResponse, ApiError>;
    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, ApiError>;
    async fn register(&self, registration: &Registration) -> Result<AuthResponse, ApiError>;
    /// Trades a refresh token for a new token pair.
    async fn refresh(&self, refresh_token: &str) -> Result<AuthResponse, ApiError>;
    async fn logout(&self) -> Result<(), ApiError>;
    /// Resolves a bearer token to the user it was issued for.
    async fn verify(&self, token: &str) -> Result<User, ApiError>;
}

#[automock]
#[async_trait]
pub trait UserApi {
    async fn current_user(&self) -> Result<User, ApiError>;
    async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, ApiError>;
}
