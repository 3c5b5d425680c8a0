//! Core domain models shared by the taskboard server and client.
pub mod auth;
pub mod task;
pub mod user;

pub use auth::{
    AuthResponse, Credentials, GoogleLogin, RefreshRequest, Registration, VerifyRequest,
    VerifyResponse,
};
pub use task::{
    NewTask, ParseError, Priority, SortField, SortOrder, Task, TaskPatch, TaskQuery, TaskStats,
    TaskStatus,
};
pub use user::{ProfileUpdate, User};
