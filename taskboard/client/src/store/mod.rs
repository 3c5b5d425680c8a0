//! Client-side state containers.
pub mod auth;
pub mod tasks;

pub use auth::{AuthState, AuthStore};
pub use tasks::{TaskPreferences, TaskState, TaskStore};
