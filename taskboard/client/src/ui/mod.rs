//! Text rendering and input validation for the command line.
pub mod dashboard;
pub mod forms;
pub mod views;

pub use dashboard::Dashboard;
pub use forms::{FormError, TaskEditForm, TaskForm};

/// Shown when the session is gone and the user has to sign in again.
pub const LOGIN_HINT: &str = "You are not logged in. Run `taskboard login` to sign in.";
