pub mod api;
pub mod config;
pub mod error;
pub mod session;
pub mod storage;
pub mod store;
pub mod ui;

pub use api::ApiClient;
pub use config::ClientConfig;
pub use error::ApiError;
