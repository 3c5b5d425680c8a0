use reqwest::StatusCode;
use serde::Deserialize;

pub const UNEXPECTED_ERROR: &str = "An unexpected error occurred";
const UNREACHABLE: &str = "Unable to reach the server. Check your connection and try again.";
const TIMED_OUT: &str = "The server took too long to respond. Please try again.";

/// Failure of a remote call, normalised into something the user can read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The server could not be reached or did not answer in time.
    #[error("{0}")]
    Transport(String),
    #[error("{0}")]
    Unauthorized(String),
    /// The session could not be renewed and the user has to log in again.
    #[error("Your session has expired. Please log in again.")]
    SessionExpired,
    #[error("{message}")]
    Validation { status: u16, message: String },
    #[error("{0}")]
    NotFound(String),
    #[error("{message}")]
    Server { status: u16, message: String },
    /// The server answered with a body that could not be understood.
    #[error("Unexpected response from server: {0}")]
    Decode(String),
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl ApiError {
    /// Builds the error for a non-success response.
    ///
    /// The message is the server's `message` field, else the status reason phrase,
    /// else a generic text.
    pub fn from_status(status: StatusCode, body: &[u8]) -> Self {
        let message = serde_json::from_slice::<ErrorBody>(body)
            .ok()
            .and_then(|body| body.message)
            .filter(|message| !message.trim().is_empty())
            .or_else(|| status.canonical_reason().map(str::to_string))
            .unwrap_or_else(|| UNEXPECTED_ERROR.to_string());

        match status {
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized(message),
            StatusCode::NOT_FOUND => ApiError::NotFound(message),
            status if status.is_client_error() => ApiError::Validation {
                status: status.as_u16(),
                message,
            },
            status => ApiError::Server {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// Requires re-authentication before retrying makes sense.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_) | ApiError::SessionExpired)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else if err.is_timeout() {
            ApiError::Transport(TIMED_OUT.to_string())
        } else {
            tracing::debug!("Transport failure: {}", err);
            ApiError::Transport(UNREACHABLE.to_string())
        }
    }
}
