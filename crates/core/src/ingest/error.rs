use crate::validate::ValidationErrors;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("authentication rejected")]
    Auth,
    #[error("backend returned {status}: {}", .message.as_deref().unwrap_or("no message"))]
    Server { status: u16, message: Option<String> },
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
}

impl FetchError {
    /// Only transient failures are worth another attempt.
    pub fn should_retry(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout => true,
            Self::Server { status, .. } => *status == 429 || (500..=599).contains(status),
            Self::Auth | Self::Malformed(_) | Self::Validation(_) => false,
        }
    }

    /// Short stable name, used as a structured log field and in JSON error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Timeout => "timeout",
            Self::Auth => "auth",
            Self::Server { .. } => "server",
            Self::Malformed(_) => "malformed",
            Self::Validation(_) => "validation",
        }
    }

    /// Text for the dismissable notice shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) => {
                "Network error. Please check your connection and try again.".to_string()
            }
            Self::Timeout => "Request timeout. Please try again.".to_string(),
            Self::Auth => "Authentication failed. Please log in again.".to_string(),
            Self::Server {
                message: Some(message),
                ..
            } if !message.trim().is_empty() => message.clone(),
            Self::Server { .. } => "Something went wrong on the server. Please try again later."
                .to_string(),
            Self::Malformed(_) => "Received unexpected data from the server.".to_string(),
            Self::Validation(errors) => errors.to_string(),
        }
    }
}

pub(crate) fn map_reqwest_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else if e.is_decode() {
        FetchError::Malformed(e.to_string())
    } else {
        FetchError::Network(e.to_string())
    }
}
