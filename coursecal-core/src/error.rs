//! Error types for coursecal.

use thiserror::Error;

/// Errors that can occur in coursecal operations.
#[derive(Error, Debug)]
pub enum CourseCalError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid event {id}: {reason}")]
    InvalidEvent { id: String, reason: String },

    #[error("History error: {0}")]
    History(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("{service} API error: {message}")]
    Api {
        service: &'static str,
        status: Option<u16>,
        message: String,
    },

    #[error("Registration error: {0}")]
    Registration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CourseCalError {
    pub fn api(service: &'static str, message: impl Into<String>) -> Self {
        CourseCalError::Api {
            service,
            status: None,
            message: message.into(),
        }
    }
}

/// Result type alias for coursecal operations.
pub type CourseCalResult<T> = Result<T, CourseCalError>;
