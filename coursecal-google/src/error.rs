//! Error types for the Google clients.

use coursecal_core::CourseCalError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GoogleError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} API returned {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("Token refresh failed: {0}")]
    Auth(String),

    #[error("Could not decode {service} response: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },

    #[error("Credentials error: {0}")]
    Credentials(String),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl From<GoogleError> for CourseCalError {
    fn from(err: GoogleError) -> Self {
        match err {
            GoogleError::Status {
                service,
                status,
                body,
            } => CourseCalError::Api {
                service,
                status: Some(status),
                message: body,
            },
            GoogleError::Decode { service, message } => CourseCalError::Api {
                service,
                status: None,
                message,
            },
            GoogleError::Http(e) => CourseCalError::Api {
                service: "google",
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            },
            GoogleError::Auth(message) => CourseCalError::Api {
                service: "oauth",
                status: None,
                message,
            },
            GoogleError::Credentials(message) => CourseCalError::Config(message),
            GoogleError::Url(e) => CourseCalError::Config(format!("Invalid API URL: {}", e)),
        }
    }
}

pub type GoogleResult<T> = Result<T, GoogleError>;
