pub mod notifications;
pub mod registrations;
pub mod schedule;

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use tracing::error;

use crate::state::AppState;

/// All endpoints, with state attached.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .merge(notifications::router())
        .merge(schedule::router())
        .merge(registrations::router())
        .with_state(state)
}

/// GET /healthz
async fn healthz() -> &'static str {
    "ok"
}

/// Standard API error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Convert anyhow errors to HTTP responses
pub struct AppError {
    status: StatusCode,
    error: anyhow::Error,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError {
            status: StatusCode::BAD_REQUEST,
            error: anyhow::anyhow!(message.into()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(error = %format!("{:#}", self.error), "Request failed");
        }
        let body = Json(ErrorResponse {
            error: self.error.to_string(),
        });
        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: err.into(),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use axum::body::Body;
    use axum::http::Request;
    use coursecal_core::testing::Fakes;

    use super::*;

    #[tokio::test]
    async fn healthz_says_ok() {
        let fakes = Fakes::default();
        let request = Request::get("/healthz").body(Body::empty()).unwrap();

        let (status, body) = send(app(&fakes), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let fakes = Fakes::default();
        let request = Request::get("/calendars").body(Body::empty()).unwrap();

        let (status, _) = send(app(&fakes), request).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
