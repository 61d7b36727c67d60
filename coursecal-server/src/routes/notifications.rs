//! Calendar push notifications

use axum::{Json, Router, extract::State, http::HeaderMap, routing::post};
use chrono::Utc;
use coursecal_core::sync::SyncReport;
use serde::Serialize;
use tracing::{debug, info};

use crate::routes::AppError;
use crate::state::AppState;

const RESOURCE_STATE_HEADER: &str = "x-goog-resource-state";

pub fn router() -> Router<AppState> {
    Router::new().route("/notifications", post(calendar_notification))
}

#[derive(Serialize)]
pub struct NotificationResponse {
    pub state: String,
    pub reports: Vec<SyncReport>,
}

/// POST /notifications - A watched calendar changed
///
/// Only `exists` carries a change. The `sync` handshake sent when a channel
/// is opened, and anything else, is acknowledged without work.
async fn calendar_notification(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<NotificationResponse>, AppError> {
    let resource_state = headers
        .get(RESOURCE_STATE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    if resource_state != "exists" {
        debug!(state = %resource_state, "Acknowledging notification");
        return Ok(Json(NotificationResponse {
            state: resource_state,
            reports: Vec::new(),
        }));
    }

    let reports = state.sync.handle_calendar_change(Utc::now()).await?;
    info!(scopes = reports.len(), "Calendar change handled");

    Ok(Json(NotificationResponse {
        state: resource_state,
        reports,
    }))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use coursecal_core::testing::Fakes;

    use crate::routes::test_support::*;

    fn notification(state: &str) -> Request<Body> {
        Request::post("/notifications")
            .header("X-Goog-Resource-State", state)
            .header("X-Goog-Channel-ID", "chan-1")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn sync_handshake_is_acknowledged_without_work() {
        let fakes = Fakes::default();
        fakes.calendar.set_events(ADMIN, vec![event_in("a", "[Salsa1] Montag", 2)]);

        let (status, body) = send(app(&fakes), notification("sync")).await;

        assert_eq!(status, StatusCode::OK);
        let body: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["state"], "sync");
        assert!(!fakes.blobs.contains("history", "events_history.json"));
    }

    #[tokio::test]
    async fn exists_runs_compare_and_notify() {
        let fakes = Fakes::default();
        roster(&fakes, "Salsa1");
        let app = app(&fakes);

        fakes.calendar.set_events(
            ADMIN,
            vec![event_in("a", "[Salsa1] Montag", 2), event_in("b", "[Salsa1] Mittwoch", 4)],
        );
        let (status, body) = send(app.clone(), notification("exists")).await;
        assert_eq!(status, StatusCode::OK);
        let body: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["reports"][0]["scope"], "Admin");
        assert_eq!(body["reports"][0]["created"], 2);

        fakes.calendar.set_events(ADMIN, vec![event_in("a", "[Salsa1] Montag", 2)]);
        let (_, body) = send(app, notification("exists")).await;
        let body: serde_json::Value = serde_json::from_str(&body).unwrap();

        assert_eq!(body["reports"][0]["deleted"], 1);
        assert_eq!(fakes.mail.sent().len(), 1);
        assert!(fakes.mail.sent()[0].body.contains("Mittwoch"));
    }

    #[tokio::test]
    async fn corrupt_history_is_a_server_error() {
        let fakes = Fakes::default();
        fakes
            .blobs
            .insert("history", "events_history.json", b"not json".to_vec());

        let (status, body) = send(app(&fakes), notification("exists")).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("events_history.json"));
    }
}
