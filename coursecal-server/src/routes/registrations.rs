//! Mailbox push notifications (Pub/Sub push subscription)

use axum::{Json, Router, body::Bytes, extract::State, routing::post};
use coursecal_core::registration::{PushEnvelope, RegistrationOutcome};
use serde::Serialize;
use tracing::{error, info};

use crate::routes::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/registrations", post(mailbox_notification))
}

#[derive(Debug, PartialEq, Serialize)]
pub struct RegistrationResponse {
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl From<RegistrationOutcome> for RegistrationResponse {
    fn from(outcome: RegistrationOutcome) -> Self {
        match outcome {
            RegistrationOutcome::Ignored(reason) => RegistrationResponse {
                outcome: "ignored",
                tag: None,
                detail: Some(reason),
            },
            RegistrationOutcome::Accepted { tag, .. } => RegistrationResponse {
                outcome: "accepted",
                tag: Some(tag.to_string()),
                detail: None,
            },
            RegistrationOutcome::Denied { tag, .. } => RegistrationResponse {
                outcome: "denied",
                tag: Some(tag.to_string()),
                detail: None,
            },
        }
    }
}

/// POST /registrations - New mail in the watched mailbox
///
/// Once the envelope decodes the message is acknowledged with 200 even when
/// processing fails, otherwise Pub/Sub keeps redelivering it.
async fn mailbox_notification(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<RegistrationResponse>, AppError> {
    let notification = PushEnvelope::from_slice(&body)
        .and_then(|envelope| envelope.notification())
        .map_err(|e| AppError::bad_request(e.to_string()))?;

    let response = match state.registrations.process(&notification.history_id).await {
        Ok(outcome) => {
            info!(history_id = %notification.history_id, ?outcome, "Registration handled");
            outcome.into()
        }
        Err(e) => {
            error!(history_id = %notification.history_id, error = %e, "Registration failed");
            RegistrationResponse {
                outcome: "failed",
                tag: None,
                detail: Some(e.to_string()),
            }
        }
    };

    Ok(Json(response))
}
