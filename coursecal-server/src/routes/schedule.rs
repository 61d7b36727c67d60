//! On-demand schedule mails

use axum::{Json, Router, body::Bytes, extract::State, routing::post};
use chrono::Utc;
use coursecal_core::Tag;
use coursecal_core::date_range::DayRange;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::routes::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/schedule", post(send_schedule))
}

/// Request body for a schedule run. Every field is optional, and so is the
/// body itself.
#[derive(Debug, Default, Deserialize)]
pub struct ScheduleRequest {
    pub tag: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Serialize)]
pub struct ScheduleResponse {
    pub sent: usize,
}

impl ScheduleRequest {
    fn parse(body: &[u8]) -> Result<Self, AppError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(ScheduleRequest::default());
        }
        serde_json::from_slice(body).map_err(|e| AppError::bad_request(format!("Invalid request body: {}", e)))
    }

    /// The day filter, only when both ends are given.
    fn days(&self) -> Result<Option<DayRange>, AppError> {
        match (self.start_date.as_deref(), self.end_date.as_deref()) {
            (Some(first), Some(last)) => DayRange::from_args(first, last)
                .map(Some)
                .map_err(AppError::bad_request),
            (None, None) => Ok(None),
            _ => {
                debug!("Only one end of the range given, sending the whole schedule");
                Ok(None)
            }
        }
    }
}

/// POST /schedule - Mail the upcoming schedule to participants
async fn send_schedule(State(state): State<AppState>, body: Bytes) -> Result<Json<ScheduleResponse>, AppError> {
    let request = ScheduleRequest::parse(&body)?;
    let days = request.days()?;
    let tag = request.tag.as_deref().map(str::trim).filter(|t| !t.is_empty()).map(Tag::new);

    let sent = state.sync.send_schedule(tag.as_ref(), days, Utc::now()).await?;
    Ok(Json(ScheduleResponse { sent }))
}
