// --------------------------------------------------
// Handles API endpoints for the alarm itself.
//
// Responsibilities:
// - Read the current alarm (with time-left figures)
// - Stream every alarm change as server-sent events
// - Set the time setpoint
// - Arm / disarm
// --------------------------------------------------

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    Json,
};
use chrono::{DateTime, FixedOffset};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::error;

use crate::cache::InfoCache;
use crate::clock::Clock;
use crate::error::ServiceError;
use crate::events::SystemEvent;
use crate::models::AlarmInfo;
use crate::service::MutationService;

#[derive(Clone)]
pub struct AppState {
    pub cache: InfoCache,
    pub mutations: MutationService,
    pub events: mpsc::UnboundedSender<SystemEvent>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Debug, Serialize)]
pub struct AlarmView {
    pub alarm: i64,              // epoch millis, 0 = off
    pub time_hour: u32,
    pub time_minute: u32,
    pub time: String,            // "HH:MM"
    pub active: bool,
    pub hours_till_alarm: i64,   // rounded up
    pub minutes_till_alarm: i64, // rounded up
}

impl AlarmView {
    pub fn new(info: &AlarmInfo, now: DateTime<FixedOffset>) -> Self {
        Self {
            alarm: info.alarm(),
            time_hour: info.time_hour(),
            time_minute: info.time_minute(),
            time: info.setpoint_label(),
            active: info.is_active(now),
            hours_till_alarm: info.hours_till_alarm(now),
            minutes_till_alarm: info.minutes_till_alarm(now),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SetTimeInput {
    pub hour: u32,   // 0..=23
    pub minute: u32, // 0..=59
}

fn accepted(result: Result<(), ServiceError>) -> Response {
    match result {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(ServiceError::InvalidSetpoint(e)) => {
            (StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
        Err(ServiceError::Closed) => {
            (StatusCode::SERVICE_UNAVAILABLE, "scheduler stopped").into_response()
        }
    }
}

// -----------------------------
// GET /api/alarm
// Returns the current alarm and time left
// -----------------------------
pub async fn get_alarm(State(state): State<AppState>) -> impl IntoResponse {
    let info = match state.cache.current() {
        Ok(info) => info,
        Err(e) => {
            error!(error = %e, "Failed to load alarm info");
            return (StatusCode::INTERNAL_SERVER_ERROR, "failed to load alarm").into_response();
        }
    };

    Json(AlarmView::new(&info, state.clock.now())).into_response()
}

// -----------------------------
// GET /api/alarm/stream
// Server-sent events: the current alarm, then every change
// -----------------------------
pub async fn stream_alarm(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let clock = state.clock.clone();
    let stream = state.cache.observe().into_stream().map(move |info| {
        let view = AlarmView::new(&info, clock.now());
        let event = Event::default()
            .event("alarm")
            .json_data(&view)
            .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()));
        Ok(event)
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

// -----------------------------
// PUT /api/alarm/time
// Updates the time setpoint
// -----------------------------
pub async fn put_time(
    State(state): State<AppState>,
    Json(input): Json<SetTimeInput>,
) -> impl IntoResponse {
    accepted(state.mutations.set_time(input.hour, input.minute))
}

// -----------------------------
// POST /api/alarm/arm
// Arms the alarm for the next occurrence of the setpoint
// -----------------------------
pub async fn arm(State(state): State<AppState>) -> impl IntoResponse {
    accepted(state.mutations.arm())
}

// -----------------------------
// POST /api/alarm/disarm
// Cancels any pending alarm
// -----------------------------
pub async fn disarm(State(state): State<AppState>) -> impl IntoResponse {
    accepted(state.mutations.disarm())
}
