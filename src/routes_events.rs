// --------------------------------------------------
// Hooks for the host to report disruptions
// (e.g. a systemd unit after resume, or an NTP step).
// Both trigger a reconciliation of the alarm.
// --------------------------------------------------

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::events::SystemEvent;
use crate::routes_alarm::AppState;

fn forward(state: &AppState, event: SystemEvent) -> Response {
    match state.events.send(event) {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(_) => {
            warn!(?event, "Event loop stopped, dropping event");
            (StatusCode::SERVICE_UNAVAILABLE, "event loop stopped").into_response()
        }
    }
}

// -----------------------------
// POST /api/events/boot
// -----------------------------
pub async fn post_boot(State(state): State<AppState>) -> impl IntoResponse {
    forward(&state, SystemEvent::Boot)
}

// -----------------------------
// POST /api/events/clock-changed
// -----------------------------
pub async fn post_clock_changed(State(state): State<AppState>) -> impl IntoResponse {
    forward(&state, SystemEvent::ClockChanged)
}
