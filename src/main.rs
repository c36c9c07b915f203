// Define data modules
mod models; // AlarmInfo value type
mod store; // Persistent storage (load/save alarm.json)
mod logic; // Alarm time arithmetic
mod cache; // Observable in-process copy of the alarm
mod service; // Single-writer mutations (set time, arm, disarm)
mod reconcile; // Re-arm / fire after boot or clock change
mod fire; // What happens when the alarm goes off
mod events; // System events, event loop, clock-jump watch
mod timer; // One-slot deferred trigger
mod audio; // Audio interrupt requests
mod clock; // Wall-clock source
mod config; // DRIFT_OFF_* environment settings
mod error; // Error types
mod routes_alarm; // HTTP handlers for the alarm API
mod routes_events; // HTTP hooks for boot / clock-change events

#[cfg(test)]
mod testing;

use std::sync::Arc;

// Import axum routing utilities and Router
use axum::{
    routing::{get, post, put}, // HTTP method helpers
    Router, // Main router type
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::audio::{AudioInterrupt, CommandAudioInterrupt, LogAudioInterrupt};
use crate::cache::InfoCache;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::events::{ClockWatch, SystemEvent};
use crate::fire::FireHandler;
use crate::routes_alarm::AppState;
use crate::service::{MutationService, Mutator};
use crate::store::{JsonFileStorage, Storage};
use crate::timer::{AlarmTimer, TokioAlarmTimer};

fn app(state: AppState) -> Router {
    let api = Router::new()
        // alarm
        .route("/alarm", get(routes_alarm::get_alarm))
        .route("/alarm/stream", get(routes_alarm::stream_alarm))
        .route("/alarm/time", put(routes_alarm::put_time))
        .route("/alarm/arm", post(routes_alarm::arm))
        .route("/alarm/disarm", post(routes_alarm::disarm))
        // host events
        .route("/events/boot", post(routes_events::post_boot))
        .route("/events/clock-changed", post(routes_events::post_clock_changed))
        .with_state(state);

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    info!(?config, "Starting drift-off");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let file_storage = JsonFileStorage::new(&config.data_path);
    info!(path = %file_storage.path().display(), "Alarm storage");
    let storage: Arc<dyn Storage> = Arc::new(file_storage);
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let timer: Arc<dyn AlarmTimer> =
        Arc::new(TokioAlarmTimer::new(clock.clone(), events_tx.clone()));
    let audio: Arc<dyn AudioInterrupt> = match config
        .interrupt_command
        .as_deref()
        .and_then(CommandAudioInterrupt::from_command_line)
    {
        Some(command) => {
            info!(program = command.program(), args = ?command.args(), "Audio interrupt command");
            Arc::new(command)
        }
        None => Arc::new(LogAudioInterrupt),
    };

    let cache = InfoCache::new(storage.clone());
    let (mutations, _writer) = MutationService::spawn(Mutator::new(
        cache.clone(),
        storage,
        timer,
        clock.clone(),
        audio.clone(),
    ));
    let fire = Arc::new(FireHandler::new(audio, mutations.clone()));

    let running = CancellationToken::new();
    let event_loop = tokio::spawn(events::run(
        events_rx,
        mutations.clone(),
        fire,
        running.clone(),
    ));
    tokio::spawn(
        ClockWatch::new(
            clock.clone(),
            config.clock_check_interval,
            config.clock_drift_threshold,
            events_tx.clone(),
        )
        .run(running.clone()),
    );

    // In-process timers do not outlive the process, so every start is a boot.
    events_tx.send(SystemEvent::Boot)?;

    let app = app(AppState {
        cache,
        mutations,
        events: events_tx,
        clock,
    });

    let listener = tokio::net::TcpListener::bind(config.addr).await?;

    // Print the link to the server
    info!("Server running at http://{}", config.addr);
    info!("API base:     http://{}/api", config.addr);

    let shutdown = running.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for ctrl-c");
            }
            shutdown.cancel();
        })
        .await?;

    running.cancel();
    event_loop.await?;
    info!("drift-off stopped");
    Ok(())
}
