//! Axum-based HTTP API
//!
//! Read side: latest status, session statistics, configuration and its JSON
//! schema, and a server-sent event stream of statuses and alerts. Write side:
//! mode and command changes, which only ever touch the [`CommandBus`]; the
//! controller picks them up at the start of its next cycle.

use crate::commands::{CommandBus, ControlCommand};
use crate::config::Config;
use crate::controller::{ChargeStatus, ControllerState};
use crate::controls::ChargeMode;
use crate::error::HeliosError;
use crate::ports::ChannelPublisher;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::StreamExt;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

#[derive(Clone)]
pub struct AppState {
    pub bus: CommandBus,
    pub publisher: ChannelPublisher,
    pub status: watch::Receiver<Option<Arc<ChargeStatus>>>,
    pub controller_state: watch::Receiver<ControllerState>,
    pub sessions: watch::Receiver<serde_json::Value>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        bus: CommandBus,
        publisher: ChannelPublisher,
        controller_state: watch::Receiver<ControllerState>,
        sessions: watch::Receiver<serde_json::Value>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            status: publisher.latest(),
            bus,
            publisher,
            controller_state,
            sessions,
            config,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ModeBody {
    pub mode: String,
}

fn bad_request(err: &HeliosError) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({"error": err.to_string(), "kind": err.kind()})),
    )
        .into_response()
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let controller_state = *state.controller_state.borrow();
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("APP_VERSION"),
        "controller_state": controller_state.as_str(),
    }))
}

async fn status(State(state): State<AppState>) -> Response {
    let latest = state.status.borrow().clone();
    match latest {
        Some(status) => Json(status.as_ref().clone()).into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"error": "no control cycle completed yet"})),
        )
            .into_response(),
    }
}

async fn set_mode(State(state): State<AppState>, Json(body): Json<ModeBody>) -> Response {
    let mode = match body.mode.parse::<ChargeMode>() {
        Ok(mode) => mode,
        Err(e) => return bad_request(&e),
    };
    state
        .bus
        .apply(ControlCommand::SetMode(mode.as_str().to_string()));
    (
        StatusCode::OK,
        Json(serde_json::json!({"ok": true, "mode": mode})),
    )
        .into_response()
}

/// Reject commands the controller would only fail on later
fn validate_command(command: &ControlCommand) -> Result<(), HeliosError> {
    match command {
        ControlCommand::SetMode(mode) => mode.parse::<ChargeMode>().map(|_| ()),
        ControlCommand::SetTargetEnergy(Some(kwh)) if !(kwh.is_finite() && *kwh >= 0.0) => Err(
            HeliosError::invalid_config("target_energy_kwh", "must be a non-negative number"),
        ),
        ControlCommand::SetTargetSoc(Some(pct)) if !(0.0..=100.0).contains(pct) => Err(
            HeliosError::invalid_config("target_soc_pct", "must be between 0 and 100"),
        ),
        _ => Ok(()),
    }
}

async fn command(
    State(state): State<AppState>,
    Json(command): Json<ControlCommand>,
) -> Response {
    if let Err(e) = validate_command(&command) {
        return bad_request(&e);
    }
    let command = match command {
        ControlCommand::SetMode(mode) => ControlCommand::SetMode(
            mode.parse::<ChargeMode>()
                .map_or(mode, |m| m.as_str().to_string()),
        ),
        other => other,
    };
    state.bus.apply(command);
    (
        StatusCode::OK,
        Json(serde_json::json!({"ok": true, "inputs": state.bus.current()})),
    )
        .into_response()
}

async fn session(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.sessions.borrow().clone())
}

async fn get_config(State(state): State<AppState>) -> impl IntoResponse {
    Json(
        serde_json::to_value(state.config.as_ref())
            .unwrap_or(serde_json::json!({"error": "serialization"})),
    )
}

async fn get_config_schema() -> impl IntoResponse {
    let schema = schemars::schema_for!(Config);
    Json(serde_json::to_value(&schema).unwrap_or(serde_json::json!({"error": "schema"})))
}

async fn events(State(state): State<AppState>) -> impl IntoResponse {
    let rx = state.publisher.subscribe();
    let stream = tokio_stream::wrappers::BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(event) => Some(Ok::<Event, std::convert::Infallible>(
            Event::default().event(event.event_name()).data(event.to_json()),
        )),
        // Lagged subscribers skip ahead
        Err(_) => None,
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/status", get(status))
        .route("/api/mode", post(set_mode))
        .route("/api/command", post(command))
        .route("/api/session", get(session))
        .route("/api/config", get(get_config))
        .route("/api/config/schema", get(get_config_schema))
        .route("/api/events", get(events))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let router = build_router(state);
    let logger = crate::logging::get_logger("web");

    let addr = match host.parse::<IpAddr>() {
        Ok(ip) => SocketAddr::new(ip, port),
        Err(_) => {
            logger.warn(&format!("Invalid host '{}'; falling back to 127.0.0.1", host));
            ([127, 0, 0, 1], port).into()
        }
    };

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    logger.info(&format!(
        "API listening at http://{}:{}/api",
        local_addr.ip(),
        local_addr.port()
    ));

    axum::serve(listener, router).await?;
    Ok(())
}
