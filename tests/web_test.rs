use axum::body::Body;
use axum::http::{Request, StatusCode};
use helios::commands::{CommandBus, ControlInputs};
use helios::config::Config;
use helios::controller::{ChargeStatus, ControllerState};
use helios::ports::{ChannelPublisher, StatusPublisher};
use helios::web::{AppState, build_router};
use http_body_util::BodyExt as _;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tower::ServiceExt;

fn test_state() -> (AppState, CommandBus, ChannelPublisher) {
    let (bus, _rx) = CommandBus::new(ControlInputs::default());
    let publisher = ChannelPublisher::new(8);
    let (_state_tx, state_rx) = watch::channel(ControllerState::Running);
    let (_sessions_tx, sessions_rx) =
        watch::channel(serde_json::json!({"session_active": false}));
    let state = AppState::new(
        bus.clone(),
        publisher.clone(),
        state_rx,
        sessions_rx,
        Arc::new(Config::default()),
    );
    (state, bus, publisher)
}

fn sample_status() -> ChargeStatus {
    ChargeStatus {
        timestamp: chrono::Utc::now(),
        target_power_w: 3000.0,
        actual_power_w: 2950.0,
        mode: Some(helios::controls::ChargeMode::PvSurplus),
        raw_mode: "pv_surplus".to_string(),
        session_energy_delivered_kwh: 1.25,
        surplus_w: 3000.0,
        assist_w: 0.0,
        reasoning: helios::decision::Reasoning::new(),
        summary: String::new(),
        controller_state: ControllerState::Running,
        plug: helios::snapshot::PlugState::Charging,
        session_phase: helios::session::SessionPhase::Charging,
        session_id: Some("abc".to_string()),
        target_energy_kwh: 20.0,
        departure_deadline: None,
        full_by_morning: false,
        deadline_unreachable: false,
        solar_energy_kwh: 1.25,
        grid_energy_kwh: 0.0,
        session_cost: 0.1,
        currency: "€".to_string(),
        battery_soc_pct: Some(55.0),
        ev_soc_pct: None,
        stale_fields: vec![],
        consecutive_read_failures: 0,
        actuator_ok: true,
        safe_mode: false,
        total_cycles: 1,
        overrun_count: 0,
        last_cycle_duration_ms: Some(3),
        control_interval_s: 30,
    }
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn health_reports_controller_state() {
    let (state, _, _) = test_state();
    let response = build_router(state).oneshot(get("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["controller_state"], "running");
    let version = json["version"].as_str().unwrap();
    assert_eq!(version, env!("APP_VERSION"));
    assert!(version.starts_with(env!("CARGO_PKG_VERSION")));
}

#[tokio::test]
async fn status_unavailable_until_first_cycle() {
    let (state, _, mut publisher) = test_state();
    let router = build_router(state);
    let response = router.clone().oneshot(get("/api/status")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    publisher.publish_status(&sample_status()).await.unwrap();
    let response = router.oneshot(get("/api/status")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["target_power_w"], 3000.0);
    assert_eq!(json["mode"], "pv_surplus");
}

#[tokio::test]
async fn set_mode_validates_and_normalizes() {
    let (state, bus, _) = test_state();
    let router = build_router(state);

    let response = router
        .clone()
        .oneshot(post_json("/api/mode", serde_json::json!({"mode": "Turbo"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["kind"], "invalid_mode");
    assert_eq!(bus.current().mode, "pv_surplus");

    let response = router
        .oneshot(post_json("/api/mode", serde_json::json!({"mode": "SMART"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(bus.current().mode, "smart");
}

#[tokio::test]
async fn commands_update_inputs() {
    let (state, bus, _) = test_state();
    let router = build_router(state);

    let response = router
        .clone()
        .oneshot(post_json(
            "/api/command",
            serde_json::json!({"command": "set_full_by_morning", "value": true}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(bus.current().full_by_morning);

    let response = router
        .clone()
        .oneshot(post_json(
            "/api/command",
            serde_json::json!({"command": "set_target_soc", "value": 140.0}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(bus.current().target_soc_pct, None);

    let response = router
        .oneshot(post_json(
            "/api/command",
            serde_json::json!({"command": "set_safe_mode", "value": true}),
        ))
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["inputs"]["safe_mode"], true);
}

#[tokio::test]
async fn config_and_schema_are_served() {
    let (state, _, _) = test_state();
    let router = build_router(state);

    let response = router.clone().oneshot(get("/api/config")).await.unwrap();
    let json = body_json(response).await;
    assert_eq!(json["controls"]["wallbox_min_w"], 1400.0);

    let response = router.clone().oneshot(get("/api/config/schema")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let schema = body_json(response).await;
    assert!(schema["properties"]["controls"].is_object());

    let response = router.oneshot(get("/api/session")).await.unwrap();
    assert_eq!(body_json(response).await["session_active"], false);
}

#[tokio::test]
async fn events_stream_named_status_events() {
    let (state, _, mut publisher) = test_state();
    let response = build_router(state).oneshot(get("/api/events")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let ct = response
        .headers()
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("")
        .to_string();
    assert!(ct.contains("text/event-stream"));

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        publisher.publish_status(&sample_status()).await.unwrap();
    });

    let mut body = response.into_body();
    let mut buf: Vec<u8> = Vec::new();
    let found = tokio::time::timeout(Duration::from_secs(2), async {
        while let Some(Ok(frame)) = body.frame().await {
            if let Some(data) = frame.data_ref() {
                buf.extend_from_slice(data);
                let text = String::from_utf8_lossy(&buf);
                if text.contains("event: status") && text.contains("\"target_power_w\":3000") {
                    return true;
                }
            }
        }
        false
    })
    .await
    .unwrap_or(false);
    assert!(found, "status event not observed");
}
