use anyhow::{Context, Result};
use helios::commands::{CommandBus, ControlInputs};
use helios::logging::{get_logger, init_logging};
use helios::persistence::PersistenceManager;
use helios::ports::ChannelPublisher;
use helios::sim::{SimCharger, SimSource, SimulatedSite};
use helios::{ChargeController, Config};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Capacity of the status/alert event stream
const EVENT_BUFFER: usize = 64;

#[tokio::main]
async fn main() -> Result<()> {
    // Optional explicit config path as the first argument
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(&path)
            .with_context(|| format!("Failed to load configuration from {}", path))?,
        None => Config::load().context("Failed to load configuration")?,
    };
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    init_logging(&config.logging).map_err(|e| anyhow::anyhow!("Logging setup failed: {}", e))?;
    let logger = get_logger("main");
    logger.info(&format!("Helios {} starting up", env!("APP_VERSION")));

    let mut persistence = PersistenceManager::new(&config.persistence.path);
    if let Err(e) = persistence.load() {
        logger.warn(&format!("Ignoring unreadable state file: {}", e));
    }
    let inputs = persistence
        .get_section("inputs")
        .and_then(|v| serde_json::from_value::<ControlInputs>(v).ok())
        .unwrap_or_else(|| ControlInputs::from_config(&config));
    let (bus, inputs_rx) = CommandBus::new(inputs);

    let site = SimulatedSite::new(config.simulation.clone(), &config.vehicle, config.tz()?).shared();
    let publisher = ChannelPublisher::new(EVENT_BUFFER);

    let mut controller = ChargeController::new(
        config.clone(),
        Box::new(SimSource::new(site.clone())),
        Box::new(SimCharger::new(site)),
        Box::new(publisher.clone()),
        inputs_rx,
    )
    .with_persistence(persistence);

    let web_task = if cfg!(feature = "web") && config.web.enabled {
        let state = helios::web::AppState::new(
            bus,
            publisher,
            controller.subscribe_state(),
            controller.subscribe_sessions(),
            Arc::new(config.clone()),
        );
        let host = config.web.host.clone();
        let port = config.web.port;
        let web_logger = logger.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = helios::web::serve(state, &host, port).await {
                web_logger.error(&format!("Web server error: {}", e));
            }
        }))
    } else {
        None
    };

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    let signal_logger = logger.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            signal_logger.error(&format!("Failed to listen for shutdown signal: {}", e));
        }
        signal_token.cancel();
    });

    let result = controller.run(shutdown).await;
    if let Some(task) = web_task {
        task.abort();
    }
    match result {
        Ok(()) => {
            logger.info("Helios shutdown complete");
            Ok(())
        }
        Err(e) => {
            logger.error(&format!("Control loop failed: {}", e));
            Err(anyhow::anyhow!("Control loop error: {}", e))
        }
    }
}
