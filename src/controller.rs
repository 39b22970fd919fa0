//! Control loop orchestration for Helios
//!
//! [`ChargeController`] owns the session state and runs one strictly
//! sequential cycle per interval: read the site, resolve the mode, ramp, write
//! the setpoint, account energy and publish status. Nothing inside a cycle is
//! allowed to stop the loop; every failure degrades to a defined fallback.

use crate::commands::ControlInputs;
use crate::config::Config;
use crate::controls::ChargeMode;
use crate::decision::Decision;
use crate::error::{HeliosError, Result};
use crate::logging::StructuredLogger;
use crate::persistence::PersistenceManager;
use crate::ports::{ChargerActuator, SnapshotSource, StatusPublisher};
use crate::session::SessionManager;
use crate::snapshot::PowerSnapshot;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;

mod cycle;
mod runtime;
mod status;
pub mod types;


pub use types::{ChargeStatus, ControllerState, DeadlineAlert};

/// The decision engine's control loop
pub struct ChargeController {
    config: Config,
    logger: StructuredLogger,

    source: Box<dyn SnapshotSource>,
    actuator: Box<dyn ChargerActuator>,
    publisher: Box<dyn StatusPublisher>,
    inputs_rx: watch::Receiver<ControlInputs>,

    sessions: SessionManager,
    persistence: Option<PersistenceManager>,
    restored_session: bool,

    state_tx: watch::Sender<ControllerState>,
    sessions_tx: watch::Sender<serde_json::Value>,

    last_snapshot: Option<PowerSnapshot>,
    last_decision: Option<Decision>,
    last_status: Option<ChargeStatus>,
    last_mode: Option<ChargeMode>,
    last_surplus_w: f64,
    last_assist_w: f64,

    consecutive_read_failures: u32,
    actuator_ok: bool,
    deadline_unreachable: bool,

    total_cycles: u64,
    overrun_count: u64,
    last_cycle_duration_ms: Option<u64>,
}

impl std::fmt::Debug for ChargeController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChargeController")
            .field("state", &*self.state_tx.borrow())
            .field("total_cycles", &self.total_cycles)
            .field("last_setpoint_w", &self.sessions.state().last_setpoint_w)
            .finish_non_exhaustive()
    }
}

impl ChargeController {
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn last_decision(&self) -> Option<&Decision> {
        self.last_decision.as_ref()
    }

    pub fn last_status(&self) -> Option<&ChargeStatus> {
        self.last_status.as_ref()
    }

    pub fn last_setpoint_w(&self) -> f64 {
        self.sessions.state().last_setpoint_w
    }

    pub fn consecutive_read_failures(&self) -> u32 {
        self.consecutive_read_failures
    }

    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    pub fn overrun_count(&self) -> u64 {
        self.overrun_count
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ControllerState> {
        self.state_tx.subscribe()
    }

    /// Session statistics and history, refreshed every cycle
    pub fn subscribe_sessions(&self) -> watch::Receiver<serde_json::Value> {
        self.sessions_tx.subscribe()
    }

    pub(crate) fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.config.controls.io_timeout_ms)
    }

    pub(crate) fn interval(&self) -> Duration {
        Duration::from_secs(self.config.controls.control_interval_s)
    }
}

/// Run `fut` with a deadline, turning expiry into a `Timeout` error
pub(crate) async fn bounded<T, F>(limit: Duration, what: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(HeliosError::timeout(format!(
            "{} timed out after {} ms",
            what,
            limit.as_millis()
        ))),
    }
}
