use std::time::Instant;
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

use crate::commands::ControlInputs;
use crate::config::Config;
use crate::controls::{ChargeMode, apply_band};
use crate::decision::{Decision, ReasonStep, Reasoning};
use crate::error::Result;
use crate::logging::get_logger;
use crate::persistence::PersistenceManager;
use crate::ports::{ChargerActuator, SnapshotSource, StatusPublisher};
use crate::session::SessionManager;

use super::types::ControllerState;

impl super::ChargeController {
    /// Create a controller over the given ports
    pub fn new(
        config: Config,
        source: Box<dyn SnapshotSource>,
        actuator: Box<dyn ChargerActuator>,
        publisher: Box<dyn StatusPublisher>,
        inputs_rx: watch::Receiver<ControlInputs>,
    ) -> Self {
        let logger = get_logger("controller");
        let (state_tx, _) = watch::channel(ControllerState::Initializing);
        let (sessions_tx, _) = watch::channel(serde_json::Value::Null);
        let sessions = SessionManager::new(config.persistence.history_size);

        logger.info(&format!(
            "Controller created: band {:.0}-{:.0} W, ramp {:.0} W, interval {} s",
            config.controls.wallbox_min_w,
            config.controls.wallbox_max_w,
            config.controls.ramp_step_w,
            config.controls.control_interval_s
        ));

        Self {
            config,
            logger,
            source,
            actuator,
            publisher,
            inputs_rx,
            sessions,
            persistence: None,
            restored_session: false,
            state_tx,
            sessions_tx,
            last_snapshot: None,
            last_decision: None,
            last_status: None,
            last_mode: None,
            last_surplus_w: 0.0,
            last_assist_w: 0.0,
            consecutive_read_failures: 0,
            actuator_ok: true,
            deadline_unreachable: false,
            total_cycles: 0,
            overrun_count: 0,
            last_cycle_duration_ms: None,
        }
    }

    /// Attach a state store and restore the last setpoint and session from it.
    ///
    /// Restoring is best-effort: a corrupt section is logged and skipped.
    pub fn with_persistence(mut self, persistence: PersistenceManager) -> Self {
        // The band may have changed since the state was written
        let persisted = persistence.get::<f64>("last_setpoint_w").unwrap_or(0.0);
        let (restored_setpoint, adjustment) = apply_band(persisted, &self.config.controls);
        if adjustment.is_some() {
            self.logger.warn(&format!(
                "Persisted setpoint {:.0} W is outside the wallbox band; using {:.0} W",
                persisted, restored_setpoint
            ));
        }

        if let Some(section) = persistence.get_section("session") {
            match self.sessions.restore_state(section) {
                Ok(()) => self.restored_session = self.sessions.state().id.is_some(),
                Err(e) => self
                    .logger
                    .warn(&format!("Ignoring persisted session state: {}", e)),
            }
        }
        self.sessions.state_mut().last_setpoint_w = restored_setpoint;
        if restored_setpoint > 0.0 {
            self.logger.info(&format!(
                "Resuming ramp from persisted setpoint {:.0} W",
                restored_setpoint
            ));
        }

        self.persistence = Some(persistence);
        self
    }

    /// Run cycles until `shutdown` is cancelled.
    ///
    /// Cancellation is observed between cycles only; the cycle in flight
    /// always completes.
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<()> {
        let period = self.interval();
        self.logger.info(&format!(
            "Starting control loop ({} s interval)",
            period.as_secs()
        ));
        self.state_tx.send_replace(ControllerState::Running);

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => {
                    self.logger.info("Shutdown signal received");
                    break;
                }
                _ = ticker.tick() => {
                    let started = Instant::now();
                    self.run_cycle().await;
                    let elapsed = started.elapsed();
                    self.last_cycle_duration_ms = Some(elapsed.as_millis() as u64);
                    if elapsed > period {
                        self.overrun_count = self.overrun_count.saturating_add(1);
                        self.logger.warn(&format!(
                            "Cycle took {} ms, longer than the {} s interval; next tick skipped",
                            elapsed.as_millis(),
                            period.as_secs()
                        ));
                    }
                }
            }
        }

        self.shutdown().await
    }

    /// Publish a final paused status and flush state
    pub(crate) async fn shutdown(&mut self) -> Result<()> {
        self.logger.info("Stopping control loop");
        self.state_tx.send_replace(ControllerState::Paused);

        let now = chrono::Utc::now();
        let status = match self.last_status.clone() {
            Some(mut status) => {
                status.controller_state = ControllerState::Paused;
                status.timestamp = now;
                status
            }
            None => {
                // Stopped before the first cycle completed
                let inputs = self.inputs_rx.borrow().clone();
                let setpoint_w = self.sessions.state().last_setpoint_w;
                let mut reasoning = Reasoning::new();
                reasoning.push(ReasonStep::HoldPrevious { setpoint_w });
                let decision = Decision {
                    target_power_w: setpoint_w,
                    reasoning,
                    mode: inputs.mode.parse::<ChargeMode>().ok(),
                    timestamp: now,
                };
                self.build_status(&decision, &inputs, ControllerState::Paused, now)
            }
        };
        let limit = self.io_timeout();
        if let Err(e) =
            super::bounded(limit, "final status", self.publisher.publish_status(&status)).await
        {
            self.logger
                .warn(&format!("Failed to publish final status: {}", e));
        }
        self.last_status = Some(status);

        self.persist();
        self.logger.info("Control loop stopped");
        Ok(())
    }

    /// Best-effort save of setpoint, inputs and session
    pub(crate) fn persist(&mut self) {
        let Some(persistence) = self.persistence.as_mut() else {
            return;
        };
        persistence.set_last_setpoint(self.sessions.state().last_setpoint_w);
        let inputs = self.inputs_rx.borrow().clone();
        let session_state = self.sessions.get_state();
        let result = (|| -> Result<()> {
            persistence.set_section("inputs", serde_json::to_value(&inputs)?)?;
            persistence.set_section("session", session_state)?;
            persistence.save()
        })();
        if let Err(e) = result {
            self.logger
                .warn(&format!("Failed to persist controller state: {}", e));
        }
    }
}
