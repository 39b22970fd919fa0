//! Charging session management for Helios
//!
//! The session follows the plug state reported by the charger:
//! `Disconnected -> Connected <-> Charging -> Disconnected`. Energy is
//! integrated from the EV power actually measured, never from the setpoint,
//! and split into a solar and a grid share for cost accounting.

use crate::config::PricingConfig;
use crate::error::{HeliosError, Result};
use crate::logging::{StructuredLogger, get_logger};
use crate::snapshot::PlugState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Disconnected,
    Connected,
    Charging,
}

impl From<PlugState> for SessionPhase {
    fn from(plug: PlugState) -> Self {
        match plug {
            PlugState::Disconnected => Self::Disconnected,
            PlugState::Connected => Self::Connected,
            PlugState::Charging => Self::Charging,
        }
    }
}

/// Mutable per-session state owned by the controller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionState {
    /// Session id; `None` while no vehicle is connected
    pub id: Option<String>,
    pub phase: SessionPhase,
    pub started_at: Option<DateTime<Utc>>,
    pub target_energy_kwh: f64,
    pub session_energy_delivered_kwh: f64,
    pub solar_energy_kwh: f64,
    pub grid_energy_kwh: f64,
    pub peak_power_w: f64,
    pub departure_deadline: Option<DateTime<Utc>>,
    pub full_by_morning_enabled: bool,
    /// Last setpoint written to the charger; survives disconnects and restarts
    pub last_setpoint_w: f64,
}

impl SessionState {
    /// Cost of the energy delivered so far
    pub fn cost(&self, pricing: &PricingConfig) -> f64 {
        self.grid_energy_kwh * pricing.grid_rate_per_kwh
            + self.solar_energy_kwh * pricing.feed_in_rate_per_kwh
    }

    fn reset_counters(&mut self) {
        self.id = None;
        self.started_at = None;
        self.session_energy_delivered_kwh = 0.0;
        self.solar_energy_kwh = 0.0;
        self.grid_energy_kwh = 0.0;
        self.peak_power_w = 0.0;
    }
}

/// Final status of an archived session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    /// Ended by unplugging
    Completed,
    /// Ended by a restart or shutdown while connected
    Interrupted,
}

/// Archived session record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedSession {
    pub id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub energy_delivered_kwh: f64,
    pub solar_energy_kwh: f64,
    pub grid_energy_kwh: f64,
    pub peak_power_w: f64,
    pub average_power_w: f64,
    pub cost: Option<f64>,
    pub status: SessionStatus,
}

/// Phase change produced by a plug state update
#[derive(Debug, Clone, PartialEq)]
pub enum SessionTransition {
    Started { id: String },
    ChargingStarted,
    ChargingPaused,
    Ended(Box<CompletedSession>),
}

/// Owner of the live session, the last finished one and a bounded history
#[derive(Debug)]
pub struct SessionManager {
    state: SessionState,
    pub last_session: Option<CompletedSession>,
    history: VecDeque<CompletedSession>,
    max_history_size: usize,
    logger: StructuredLogger,
}

impl SessionManager {
    pub fn new(max_history_size: usize) -> Self {
        let max_history_size = max_history_size.max(1);
        Self {
            state: SessionState::default(),
            last_session: None,
            history: VecDeque::with_capacity(max_history_size),
            max_history_size,
            logger: get_logger("session"),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SessionState {
        &mut self.state
    }

    pub fn history(&self) -> impl Iterator<Item = &CompletedSession> {
        self.history.iter()
    }

    /// Advance the lifecycle from the plug state of this cycle
    pub fn on_plug_state(
        &mut self,
        plug: PlugState,
        now: DateTime<Utc>,
        pricing: &PricingConfig,
    ) -> Option<SessionTransition> {
        let next = SessionPhase::from(plug);
        let current = self.state.phase;
        if next == current {
            return None;
        }

        let transition = match (current, next) {
            (SessionPhase::Disconnected, _) => {
                let id = uuid::Uuid::new_v4().to_string();
                self.state.reset_counters();
                self.state.id = Some(id.clone());
                self.state.started_at = Some(now);
                self.logger
                    .for_session(&id)
                    .info("Vehicle connected, session started");
                Some(SessionTransition::Started { id })
            }
            (_, SessionPhase::Disconnected) => self
                .archive(now, SessionStatus::Completed, pricing)
                .map(|s| SessionTransition::Ended(Box::new(s))),
            (SessionPhase::Connected, SessionPhase::Charging) => {
                Some(SessionTransition::ChargingStarted)
            }
            (SessionPhase::Charging, SessionPhase::Connected) => {
                Some(SessionTransition::ChargingPaused)
            }
            _ => None,
        };
        self.state.phase = next;
        transition
    }

    /// Integrate measured EV power over `elapsed_s`.
    ///
    /// `solar_covered_w` is how much of that power PV surplus and battery assist
    /// could supply; the remainder is counted as grid energy. Nothing is
    /// counted without a connected vehicle or when `counting` is false.
    pub fn integrate(
        &mut self,
        actual_power_w: f64,
        solar_covered_w: f64,
        elapsed_s: f64,
        counting: bool,
    ) -> f64 {
        if !counting
            || self.state.phase == SessionPhase::Disconnected
            || !(elapsed_s > 0.0)
            || !(actual_power_w > 0.0)
        {
            return 0.0;
        }
        let hours = elapsed_s / 3600.0;
        let delivered_kwh = actual_power_w * hours / 1000.0;
        let solar_w = solar_covered_w.clamp(0.0, actual_power_w);
        let solar_kwh = solar_w * hours / 1000.0;

        self.state.session_energy_delivered_kwh += delivered_kwh;
        self.state.solar_energy_kwh += solar_kwh;
        self.state.grid_energy_kwh += delivered_kwh - solar_kwh;
        self.state.peak_power_w = self.state.peak_power_w.max(actual_power_w);
        delivered_kwh
    }

    /// Close the live session, if any, with the given status
    pub fn end_session(
        &mut self,
        now: DateTime<Utc>,
        status: SessionStatus,
        pricing: &PricingConfig,
    ) -> Option<CompletedSession> {
        let ended = self.archive(now, status, pricing);
        self.state.phase = SessionPhase::Disconnected;
        ended
    }

    fn archive(
        &mut self,
        now: DateTime<Utc>,
        status: SessionStatus,
        pricing: &PricingConfig,
    ) -> Option<CompletedSession> {
        let id = self.state.id.clone()?;
        let start_time = self.state.started_at.unwrap_or(now);
        let duration_hours = (now - start_time).num_seconds().max(0) as f64 / 3600.0;
        let energy = self.state.session_energy_delivered_kwh;
        let session = CompletedSession {
            id: id.clone(),
            start_time,
            end_time: now,
            energy_delivered_kwh: energy,
            solar_energy_kwh: self.state.solar_energy_kwh,
            grid_energy_kwh: self.state.grid_energy_kwh,
            peak_power_w: self.state.peak_power_w,
            average_power_w: if duration_hours > 0.0 {
                energy / duration_hours * 1000.0
            } else {
                0.0
            },
            cost: Some(self.state.cost(pricing)),
            status,
        };

        self.logger.for_session(&id).info(&format!(
            "Session ended ({:?}), delivered {:.3} kWh ({:.3} kWh solar)",
            status, energy, session.solar_energy_kwh
        ));

        self.last_session = Some(session.clone());
        self.history.push_back(session.clone());
        while self.history.len() > self.max_history_size {
            self.history.pop_front();
        }
        self.state.reset_counters();
        Some(session)
    }

    /// Override the cost of the most recent finished session
    pub fn set_cost_on_last_session(&mut self, cost: f64) {
        if let Some(last) = self.last_session.as_mut() {
            last.cost = Some(cost);
            if let Some(h) = self.history.back_mut()
                && h.id == last.id
            {
                h.cost = Some(cost);
            }
        }
    }

    /// Summary for status endpoints
    pub fn get_session_stats(&self, now: DateTime<Utc>, pricing: &PricingConfig) -> serde_json::Value {
        let s = &self.state;
        match (&s.id, s.started_at) {
            (Some(id), Some(started)) => serde_json::json!({
                "session_active": true,
                "id": id,
                "phase": s.phase,
                "session_duration_min": (now - started).num_minutes().max(0),
                "energy_delivered_kwh": s.session_energy_delivered_kwh,
                "solar_energy_kwh": s.solar_energy_kwh,
                "grid_energy_kwh": s.grid_energy_kwh,
                "target_energy_kwh": s.target_energy_kwh,
                "cost": s.cost(pricing),
                "currency": pricing.currency_symbol,
            }),
            _ => serde_json::json!({
                "session_active": false,
                "phase": s.phase,
                "session_duration_min": null,
                "energy_delivered_kwh": null,
                "last_session": self.last_session,
            }),
        }
    }

    /// Serializable state for persistence
    pub fn get_state(&self) -> serde_json::Value {
        serde_json::json!({
            "current": self.state,
            "last_session": self.last_session,
            "history": self.history,
        })
    }

    /// Restore from [`Self::get_state`] output, trimming history to the limit
    pub fn restore_state(&mut self, state: serde_json::Value) -> Result<()> {
        #[derive(Deserialize)]
        struct Persisted {
            #[serde(default)]
            current: SessionState,
            #[serde(default)]
            last_session: Option<CompletedSession>,
            #[serde(default)]
            history: Vec<CompletedSession>,
        }

        if state.is_null() {
            return Ok(());
        }
        let persisted: Persisted = serde_json::from_value(state)
            .map_err(|e| HeliosError::serialization(format!("Invalid session state: {}", e)))?;

        self.state = persisted.current;
        self.last_session = persisted.last_session;
        let skip = persisted.history.len().saturating_sub(self.max_history_size);
        self.history = persisted.history.into_iter().skip(skip).collect();
        self.logger.info(&format!(
            "Restored session state (phase {:?}, {} archived sessions)",
            self.state.phase,
            self.history.len()
        ));
        Ok(())
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(100)
    }
}
