//! Operator inputs
//!
//! The mode and the user toggles live in a single [`ControlInputs`] value
//! behind a `watch` channel. Writers (HTTP API, tests) modify it through the
//! [`CommandBus`]; the controller clones it once at the start of every cycle,
//! so a cycle always sees one consistent set of inputs.

use crate::config::Config;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Inputs captured once per cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlInputs {
    /// Raw mode string; parsed by the controller each cycle
    pub mode: String,
    /// Explicit departure time; falls back to the configured time of day
    pub departure_deadline: Option<DateTime<Utc>>,
    /// Session energy target in kWh
    pub target_energy_kwh: Option<f64>,
    /// Vehicle SoC target; takes precedence over the energy target when the
    /// vehicle reports its SoC
    pub target_soc_pct: Option<f64>,
    pub full_by_morning: bool,
    /// Forces the setpoint to zero and suspends control while set
    pub safe_mode: bool,
}

impl Default for ControlInputs {
    fn default() -> Self {
        Self {
            mode: "pv_surplus".to_string(),
            departure_deadline: None,
            target_energy_kwh: None,
            target_soc_pct: None,
            full_by_morning: false,
            safe_mode: false,
        }
    }
}

impl ControlInputs {
    pub fn from_config(config: &Config) -> Self {
        Self {
            full_by_morning: config.departure.full_by_morning,
            ..Self::default()
        }
    }

    pub fn apply(&mut self, command: ControlCommand) {
        match command {
            ControlCommand::SetMode(mode) => self.mode = mode,
            ControlCommand::SetDeparture(deadline) => self.departure_deadline = deadline,
            ControlCommand::SetTargetEnergy(kwh) => self.target_energy_kwh = kwh,
            ControlCommand::SetTargetSoc(pct) => self.target_soc_pct = pct,
            ControlCommand::SetFullByMorning(on) => self.full_by_morning = on,
            ControlCommand::SetSafeMode(on) => self.safe_mode = on,
        }
    }
}

/// A single change to the operator inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "value", rename_all = "snake_case")]
pub enum ControlCommand {
    SetMode(String),
    SetDeparture(Option<DateTime<Utc>>),
    SetTargetEnergy(Option<f64>),
    SetTargetSoc(Option<f64>),
    SetFullByMorning(bool),
    SetSafeMode(bool),
}

/// Write side of the inputs channel
#[derive(Debug, Clone)]
pub struct CommandBus {
    tx: watch::Sender<ControlInputs>,
}

impl CommandBus {
    pub fn new(initial: ControlInputs) -> (Self, watch::Receiver<ControlInputs>) {
        let (tx, rx) = watch::channel(initial);
        (Self { tx }, rx)
    }

    pub fn apply(&self, command: ControlCommand) {
        self.tx.send_modify(|inputs| inputs.apply(command));
    }

    pub fn replace(&self, inputs: ControlInputs) {
        self.tx.send_replace(inputs);
    }

    pub fn current(&self) -> ControlInputs {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ControlInputs> {
        self.tx.subscribe()
    }
}
