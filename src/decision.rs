//! Per-cycle decisions and their reasoning trail

use crate::assist::AssistInactive;
use crate::controls::{ChargeMode, TargetBasis};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One policy's contribution to a decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ReasonStep {
    Surplus {
        surplus_w: f64,
        grid_power_w: f64,
        ev_power_w: f64,
        battery_power_w: f64,
        reserve_w: f64,
    },
    BatteryAssist {
        assist_w: f64,
        gap_w: f64,
        forecast_factor: f64,
    },
    AssistInactive {
        reason: AssistInactive,
    },
    Deadline {
        required_w: f64,
        hours_left: f64,
        energy_remaining_kwh: f64,
        escalate: bool,
    },
    DeadlineUnreachable {
        required_w: f64,
        max_w: f64,
    },
    ModeTarget {
        mode: ChargeMode,
        basis: TargetBasis,
        requested_w: f64,
    },
    BelowMinimum {
        requested_w: f64,
        min_w: f64,
    },
    CappedAtMaximum {
        requested_w: f64,
        max_w: f64,
    },
    ManualObserve {
        actual_w: f64,
    },
    ImmediateCutoff,
    RampLimited {
        previous_w: f64,
        target_w: f64,
        applied_w: f64,
        step_w: f64,
    },
    StaleSensors {
        fields: Vec<String>,
    },
    SensorUnavailable {
        message: String,
        consecutive_failures: u32,
    },
    FailSafeDecay {
        consecutive_failures: u32,
    },
    HoldPrevious {
        setpoint_w: f64,
    },
    SafeMode,
    InvalidMode {
        value: String,
        message: String,
    },
    ActuatorFailure {
        message: String,
        attempts: u32,
    },
}

impl fmt::Display for ReasonStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Surplus {
                surplus_w,
                grid_power_w,
                ev_power_w,
                battery_power_w,
                reserve_w,
            } => write!(
                f,
                "PV surplus {:.0} W (grid {:+.0} + ev {:.0} + battery {:+.0} - reserve {:.0})",
                surplus_w, grid_power_w, ev_power_w, battery_power_w, reserve_w
            ),
            Self::BatteryAssist {
                assist_w,
                gap_w,
                forecast_factor,
            } => write!(
                f,
                "battery assist {:.0} W for a {:.0} W gap (forecast factor {:.2})",
                assist_w, gap_w, forecast_factor
            ),
            Self::AssistInactive { reason } => {
                write!(f, "battery assist idle: {}", reason.describe())
            }
            Self::Deadline {
                required_w,
                hours_left,
                energy_remaining_kwh,
                escalate,
            } => write!(
                f,
                "deadline needs {:.0} W ({:.2} kWh in {:.2} h){}",
                required_w,
                energy_remaining_kwh,
                hours_left,
                if *escalate { ", escalating" } else { "" }
            ),
            Self::DeadlineUnreachable { required_w, max_w } => write!(
                f,
                "deadline unreachable: needs {:.0} W, wallbox maximum is {:.0} W",
                required_w, max_w
            ),
            Self::ModeTarget {
                mode,
                basis,
                requested_w,
            } => write!(
                f,
                "mode {} requests {:.0} W ({:?})",
                mode, requested_w, basis
            ),
            Self::BelowMinimum { requested_w, min_w } => write!(
                f,
                "{:.0} W is below the wallbox minimum {:.0} W, stopping",
                requested_w, min_w
            ),
            Self::CappedAtMaximum { requested_w, max_w } => write!(
                f,
                "{:.0} W capped at wallbox maximum {:.0} W",
                requested_w, max_w
            ),
            Self::ManualObserve { actual_w } => {
                write!(f, "manual mode, observing {:.0} W", actual_w)
            }
            Self::ImmediateCutoff => write!(f, "immediate cutoff, ramp bypassed"),
            Self::RampLimited {
                previous_w,
                target_w,
                applied_w,
                step_w,
            } => write!(
                f,
                "ramp {:.0} -> {:.0} W toward {:.0} W (step {:.0} W)",
                previous_w, applied_w, target_w, step_w
            ),
            Self::StaleSensors { fields } => {
                write!(f, "stale sensor values: {}", fields.join(", "))
            }
            Self::SensorUnavailable {
                message,
                consecutive_failures,
            } => write!(
                f,
                "sensor unavailable ({} consecutive): {}",
                consecutive_failures, message
            ),
            Self::FailSafeDecay {
                consecutive_failures,
            } => write!(
                f,
                "fail-safe decay after {} failed reads",
                consecutive_failures
            ),
            Self::HoldPrevious { setpoint_w } => {
                write!(f, "holding previous setpoint {:.0} W", setpoint_w)
            }
            Self::SafeMode => write!(f, "safe mode active, control suspended"),
            Self::InvalidMode { value, message } => {
                write!(f, "invalid mode '{}': {}", value, message)
            }
            Self::ActuatorFailure { message, attempts } => write!(
                f,
                "actuator failed after {} attempt(s): {}",
                attempts, message
            ),
        }
    }
}

/// Ordered explanation of a decision
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reasoning {
    pub steps: Vec<ReasonStep>,
}

impl Reasoning {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: ReasonStep) {
        self.steps.push(step);
    }

    pub fn contains(&self, predicate: impl Fn(&ReasonStep) -> bool) -> bool {
        self.steps.iter().any(predicate)
    }

    /// Single-line human readable form
    pub fn summary(&self) -> String {
        self.steps
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl fmt::Display for Reasoning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

/// The outcome of one control cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub target_power_w: f64,
    pub reasoning: Reasoning,
    /// `None` when the mode input could not be parsed
    pub mode: Option<ChargeMode>,
    pub timestamp: DateTime<Utc>,
}
