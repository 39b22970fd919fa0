use crate::controls::ChargeMode;
use crate::decision::Reasoning;
use crate::session::SessionPhase;
use crate::snapshot::PlugState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Controller lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    /// Constructed, loop not started
    Initializing,
    /// Normal operation
    Running,
    /// Running on stale or missing sensor data, or the charger is not accepting setpoints
    Degraded,
    /// Safe mode forced the setpoint to zero
    SafeMode,
    /// Loop stopped
    Paused,
}

impl ControllerState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::Degraded => "degraded",
            Self::SafeMode => "safe_mode",
            Self::Paused => "paused",
        }
    }
}

/// Status published once per cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeStatus {
    pub timestamp: DateTime<Utc>,
    pub target_power_w: f64,
    pub actual_power_w: f64,
    /// Parsed mode; `None` when the mode input was invalid
    pub mode: Option<ChargeMode>,
    /// Mode as received
    pub raw_mode: String,
    pub session_energy_delivered_kwh: f64,
    pub surplus_w: f64,
    pub assist_w: f64,
    pub reasoning: Reasoning,
    /// One-line form of `reasoning`
    pub summary: String,
    pub controller_state: ControllerState,
    pub plug: PlugState,
    pub session_phase: SessionPhase,
    pub session_id: Option<String>,
    pub target_energy_kwh: f64,
    pub departure_deadline: Option<DateTime<Utc>>,
    pub full_by_morning: bool,
    pub deadline_unreachable: bool,
    pub solar_energy_kwh: f64,
    pub grid_energy_kwh: f64,
    pub session_cost: f64,
    pub currency: String,
    pub battery_soc_pct: Option<f64>,
    pub ev_soc_pct: Option<f64>,
    pub stale_fields: Vec<String>,
    pub consecutive_read_failures: u32,
    pub actuator_ok: bool,
    pub safe_mode: bool,
    pub total_cycles: u64,
    pub overrun_count: u64,
    pub last_cycle_duration_ms: Option<u64>,
    pub control_interval_s: u64,
}

/// Raised once when a deadline becomes unreachable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadlineAlert {
    pub timestamp: DateTime<Utc>,
    pub session_id: Option<String>,
    pub deadline: DateTime<Utc>,
    pub required_w: f64,
    pub max_w: f64,
    pub energy_remaining_kwh: f64,
    pub message: String,
}
