//! Battery assist policy
//!
//! When PV almost reaches the wallbox minimum, a bounded discharge from the
//! home battery bridges the gap so the car can charge at all. Assist only
//! tops up a real surplus; it never replaces grid charging.

use crate::config::ControlsConfig;
use crate::snapshot::PowerSnapshot;
use serde::{Deserialize, Serialize};

/// How much PV the rest of the day is expected to bring
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ForecastQuality {
    /// No forecast available; assist is not throttled
    Unknown,
    /// Remaining forecast below the "good day" threshold
    Weak { factor: f64 },
    /// Remaining forecast at or above the threshold
    Good,
}

impl ForecastQuality {
    pub fn from_snapshot(snapshot: &PowerSnapshot, config: &ControlsConfig) -> Self {
        match snapshot.pv_forecast_remaining_kwh {
            None => Self::Unknown,
            Some(remaining) => {
                let factor = (remaining / config.pv_forecast_good_kwh).clamp(0.0, 1.0);
                if factor >= 1.0 {
                    Self::Good
                } else {
                    Self::Weak { factor }
                }
            }
        }
    }

    /// Scaling applied to the assist power
    pub fn factor(self) -> f64 {
        match self {
            Self::Unknown | Self::Good => 1.0,
            Self::Weak { factor } => factor,
        }
    }
}

/// Reason the policy stayed idle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssistInactive {
    NoVehicle,
    NoSurplus,
    SurplusSufficient,
    BatteryAtFloor,
    ForecastExhausted,
}

impl AssistInactive {
    pub fn describe(self) -> &'static str {
        match self {
            Self::NoVehicle => "no vehicle connected",
            Self::NoSurplus => "no PV surplus to top up",
            Self::SurplusSufficient => "surplus already reaches the wallbox minimum",
            Self::BatteryAtFloor => "home battery at or below its SoC floor",
            Self::ForecastExhausted => "no PV expected for the rest of the day",
        }
    }
}

/// Outcome of the policy for one cycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AssistOutcome {
    Active {
        assist_w: f64,
        gap_w: f64,
        forecast: ForecastQuality,
    },
    Inactive {
        reason: AssistInactive,
    },
}

impl AssistOutcome {
    pub fn assist_w(&self) -> f64 {
        match self {
            Self::Active { assist_w, .. } => *assist_w,
            Self::Inactive { .. } => 0.0,
        }
    }
}

/// Evaluate the assist policy and report why it did or did not engage
pub fn evaluate_assist(
    snapshot: &PowerSnapshot,
    surplus_w: f64,
    config: &ControlsConfig,
    forecast: ForecastQuality,
) -> AssistOutcome {
    let reason = if !snapshot.vehicle_connected() {
        Some(AssistInactive::NoVehicle)
    } else if surplus_w <= 0.0 {
        Some(AssistInactive::NoSurplus)
    } else if surplus_w >= config.wallbox_min_w {
        Some(AssistInactive::SurplusSufficient)
    } else if snapshot.battery_soc_pct <= config.battery_min_soc_pct {
        Some(AssistInactive::BatteryAtFloor)
    } else if forecast.factor() <= 0.0 {
        Some(AssistInactive::ForecastExhausted)
    } else {
        None
    };

    if let Some(reason) = reason {
        return AssistOutcome::Inactive { reason };
    }

    let gap_w = config.wallbox_min_w - surplus_w;
    let assist_w = gap_w.min(config.battery_assist_max_w).max(0.0) * forecast.factor();
    AssistOutcome::Active {
        assist_w,
        gap_w,
        forecast,
    }
}

/// Battery discharge in watts granted to reach the wallbox minimum
pub fn compute_assist(
    snapshot: &PowerSnapshot,
    surplus_w: f64,
    config: &ControlsConfig,
    forecast: ForecastQuality,
) -> f64 {
    evaluate_assist(snapshot, surplus_w, config, forecast).assist_w()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::PlugState;

    fn snap(soc: f64, forecast: Option<f64>) -> PowerSnapshot {
        PowerSnapshot {
            battery_soc_pct: soc,
            pv_forecast_remaining_kwh: forecast,
            plug: PlugState::Connected,
            ..Default::default()
        }
    }

    #[test]
    fn fills_gap_to_minimum() {
        let cfg = ControlsConfig::default();
        let s = snap(60.0, None);
        assert_eq!(compute_assist(&s, 800.0, &cfg, ForecastQuality::Unknown), 600.0);
    }

    #[test]
    fn capped_at_assist_max() {
        let cfg = ControlsConfig {
            wallbox_min_w: 4000.0,
            battery_assist_max_w: 2000.0,
            ..Default::default()
        };
        let s = snap(60.0, None);
        assert_eq!(compute_assist(&s, 500.0, &cfg, ForecastQuality::Unknown), 2000.0);
    }

    #[test]
    fn weak_forecast_throttles() {
        let cfg = ControlsConfig::default();
        let s = snap(60.0, Some(5.0));
        let q = ForecastQuality::from_snapshot(&s, &cfg);
        assert_eq!(q, ForecastQuality::Weak { factor: 0.5 });
        assert_eq!(compute_assist(&s, 800.0, &cfg, q), 300.0);
    }

    #[test]
    fn idle_reasons() {
        let cfg = ControlsConfig::default();
        let q = ForecastQuality::Unknown;
        let at_floor = snap(20.0, None);
        assert_eq!(
            evaluate_assist(&at_floor, 800.0, &cfg, q),
            AssistOutcome::Inactive {
                reason: AssistInactive::BatteryAtFloor
            }
        );
        let s = snap(60.0, None);
        assert_eq!(
            evaluate_assist(&s, 0.0, &cfg, q),
            AssistOutcome::Inactive {
                reason: AssistInactive::NoSurplus
            }
        );
        assert_eq!(
            evaluate_assist(&s, 1500.0, &cfg, q),
            AssistOutcome::Inactive {
                reason: AssistInactive::SurplusSufficient
            }
        );
        let unplugged = PowerSnapshot {
            battery_soc_pct: 80.0,
            ..Default::default()
        };
        assert_eq!(compute_assist(&unplugged, 800.0, &cfg, q), 0.0);
    }
}
