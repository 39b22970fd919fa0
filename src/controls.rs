//! Charge modes and target resolution
//!
//! The operator picks one [`ChargeMode`]; each cycle it is resolved into a raw
//! power target from the surplus, the battery assist and the deadline
//! assessment. The result is always deliverable: zero, or within
//! `[wallbox_min_w, wallbox_max_w]`.

use crate::config::ControlsConfig;
use crate::deadline::DeadlineAssessment;
use crate::error::HeliosError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Operator-selected charging strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChargeMode {
    /// Charging stopped
    Off,
    /// Charge from PV surplus (plus battery assist) only
    PvSurplus,
    /// PV surplus, escalating toward a departure deadline when needed
    Smart,
    /// Fixed economy power
    Eco,
    /// Fixed maximum power
    Fast,
    /// Hands-off: the charger is controlled elsewhere
    Manual,
}

impl ChargeMode {
    pub const ALL: [ChargeMode; 6] = [
        Self::Off,
        Self::PvSurplus,
        Self::Smart,
        Self::Eco,
        Self::Fast,
        Self::Manual,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::PvSurplus => "pv_surplus",
            Self::Smart => "smart",
            Self::Eco => "eco",
            Self::Fast => "fast",
            Self::Manual => "manual",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Off => "Off",
            Self::PvSurplus => "PV surplus",
            Self::Smart => "Smart",
            Self::Eco => "Eco",
            Self::Fast => "Fast",
            Self::Manual => "Manual",
        }
    }

    /// Whether the controller writes setpoints in this mode
    pub fn actuates(self) -> bool {
        !matches!(self, Self::Manual)
    }

    fn expected() -> String {
        Self::ALL
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for ChargeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChargeMode {
    type Err = HeliosError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "pv" | "pv_surplus" | "pvsurplus" => Ok(Self::PvSurplus),
            "smart" => Ok(Self::Smart),
            "eco" => Ok(Self::Eco),
            "fast" => Ok(Self::Fast),
            "manual" => Ok(Self::Manual),
            _ => Err(HeliosError::invalid_mode(s, Self::expected())),
        }
    }
}

/// What the resolved target was derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetBasis {
    Off,
    Disconnected,
    Surplus,
    DeadlineEscalation,
    Fixed,
}

/// Correction applied to keep the target deliverable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandAdjustment {
    BelowMinimum,
    CappedAtMaximum,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolvedTarget {
    /// Deliverable target: 0 or within the wallbox band
    pub target_w: f64,
    /// Value before the band was applied
    pub requested_w: f64,
    pub basis: TargetBasis,
    pub adjustment: Option<BandAdjustment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resolution {
    Actuate(ResolvedTarget),
    /// Manual mode: observe and report only
    Observe,
}

/// Snap a requested power into the deliverable set
pub fn apply_band(requested_w: f64, config: &ControlsConfig) -> (f64, Option<BandAdjustment>) {
    if requested_w <= 0.0 {
        (0.0, None)
    } else if requested_w < config.wallbox_min_w {
        (0.0, Some(BandAdjustment::BelowMinimum))
    } else if requested_w > config.wallbox_max_w {
        (config.wallbox_max_w, Some(BandAdjustment::CappedAtMaximum))
    } else {
        (requested_w, None)
    }
}

/// Resolve the mode into this cycle's raw target
pub fn resolve_target(
    mode: ChargeMode,
    surplus_w: f64,
    assist_w: f64,
    deadline: Option<&DeadlineAssessment>,
    vehicle_connected: bool,
    config: &ControlsConfig,
) -> Resolution {
    let (requested_w, basis) = match mode {
        ChargeMode::Manual => return Resolution::Observe,
        ChargeMode::Off => (0.0, TargetBasis::Off),
        _ if !vehicle_connected => (0.0, TargetBasis::Disconnected),
        ChargeMode::PvSurplus => (surplus_w + assist_w, TargetBasis::Surplus),
        ChargeMode::Smart => match deadline {
            Some(d) if d.escalate => (
                d.required_w.min(config.wallbox_max_w),
                TargetBasis::DeadlineEscalation,
            ),
            _ => (surplus_w + assist_w, TargetBasis::Surplus),
        },
        ChargeMode::Eco => (config.eco_power_w, TargetBasis::Fixed),
        ChargeMode::Fast => (config.fast_power_w, TargetBasis::Fixed),
    };

    let (target_w, adjustment) = apply_band(requested_w, config);
    Resolution::Actuate(ResolvedTarget {
        target_w,
        requested_w,
        basis,
        adjustment,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_modes_strictly() {
        assert_eq!("PV".parse::<ChargeMode>().unwrap(), ChargeMode::PvSurplus);
        assert_eq!(" smart ".parse::<ChargeMode>().unwrap(), ChargeMode::Smart);
        let err = "turbo".parse::<ChargeMode>().unwrap_err();
        assert!(err.to_string().contains("off, pv_surplus, smart, eco, fast, manual"));
        assert!("".parse::<ChargeMode>().is_err());
    }

    #[test]
    fn display_round_trips() {
        for mode in ChargeMode::ALL {
            assert_eq!(mode.to_string().parse::<ChargeMode>().unwrap(), mode);
        }
    }

    #[test]
    fn band_snaps_and_caps() {
        let cfg = ControlsConfig::default();
        assert_eq!(apply_band(900.0, &cfg), (0.0, Some(BandAdjustment::BelowMinimum)));
        assert_eq!(
            apply_band(20_000.0, &cfg),
            (11_000.0, Some(BandAdjustment::CappedAtMaximum))
        );
        assert_eq!(apply_band(1400.0, &cfg), (1400.0, None));
    }
}
