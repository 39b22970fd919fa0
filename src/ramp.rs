//! Ramp limiting of the charger setpoint

use crate::config::ControlsConfig;
use serde::{Deserialize, Serialize};

/// Move from `previous_w` toward `target_w` by at most `ramp_step_w`
pub fn limit(previous_w: f64, target_w: f64, ramp_step_w: f64) -> f64 {
    previous_w + (target_w - previous_w).clamp(-ramp_step_w, ramp_step_w)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RampStep {
    pub value_w: f64,
    /// The target was not reached this cycle
    pub limited: bool,
}

/// One ramp step that stays deliverable.
///
/// A step landing strictly between 0 and the wallbox minimum is raised to the
/// minimum; with `ramp_step_w >= wallbox_min_w` this never exceeds the step.
pub fn ramp_toward(previous_w: f64, target_w: f64, config: &ControlsConfig) -> RampStep {
    let previous_w = previous_w.clamp(0.0, config.wallbox_max_w);
    let mut value_w = limit(previous_w, target_w, config.ramp_step_w);
    if value_w > 0.0 && value_w < config.wallbox_min_w {
        value_w = config.wallbox_min_w;
    }
    value_w = value_w.min(config.wallbox_max_w);
    RampStep {
        value_w,
        limited: (value_w - target_w).abs() > f64::EPSILON,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_is_symmetric() {
        assert_eq!(limit(0.0, 3000.0, 1500.0), 1500.0);
        assert_eq!(limit(3000.0, 0.0, 1500.0), 1500.0);
        assert_eq!(limit(2000.0, 2500.0, 1500.0), 2500.0);
    }

    #[test]
    fn ramp_down_keeps_deliverable_value() {
        let cfg = ControlsConfig::default();
        let step = ramp_toward(2000.0, 0.0, &cfg);
        assert_eq!(step.value_w, 1400.0);
        assert!(step.limited);
        let step = ramp_toward(1400.0, 0.0, &cfg);
        assert_eq!(step.value_w, 0.0);
        assert!(!step.limited);
    }

    #[test]
    fn ramp_up_from_zero() {
        let cfg = ControlsConfig::default();
        let step = ramp_toward(0.0, 3000.0, &cfg);
        assert_eq!(step.value_w, 1500.0);
        assert!(step.limited);
    }

    #[test]
    fn previous_above_max_is_clamped() {
        let cfg = ControlsConfig {
            wallbox_max_w: 7400.0,
            fast_power_w: 7400.0,
            ..Default::default()
        };
        let step = ramp_toward(11_000.0, 7400.0, &cfg);
        assert_eq!(step.value_w, 7400.0);
    }
}
