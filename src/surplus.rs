//! PV surplus calculation

use crate::config::ControlsConfig;
use crate::snapshot::PowerSnapshot;

/// Solar power available for the vehicle after house load and the reserve.
///
/// The export at the meter plus what the EV and a charging home battery already
/// absorb is what PV leaves over; a discharging battery lowers it. Never
/// negative.
pub fn compute_pv_surplus(snapshot: &PowerSnapshot, config: &ControlsConfig) -> f64 {
    let raw = snapshot.grid_power_w + snapshot.ev_power_w + snapshot.battery_power_w
        - config.grid_reserve_w;
    raw.max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(grid: f64, ev: f64, battery: f64) -> PowerSnapshot {
        PowerSnapshot {
            grid_power_w: grid,
            ev_power_w: ev,
            battery_power_w: battery,
            ..Default::default()
        }
    }

    #[test]
    fn export_minus_reserve() {
        let cfg = ControlsConfig::default();
        assert_eq!(compute_pv_surplus(&snap(3000.0, 0.0, 0.0), &cfg), 2900.0);
    }

    #[test]
    fn ev_draw_is_added_back() {
        let cfg = ControlsConfig::default();
        assert_eq!(compute_pv_surplus(&snap(500.0, 2000.0, 0.0), &cfg), 2400.0);
    }

    #[test]
    fn battery_discharge_reduces_surplus() {
        let cfg = ControlsConfig::default();
        assert_eq!(compute_pv_surplus(&snap(500.0, 0.0, -800.0), &cfg), 0.0);
        assert_eq!(compute_pv_surplus(&snap(500.0, 0.0, 1000.0), &cfg), 1400.0);
    }

    #[test]
    fn import_clamps_to_zero() {
        let cfg = ControlsConfig::default();
        assert_eq!(compute_pv_surplus(&snap(-2500.0, 0.0, 0.0), &cfg), 0.0);
    }
}
