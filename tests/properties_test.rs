use helios::assist::{ForecastQuality, compute_assist};
use helios::config::ControlsConfig;
use helios::controls::{ChargeMode, Resolution, resolve_target};
use helios::deadline::DeadlineAssessment;
use helios::ramp::ramp_toward;
use helios::snapshot::{PlugState, PowerSnapshot};
use helios::surplus::compute_pv_surplus;
use chrono::{TimeZone, Utc};
use proptest::prelude::*;

fn snapshot(grid: f64, ev: f64, battery: f64, soc: f64) -> PowerSnapshot {
    PowerSnapshot {
        grid_power_w: grid,
        ev_power_w: ev,
        battery_power_w: battery,
        battery_soc_pct: soc,
        plug: PlugState::Connected,
        ..Default::default()
    }
}

fn assessment(required_w: f64, escalate: bool, unreachable: bool) -> DeadlineAssessment {
    DeadlineAssessment {
        required_w,
        escalate,
        unreachable,
        hours_left: 1.0,
        energy_remaining_kwh: required_w / 1000.0,
        deadline: Utc.with_ymd_and_hms(2024, 6, 2, 7, 0, 0).unwrap(),
    }
}

fn mode_strategy() -> impl Strategy<Value = ChargeMode> {
    prop::sample::select(ChargeMode::ALL.to_vec())
}

proptest! {
    #[test]
    fn resolved_target_is_zero_or_within_band(
        mode in mode_strategy(),
        grid in -15_000.0f64..15_000.0,
        ev in 0.0f64..11_000.0,
        battery in -5_000.0f64..5_000.0,
        soc in 0.0f64..=100.0,
    ) {
        let c = ControlsConfig::default();
        let snap = snapshot(grid, ev, battery, soc);
        let surplus = compute_pv_surplus(&snap, &c);
        let assist = compute_assist(&snap, surplus, &c, ForecastQuality::Unknown);
        if let Resolution::Actuate(t) = resolve_target(mode, surplus, assist, None, true, &c) {
            prop_assert!(
                t.target_w == 0.0 || (c.wallbox_min_w <= t.target_w && t.target_w <= c.wallbox_max_w)
            );
        }
    }

    #[test]
    fn deadline_target_is_zero_or_within_band(
        mode in mode_strategy(),
        surplus in 0.0f64..15_000.0,
        assist in 0.0f64..2_000.0,
        required in 0.0f64..100_000.0,
        escalate in any::<bool>(),
        unreachable in any::<bool>(),
        connected in any::<bool>(),
    ) {
        let c = ControlsConfig::default();
        let deadline = assessment(required, escalate, unreachable);
        if let Resolution::Actuate(t) =
            resolve_target(mode, surplus, assist, Some(&deadline), connected, &c)
        {
            prop_assert!(
                t.target_w == 0.0 || (c.wallbox_min_w <= t.target_w && t.target_w <= c.wallbox_max_w)
            );
            if mode == ChargeMode::Smart && connected && escalate && required >= c.wallbox_min_w {
                prop_assert_eq!(t.target_w, required.min(c.wallbox_max_w));
            }
        }
    }

    #[test]
    fn ramp_step_is_bounded_and_deliverable(
        previous in prop_oneof![Just(0.0f64), 1400.0f64..=11_000.0],
        target in prop_oneof![Just(0.0f64), 1400.0f64..=11_000.0],
    ) {
        let c = ControlsConfig::default();
        let next = ramp_toward(previous, target, &c).value_w;
        prop_assert!((next - previous).abs() <= c.ramp_step_w + 1e-9);
        prop_assert!(next == 0.0 || (c.wallbox_min_w <= next && next <= c.wallbox_max_w));
    }

    #[test]
    fn surplus_is_monotonic_in_grid(
        grid in -20_000.0f64..20_000.0,
        delta in 0.0f64..5_000.0,
        ev in 0.0f64..11_000.0,
        battery in -5_000.0f64..5_000.0,
    ) {
        let c = ControlsConfig::default();
        let low = compute_pv_surplus(&snapshot(grid, ev, battery, 50.0), &c);
        let high = compute_pv_surplus(&snapshot(grid + delta, ev, battery, 50.0), &c);
        prop_assert!(high >= low);
        prop_assert!(low >= 0.0);
    }

    #[test]
    fn no_assist_at_or_below_soc_floor(
        surplus in 0.0f64..20_000.0,
        soc in 0.0f64..=20.0,
    ) {
        let c = ControlsConfig::default();
        let snap = snapshot(surplus, 0.0, 0.0, soc);
        prop_assert_eq!(compute_assist(&snap, surplus, &c, ForecastQuality::Good), 0.0);
    }
}
