use helios::assist::{AssistInactive, AssistOutcome, ForecastQuality, compute_assist, evaluate_assist};
use helios::config::ControlsConfig;
use helios::controls::{ChargeMode, resolve_target};
use helios::ramp::ramp_toward;
use helios::snapshot::{PlugState, PowerSnapshot};
use helios::surplus::compute_pv_surplus;

fn cfg() -> ControlsConfig {
    ControlsConfig {
        grid_reserve_w: 0.0,
        ..ControlsConfig::default()
    }
}

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

#[test]
fn pv_sufficient_needs_no_assist() {
    let c = cfg();
    let snap = snapshot(3000.0, 0.0, 0.0, 60.0);
    let surplus = compute_pv_surplus(&snap, &c);
    assert_eq!(surplus, 3000.0);

    let assist = evaluate_assist(&snap, surplus, &c, ForecastQuality::Unknown);
    assert_eq!(
        assist,
        AssistOutcome::Inactive {
            reason: AssistInactive::SurplusSufficient
        }
    );

    let resolved = resolve_target(ChargeMode::PvSurplus, surplus, 0.0, None, true, &c);
    let helios::controls::Resolution::Actuate(t) = resolved else {
        panic!("expected actuation");
    };
    assert_eq!(t.target_w, 3000.0);
    // Ramps toward the target from zero
    assert_eq!(ramp_toward(0.0, t.target_w, &c).value_w, 1500.0);
}

#[test]
fn battery_bridges_gap_to_minimum() {
    let c = cfg();
    let snap = snapshot(800.0, 0.0, 0.0, 60.0);
    let surplus = compute_pv_surplus(&snap, &c);
    assert_eq!(surplus, 800.0);
    let assist = compute_assist(&snap, surplus, &c, ForecastQuality::Unknown);
    assert_eq!(assist, 600.0);

    let resolved = resolve_target(ChargeMode::PvSurplus, surplus, assist, None, true, &c);
    let helios::controls::Resolution::Actuate(t) = resolved else {
        panic!("expected actuation");
    };
    assert_eq!(t.target_w, 1400.0);
}

#[test]
fn reserve_and_discharging_battery_lower_surplus() {
    let c = ControlsConfig::default();
    assert_eq!(compute_pv_surplus(&snapshot(3000.0, 0.0, 0.0, 60.0), &c), 2900.0);
    assert_eq!(compute_pv_surplus(&snapshot(0.0, 2000.0, -500.0, 60.0), &c), 1400.0);
    assert_eq!(compute_pv_surplus(&snapshot(-4000.0, 0.0, 0.0, 60.0), &c), 0.0);
}

#[test]
fn assist_never_creates_surplus_from_nothing() {
    let c = cfg();
    let snap = snapshot(-200.0, 0.0, 0.0, 90.0);
    assert_eq!(compute_assist(&snap, 0.0, &c, ForecastQuality::Good), 0.0);
}

#[test]
fn weak_forecast_throttles_assist() {
    let c = cfg();
    let mut snap = snapshot(800.0, 0.0, 0.0, 60.0);
    snap.pv_forecast_remaining_kwh = Some(2.5);
    let forecast = ForecastQuality::from_snapshot(&snap, &c);
    assert_eq!(forecast, ForecastQuality::Weak { factor: 0.25 });
    assert_eq!(compute_assist(&snap, 800.0, &c, forecast), 150.0);

    snap.pv_forecast_remaining_kwh = Some(0.0);
    let exhausted = ForecastQuality::from_snapshot(&snap, &c);
    assert_eq!(
        evaluate_assist(&snap, 800.0, &c, exhausted),
        AssistOutcome::Inactive {
            reason: AssistInactive::ForecastExhausted
        }
    );
}

#[test]
fn identical_snapshots_give_identical_outputs() {
    let c = cfg();
    let snap = snapshot(1100.0, 300.0, -50.0, 45.0);
    let a = compute_pv_surplus(&snap, &c);
    let b = compute_pv_surplus(&snap.clone(), &c);
    assert_eq!(a, b);
    assert_eq!(
        evaluate_assist(&snap, a, &c, ForecastQuality::Unknown),
        evaluate_assist(&snap, b, &c, ForecastQuality::Unknown)
    );
}
