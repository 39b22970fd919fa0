#![no_main]
use helios::assist::{ForecastQuality, compute_assist};
use helios::config::ControlsConfig;
use helios::controls::{ChargeMode, Resolution, resolve_target};
use helios::ramp::ramp_toward;
use helios::snapshot::{PowerSnapshot, SensorReading};
use helios::surplus::compute_pv_surplus;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Interpret the input as a JSON sensor reading
    let Ok(reading) = serde_json::from_slice::<SensorReading>(data) else {
        return;
    };
    let Ok(snap) = PowerSnapshot::assemble(reading, None) else {
        return;
    };

    let c = ControlsConfig::default();
    let surplus = compute_pv_surplus(&snap, &c);
    let forecast = ForecastQuality::from_snapshot(&snap, &c);
    let assist = compute_assist(&snap, surplus, &c, forecast);
    assert!(surplus >= 0.0 && assist >= 0.0);

    for mode in ChargeMode::ALL {
        if let Resolution::Actuate(t) =
            resolve_target(mode, surplus, assist, None, snap.vehicle_connected(), &c)
        {
            assert!(t.target_w == 0.0 || (c.wallbox_min_w..=c.wallbox_max_w).contains(&t.target_w));
            let step = ramp_toward(c.wallbox_max_w, t.target_w, &c);
            assert!(step.value_w == 0.0 || step.value_w >= c.wallbox_min_w);
        }
    }
});
