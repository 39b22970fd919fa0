//! Simulated site
//!
//! A deterministic stand-in for the meter, inverter and wallbox so the binary
//! runs without hardware. PV follows a half-sine between sunrise and sunset,
//! the house draws a constant base load and the home battery absorbs or
//! covers whatever is left within its power and energy limits.

use crate::config::{SimulationConfig, VehicleConfig};
use crate::error::Result;
use crate::ports::{ChargerActuator, SnapshotSource};
use crate::snapshot::{PlugState, SensorReading};
use async_trait::async_trait;
use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use std::f64::consts::PI;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Longest step the model integrates at once
const MAX_STEP_HOURS: f64 = 1.0;

/// Fraction of peak PV output at `hour` (local, fractional)
pub fn daylight_fraction(hour: f64, sunrise: f64, sunset: f64) -> f64 {
    if sunset <= sunrise || hour <= sunrise || hour >= sunset {
        return 0.0;
    }
    let x = (hour - sunrise) / (sunset - sunrise);
    (PI * x).sin().max(0.0)
}

/// Share of the day's PV energy still to come at `hour`
pub fn remaining_fraction(hour: f64, sunrise: f64, sunset: f64) -> f64 {
    if sunset <= sunrise || hour >= sunset {
        return 0.0;
    }
    if hour <= sunrise {
        return 1.0;
    }
    let x = (hour - sunrise) / (sunset - sunrise);
    (1.0 + (PI * x).cos()) / 2.0
}

#[derive(Debug, Clone)]
pub struct SimulatedSite {
    config: SimulationConfig,
    tz: Tz,
    ev_capacity_kwh: f64,
    setpoint_w: f64,
    battery_soc_pct: f64,
    ev_soc_pct: f64,
    plugged_in: bool,
    last_step: Option<DateTime<Utc>>,
}

impl SimulatedSite {
    pub fn new(config: SimulationConfig, vehicle: &VehicleConfig, tz: Tz) -> Self {
        Self {
            battery_soc_pct: config.home_battery_initial_soc_pct.clamp(0.0, 100.0),
            ev_soc_pct: config.ev_initial_soc_pct.clamp(0.0, 100.0),
            plugged_in: config.ev_plugged_in,
            ev_capacity_kwh: vehicle.battery_capacity_kwh,
            setpoint_w: 0.0,
            last_step: None,
            config,
            tz,
        }
    }

    pub fn shared(self) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(self))
    }

    pub fn set_power(&mut self, watts: f64) {
        self.setpoint_w = watts.max(0.0);
    }

    pub fn plug_in(&mut self, ev_soc_pct: f64) {
        self.plugged_in = true;
        self.ev_soc_pct = ev_soc_pct.clamp(0.0, 100.0);
    }

    pub fn unplug(&mut self) {
        self.plugged_in = false;
    }

    pub fn battery_soc_pct(&self) -> f64 {
        self.battery_soc_pct
    }

    pub fn ev_soc_pct(&self) -> f64 {
        self.ev_soc_pct
    }

    fn local_hour(&self, now: DateTime<Utc>) -> f64 {
        let local = now.with_timezone(&self.tz);
        f64::from(local.hour()) + f64::from(local.minute()) / 60.0 + f64::from(local.second()) / 3600.0
    }

    /// Advance the model to `now` and report what the meters would show
    pub fn reading_at(&mut self, now: DateTime<Utc>) -> SensorReading {
        let dt_h = self
            .last_step
            .map_or(0.0, |last| (now - last).num_milliseconds() as f64 / 3_600_000.0)
            .clamp(0.0, MAX_STEP_HOURS);
        self.last_step = Some(now);

        let hour = self.local_hour(now);
        let cfg = &self.config;
        let pv_w = cfg.pv_peak_w.max(0.0) * daylight_fraction(hour, cfg.sunrise_hour, cfg.sunset_hour);
        let house_w = cfg.house_load_w.max(0.0);

        let ev_w = if self.plugged_in && self.ev_soc_pct < 100.0 {
            self.setpoint_w
        } else {
            0.0
        };

        // Battery takes the imbalance first, the grid the rest
        let net_w = pv_w - house_w - ev_w;
        let capacity_wh = cfg.home_battery_capacity_kwh.max(0.0) * 1000.0;
        let battery_w = if capacity_wh <= 0.0 || dt_h <= 0.0 {
            net_w.clamp(-cfg.home_battery_max_power_w, cfg.home_battery_max_power_w)
        } else if net_w >= 0.0 {
            let room_w = (100.0 - self.battery_soc_pct) / 100.0 * capacity_wh / dt_h;
            net_w.min(cfg.home_battery_max_power_w).min(room_w)
        } else {
            let stored_w = self.battery_soc_pct / 100.0 * capacity_wh / dt_h;
            -(-net_w).min(cfg.home_battery_max_power_w).min(stored_w)
        };
        if capacity_wh > 0.0 {
            self.battery_soc_pct =
                (self.battery_soc_pct + battery_w * dt_h / capacity_wh * 100.0).clamp(0.0, 100.0);
        }
        let grid_w = net_w - battery_w;

        if self.ev_capacity_kwh > 0.0 {
            self.ev_soc_pct =
                (self.ev_soc_pct + ev_w * dt_h / (self.ev_capacity_kwh * 1000.0) * 100.0).min(100.0);
        }

        let plug = match (self.plugged_in, ev_w > 0.0) {
            (false, _) => PlugState::Disconnected,
            (true, true) => PlugState::Charging,
            (true, false) => PlugState::Connected,
        };

        SensorReading {
            timestamp: now,
            grid_power_w: Some(grid_w),
            house_power_w: Some(house_w),
            battery_power_w: Some(battery_w),
            ev_power_w: Some(ev_w),
            pv_dc_power_w: Some(pv_w),
            battery_soc_pct: Some(self.battery_soc_pct),
            ev_soc_pct: self.plugged_in.then_some(self.ev_soc_pct),
            pv_forecast_remaining_kwh: Some(
                cfg.pv_daily_forecast_kwh.max(0.0)
                    * remaining_fraction(hour, cfg.sunrise_hour, cfg.sunset_hour),
            ),
            plug: Some(plug),
        }
    }
}

/// Sensor side of the simulated site
#[derive(Debug, Clone)]
pub struct SimSource {
    site: Arc<Mutex<SimulatedSite>>,
}

impl SimSource {
    pub fn new(site: Arc<Mutex<SimulatedSite>>) -> Self {
        Self { site }
    }
}

#[async_trait]
impl SnapshotSource for SimSource {
    async fn read(&mut self) -> Result<SensorReading> {
        Ok(self.site.lock().await.reading_at(Utc::now()))
    }
}

/// Wallbox side of the simulated site
#[derive(Debug, Clone)]
pub struct SimCharger {
    site: Arc<Mutex<SimulatedSite>>,
}

impl SimCharger {
    pub fn new(site: Arc<Mutex<SimulatedSite>>) -> Self {
        Self { site }
    }
}

#[async_trait]
impl ChargerActuator for SimCharger {
    async fn set_power(&mut self, watts: f64) -> Result<()> {
        self.site.lock().await.set_power(watts);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn site() -> SimulatedSite {
        SimulatedSite::new(
            SimulationConfig::default(),
            &VehicleConfig::default(),
            chrono_tz::UTC,
        )
    }

    #[test]
    fn daylight_curve_peaks_at_noon() {
        assert_eq!(daylight_fraction(6.0, 7.0, 20.0), 0.0);
        assert_eq!(daylight_fraction(21.0, 7.0, 20.0), 0.0);
        assert!((daylight_fraction(13.5, 7.0, 20.0) - 1.0).abs() < 1e-9);
        assert!((remaining_fraction(13.5, 7.0, 20.0) - 0.5).abs() < 1e-9);
        assert_eq!(remaining_fraction(5.0, 7.0, 20.0), 1.0);
    }

    #[test]
    fn night_reading_imports_or_discharges() {
        let mut s = site();
        let midnight = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        s.reading_at(midnight);
        let r = s.reading_at(midnight + chrono::Duration::minutes(1));
        assert_eq!(r.pv_dc_power_w, Some(0.0));
        // Battery covers the house load
        assert_eq!(r.battery_power_w, Some(-450.0));
        assert!(r.grid_power_w.unwrap().abs() < 1e-9);
        assert_eq!(r.pv_forecast_remaining_kwh, Some(40.0));
    }

    #[test]
    fn charging_ev_draws_setpoint() {
        let mut s = site();
        s.set_power(3700.0);
        let noon = Utc.with_ymd_and_hms(2024, 6, 1, 13, 30, 0).unwrap();
        s.reading_at(noon);
        let r = s.reading_at(noon + chrono::Duration::minutes(30));
        assert_eq!(r.ev_power_w, Some(3700.0));
        assert_eq!(r.plug, Some(PlugState::Charging));
        assert!(s.ev_soc_pct() > 40.0);

        s.unplug();
        let r = s.reading_at(noon + chrono::Duration::minutes(31));
        assert_eq!(r.ev_power_w, Some(0.0));
        assert_eq!(r.plug, Some(PlugState::Disconnected));
        assert_eq!(r.ev_soc_pct, None);
    }

    #[tokio::test]
    async fn ports_share_one_site() {
        let shared = site().shared();
        let mut charger = SimCharger::new(shared.clone());
        let mut source = SimSource::new(shared);
        charger.set_power(2000.0).await.unwrap();
        let r = source.read().await.unwrap();
        assert_eq!(r.ev_power_w, Some(2000.0));
    }
}
