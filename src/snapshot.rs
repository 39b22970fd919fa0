//! Power flow snapshots
//!
//! A [`SensorReading`] is what the site delivers each cycle: every measured
//! quantity is optional because meters drop out independently. The controller
//! turns it into an immutable [`PowerSnapshot`] by carrying missing values over
//! from the previous cycle and listing them in `stale_fields`. A missing value
//! is never replaced by zero; without a previous value the reading is rejected.
//!
//! Sign conventions:
//! - `grid_power_w`: positive = export to the grid, negative = import
//! - `battery_power_w`: positive = battery charging, negative = discharging
//! - all other powers are non-negative magnitudes

use crate::error::{HeliosError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Vehicle connection as reported by the charger hardware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlugState {
    #[default]
    Disconnected,
    /// Plugged in, not drawing power
    Connected,
    /// Plugged in and drawing power
    Charging,
}

impl PlugState {
    pub fn is_connected(self) -> bool {
        !matches!(self, Self::Disconnected)
    }

    /// Numeric status code used by charger status registers (0/1/2)
    pub fn code(self) -> u8 {
        match self {
            Self::Disconnected => 0,
            Self::Connected => 1,
            Self::Charging => 2,
        }
    }
}

/// Raw per-cycle reading from the site
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SensorReading {
    pub timestamp: DateTime<Utc>,
    pub grid_power_w: Option<f64>,
    pub house_power_w: Option<f64>,
    pub battery_power_w: Option<f64>,
    pub ev_power_w: Option<f64>,
    pub pv_dc_power_w: Option<f64>,
    pub battery_soc_pct: Option<f64>,
    pub ev_soc_pct: Option<f64>,
    pub pv_forecast_remaining_kwh: Option<f64>,
    pub plug: Option<PlugState>,
}

/// Immutable, timestamped view of the site's power flows for one cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PowerSnapshot {
    pub timestamp: DateTime<Utc>,
    pub grid_power_w: f64,
    pub house_power_w: f64,
    pub battery_power_w: f64,
    pub ev_power_w: f64,
    pub pv_dc_power_w: f64,
    pub battery_soc_pct: f64,
    pub ev_soc_pct: Option<f64>,
    pub pv_forecast_remaining_kwh: Option<f64>,
    pub plug: PlugState,
    /// Fields carried over from the previous snapshot
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stale_fields: Vec<String>,
}

fn finite(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite())
}

struct Assembler<'a> {
    previous: Option<&'a PowerSnapshot>,
    stale: Vec<String>,
    missing: Vec<&'static str>,
}

impl Assembler<'_> {
    fn required<T: Copy>(
        &mut self,
        name: &'static str,
        value: Option<T>,
        prev: impl Fn(&PowerSnapshot) -> T,
        fallback: T,
    ) -> T {
        if let Some(v) = value {
            return v;
        }
        match self.previous {
            Some(p) => {
                self.stale.push(name.to_string());
                prev(p)
            }
            None => {
                self.missing.push(name);
                fallback
            }
        }
    }

    fn optional(
        &mut self,
        name: &'static str,
        value: Option<f64>,
        prev: impl Fn(&PowerSnapshot) -> Option<f64>,
    ) -> Option<f64> {
        if value.is_some() {
            return value;
        }
        let carried = self.previous.and_then(prev);
        if carried.is_some() {
            self.stale.push(name.to_string());
        }
        carried
    }
}

impl PowerSnapshot {
    /// Build a snapshot from a reading, filling gaps from `previous`.
    ///
    /// Non-finite values count as missing. Returns `SensorUnavailable` when a
    /// required field is missing and there is no previous snapshot to carry
    /// it from. The vehicle SoC is dropped rather than carried while the
    /// vehicle is unplugged.
    pub fn assemble(reading: SensorReading, previous: Option<&PowerSnapshot>) -> Result<Self> {
        let mut a = Assembler {
            previous,
            stale: Vec::new(),
            missing: Vec::new(),
        };

        let grid_power_w = a.required("grid_power_w", finite(reading.grid_power_w), |p| p.grid_power_w, 0.0);
        let house_power_w =
            a.required("house_power_w", finite(reading.house_power_w), |p| p.house_power_w, 0.0);
        let battery_power_w = a.required(
            "battery_power_w",
            finite(reading.battery_power_w),
            |p| p.battery_power_w,
            0.0,
        );
        let ev_power_w = a.required("ev_power_w", finite(reading.ev_power_w), |p| p.ev_power_w, 0.0);
        let pv_dc_power_w =
            a.required("pv_dc_power_w", finite(reading.pv_dc_power_w), |p| p.pv_dc_power_w, 0.0);
        let battery_soc_pct = a.required(
            "battery_soc_pct",
            finite(reading.battery_soc_pct).filter(|s| (0.0..=100.0).contains(s)),
            |p| p.battery_soc_pct,
            0.0,
        );
        let plug = a.required("plug", reading.plug, |p| p.plug, PlugState::Disconnected);

        if !a.missing.is_empty() {
            return Err(HeliosError::sensor_unavailable(format!(
                "missing {} with no previous value",
                a.missing.join(", ")
            )));
        }

        let ev_soc_pct = if plug.is_connected() {
            a.optional("ev_soc_pct", finite(reading.ev_soc_pct), |p| {
                if p.plug.is_connected() { p.ev_soc_pct } else { None }
            })
        } else {
            finite(reading.ev_soc_pct)
        };
        let pv_forecast_remaining_kwh = a.optional(
            "pv_forecast_remaining_kwh",
            finite(reading.pv_forecast_remaining_kwh).map(|k| k.max(0.0)),
            |p| p.pv_forecast_remaining_kwh,
        );

        Ok(Self {
            timestamp: reading.timestamp,
            grid_power_w,
            house_power_w,
            battery_power_w,
            ev_power_w: ev_power_w.max(0.0),
            pv_dc_power_w: pv_dc_power_w.max(0.0),
            battery_soc_pct,
            ev_soc_pct,
            pv_forecast_remaining_kwh,
            plug,
            stale_fields: a.stale,
        })
    }

    pub fn vehicle_connected(&self) -> bool {
        self.plug.is_connected()
    }

    pub fn is_stale(&self) -> bool {
        !self.stale_fields.is_empty()
    }
}
