//! Configuration management for Helios
//!
//! This module handles loading, validation, and management of the application
//! configuration from YAML files. Every section defaults sensibly so a partial
//! file is enough; `validate()` is the single gate that rejects an unsafe
//! configuration before the control loop starts.

use crate::error::{HeliosError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

mod defaults;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Config {
    /// Power limits and control loop tuning
    pub controls: ControlsConfig,

    /// Vehicle battery parameters used for SoC based targets
    pub vehicle: VehicleConfig,

    /// Departure defaults for full-by-morning charging
    pub departure: DepartureConfig,

    /// Energy prices for session cost calculation
    pub pricing: PricingConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Web server binding configuration
    pub web: WebConfig,

    /// State file location
    pub persistence: PersistenceConfig,

    /// Simulated site used by the standalone binary
    pub simulation: SimulationConfig,

    /// IANA timezone for departure times (e.g. "Europe/Amsterdam")
    pub timezone: String,
}

/// Power limits and control loop tuning
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ControlsConfig {
    /// Minimum sustainable wallbox power in watts
    pub wallbox_min_w: f64,

    /// Maximum rated wallbox power in watts
    pub wallbox_max_w: f64,

    /// Fixed power for Eco mode in watts
    pub eco_power_w: f64,

    /// Fixed power for Fast mode in watts
    pub fast_power_w: f64,

    /// Export kept back from the surplus as a safety margin in watts
    pub grid_reserve_w: f64,

    /// Home battery SoC floor; no assist at or below this percentage
    pub battery_min_soc_pct: f64,

    /// Maximum battery discharge used to reach the wallbox minimum in watts
    pub battery_assist_max_w: f64,

    /// Maximum setpoint change per cycle in watts
    pub ramp_step_w: f64,

    /// Control cycle interval in seconds
    pub control_interval_s: u64,

    /// Remaining-day PV forecast above which assist is not throttled (kWh)
    pub pv_forecast_good_kwh: f64,

    /// Timeout applied to every sensor, actuator and publish call (ms)
    pub io_timeout_ms: u64,

    /// Consecutive sensor failures tolerated before the setpoint decays to zero
    pub max_read_failures: u32,

    /// Additional actuator attempts within one cycle
    pub actuator_retries: u32,

    /// Delay between actuator attempts (ms)
    pub retry_delay_ms: u64,
}

/// Vehicle battery parameters
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct VehicleConfig {
    /// Usable battery capacity in kWh
    pub battery_capacity_kwh: f64,

    /// Charger-to-battery efficiency (0..1]
    pub charge_efficiency: f64,
}

/// Departure defaults
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DepartureConfig {
    /// Default departure time of day, HH:MM in the configured timezone
    pub default_time: String,

    /// Energy target used when none is supplied with the command (kWh)
    pub default_target_energy_kwh: f64,

    /// Whether full-by-morning is enabled at startup
    pub full_by_morning: bool,
}

/// Pricing configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct PricingConfig {
    /// Grid import price per kWh
    pub grid_rate_per_kwh: f64,

    /// Feed-in tariff per kWh (export revenue foregone when charging from PV)
    pub feed_in_rate_per_kwh: f64,

    /// Currency symbol
    pub currency_symbol: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Optional console level override
    pub console_level: Option<String>,

    /// Optional file level override
    pub file_level: Option<String>,

    /// Path to log file (or directory)
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

/// Web server configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct WebConfig {
    /// Whether the HTTP API is served
    pub enabled: bool,

    /// Bind address
    pub host: String,

    /// TCP port
    pub port: u16,
}

/// State persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct PersistenceConfig {
    /// JSON state file path
    pub path: String,

    /// Number of completed sessions kept in history
    pub history_size: usize,
}

/// Simulated site parameters
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SimulationConfig {
    /// PV peak output at solar noon in watts
    pub pv_peak_w: f64,

    /// Hour of sunrise (local)
    pub sunrise_hour: f64,

    /// Hour of sunset (local)
    pub sunset_hour: f64,

    /// Constant house base load in watts
    pub house_load_w: f64,

    /// Home battery capacity in kWh
    pub home_battery_capacity_kwh: f64,

    /// Home battery charge/discharge limit in watts
    pub home_battery_max_power_w: f64,

    /// Home battery SoC at startup
    pub home_battery_initial_soc_pct: f64,

    /// Vehicle SoC at startup
    pub ev_initial_soc_pct: f64,

    /// Whether a vehicle is plugged in at startup
    pub ev_plugged_in: bool,

    /// Total PV energy expected for the day, used for the forecast (kWh)
    pub pv_daily_forecast_kwh: f64,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the first default location that exists
    pub fn load() -> Result<Self> {
        let default_paths = [
            "helios_config.yaml",
            "/data/helios_config.yaml",
            "/etc/helios/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        Ok(Config::default())
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Parsed timezone
    pub fn tz(&self) -> Result<chrono_tz::Tz> {
        self.timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|_| HeliosError::invalid_config("timezone", "Unknown IANA timezone"))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let c = &self.controls;

        if !(c.wallbox_min_w > 0.0) {
            return Err(HeliosError::invalid_config(
                "controls.wallbox_min_w",
                "Must be positive",
            ));
        }
        if c.wallbox_min_w > c.wallbox_max_w {
            return Err(HeliosError::invalid_config(
                "controls.wallbox_max_w",
                "Must not be below wallbox_min_w",
            ));
        }
        if c.eco_power_w < c.wallbox_min_w || c.eco_power_w > c.wallbox_max_w {
            return Err(HeliosError::invalid_config(
                "controls.eco_power_w",
                "Must lie within [wallbox_min_w, wallbox_max_w]",
            ));
        }
        if c.fast_power_w < c.wallbox_min_w || c.fast_power_w > c.wallbox_max_w {
            return Err(HeliosError::invalid_config(
                "controls.fast_power_w",
                "Must lie within [wallbox_min_w, wallbox_max_w]",
            ));
        }
        if c.grid_reserve_w < 0.0 {
            return Err(HeliosError::invalid_config(
                "controls.grid_reserve_w",
                "Must not be negative",
            ));
        }
        if !(0.0..=100.0).contains(&c.battery_min_soc_pct) {
            return Err(HeliosError::invalid_config(
                "controls.battery_min_soc_pct",
                "Must be between 0 and 100",
            ));
        }
        if c.battery_assist_max_w < 0.0 {
            return Err(HeliosError::invalid_config(
                "controls.battery_assist_max_w",
                "Must not be negative",
            ));
        }
        if c.ramp_step_w < c.wallbox_min_w {
            return Err(HeliosError::invalid_config(
                "controls.ramp_step_w",
                "Must be at least wallbox_min_w so charging can start and stop within one cycle",
            ));
        }
        if c.control_interval_s == 0 {
            return Err(HeliosError::invalid_config(
                "controls.control_interval_s",
                "Must be greater than 0",
            ));
        }
        if !(c.pv_forecast_good_kwh > 0.0) {
            return Err(HeliosError::invalid_config(
                "controls.pv_forecast_good_kwh",
                "Must be positive",
            ));
        }
        if c.io_timeout_ms == 0 {
            return Err(HeliosError::invalid_config(
                "controls.io_timeout_ms",
                "Must be greater than 0",
            ));
        }

        if !(self.vehicle.battery_capacity_kwh > 0.0) {
            return Err(HeliosError::invalid_config(
                "vehicle.battery_capacity_kwh",
                "Must be positive",
            ));
        }
        if !(self.vehicle.charge_efficiency > 0.0 && self.vehicle.charge_efficiency <= 1.0) {
            return Err(HeliosError::invalid_config(
                "vehicle.charge_efficiency",
                "Must be within (0, 1]",
            ));
        }

        if crate::deadline::parse_time_of_day(&self.departure.default_time).is_err() {
            return Err(HeliosError::invalid_config(
                "departure.default_time",
                "Expected HH:MM",
            ));
        }
        if self.departure.default_target_energy_kwh < 0.0 {
            return Err(HeliosError::invalid_config(
                "departure.default_target_energy_kwh",
                "Must not be negative",
            ));
        }

        self.tz()?;

        if crate::logging::parse_log_level(&self.logging.level).is_err() {
            return Err(HeliosError::invalid_config(
                "logging.level",
                "Expected one of TRACE, DEBUG, INFO, WARN, ERROR",
            ));
        }

        if self.persistence.history_size == 0 {
            return Err(HeliosError::invalid_config(
                "persistence.history_size",
                "Must be greater than 0",
            ));
        }

        Ok(())
    }
}
