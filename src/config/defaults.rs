use super::*;

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            wallbox_min_w: 1400.0,
            wallbox_max_w: 11000.0,
            eco_power_w: 4200.0,
            fast_power_w: 11000.0,
            grid_reserve_w: 100.0,
            battery_min_soc_pct: 20.0,
            battery_assist_max_w: 2000.0,
            ramp_step_w: 1500.0,
            control_interval_s: 30,
            pv_forecast_good_kwh: 10.0,
            io_timeout_ms: 5000,
            max_read_failures: 3,
            actuator_retries: 1,
            retry_delay_ms: 250,
        }
    }
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            battery_capacity_kwh: 60.0,
            charge_efficiency: 0.9,
        }
    }
}

impl Default for DepartureConfig {
    fn default() -> Self {
        Self {
            default_time: "07:00".to_string(),
            default_target_energy_kwh: 20.0,
            full_by_morning: false,
        }
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            grid_rate_per_kwh: 0.30,
            feed_in_rate_per_kwh: 0.08,
            currency_symbol: "€".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            console_level: None,
            file_level: None,
            file: "/tmp/helios.log".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8088,
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            path: "/data/helios_state.json".to_string(),
            history_size: 100,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            pv_peak_w: 8000.0,
            sunrise_hour: 7.0,
            sunset_hour: 20.0,
            house_load_w: 450.0,
            home_battery_capacity_kwh: 10.0,
            home_battery_max_power_w: 3000.0,
            home_battery_initial_soc_pct: 60.0,
            ev_initial_soc_pct: 40.0,
            ev_plugged_in: true,
            pv_daily_forecast_kwh: 40.0,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            controls: ControlsConfig::default(),
            vehicle: VehicleConfig::default(),
            departure: DepartureConfig::default(),
            pricing: PricingConfig::default(),
            logging: LoggingConfig::default(),
            web: WebConfig::default(),
            persistence: PersistenceConfig::default(),
            simulation: SimulationConfig::default(),
            timezone: "UTC".to_string(),
        }
    }
}
