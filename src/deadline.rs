//! Deadline escalation
//!
//! With full-by-morning enabled, the power needed to deliver the remaining
//! session energy before departure is compared against what PV and battery
//! assist offer. When they fall short the Smart mode escalates toward that
//! requirement, capped at the wallbox maximum.

use crate::config::{ControlsConfig, VehicleConfig};
use crate::error::{HeliosError, Result};
use crate::session::SessionState;
use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Floor on the time left, so an overdue deadline yields a finite requirement
pub const MIN_HOURS_LEFT: f64 = 1.0 / 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeadlineAssessment {
    /// Average power needed from now until the deadline
    pub required_w: f64,
    /// PV plus assist cannot cover the requirement
    pub escalate: bool,
    /// Even the wallbox maximum cannot cover the requirement
    pub unreachable: bool,
    pub hours_left: f64,
    pub energy_remaining_kwh: f64,
    pub deadline: DateTime<Utc>,
}

/// Power required to meet the session target by its deadline.
///
/// `None` unless full-by-morning is enabled and a deadline is set.
pub fn compute_required_power(
    session: &SessionState,
    now: DateTime<Utc>,
    available_w: f64,
    config: &ControlsConfig,
) -> Option<DeadlineAssessment> {
    if !session.full_by_morning_enabled {
        return None;
    }
    let deadline = session.departure_deadline?;

    let hours_left = ((deadline - now).num_milliseconds() as f64 / 3_600_000.0).max(MIN_HOURS_LEFT);
    let energy_remaining_kwh =
        (session.target_energy_kwh - session.session_energy_delivered_kwh).max(0.0);
    let required_w = energy_remaining_kwh * 1000.0 / hours_left;

    Some(DeadlineAssessment {
        required_w,
        escalate: required_w > available_w,
        unreachable: required_w > config.wallbox_max_w,
        hours_left,
        energy_remaining_kwh,
        deadline,
    })
}

/// Parse an `HH:MM` time of day
pub fn parse_time_of_day(value: &str) -> Result<NaiveTime> {
    Ok(NaiveTime::parse_from_str(value.trim(), "%H:%M")?)
}

/// Next occurrence of `time` in `tz` strictly after `now`.
///
/// A time that falls into a DST gap resolves to the first valid instant
/// after it.
pub fn next_departure(now: DateTime<Utc>, time: NaiveTime, tz: Tz) -> Result<DateTime<Utc>> {
    let local_today = now.with_timezone(&tz).date_naive();
    for day_offset in 0..3 {
        let date = local_today + Duration::days(day_offset);
        let naive = date.and_time(time);
        let resolved = tz
            .from_local_datetime(&naive)
            .earliest()
            .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest());
        if let Some(local) = resolved {
            let utc = local.with_timezone(&Utc);
            if utc > now {
                return Ok(utc);
            }
        }
    }
    Err(HeliosError::generic(format!(
        "Could not resolve departure time {} in {}",
        time, tz
    )))
}

/// Session energy target that brings the vehicle from `ev_soc_pct` to
/// `target_soc_pct`, on top of what was already delivered.
pub fn target_energy_for_soc(
    delivered_kwh: f64,
    ev_soc_pct: f64,
    target_soc_pct: f64,
    vehicle: &VehicleConfig,
) -> f64 {
    let soc_gap = (target_soc_pct.clamp(0.0, 100.0) - ev_soc_pct).max(0.0);
    delivered_kwh + soc_gap / 100.0 * vehicle.battery_capacity_kwh / vehicle.charge_efficiency
}
