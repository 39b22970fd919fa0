use chrono::{DateTime, Utc};

use crate::commands::ControlInputs;
use crate::decision::{Decision, ReasonStep};
use crate::snapshot::{PlugState, PowerSnapshot};

use super::bounded;
use super::types::{ChargeStatus, ControllerState};

impl super::ChargeController {
    /// Controller state implied by the last cycle
    fn derive_state(&self, decision: &Decision, inputs: &ControlInputs) -> ControllerState {
        if inputs.safe_mode {
            return ControllerState::SafeMode;
        }
        let degraded = self.consecutive_read_failures > 0
            || !self.actuator_ok
            || decision
                .reasoning
                .contains(|s| matches!(s, ReasonStep::StaleSensors { .. }));
        if degraded {
            ControllerState::Degraded
        } else {
            ControllerState::Running
        }
    }

    pub(crate) fn build_status(
        &self,
        decision: &Decision,
        inputs: &ControlInputs,
        controller_state: ControllerState,
        now: DateTime<Utc>,
    ) -> ChargeStatus {
        let session = self.sessions.state();
        let snapshot: Option<&PowerSnapshot> = self.last_snapshot.as_ref();
        let pricing = &self.config.pricing;

        ChargeStatus {
            timestamp: now,
            target_power_w: decision.target_power_w,
            actual_power_w: snapshot.map_or(0.0, |s| s.ev_power_w),
            mode: decision.mode,
            raw_mode: inputs.mode.clone(),
            session_energy_delivered_kwh: session.session_energy_delivered_kwh,
            surplus_w: self.last_surplus_w,
            assist_w: self.last_assist_w,
            summary: decision.reasoning.summary(),
            reasoning: decision.reasoning.clone(),
            controller_state,
            plug: snapshot.map_or(PlugState::Disconnected, |s| s.plug),
            session_phase: session.phase,
            session_id: session.id.clone(),
            target_energy_kwh: session.target_energy_kwh,
            departure_deadline: session.departure_deadline,
            full_by_morning: session.full_by_morning_enabled,
            deadline_unreachable: self.deadline_unreachable,
            solar_energy_kwh: session.solar_energy_kwh,
            grid_energy_kwh: session.grid_energy_kwh,
            session_cost: session.cost(pricing),
            currency: pricing.currency_symbol.clone(),
            battery_soc_pct: snapshot.map(|s| s.battery_soc_pct),
            ev_soc_pct: snapshot.and_then(|s| s.ev_soc_pct),
            stale_fields: snapshot.map(|s| s.stale_fields.clone()).unwrap_or_default(),
            consecutive_read_failures: self.consecutive_read_failures,
            actuator_ok: self.actuator_ok,
            safe_mode: inputs.safe_mode,
            total_cycles: self.total_cycles,
            overrun_count: self.overrun_count,
            last_cycle_duration_ms: self.last_cycle_duration_ms,
            control_interval_s: self.config.controls.control_interval_s,
        }
    }

    /// Publish the status of this cycle and refresh the watch channels
    pub(crate) async fn publish(&mut self, decision: &Decision, inputs: &ControlInputs) {
        let controller_state = self.derive_state(decision, inputs);
        let status = self.build_status(decision, inputs, controller_state, decision.timestamp);

        self.state_tx.send_if_modified(|current| {
            if *current == controller_state {
                return false;
            }
            *current = controller_state;
            true
        });

        let limit = self.io_timeout();
        if let Err(e) = bounded(limit, "status publish", self.publisher.publish_status(&status)).await {
            self.logger.warn(&format!("Failed to publish status: {}", e));
        }

        let mut stats = self
            .sessions
            .get_session_stats(decision.timestamp, &self.config.pricing);
        if let Some(map) = stats.as_object_mut() {
            map.insert(
                "history".to_string(),
                serde_json::to_value(self.sessions.history().collect::<Vec<_>>())
                    .unwrap_or_default(),
            );
            map.insert(
                "last_session".to_string(),
                serde_json::to_value(&self.sessions.last_session).unwrap_or_default(),
            );
        }
        self.sessions_tx.send_replace(stats);

        self.last_status = Some(status);
    }
}
