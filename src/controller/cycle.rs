use chrono::{DateTime, Utc};

use crate::assist::{AssistOutcome, ForecastQuality, evaluate_assist};
use crate::commands::ControlInputs;
use crate::controls::{BandAdjustment, ChargeMode, Resolution, TargetBasis, apply_band, resolve_target};
use crate::deadline::{
    DeadlineAssessment, compute_required_power, next_departure, parse_time_of_day,
    target_energy_for_soc,
};
use crate::decision::{Decision, ReasonStep, Reasoning};
use crate::ramp::ramp_toward;
use crate::session::SessionStatus;
use crate::snapshot::PowerSnapshot;
use crate::surplus::compute_pv_surplus;

use super::bounded;
use super::types::DeadlineAlert;

/// What the cycle does with the charger
#[derive(Debug, Clone, Copy, PartialEq)]
enum Action {
    Write(f64),
    Hold,
    /// Manual mode: adopt the observed power as the setpoint without writing
    Adopt(f64),
}

/// Inputs to the policy pipeline derived from one snapshot
struct Flows {
    surplus_w: f64,
    assist: AssistOutcome,
}

impl super::ChargeController {
    /// Execute one control cycle and return its decision.
    ///
    /// Never fails: sensor, mode and actuator errors are folded into the
    /// decision's reasoning and the setpoint falls back accordingly.
    pub async fn run_cycle(&mut self) -> Decision {
        let inputs = self.inputs_rx.borrow().clone();
        let previous_w = self.sessions.state().last_setpoint_w;
        let mut reasoning = Reasoning::new();

        let snapshot = self.read_snapshot(&mut reasoning).await;
        let now = snapshot.as_ref().map_or_else(Utc::now, |s| s.timestamp);

        let mode = match inputs.mode.parse::<ChargeMode>() {
            Ok(mode) => {
                if self.last_mode != Some(mode) {
                    self.logger.info(&format!(
                        "Mode {} -> {}",
                        self.last_mode.map_or("none", ChargeMode::as_str),
                        mode
                    ));
                }
                self.last_mode = Some(mode);
                Some(mode)
            }
            Err(e) => {
                self.logger.error(&format!("Cycle rejected: {}", e));
                reasoning.push(ReasonStep::InvalidMode {
                    value: inputs.mode.clone(),
                    message: e.to_string(),
                });
                None
            }
        };

        let flows = snapshot.as_ref().map(|snap| {
            self.track_session(snap, &inputs, now);
            let surplus_w = compute_pv_surplus(snap, &self.config.controls);
            let forecast = ForecastQuality::from_snapshot(snap, &self.config.controls);
            let assist = evaluate_assist(snap, surplus_w, &self.config.controls, forecast);
            Flows { surplus_w, assist }
        });

        let action = self
            .decide(
                &inputs,
                mode,
                snapshot.as_ref(),
                flows.as_ref(),
                previous_w,
                now,
                &mut reasoning,
            )
            .await;

        let target_power_w = self.actuate(action, previous_w, &mut reasoning).await;

        if let (Some(snap), Some(flows)) = (snapshot.as_ref(), flows.as_ref()) {
            let elapsed_s = self.elapsed_since_last(snap);
            let counting = mode != Some(ChargeMode::Off);
            self.sessions.integrate(
                snap.ev_power_w,
                flows.surplus_w + flows.assist.assist_w(),
                elapsed_s,
                counting,
            );
        }
        // Nothing was measured on a failed read
        self.last_surplus_w = flows.as_ref().map_or(0.0, |f| f.surplus_w);
        self.last_assist_w = flows.as_ref().map_or(0.0, |f| f.assist.assist_w());
        if let Some(snap) = snapshot {
            self.last_snapshot = Some(snap);
        }

        let decision = Decision {
            target_power_w,
            reasoning,
            mode,
            timestamp: now,
        };

        self.log_decision(&decision, previous_w);
        self.total_cycles = self.total_cycles.saturating_add(1);
        self.publish(&decision, &inputs).await;
        self.persist();
        self.last_decision = Some(decision.clone());
        decision
    }

    async fn read_snapshot(&mut self, reasoning: &mut Reasoning) -> Option<PowerSnapshot> {
        let limit = self.io_timeout();
        let result = bounded(limit, "sensor read", self.source.read())
            .await
            .and_then(|reading| PowerSnapshot::assemble(reading, self.last_snapshot.as_ref()));

        match result {
            Ok(snap) => {
                if self.consecutive_read_failures > 0 {
                    self.logger.info(&format!(
                        "Sensor data recovered after {} failed reads",
                        self.consecutive_read_failures
                    ));
                }
                self.consecutive_read_failures = 0;
                if snap.is_stale() {
                    self.logger.warn(&format!(
                        "Using last known values for {}",
                        snap.stale_fields.join(", ")
                    ));
                    reasoning.push(ReasonStep::StaleSensors {
                        fields: snap.stale_fields.clone(),
                    });
                }
                Some(snap)
            }
            Err(e) => {
                self.consecutive_read_failures = self.consecutive_read_failures.saturating_add(1);
                self.logger.warn(&format!(
                    "Sensor read failed ({} consecutive): {}",
                    self.consecutive_read_failures, e
                ));
                reasoning.push(ReasonStep::SensorUnavailable {
                    message: e.to_string(),
                    consecutive_failures: self.consecutive_read_failures,
                });
                None
            }
        }
    }

    /// Advance the session lifecycle and refresh its targets from the inputs
    fn track_session(&mut self, snap: &PowerSnapshot, inputs: &ControlInputs, now: DateTime<Utc>) {
        let pricing = self.config.pricing.clone();

        if self.restored_session {
            self.restored_session = false;
            if !snap.vehicle_connected() {
                // Unplugged while we were down
                self.sessions
                    .end_session(now, SessionStatus::Interrupted, &pricing);
            }
        }

        if let Some(transition) = self.sessions.on_plug_state(snap.plug, now, &pricing) {
            self.logger.debug(&format!("Session transition: {:?}", transition));
        }

        if !snap.vehicle_connected() {
            return;
        }

        let state = self.sessions.state_mut();
        state.full_by_morning_enabled = inputs.full_by_morning;

        state.departure_deadline = match inputs.departure_deadline {
            Some(explicit) => Some(explicit),
            None if inputs.full_by_morning => match state.departure_deadline {
                Some(existing) if existing > now => Some(existing),
                _ => parse_time_of_day(&self.config.departure.default_time)
                    .and_then(|t| next_departure(now, t, self.config.tz()?))
                    .map_err(|e| {
                        self.logger
                            .warn(&format!("Cannot resolve default departure: {}", e));
                    })
                    .ok(),
            },
            None => None,
        };

        state.target_energy_kwh = match (inputs.target_soc_pct, snap.ev_soc_pct) {
            (Some(target_soc), Some(ev_soc)) => target_energy_for_soc(
                state.session_energy_delivered_kwh,
                ev_soc,
                target_soc,
                &self.config.vehicle,
            ),
            _ => inputs
                .target_energy_kwh
                .unwrap_or(self.config.departure.default_target_energy_kwh)
                .max(0.0),
        };
    }

    #[allow(clippy::too_many_arguments)]
    async fn decide(
        &mut self,
        inputs: &ControlInputs,
        mode: Option<ChargeMode>,
        snapshot: Option<&PowerSnapshot>,
        flows: Option<&Flows>,
        previous_w: f64,
        now: DateTime<Utc>,
        reasoning: &mut Reasoning,
    ) -> Action {
        let controls = &self.config.controls;

        if inputs.safe_mode {
            reasoning.push(ReasonStep::SafeMode);
            reasoning.push(ReasonStep::ImmediateCutoff);
            return Action::Write(0.0);
        }

        if mode == Some(ChargeMode::Off) {
            reasoning.push(ReasonStep::ModeTarget {
                mode: ChargeMode::Off,
                basis: TargetBasis::Off,
                requested_w: 0.0,
            });
            reasoning.push(ReasonStep::ImmediateCutoff);
            return Action::Write(0.0);
        }

        // Persistent read failures decay even while the mode is unusable
        if snapshot.is_none()
            && mode != Some(ChargeMode::Manual)
            && self.consecutive_read_failures > controls.max_read_failures
        {
            reasoning.push(ReasonStep::FailSafeDecay {
                consecutive_failures: self.consecutive_read_failures,
            });
            let step = ramp_toward(previous_w, 0.0, controls);
            if step.limited {
                reasoning.push(ReasonStep::RampLimited {
                    previous_w,
                    target_w: 0.0,
                    applied_w: step.value_w,
                    step_w: controls.ramp_step_w,
                });
            }
            return Action::Write(step.value_w);
        }

        let (Some(mode), Some(snap), Some(flows)) = (mode, snapshot, flows) else {
            reasoning.push(ReasonStep::HoldPrevious {
                setpoint_w: previous_w,
            });
            return Action::Hold;
        };

        reasoning.push(ReasonStep::Surplus {
            surplus_w: flows.surplus_w,
            grid_power_w: snap.grid_power_w,
            ev_power_w: snap.ev_power_w,
            battery_power_w: snap.battery_power_w,
            reserve_w: controls.grid_reserve_w,
        });
        match flows.assist {
            AssistOutcome::Active {
                assist_w,
                gap_w,
                forecast,
            } => reasoning.push(ReasonStep::BatteryAssist {
                assist_w,
                gap_w,
                forecast_factor: forecast.factor(),
            }),
            AssistOutcome::Inactive { reason } => {
                reasoning.push(ReasonStep::AssistInactive { reason });
            }
        }

        let available_w = flows.surplus_w + flows.assist.assist_w();
        let assessment = if mode == ChargeMode::Smart && snap.vehicle_connected() {
            compute_required_power(self.sessions.state(), now, available_w, controls)
        } else {
            None
        };
        if let Some(a) = assessment.as_ref() {
            reasoning.push(ReasonStep::Deadline {
                required_w: a.required_w,
                hours_left: a.hours_left,
                energy_remaining_kwh: a.energy_remaining_kwh,
                escalate: a.escalate,
            });
        }
        self.track_deadline(assessment.as_ref(), now, reasoning).await;

        let controls = &self.config.controls;
        let resolved = match resolve_target(
            mode,
            flows.surplus_w,
            flows.assist.assist_w(),
            assessment.as_ref(),
            snap.vehicle_connected(),
            controls,
        ) {
            Resolution::Observe => {
                reasoning.push(ReasonStep::ManualObserve {
                    actual_w: snap.ev_power_w,
                });
                return Action::Adopt(apply_band(snap.ev_power_w, controls).0);
            }
            Resolution::Actuate(resolved) => resolved,
        };

        reasoning.push(ReasonStep::ModeTarget {
            mode,
            basis: resolved.basis,
            requested_w: resolved.requested_w,
        });
        match resolved.adjustment {
            Some(BandAdjustment::BelowMinimum) => reasoning.push(ReasonStep::BelowMinimum {
                requested_w: resolved.requested_w,
                min_w: controls.wallbox_min_w,
            }),
            Some(BandAdjustment::CappedAtMaximum) => reasoning.push(ReasonStep::CappedAtMaximum {
                requested_w: resolved.requested_w,
                max_w: controls.wallbox_max_w,
            }),
            None => {}
        }

        let step = ramp_toward(previous_w, resolved.target_w, controls);
        if step.limited {
            reasoning.push(ReasonStep::RampLimited {
                previous_w,
                target_w: resolved.target_w,
                applied_w: step.value_w,
                step_w: controls.ramp_step_w,
            });
        }
        Action::Write(step.value_w)
    }

    /// Record an unreachable deadline and alert once per episode
    async fn track_deadline(
        &mut self,
        assessment: Option<&DeadlineAssessment>,
        now: DateTime<Utc>,
        reasoning: &mut Reasoning,
    ) {
        let Some(a) = assessment.filter(|a| a.unreachable) else {
            self.deadline_unreachable = false;
            return;
        };

        let max_w = self.config.controls.wallbox_max_w;
        reasoning.push(ReasonStep::DeadlineUnreachable {
            required_w: a.required_w,
            max_w,
        });

        if self.deadline_unreachable {
            return;
        }
        self.deadline_unreachable = true;

        let alert = DeadlineAlert {
            timestamp: now,
            session_id: self.sessions.state().id.clone(),
            deadline: a.deadline,
            required_w: a.required_w,
            max_w,
            energy_remaining_kwh: a.energy_remaining_kwh,
            message: format!(
                "Cannot deliver {:.2} kWh by {}: needs {:.0} W, wallbox maximum is {:.0} W",
                a.energy_remaining_kwh,
                a.deadline.to_rfc3339(),
                a.required_w,
                max_w
            ),
        };
        self.logger.warn(&alert.message);
        let limit = self.io_timeout();
        if let Err(e) = bounded(limit, "deadline alert", self.publisher.publish_alert(&alert)).await {
            self.logger
                .warn(&format!("Failed to publish deadline alert: {}", e));
        }
    }

    /// Apply the action; returns the setpoint in force after this cycle
    async fn actuate(&mut self, action: Action, previous_w: f64, reasoning: &mut Reasoning) -> f64 {
        let watts = match action {
            Action::Hold => return previous_w,
            Action::Adopt(observed_w) => {
                self.sessions.state_mut().last_setpoint_w = observed_w;
                return observed_w;
            }
            Action::Write(watts) => watts,
        };

        let attempts = 1 + self.config.controls.actuator_retries;
        let limit = self.io_timeout();
        let retry_delay = std::time::Duration::from_millis(self.config.controls.retry_delay_ms);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match bounded(limit, "actuator write", self.actuator.set_power(watts)).await {
                Ok(()) => {
                    if !self.actuator_ok {
                        self.logger.info("Charger accepting setpoints again");
                    }
                    self.actuator_ok = true;
                    self.sessions.state_mut().last_setpoint_w = watts;
                    return watts;
                }
                Err(e) => {
                    self.logger.warn(&format!(
                        "Setpoint {:.0} W rejected (attempt {}/{}): {}",
                        watts, attempt, attempts, e
                    ));
                    last_error = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(retry_delay).await;
                    }
                }
            }
        }

        self.actuator_ok = false;
        let message = last_error.map_or_else(|| "unknown".to_string(), |e| e.to_string());
        self.logger.error(&format!(
            "Charger did not accept {:.0} W, holding {:.0} W: {}",
            watts, previous_w, message
        ));
        reasoning.push(ReasonStep::ActuatorFailure { message, attempts });
        reasoning.push(ReasonStep::HoldPrevious {
            setpoint_w: previous_w,
        });
        previous_w
    }

    /// Seconds since the previous snapshot, bounded to a few intervals
    fn elapsed_since_last(&self, snap: &PowerSnapshot) -> f64 {
        let Some(prev) = self.last_snapshot.as_ref() else {
            return 0.0;
        };
        let max_s = self.interval().as_secs_f64() * 3.0;
        let elapsed = (snap.timestamp - prev.timestamp).num_milliseconds() as f64 / 1000.0;
        elapsed.clamp(0.0, max_s)
    }

    fn log_decision(&self, decision: &Decision, previous_w: f64) {
        let logger = match self.sessions.state().id.as_deref() {
            Some(id) => self.logger.for_session(id),
            None => self.logger.clone(),
        };
        if (decision.target_power_w - previous_w).abs() > f64::EPSILON {
            logger.info(&format!(
                "Setpoint {:.0} W -> {:.0} W: {}",
                previous_w, decision.target_power_w, decision.reasoning
            ));
        } else {
            logger.debug(&format!(
                "Setpoint {:.0} W: {}",
                decision.target_power_w, decision.reasoning
            ));
        }
    }
}
