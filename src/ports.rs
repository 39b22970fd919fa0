//! Boundaries between the decision engine and the site
//!
//! The controller only talks to the outside through these traits: a source of
//! sensor readings, a charger that accepts a power setpoint, and a publisher
//! for status and alerts. Implementations are expected to be cheap to call
//! once per cycle; the controller wraps every call in a timeout.

use crate::controller::types::{ChargeStatus, DeadlineAlert};
use crate::error::Result;
use crate::snapshot::SensorReading;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

/// Delivers one reading per cycle
#[async_trait]
pub trait SnapshotSource: Send {
    async fn read(&mut self) -> Result<SensorReading>;
}

/// Accepts power setpoints in watts
#[async_trait]
pub trait ChargerActuator: Send {
    /// Command the charger. Writing the same value twice has no further effect.
    async fn set_power(&mut self, watts: f64) -> Result<()>;
}

/// Receives the per-cycle status and out-of-band alerts
#[async_trait]
pub trait StatusPublisher: Send {
    async fn publish_status(&mut self, status: &ChargeStatus) -> Result<()>;
    async fn publish_alert(&mut self, alert: &DeadlineAlert) -> Result<()>;
}

/// Event pushed to in-process subscribers
#[derive(Debug, Clone)]
pub enum StatusEvent {
    Status(Arc<ChargeStatus>),
    Alert(DeadlineAlert),
}

impl StatusEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Status(_) => "status",
            Self::Alert(_) => "alert",
        }
    }

    pub fn to_json(&self) -> String {
        let value = match self {
            Self::Status(s) => serde_json::to_string(s.as_ref()),
            Self::Alert(a) => serde_json::to_string(a),
        };
        value.unwrap_or_else(|e| format!("{{\"error\":\"{}\"}}", e))
    }
}

/// Publisher backed by tokio channels: the latest status in a `watch`, and
/// every status and alert on a `broadcast` stream
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    latest: watch::Sender<Option<Arc<ChargeStatus>>>,
    events: broadcast::Sender<StatusEvent>,
}

impl ChannelPublisher {
    pub fn new(capacity: usize) -> Self {
        let (latest, _) = watch::channel(None);
        let (events, _) = broadcast::channel(capacity.max(1));
        Self { latest, events }
    }

    pub fn latest(&self) -> watch::Receiver<Option<Arc<ChargeStatus>>> {
        self.latest.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.events.subscribe()
    }
}

#[async_trait]
impl StatusPublisher for ChannelPublisher {
    async fn publish_status(&mut self, status: &ChargeStatus) -> Result<()> {
        let status = Arc::new(status.clone());
        self.latest.send_replace(Some(status.clone()));
        // No subscribers is not an error
        let _ = self.events.send(StatusEvent::Status(status));
        Ok(())
    }

    async fn publish_alert(&mut self, alert: &DeadlineAlert) -> Result<()> {
        let _ = self.events.send(StatusEvent::Alert(alert.clone()));
        Ok(())
    }
}
