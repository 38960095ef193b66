//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] fans [`HubEvent`]s out to any number of display consumers.
//! It is shared via [`Hub`](crate::state::Hub) across the hub's tasks.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use fieldlink_core::alert::MetricAlert;
use fieldlink_core::{Liveness, Telemetry, UnitId};

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

// ---------------------------------------------------------------------------
// HubEvent
// ---------------------------------------------------------------------------

/// Something the operator display may want to react to.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HubEvent {
    TelemetryReceived {
        telemetry: Telemetry,
    },
    Alert {
        alert: MetricAlert,
    },
    LivenessChanged {
        unit_id: UnitId,
        liveness: Liveness,
    },
    ActuatorChanged {
        unit_id: UnitId,
        on: bool,
    },
    CommandSent {
        unit_id: UnitId,
        command: String,
        at: DateTime<Utc>,
    },
    CommandFailed {
        unit_id: UnitId,
        command: String,
        error: String,
        at: DateTime<Utc>,
    },
}

impl HubEvent {
    /// The field unit the event concerns.
    pub fn unit_id(&self) -> &UnitId {
        match self {
            HubEvent::TelemetryReceived { telemetry } => &telemetry.unit_id,
            HubEvent::Alert { alert } => &alert.unit_id,
            HubEvent::LivenessChanged { unit_id, .. }
            | HubEvent::ActuatorChanged { unit_id, .. }
            | HubEvent::CommandSent { unit_id, .. }
            | HubEvent::CommandFailed { unit_id, .. } => unit_id,
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// In-process fan-out event bus.
pub struct EventBus {
    sender: broadcast::Sender<HubEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, slow receivers observe
    /// `RecvError::Lagged` and miss the oldest events.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers. Dropped when nobody
    /// is listening.
    pub fn publish(&self, event: HubEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HubEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
