use std::sync::Arc;

use tokio::time::Instant;

use fieldlink_core::{Telemetry, UnitId};

use crate::alerts::AlertLog;
use crate::bus::{EventBus, HubEvent};
use crate::config::{FieldUnit, HubConfig};
use crate::session::{ApplyOutcome, SessionRegistry};

/// Shared hub state passed to every task.
///
/// Cloneable (all inner fields are `Arc`-wrapped).
#[derive(Clone)]
pub struct Hub {
    pub units: Arc<Vec<FieldUnit>>,
    pub sessions: Arc<SessionRegistry>,
    pub alerts: Arc<AlertLog>,
    pub bus: Arc<EventBus>,
}

impl Hub {
    pub fn new(config: &HubConfig) -> Self {
        Self {
            units: Arc::new(config.units.clone()),
            sessions: Arc::new(SessionRegistry::new(&config.units)),
            alerts: Arc::new(AlertLog::new(config.alert_log_capacity)),
            bus: Arc::new(EventBus::default()),
        }
    }

    /// Look up a unit by id, or by its field number (`"1"`, `"2"`).
    pub fn unit(&self, name: &str) -> Option<&FieldUnit> {
        self.units
            .iter()
            .find(|unit| unit.id.as_str() == name || unit.field_number.to_string() == name)
    }

    pub fn unit_by_id(&self, id: &UnitId) -> Option<&FieldUnit> {
        self.units.iter().find(|unit| &unit.id == id)
    }

    /// Apply one decoded telemetry message: update the session, record
    /// alerts and publish what changed.
    pub async fn ingest(&self, telemetry: Telemetry) -> Option<ApplyOutcome> {
        let outcome = self
            .sessions
            .apply_telemetry(&telemetry, Instant::now())
            .await?;

        for alert in &outcome.alerts {
            tracing::warn!(
                unit_id = %alert.unit_id,
                metric = alert.metric.key(),
                value = alert.value,
                threshold = alert.threshold,
                "{alert}",
            );
            self.alerts.push(alert.clone());
            self.bus.publish(HubEvent::Alert {
                alert: alert.clone(),
            });
        }

        if let Some(liveness) = outcome.liveness_changed {
            tracing::info!(unit_id = %telemetry.unit_id, %liveness, "Heartbeat state changed");
            self.bus.publish(HubEvent::LivenessChanged {
                unit_id: telemetry.unit_id.clone(),
                liveness,
            });
        }

        if let Some(on) = outcome.actuator_changed {
            self.publish_actuator(&telemetry.unit_id, on);
        }

        self.bus.publish(HubEvent::TelemetryReceived { telemetry });
        Some(outcome)
    }

    pub(crate) fn publish_actuator(&self, unit_id: &UnitId, on: bool) {
        tracing::info!(%unit_id, on, "Pump state changed");
        self.bus.publish(HubEvent::ActuatorChanged {
            unit_id: unit_id.clone(),
            on,
        });
    }
}
