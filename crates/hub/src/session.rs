//! Per-field-unit session state.
//!
//! The hub keeps one [`FieldSession`] per configured unit for the whole
//! process lifetime. Sessions are updated by that unit's receive task and
//! by operator commands, and read by the status reporter and console.

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::Instant;
use uuid::Uuid;

use fieldlink_core::actuator::ActuatorState;
use fieldlink_core::alert::MetricAlert;
use fieldlink_core::thresholds::{self, Thresholds};
use fieldlink_core::{Command, Liveness, Metric, SensorReading, Telemetry, UnitId, Uptime};

use crate::config::FieldUnit;

/// Mutable state for one field unit.
#[derive(Debug, Clone)]
pub struct FieldSession {
    pub unit_id: UnitId,
    pub field_number: u8,
    pub reading: SensorReading,
    pub uptime: Option<Uptime>,
    /// Latest heartbeat flag; assumed `true` until a message carries one.
    pub heartbeat: bool,
    pub thresholds: Thresholds,
    /// Optimistic mirror of the last command sent to the unit.
    pub explicit: ActuatorState,
    /// Derived display state: explicit ON, or any metric above 70.
    pub actuator_on: bool,
    pub active_since: Option<Instant>,
    pub messages_received: u64,
    pub last_seen: Option<Instant>,
    /// Id of the connection currently feeding this session.
    pub connection: Option<Uuid>,
}

impl FieldSession {
    pub fn new(unit: &FieldUnit) -> Self {
        Self {
            unit_id: unit.id.clone(),
            field_number: unit.field_number,
            reading: SensorReading::default(),
            uptime: None,
            heartbeat: true,
            thresholds: Thresholds::default(),
            explicit: ActuatorState::default(),
            actuator_on: false,
            active_since: None,
            messages_received: 0,
            last_seen: None,
            connection: None,
        }
    }

    pub fn liveness(&self) -> Liveness {
        Liveness::from(self.heartbeat)
    }

    /// Fold one telemetry message into the session.
    pub fn apply_telemetry(&mut self, telemetry: &Telemetry, now: Instant) -> ApplyOutcome {
        let previous_liveness = self.liveness();

        self.reading = telemetry.reading;
        self.uptime = Some(telemetry.uptime);
        if let Some(heartbeat) = telemetry.heartbeat {
            self.heartbeat = heartbeat;
        }
        self.messages_received += 1;
        self.last_seen = Some(now);

        let alerts = thresholds::evaluate(
            &self.unit_id,
            self.field_number,
            &self.reading,
            telemetry.uptime,
            &self.thresholds,
        );

        let liveness = self.liveness();
        ApplyOutcome {
            alerts,
            liveness_changed: (liveness != previous_liveness).then_some(liveness),
            actuator_changed: self.refresh_actuator(now),
        }
    }

    /// Mirror a command the operator sent to the unit.
    pub fn mark_explicit(&mut self, command: &Command, now: Instant) -> Option<bool> {
        self.explicit.apply(command, now);
        self.refresh_actuator(now)
    }

    /// Recompute the derived actuator state. Returns the new state if it
    /// changed.
    pub fn refresh_actuator(&mut self, now: Instant) -> Option<bool> {
        self.explicit.expire(now);
        let on = self.explicit.is_on() || thresholds::exceeds_safety(&self.reading);
        if on == self.actuator_on {
            return None;
        }
        self.actuator_on = on;
        self.active_since = on.then_some(now);
        Some(on)
    }

    pub fn activation_time(&self, now: Instant) -> Duration {
        self.active_since
            .map(|since| now.saturating_duration_since(since))
            .unwrap_or_default()
    }

    pub fn snapshot(&self, now: Instant) -> SessionSnapshot {
        SessionSnapshot {
            unit_id: self.unit_id.clone(),
            field_number: self.field_number,
            reading: self.reading,
            uptime: self.uptime,
            liveness: self.liveness(),
            thresholds: self.thresholds,
            actuator_on: self.actuator_on,
            explicit_on: self.explicit.is_on(),
            activation_secs: self.activation_time(now).as_secs(),
            messages_received: self.messages_received,
            last_seen_secs_ago: self
                .last_seen
                .map(|seen| now.saturating_duration_since(seen).as_secs()),
            connected: self.connection.is_some(),
        }
    }
}

/// What changed when a telemetry message was applied.
#[derive(Debug, Clone, Default)]
pub struct ApplyOutcome {
    pub alerts: Vec<MetricAlert>,
    pub liveness_changed: Option<Liveness>,
    pub actuator_changed: Option<bool>,
}

/// Read-only view of a session for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub unit_id: UnitId,
    pub field_number: u8,
    pub reading: SensorReading,
    pub uptime: Option<Uptime>,
    pub liveness: Liveness,
    pub thresholds: Thresholds,
    pub actuator_on: bool,
    pub explicit_on: bool,
    pub activation_secs: u64,
    pub messages_received: u64,
    pub last_seen_secs_ago: Option<u64>,
    pub connected: bool,
}

/// All sessions, keyed by unit id.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared across the hub's tasks.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<UnitId, FieldSession>>,
}

impl SessionRegistry {
    /// Create one session per configured unit.
    pub fn new(units: &[FieldUnit]) -> Self {
        let sessions = units
            .iter()
            .map(|unit| (unit.id.clone(), FieldSession::new(unit)))
            .collect();
        Self {
            sessions: RwLock::new(sessions),
        }
    }

    /// Apply telemetry to its unit's session. `None` for unknown units.
    pub async fn apply_telemetry(&self, telemetry: &Telemetry, now: Instant) -> Option<ApplyOutcome> {
        let mut sessions = self.sessions.write().await;
        sessions
            .get_mut(&telemetry.unit_id)
            .map(|session| session.apply_telemetry(telemetry, now))
    }

    /// Change an alert threshold. Returns the stored value, or `None` for
    /// unknown units.
    pub async fn set_threshold(&self, unit_id: &UnitId, metric: Metric, value: f64) -> Option<f64> {
        let mut sessions = self.sessions.write().await;
        sessions
            .get_mut(unit_id)
            .map(|session| session.thresholds.set(metric, value))
    }

    pub async fn mark_explicit(&self, unit_id: &UnitId, command: &Command, now: Instant) -> Option<bool> {
        let mut sessions = self.sessions.write().await;
        sessions
            .get_mut(unit_id)
            .and_then(|session| session.mark_explicit(command, now))
    }

    /// Expire elapsed explicit activations. Returns units whose derived
    /// actuator state changed.
    pub async fn refresh(&self, now: Instant) -> Vec<(UnitId, bool)> {
        let mut sessions = self.sessions.write().await;
        sessions
            .values_mut()
            .filter_map(|session| {
                session
                    .refresh_actuator(now)
                    .map(|on| (session.unit_id.clone(), on))
            })
            .collect()
    }

    /// Make `conn_id` the unit's live connection, returning the one it
    /// replaces.
    pub async fn attach(&self, unit_id: &UnitId, conn_id: Uuid) -> Option<Uuid> {
        let mut sessions = self.sessions.write().await;
        sessions
            .get_mut(unit_id)
            .and_then(|session| session.connection.replace(conn_id))
    }

    /// Clear the live connection if it is still `conn_id`.
    pub async fn detach(&self, unit_id: &UnitId, conn_id: Uuid) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(unit_id) {
            Some(session) if session.connection == Some(conn_id) => {
                session.connection = None;
                true
            }
            _ => false,
        }
    }

    pub async fn live_connection(&self, unit_id: &UnitId) -> Option<Uuid> {
        self.sessions
            .read()
            .await
            .get(unit_id)
            .and_then(|session| session.connection)
    }

    pub async fn snapshot(&self, unit_id: &UnitId, now: Instant) -> Option<SessionSnapshot> {
        self.sessions
            .read()
            .await
            .get(unit_id)
            .map(|session| session.snapshot(now))
    }

    /// Snapshots of every session, ordered by field number.
    pub async fn snapshots(&self, now: Instant) -> Vec<SessionSnapshot> {
        let mut snapshots: Vec<_> = self
            .sessions
            .read()
            .await
            .values()
            .map(|session| session.snapshot(now))
            .collect();
        snapshots.sort_by_key(|s| s.field_number);
        snapshots
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HubConfig;

    fn units() -> Vec<FieldUnit> {
        HubConfig::from_lookup(|_| None).unwrap().units
    }

    fn session() -> FieldSession {
        FieldSession::new(&units()[0])
    }

    fn telemetry(reading: SensorReading, heartbeat: Option<bool>) -> Telemetry {
        Telemetry {
            unit_id: UnitId::sensing(),
            reading,
            uptime: Uptime::from_secs(5),
            heartbeat,
        }
    }

    #[test]
    fn new_session_assumes_heartbeat() {
        let session = session();
        assert!(session.heartbeat);
        assert_eq!(session.liveness(), Liveness::Established);
        assert!(!session.actuator_on);
    }

    #[test]
    fn heartbeat_only_updates_when_present() {
        let now = Instant::now();
        let mut session = session();

        let update = session.apply_telemetry(&telemetry(SensorReading::default(), Some(false)), now);
        assert_eq!(update.liveness_changed, Some(Liveness::Lost));

        let update = session.apply_telemetry(&telemetry(SensorReading::default(), None), now);
        assert_eq!(update.liveness_changed, None);
        assert_eq!(session.liveness(), Liveness::Lost);
    }

    #[test]
    fn reading_above_safety_threshold_turns_actuator_on() {
        let now = Instant::now();
        let mut session = session();

        let update = session.apply_telemetry(
            &telemetry(SensorReading::new(75.0, 10.0, 10.0, 10.0), None),
            now,
        );
        assert_eq!(update.actuator_changed, Some(true));
        assert!(session.actuator_on);

        let update = session.apply_telemetry(
            &telemetry(SensorReading::new(10.0, 10.0, 10.0, 10.0), None),
            now + Duration::from_secs(2),
        );
        assert_eq!(update.actuator_changed, Some(false));
    }

    #[test]
    fn explicit_activation_wins_until_it_elapses() {
        let now = Instant::now();
        let mut session = session();

        assert_eq!(
            session.mark_explicit(&Command::activate_secs(5.0).unwrap(), now),
            Some(true)
        );

        let update = session.apply_telemetry(
            &telemetry(SensorReading::new(1.0, 1.0, 1.0, 1.0), None),
            now + Duration::from_secs(2),
        );
        assert_eq!(update.actuator_changed, None);
        assert!(session.actuator_on);
        assert_eq!(session.activation_time(now + Duration::from_secs(2)).as_secs(), 2);

        assert_eq!(session.refresh_actuator(now + Duration::from_secs(5)), Some(false));
    }

    #[test]
    fn explicit_off_falls_back_to_safety_inference() {
        let now = Instant::now();
        let mut session = session();
        session.apply_telemetry(&telemetry(SensorReading::new(90.0, 0.0, 0.0, 0.0), None), now);
        session.mark_explicit(&Command::activate_secs(60.0).unwrap(), now);

        assert_eq!(session.mark_explicit(&Command::Deactivate, now), None);
        assert!(session.actuator_on, "reading above 70 keeps the pump on");
    }

    #[test]
    fn threshold_change_applies_to_next_reading_only() {
        let now = Instant::now();
        let mut session = session();
        session.thresholds.set(Metric::WaterLevel, 80.0);

        let reading = SensorReading::new(0.0, 85.0, 0.0, 0.0);
        let first = session.apply_telemetry(&telemetry(reading, None), now);
        assert_eq!(first.alerts.len(), 1);

        session.thresholds.set(Metric::WaterLevel, 90.0);
        let second = session.apply_telemetry(&telemetry(reading, None), now);
        assert!(second.alerts.is_empty());
        // The earlier alert is unaffected.
        assert_eq!(first.alerts[0].threshold, 80.0);
    }

    #[tokio::test]
    async fn registry_ignores_unknown_units() {
        let registry = SessionRegistry::new(&units());
        let mut t = telemetry(SensorReading::default(), None);
        t.unit_id = UnitId::new("pi_9");
        assert!(registry.apply_telemetry(&t, Instant::now()).await.is_none());
        assert!(registry
            .set_threshold(&UnitId::new("pi_9"), Metric::Temperature, 50.0)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn registry_keeps_one_live_connection_per_unit() {
        let registry = SessionRegistry::new(&units());
        let unit = UnitId::sensing();
        let (first, second) = (Uuid::new_v4(), Uuid::new_v4());

        assert_eq!(registry.attach(&unit, first).await, None);
        assert_eq!(registry.attach(&unit, second).await, Some(first));

        // The superseded connection cannot clear the newer one.
        assert!(!registry.detach(&unit, first).await);
        assert_eq!(registry.live_connection(&unit).await, Some(second));

        assert!(registry.detach(&unit, second).await);
        assert_eq!(registry.live_connection(&unit).await, None);
    }

    #[tokio::test]
    async fn snapshots_are_ordered_by_field() {
        let registry = SessionRegistry::new(&units());
        let snapshots = registry.snapshots(Instant::now()).await;
        assert_eq!(
            snapshots.iter().map(|s| s.field_number).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert!(snapshots.iter().all(|s| !s.connected && s.last_seen_secs_ago.is_none()));
    }
}
