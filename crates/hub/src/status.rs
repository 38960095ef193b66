//! Periodic status refresh.
//!
//! Once per interval the reporter expires elapsed pump activations and
//! logs the snapshot of every field whose state changed since the last
//! tick. Runs until cancelled.

use std::collections::HashMap;
use std::fmt::Write;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use fieldlink_core::{Metric, UnitId};

use crate::session::SessionSnapshot;
use crate::state::Hub;

/// Render a snapshot the way the operator display shows a field.
pub fn render(snapshot: &SessionSnapshot) -> String {
    let mut out = format!("Monitoring Field {} ({})", snapshot.field_number, snapshot.unit_id);

    for metric in Metric::ALL {
        let _ = write!(
            out,
            "\n  {}: {:.2} (alert above {:.2})",
            metric.label(),
            snapshot.reading.get(metric),
            snapshot.thresholds.get(metric),
        );
    }

    let pump = if snapshot.actuator_on { "ON" } else { "OFF" };
    let _ = write!(out, "\n  Pump: {pump}, activation time {}s", snapshot.activation_secs);
    let _ = write!(out, "\n  Heartbeat: {}", snapshot.liveness);

    match snapshot.uptime {
        Some(uptime) => {
            let _ = write!(out, "\n  Uptime: {uptime}");
        }
        None => out.push_str("\n  Uptime: -"),
    }
    match snapshot.last_seen_secs_ago {
        Some(secs) => {
            let _ = write!(out, "\n  Last message: {secs}s ago ({} total)", snapshot.messages_received);
        }
        None => out.push_str("\n  Last message: never"),
    }

    out
}

/// Snapshot with the fields that tick on their own cleared, so only
/// meaningful changes trigger a new log line.
fn change_key(snapshot: &SessionSnapshot) -> SessionSnapshot {
    SessionSnapshot {
        last_seen_secs_ago: None,
        ..snapshot.clone()
    }
}

/// Run the status reporter until `cancel` is triggered.
pub async fn run(hub: Hub, interval: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = interval.as_secs_f64(), "Status reporter started");

    let mut ticker = tokio::time::interval(interval);
    let mut last: HashMap<UnitId, SessionSnapshot> = HashMap::new();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Status reporter stopping");
                break;
            }
            _ = ticker.tick() => {
                let now = Instant::now();

                for (unit_id, on) in hub.sessions.refresh(now).await {
                    hub.publish_actuator(&unit_id, on);
                }

                for snapshot in hub.sessions.snapshots(now).await {
                    let key = change_key(&snapshot);
                    if last.get(&snapshot.unit_id) == Some(&key) {
                        continue;
                    }
                    tracing::info!(unit_id = %snapshot.unit_id, "{}", render(&snapshot));
                    last.insert(snapshot.unit_id.clone(), key);
                }
            }
        }
    }
}
