//! Command dispatcher.
//!
//! Every command travels on a fresh connection to the unit's command
//! port: connect, write one frame, close. Failures are reported and never
//! retried.

use chrono::Utc;
use tokio::time::Instant;

use fieldlink_core::framing::{self, CONNECT_TIMEOUT};
use fieldlink_core::{Command, ProtocolError};

use crate::bus::HubEvent;
use crate::config::FieldUnit;
use crate::state::Hub;

/// Deliver `command` to `unit` and mirror it into the unit's session.
pub async fn send_command(hub: &Hub, unit: &FieldUnit, command: Command) -> Result<(), ProtocolError> {
    let text = command.encode();

    match framing::send_once(unit.command_addr, &text, CONNECT_TIMEOUT).await {
        Ok(()) => {
            tracing::info!(unit_id = %unit.id, addr = %unit.command_addr, %command, "Command sent");
            hub.bus.publish(HubEvent::CommandSent {
                unit_id: unit.id.clone(),
                command: text,
                at: Utc::now(),
            });
            if let Some(on) = hub.sessions.mark_explicit(&unit.id, &command, Instant::now()).await {
                hub.publish_actuator(&unit.id, on);
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!(
                unit_id = %unit.id,
                addr = %unit.command_addr,
                %command,
                error = %e,
                "Failed to send command",
            );
            hub.bus.publish(HubEvent::CommandFailed {
                unit_id: unit.id.clone(),
                command: text,
                error: e.to_string(),
                at: Utc::now(),
            });
            Err(e)
        }
    }
}
