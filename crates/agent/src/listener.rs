//! Command listener.
//!
//! Accepts one control connection at a time, reads a single command,
//! hands it to the actuator task and closes the connection, whatever the
//! outcome.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::FramedRead;

use fieldlink_core::{framing, Command, ProtocolError};

use crate::actuator::ActuatorHandle;

/// How long a control connection may take to deliver its command.
const COMMAND_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Serve control connections until the actuator task stops.
pub async fn run(listener: TcpListener, actuator: ActuatorHandle) {
    match listener.local_addr() {
        Ok(addr) => tracing::info!(%addr, "Listening for actuator commands"),
        Err(e) => tracing::warn!(error = %e, "Command listener has no local address"),
    }

    loop {
        let (socket, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to accept command connection");
                continue;
            }
        };

        tracing::debug!(%peer, "Command connection accepted");

        match read_command(socket).await {
            Ok(Some(command)) => {
                if !dispatch(&actuator, peer, command).await {
                    break;
                }
            }
            Ok(None) => tracing::debug!(%peer, "Command connection closed without a command"),
            Err(ProtocolError::InvalidCommand(text)) => {
                tracing::warn!(%peer, command = %text, "Invalid command received, ignoring");
            }
            Err(e) => tracing::warn!(%peer, error = %e, "Failed to receive command"),
        }
    }
}

/// Read and parse the single command carried by `socket`.
pub async fn read_command(socket: TcpStream) -> Result<Option<Command>, ProtocolError> {
    let mut frames = FramedRead::new(socket, framing::codec());

    let frame = tokio::time::timeout(COMMAND_READ_TIMEOUT, framing::read_frame(&mut frames))
        .await
        .map_err(|_| {
            ProtocolError::Connection(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "no command received in time",
            ))
        })??;

    frame.map(|text| text.parse::<Command>()).transpose()
}

/// Forward a command to the actuator. Returns `false` once the actuator
/// task is gone.
async fn dispatch(actuator: &ActuatorHandle, peer: SocketAddr, command: Command) -> bool {
    tracing::info!(%peer, %command, "Received command");
    match actuator.apply(command).await {
        Ok(on) => {
            tracing::debug!(on, "Command applied");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Cannot apply command");
            false
        }
    }
}
