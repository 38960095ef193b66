//! Telemetry listeners.
//!
//! One listener per field unit. Every accepted connection becomes that
//! unit's live connection; an older connection still open is aborted.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::bytes::BytesMut;
use tokio_util::codec::{Decoder, FramedRead, LinesCodec, LinesCodecError};
use uuid::Uuid;

use fieldlink_core::framing::{self, MAX_FRAME_LEN};
use fieldlink_core::Telemetry;

use crate::config::FieldUnit;
use crate::state::Hub;

/// Pause after a failed accept so a persistent error does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Line decoder for telemetry streams.
///
/// An oversized line is dropped up to its terminator and decoding carries
/// on with the next line, so one bad frame never ends the stream.
#[derive(Debug)]
pub struct TelemetryLines {
    lines: LinesCodec,
}

impl TelemetryLines {
    pub fn new() -> Self {
        Self {
            lines: framing::codec(),
        }
    }
}

impl Default for TelemetryLines {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for TelemetryLines {
    type Item = String;
    type Error = LinesCodecError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, LinesCodecError> {
        loop {
            match self.lines.decode(buf) {
                Err(LinesCodecError::MaxLineLengthExceeded) => {
                    tracing::warn!(max_len = MAX_FRAME_LEN, "Oversized frame discarded");
                }
                other => return other,
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>, LinesCodecError> {
        loop {
            match self.lines.decode_eof(buf) {
                Err(LinesCodecError::MaxLineLengthExceeded) => {
                    tracing::warn!(max_len = MAX_FRAME_LEN, "Oversized frame discarded");
                }
                other => return other,
            }
        }
    }
}

/// Accept telemetry connections for `unit` forever.
pub async fn run(listener: TcpListener, unit: FieldUnit, hub: Hub) {
    match listener.local_addr() {
        Ok(addr) => tracing::info!(unit_id = %unit.id, %addr, "{} listening", unit.title()),
        Err(e) => tracing::warn!(unit_id = %unit.id, error = %e, "Telemetry listener has no local address"),
    }

    let mut current: Option<JoinHandle<()>> = None;

    loop {
        let (socket, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!(unit_id = %unit.id, error = %e, "Failed to accept telemetry connection");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };

        let conn_id = Uuid::new_v4();
        if let Some(previous) = hub.sessions.attach(&unit.id, conn_id).await {
            tracing::info!(
                unit_id = %unit.id,
                %previous,
                conn_id = %conn_id,
                "New connection supersedes the previous one",
            );
        }
        if let Some(task) = current.take() {
            task.abort();
        }

        tracing::info!(unit_id = %unit.id, %peer, conn_id = %conn_id, "Field unit connected");
        current = Some(tokio::spawn(handle_connection(
            socket,
            peer,
            conn_id,
            unit.clone(),
            hub.clone(),
        )));
    }
}

/// Read frames from one connection until it closes or fails.
async fn handle_connection(socket: TcpStream, peer: SocketAddr, conn_id: Uuid, unit: FieldUnit, hub: Hub) {
    let mut frames = FramedRead::new(socket, TelemetryLines::new());

    loop {
        match framing::read_frame(&mut frames).await {
            Ok(Some(line)) => handle_frame(&line, &unit, &hub).await,
            Ok(None) => {
                tracing::info!(unit_id = %unit.id, %peer, "Field unit disconnected");
                break;
            }
            Err(e) => {
                tracing::warn!(unit_id = %unit.id, %peer, error = %e, "Telemetry connection failed");
                break;
            }
        }
    }

    hub.sessions.detach(&unit.id, conn_id).await;
}

async fn handle_frame(line: &str, unit: &FieldUnit, hub: &Hub) {
    if line.trim().is_empty() {
        return;
    }

    let telemetry = match Telemetry::decode(line) {
        Ok(telemetry) => telemetry,
        Err(e) => {
            tracing::warn!(unit_id = %unit.id, error = %e, "Discarding malformed telemetry");
            return;
        }
    };

    if telemetry.unit_id != unit.id {
        tracing::warn!(
            expected = %unit.id,
            received = %telemetry.unit_id,
            "Discarding telemetry addressed to another field",
        );
        return;
    }

    tracing::debug!(unit_id = %unit.id, uptime = %telemetry.uptime, "Telemetry received");
    hub.ingest(telemetry).await;
}
