//! Telemetry connection to the hub.
//!
//! Holds one long-lived connection and writes each new telemetry message
//! as one line. If the connection cannot be established or drops, the
//! loop reconnects with exponential backoff; cycles produced while
//! disconnected are not replayed, only the next fresh message is sent.

use std::net::SocketAddr;
use std::time::Duration;

use futures::SinkExt;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_util::codec::FramedWrite;

use fieldlink_core::{framing, ProtocolError, Telemetry};

/// First reconnection delay after a failure.
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Upper bound on the reconnection delay.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Exponential reconnection delay, reset after a successful connection.
#[derive(Debug, Default)]
pub struct Backoff {
    failure_streak: u32,
}

impl Backoff {
    /// Delay before the next attempt; each call doubles it up to the cap.
    pub fn next_delay(&mut self) -> Duration {
        let factor = 2u32.saturating_pow(self.failure_streak.min(16));
        self.failure_streak = self.failure_streak.saturating_add(1);
        INITIAL_BACKOFF.saturating_mul(factor).min(MAX_BACKOFF)
    }

    pub fn reset(&mut self) {
        self.failure_streak = 0;
    }

    pub fn failure_streak(&self) -> u32 {
        self.failure_streak
    }
}

/// How a session with the hub ended.
enum SessionEnd {
    /// The producer is gone; stop for good.
    ProducerClosed,
    /// The hub closed the connection.
    PeerClosed,
}

/// Deliver telemetry to `hub` until the producer side of `updates` is dropped.
pub async fn run(hub: SocketAddr, mut updates: watch::Receiver<Option<Telemetry>>) {
    let mut backoff = Backoff::default();

    loop {
        tracing::info!(%hub, "Connecting to hub");

        match TcpStream::connect(hub).await {
            Ok(stream) => {
                tracing::info!(%hub, "Telemetry connection established");
                backoff.reset();
                match run_session(stream, &mut updates).await {
                    Ok(SessionEnd::ProducerClosed) => {
                        tracing::info!("Telemetry producer stopped, closing connection");
                        return;
                    }
                    Ok(SessionEnd::PeerClosed) => tracing::warn!(%hub, "Hub closed telemetry connection"),
                    Err(e) => tracing::error!(%hub, error = %e, "Telemetry connection failed"),
                }
            }
            Err(e) => {
                tracing::error!(%hub, error = %e, "Failed to connect to hub");
            }
        }

        let delay = backoff.next_delay();
        tracing::warn!(
            failure_streak = backoff.failure_streak(),
            delay_secs = delay.as_secs(),
            "Reconnecting to hub after delay",
        );
        tokio::time::sleep(delay).await;
    }
}

/// Drive one connection: send every new message and watch the read half
/// so a closed connection is noticed without waiting for a failed write.
async fn run_session(
    stream: TcpStream,
    updates: &mut watch::Receiver<Option<Telemetry>>,
) -> Result<SessionEnd, ProtocolError> {
    let (mut reader, writer) = stream.into_split();
    let mut sink = FramedWrite::new(writer, framing::codec());
    let mut scratch = [0u8; 64];

    // Anything produced before the connection came up is stale.
    let _ = updates.borrow_and_update();

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    return Ok(SessionEnd::ProducerClosed);
                }
                let line = updates.borrow_and_update().as_ref().map(Telemetry::encode);
                if let Some(line) = line {
                    sink.send(line.as_str()).await?;
                    tracing::debug!(message = %line, "Telemetry sent");
                }
            }
            read = reader.read(&mut scratch) => {
                match read? {
                    0 => return Ok(SessionEnd::PeerClosed),
                    n => tracing::trace!(bytes = n, "Ignoring unexpected bytes from hub"),
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
