//! Heartbeat-loss side channel between the two field units.
//!
//! The Sensing unit sends a free-text notice on a short-lived connection
//! whenever it misses a pulse; the Emitting unit only logs what it gets.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::codec::FramedRead;

use fieldlink_core::framing;

/// Text sent to the Emitting unit when a pulse is missed.
pub const LOSS_MESSAGE: &str = "No heartbeat detected. Receiver is sending data.";

/// Connect bound for a notice. The notice is sent from inside a telemetry
/// cycle, so it must stay well below the report interval.
pub const NOTICE_CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

const NOTICE_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Best-effort delivery of a loss notice. Failures are logged only.
pub async fn notify_loss(peer: SocketAddr, message: &str) {
    match framing::send_once(peer, message, NOTICE_CONNECT_TIMEOUT).await {
        Ok(()) => tracing::info!(%peer, "Heartbeat-loss notice sent"),
        Err(e) => tracing::warn!(%peer, error = %e, "Failed to notify peer of heartbeat loss"),
    }
}

/// Accept loss notices and log them. Has no other effect.
pub async fn run_listener(listener: TcpListener) {
    match listener.local_addr() {
        Ok(addr) => tracing::info!(%addr, "Listening for heartbeat-loss notices"),
        Err(e) => tracing::warn!(error = %e, "Notice listener has no local address"),
    }

    loop {
        let (socket, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to accept notice connection");
                continue;
            }
        };

        let mut frames = FramedRead::new(socket, framing::codec());
        match tokio::time::timeout(NOTICE_READ_TIMEOUT, framing::read_frame(&mut frames)).await {
            Ok(Ok(Some(message))) => tracing::warn!(%peer, %message, "Peer reports heartbeat loss"),
            Ok(Ok(None)) => tracing::debug!(%peer, "Notice connection closed empty"),
            Ok(Err(e)) => tracing::warn!(%peer, error = %e, "Failed to read notice"),
            Err(_) => tracing::warn!(%peer, "Notice connection timed out"),
        }
    }
}
