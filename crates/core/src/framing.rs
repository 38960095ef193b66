//! Line framing shared by every FieldLink connection.
//!
//! Each message is written as one line terminated by `\n` and read back
//! with [`LinesCodec`]. A final unterminated line before EOF is still
//! delivered, so a peer that writes a single bare message and closes the
//! connection is understood as well.

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::codec::{Decoder, FramedRead, FramedWrite, LinesCodec, LinesCodecError};

use crate::error::ProtocolError;

/// Longest accepted line, matching the receive buffer of the field units.
pub const MAX_FRAME_LEN: usize = 1024;

/// Default bound on connecting for one-shot sends.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub fn codec() -> LinesCodec {
    LinesCodec::new_with_max_length(MAX_FRAME_LEN)
}

/// Read the next frame, returning `Ok(None)` on a clean EOF.
pub async fn read_frame<R, D>(frames: &mut FramedRead<R, D>) -> Result<Option<String>, ProtocolError>
where
    R: tokio::io::AsyncRead + Unpin,
    D: Decoder<Item = String, Error = LinesCodecError>,
{
    match frames.next().await {
        Some(Ok(line)) => Ok(Some(line)),
        Some(Err(e)) => Err(e.into()),
        None => Ok(None),
    }
}

/// Connect, write exactly one framed message and close the connection.
pub async fn send_once(
    addr: SocketAddr,
    message: &str,
    connect_timeout: Duration,
) -> Result<(), ProtocolError> {
    let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| {
            ProtocolError::Connection(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("connect to {addr} timed out"),
            ))
        })??;

    let mut sink = FramedWrite::new(stream, codec());
    sink.send(message.to_string()).await?;

    let mut stream = sink.into_inner();
    stream.shutdown().await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
