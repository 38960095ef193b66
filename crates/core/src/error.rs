use tokio_util::codec::LinesCodecError;

/// Protocol-level failures. These are always handled by the task that hit
/// them and only ever surface as log output.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Connection error: {0}")]
    Connection(#[from] std::io::Error),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Framing error: {0}")]
    Frame(#[from] LinesCodecError),
}

/// Failure to acquire a hardware capability. Fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    #[error("Unknown hardware backend: {0}")]
    UnknownBackend(String),

    #[error("Capability unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}
