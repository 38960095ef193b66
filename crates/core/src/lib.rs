//! Shared protocol building blocks for the FieldLink hub and field units.
//!
//! Everything in this crate is transport-agnostic apart from [`framing`],
//! which wraps the newline discipline used on every TCP connection.

pub mod actuator;
pub mod alert;
pub mod command;
pub mod config;
pub mod error;
pub mod framing;
pub mod ports;
pub mod telemetry;
pub mod thresholds;
pub mod types;

pub use command::Command;
pub use error::{CapabilityError, ConfigError, ProtocolError};
pub use telemetry::Telemetry;
pub use types::{Liveness, Metric, Role, SensorReading, UnitId, Uptime};
