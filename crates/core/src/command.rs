//! Actuator command codec.
//!
//! Commands travel on their own short-lived connection, one per command:
//! `TURN_ON_LED,<seconds>` or exactly `TURN_OFF_LED`.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ProtocolError;

pub const TURN_ON: &str = "TURN_ON_LED";
pub const TURN_OFF: &str = "TURN_OFF_LED";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Switch the actuator on, then off again after `duration`.
    Activate { duration: Duration },
    /// Switch the actuator off and drop any pending auto-off.
    Deactivate,
}

impl Command {
    pub fn activate_secs(secs: f64) -> Result<Self, ProtocolError> {
        Duration::try_from_secs_f64(secs)
            .map(|duration| Command::Activate { duration })
            .map_err(|_| ProtocolError::InvalidCommand(format!("invalid duration {secs}")))
    }

    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Activate { duration } => write!(f, "{TURN_ON},{}", duration.as_secs_f64()),
            Command::Deactivate => f.write_str(TURN_OFF),
        }
    }
}

impl FromStr for Command {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim_end_matches(['\r', '\n']);

        if text == TURN_OFF {
            return Ok(Command::Deactivate);
        }

        if let Some((head, secs)) = text.split_once(',') {
            if head == TURN_ON {
                let secs: f64 = secs.trim().parse().map_err(|_| {
                    ProtocolError::InvalidCommand(format!("invalid duration '{}'", secs.trim()))
                })?;
                return Command::activate_secs(secs);
            }
        }

        Err(ProtocolError::InvalidCommand(text.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
