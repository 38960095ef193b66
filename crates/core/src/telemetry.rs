//! Telemetry wire codec.
//!
//! One message is ASCII text, comma-separated, without escaping:
//!
//! ```text
//! unitId,soil_humidity,water_level,temperature,fertilizer_level,uptime[,heartbeat]
//! ```
//!
//! Sensor values are base-10 floats carried with two decimals, uptime is
//! `HH:MM:SS`, and the optional heartbeat is `True`/`False` (matched
//! case-insensitively on decode). Only the Sensing-role unit sends the
//! heartbeat field.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::types::{round2, SensorReading, UnitId, Uptime};

/// Payload fields after the unit id when no heartbeat is carried.
pub const FIELDS_WITHOUT_HEARTBEAT: usize = 5;

/// Payload fields after the unit id when the heartbeat flag is carried.
pub const FIELDS_WITH_HEARTBEAT: usize = 6;

/// One decoded telemetry message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    pub unit_id: UnitId,
    pub reading: SensorReading,
    pub uptime: Uptime,
    /// `None` for units that do not evaluate the liveness pulse.
    pub heartbeat: Option<bool>,
}

impl Telemetry {
    pub fn new(unit_id: UnitId, reading: SensorReading, uptime: Uptime) -> Self {
        Self {
            unit_id,
            reading,
            uptime,
            heartbeat: None,
        }
    }

    pub fn with_heartbeat(mut self, heartbeat: bool) -> Self {
        self.heartbeat = Some(heartbeat);
        self
    }

    /// Render the message as wire text, without a line terminator.
    pub fn encode(&self) -> String {
        let mut out = self.unit_id.to_string();
        for value in self.reading.values() {
            out.push_str(&format!(",{:.2}", round2(value)));
        }
        out.push(',');
        out.push_str(&self.uptime.to_string());
        if let Some(heartbeat) = self.heartbeat {
            out.push_str(if heartbeat { ",True" } else { ",False" });
        }
        out
    }

    /// Parse one message of wire text.
    ///
    /// Fails with [`ProtocolError::MalformedPayload`] when the field count
    /// after the unit id is not 5 or 6, or when a numeric field or the
    /// uptime does not parse.
    pub fn decode(payload: &str) -> Result<Self, ProtocolError> {
        let payload = payload.trim();
        let mut fields: Vec<&str> = payload.split(',').collect();
        let unit = fields.remove(0).trim();

        if unit.is_empty() {
            return Err(ProtocolError::MalformedPayload(format!(
                "missing unit id in '{payload}'"
            )));
        }

        if fields.len() != FIELDS_WITHOUT_HEARTBEAT && fields.len() != FIELDS_WITH_HEARTBEAT {
            return Err(ProtocolError::MalformedPayload(format!(
                "expected {FIELDS_WITHOUT_HEARTBEAT} or {FIELDS_WITH_HEARTBEAT} fields after unit id, got {}",
                fields.len()
            )));
        }

        let mut values = [0.0; 4];
        for (slot, field) in values.iter_mut().zip(&fields[..4]) {
            let value: f64 = field.trim().parse().map_err(|_| {
                ProtocolError::MalformedPayload(format!("non-numeric sensor field '{field}'"))
            })?;
            if !value.is_finite() {
                return Err(ProtocolError::MalformedPayload(format!(
                    "non-finite sensor field '{field}'"
                )));
            }
            *slot = round2(value);
        }

        let uptime = fields[4].parse::<Uptime>()?;
        let heartbeat = fields
            .get(5)
            .map(|flag| flag.trim().eq_ignore_ascii_case("true"));

        Ok(Self {
            unit_id: UnitId::new(unit),
            reading: SensorReading::from_values(values),
            uptime,
            heartbeat,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
