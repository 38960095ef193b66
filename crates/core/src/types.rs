//! Domain types shared by the codec, the hub and the field units.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::ports::{EMITTING_UNIT_ID, SENSING_UNIT_ID};

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

// ---------------------------------------------------------------------------
// UnitId / Role
// ---------------------------------------------------------------------------

/// Stable identifier of a field unit, carried as the first telemetry field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(String);

impl UnitId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn sensing() -> Self {
        Self::new(SENSING_UNIT_ID)
    }

    pub fn emitting() -> Self {
        Self::new(EMITTING_UNIT_ID)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fixed role of a field unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Senses the liveness pulse and reports the heartbeat flag.
    Sensing,
    /// Emits the liveness pulse.
    Emitting,
}

impl Role {
    /// The unit identifier conventionally bound to this role.
    pub fn default_unit(self) -> UnitId {
        match self {
            Role::Sensing => UnitId::sensing(),
            Role::Emitting => UnitId::emitting(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Sensing => f.write_str("sensing"),
            Role::Emitting => f.write_str("emitting"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sensing" | "receiver" => Ok(Role::Sensing),
            "emitting" | "sender" => Ok(Role::Emitting),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Liveness
// ---------------------------------------------------------------------------

/// Link state derived from the latest heartbeat flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Liveness {
    Established,
    Lost,
}

impl From<bool> for Liveness {
    fn from(heartbeat: bool) -> Self {
        if heartbeat {
            Liveness::Established
        } else {
            Liveness::Lost
        }
    }
}

impl fmt::Display for Liveness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Liveness::Established => f.write_str("Established"),
            Liveness::Lost => f.write_str("Lost"),
        }
    }
}

// ---------------------------------------------------------------------------
// Metric / SensorReading
// ---------------------------------------------------------------------------

/// One of the four monitored quantities, each a percentage in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    SoilHumidity,
    WaterLevel,
    Temperature,
    FertilizerLevel,
}

impl Metric {
    /// All metrics in wire order.
    pub const ALL: [Metric; 4] = [
        Metric::SoilHumidity,
        Metric::WaterLevel,
        Metric::Temperature,
        Metric::FertilizerLevel,
    ];

    /// Position of the metric in the telemetry payload (after the unit id).
    pub fn index(self) -> usize {
        match self {
            Metric::SoilHumidity => 0,
            Metric::WaterLevel => 1,
            Metric::Temperature => 2,
            Metric::FertilizerLevel => 3,
        }
    }

    /// Operator-facing label.
    pub fn label(self) -> &'static str {
        match self {
            Metric::SoilHumidity => "Soil humidity",
            Metric::WaterLevel => "Water level",
            Metric::Temperature => "Temperature",
            Metric::FertilizerLevel => "Fertilizer level",
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Metric::SoilHumidity => "soil_humidity",
            Metric::WaterLevel => "water_level",
            Metric::Temperature => "temperature",
            Metric::FertilizerLevel => "fertilizer_level",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Metric {
    type Err = String;

    /// Accepts the snake_case key, the label, or a short alias.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "soil_humidity" | "soil" | "humidity" => Ok(Metric::SoilHumidity),
            "water_level" | "water" => Ok(Metric::WaterLevel),
            "temperature" | "temp" => Ok(Metric::Temperature),
            "fertilizer_level" | "fertilizer" => Ok(Metric::FertilizerLevel),
            _ => Err(format!("unknown metric '{}'", s.trim())),
        }
    }
}

/// Round to two decimal digits, the precision carried on the wire.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Latest values of the four monitored quantities.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorReading {
    pub soil_humidity: f64,
    pub water_level: f64,
    pub temperature: f64,
    pub fertilizer_level: f64,
}

impl SensorReading {
    pub fn new(soil_humidity: f64, water_level: f64, temperature: f64, fertilizer_level: f64) -> Self {
        Self {
            soil_humidity,
            water_level,
            temperature,
            fertilizer_level,
        }
    }

    /// Build a reading from values in wire order.
    pub fn from_values(values: [f64; 4]) -> Self {
        Self::new(values[0], values[1], values[2], values[3])
    }

    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::SoilHumidity => self.soil_humidity,
            Metric::WaterLevel => self.water_level,
            Metric::Temperature => self.temperature,
            Metric::FertilizerLevel => self.fertilizer_level,
        }
    }

    /// Values in wire order.
    pub fn values(&self) -> [f64; 4] {
        [
            self.soil_humidity,
            self.water_level,
            self.temperature,
            self.fertilizer_level,
        ]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Metric, f64)> + '_ {
        Metric::ALL.into_iter().map(|m| (m, self.get(m)))
    }

    pub fn rounded(&self) -> Self {
        Self::from_values(self.values().map(round2))
    }
}

// ---------------------------------------------------------------------------
// Uptime
// ---------------------------------------------------------------------------

/// Elapsed time since the reporting agent started, `HH:MM:SS` on the wire.
///
/// Hours are not wrapped at 24, so `100:00:00` is valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Uptime {
    secs: u64,
}

impl Uptime {
    pub fn from_secs(secs: u64) -> Self {
        Self { secs }
    }

    pub fn as_secs(&self) -> u64 {
        self.secs
    }
}

impl From<Duration> for Uptime {
    fn from(elapsed: Duration) -> Self {
        Self::from_secs(elapsed.as_secs())
    }
}

impl fmt::Display for Uptime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hours = self.secs / 3600;
        let minutes = (self.secs % 3600) / 60;
        let seconds = self.secs % 60;
        write!(f, "{hours:02}:{minutes:02}:{seconds:02}")
    }
}

impl FromStr for Uptime {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ProtocolError::MalformedPayload(format!("invalid uptime '{s}'"));

        let mut parts = s.trim().split(':');
        let (Some(h), Some(m), Some(sec), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed());
        };

        let parse = |part: &str| -> Result<u64, ProtocolError> {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(malformed());
            }
            part.parse().map_err(|_| malformed())
        };

        let (hours, minutes, seconds) = (parse(h)?, parse(m)?, parse(sec)?);
        if minutes >= 60 || seconds >= 60 {
            return Err(malformed());
        }

        hours
            .checked_mul(3600)
            .and_then(|h| h.checked_add(minutes * 60 + seconds))
            .map(Self::from_secs)
            .ok_or_else(malformed)
    }
}

impl From<Uptime> for String {
    fn from(uptime: Uptime) -> Self {
        uptime.to_string()
    }
}

impl TryFrom<String> for Uptime {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
