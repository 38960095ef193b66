use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use fieldlink_core::config::{env_lookup, parse_or};
use fieldlink_core::ports::{COMMAND_PORT, HUB_EMITTING_PORT, HUB_SENSING_PORT};
use fieldlink_core::{ConfigError, Role, UnitId};

/// Default alert log capacity; older alerts are dropped beyond this.
pub const DEFAULT_ALERT_LOG_CAPACITY: usize = 1000;

/// A field unit as known to the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldUnit {
    pub id: UnitId,
    pub role: Role,
    /// Operator-facing number used in titles and alert text.
    pub field_number: u8,
    /// Hub port this unit sends telemetry to.
    pub telemetry_port: u16,
    /// Where the unit listens for actuator commands.
    pub command_addr: SocketAddr,
}

impl FieldUnit {
    pub fn title(&self) -> String {
        format!("Monitoring Field {}", self.field_number)
    }
}

/// Hub configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Interface the telemetry listeners bind to.
    pub bind_host: IpAddr,
    pub units: Vec<FieldUnit>,
    pub alert_log_capacity: usize,
    pub status_interval: Duration,
}

impl HubConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                  |
    /// |------------------------|--------------------------|
    /// | `HUB_BIND`             | `0.0.0.0`                |
    /// | `SENSING_PORT`         | `12345`                  |
    /// | `EMITTING_PORT`        | `12344`                  |
    /// | `SENSING_UNIT_HOST`    | `192.168.137.21`         |
    /// | `EMITTING_UNIT_HOST`   | `192.168.137.73`         |
    /// | `COMMAND_PORT`         | `12347`                  |
    /// | `ALERT_LOG_CAPACITY`   | `1000`                   |
    /// | `STATUS_INTERVAL_SECS` | `1`                      |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_host = parse_or(&lookup, "HUB_BIND", IpAddr::V4(Ipv4Addr::UNSPECIFIED))?;
        let sensing_port = parse_or(&lookup, "SENSING_PORT", HUB_SENSING_PORT)?;
        let emitting_port = parse_or(&lookup, "EMITTING_PORT", HUB_EMITTING_PORT)?;
        let sensing_host = parse_or(
            &lookup,
            "SENSING_UNIT_HOST",
            IpAddr::V4(Ipv4Addr::new(192, 168, 137, 21)),
        )?;
        let emitting_host = parse_or(
            &lookup,
            "EMITTING_UNIT_HOST",
            IpAddr::V4(Ipv4Addr::new(192, 168, 137, 73)),
        )?;
        let command_port = parse_or(&lookup, "COMMAND_PORT", COMMAND_PORT)?;

        if sensing_port == emitting_port {
            return Err(ConfigError::Invalid {
                name: "EMITTING_PORT",
                value: emitting_port.to_string(),
            });
        }

        let alert_log_capacity = parse_or(&lookup, "ALERT_LOG_CAPACITY", DEFAULT_ALERT_LOG_CAPACITY)?;
        if alert_log_capacity == 0 {
            return Err(ConfigError::Invalid {
                name: "ALERT_LOG_CAPACITY",
                value: "0".into(),
            });
        }

        let status_interval_secs: u64 = parse_or(&lookup, "STATUS_INTERVAL_SECS", 1)?;
        if status_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "STATUS_INTERVAL_SECS",
                value: "0".into(),
            });
        }

        let units = vec![
            FieldUnit {
                id: UnitId::sensing(),
                role: Role::Sensing,
                field_number: 1,
                telemetry_port: sensing_port,
                command_addr: SocketAddr::new(sensing_host, command_port),
            },
            FieldUnit {
                id: UnitId::emitting(),
                role: Role::Emitting,
                field_number: 2,
                telemetry_port: emitting_port,
                command_addr: SocketAddr::new(emitting_host, command_port),
            },
        ];

        Ok(Self {
            bind_host,
            units,
            alert_log_capacity,
            status_interval: Duration::from_secs(status_interval_secs),
        })
    }
}
