use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use fieldlink_core::config::{env_lookup, parse_or, parse_required};
use fieldlink_core::ports::{
    COMMAND_PORT, HUB_EMITTING_PORT, HUB_SENSING_PORT, NOTIFY_PORT, REPORT_INTERVAL,
};
use fieldlink_core::{ConfigError, Role, UnitId};

use crate::hardware::SIMULATED_BACKEND;

/// Address of the hub on the field network.
const DEFAULT_HUB_HOST: Ipv4Addr = Ipv4Addr::new(192, 168, 137, 1);

/// Address of the Emitting-role unit on the field network.
const DEFAULT_EMITTING_HOST: Ipv4Addr = Ipv4Addr::new(192, 168, 137, 73);

/// Address of the Sensing-role unit on the field network.
const DEFAULT_SENSING_HOST: Ipv4Addr = Ipv4Addr::new(192, 168, 137, 21);

/// Field unit configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub role: Role,
    pub unit_id: UnitId,
    /// Hub telemetry endpoint for this unit's role.
    pub hub_addr: SocketAddr,
    /// Counterpart unit's notice endpoint (used by the Sensing role).
    pub peer_addr: SocketAddr,
    /// Interface the command and notice listeners bind to.
    pub bind_host: IpAddr,
    pub command_port: u16,
    pub notify_port: u16,
    pub report_interval: Duration,
    pub hardware: String,
    /// Chance per window that the simulated sensor sees a pulse.
    pub pulse_probability: f64,
}

impl AgentConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                              |
    /// |------------------------|--------------------------------------|
    /// | `AGENT_ROLE`           | required (`sensing` / `emitting`)    |
    /// | `UNIT_ID`              | `pi_1` sensing, `pi_2` emitting      |
    /// | `HUB_ADDR`             | `192.168.137.1:12345` / `:12344`     |
    /// | `PEER_ADDR`            | the other unit's notice port         |
    /// | `BIND_HOST`            | `0.0.0.0`                            |
    /// | `COMMAND_PORT`         | `12347`                              |
    /// | `NOTIFY_PORT`          | `12346`                              |
    /// | `REPORT_INTERVAL_SECS` | `2`                                  |
    /// | `HARDWARE`             | `simulated`                          |
    /// | `PULSE_PROBABILITY`    | `0.9`                                |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let role: Role = parse_required(&lookup, "AGENT_ROLE")?;

        let (hub_port, peer_host) = match role {
            Role::Sensing => (HUB_SENSING_PORT, DEFAULT_EMITTING_HOST),
            Role::Emitting => (HUB_EMITTING_PORT, DEFAULT_SENSING_HOST),
        };

        let unit_id = lookup("UNIT_ID")
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .map(UnitId::new)
            .unwrap_or_else(|| role.default_unit());

        if unit_id.as_str().contains(',') {
            return Err(ConfigError::Invalid {
                name: "UNIT_ID",
                value: unit_id.to_string(),
            });
        }

        let notify_port = parse_or(&lookup, "NOTIFY_PORT", NOTIFY_PORT)?;

        let hub_addr = parse_or(
            &lookup,
            "HUB_ADDR",
            SocketAddr::new(DEFAULT_HUB_HOST.into(), hub_port),
        )?;
        let peer_addr = parse_or(
            &lookup,
            "PEER_ADDR",
            SocketAddr::new(peer_host.into(), notify_port),
        )?;
        let bind_host = parse_or(&lookup, "BIND_HOST", IpAddr::V4(Ipv4Addr::UNSPECIFIED))?;
        let command_port = parse_or(&lookup, "COMMAND_PORT", COMMAND_PORT)?;

        let report_interval_secs: f64 = parse_or(
            &lookup,
            "REPORT_INTERVAL_SECS",
            REPORT_INTERVAL.as_secs_f64(),
        )?;
        let report_interval = Duration::try_from_secs_f64(report_interval_secs)
            .ok()
            .filter(|d| !d.is_zero())
            .ok_or_else(|| ConfigError::Invalid {
                name: "REPORT_INTERVAL_SECS",
                value: report_interval_secs.to_string(),
            })?;

        let hardware = lookup("HARDWARE").unwrap_or_else(|| SIMULATED_BACKEND.to_string());

        let pulse_probability: f64 = parse_or(&lookup, "PULSE_PROBABILITY", 0.9)?;
        if !(0.0..=1.0).contains(&pulse_probability) {
            return Err(ConfigError::Invalid {
                name: "PULSE_PROBABILITY",
                value: pulse_probability.to_string(),
            });
        }

        Ok(Self {
            role,
            unit_id,
            hub_addr,
            peer_addr,
            bind_host,
            command_port,
            notify_port,
            report_interval,
            hardware,
            pulse_probability,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use assert_matches::assert_matches;

    fn config(vars: &[(&str, &str)]) -> Result<AgentConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AgentConfig::from_lookup(move |name| map.get(name).cloned())
    }

    #[test]
    fn role_is_required() {
        assert_matches!(config(&[]), Err(ConfigError::Missing("AGENT_ROLE")));
    }

    #[test]
    fn sensing_defaults() {
        let cfg = config(&[("AGENT_ROLE", "sensing")]).unwrap();
        assert_eq!(cfg.unit_id, UnitId::sensing());
        assert_eq!(cfg.hub_addr, "192.168.137.1:12345".parse().unwrap());
        assert_eq!(cfg.peer_addr, "192.168.137.73:12346".parse().unwrap());
        assert_eq!(cfg.command_port, 12347);
        assert_eq!(cfg.report_interval, Duration::from_secs(2));
        assert_eq!(cfg.hardware, "simulated");
    }

    #[test]
    fn emitting_defaults() {
        let cfg = config(&[("AGENT_ROLE", "emitting")]).unwrap();
        assert_eq!(cfg.unit_id, UnitId::emitting());
        assert_eq!(cfg.hub_addr.port(), 12344);
    }

    #[test]
    fn overrides_are_applied() {
        let cfg = config(&[
            ("AGENT_ROLE", "emitting"),
            ("UNIT_ID", "field_b"),
            ("HUB_ADDR", "127.0.0.1:9000"),
            ("REPORT_INTERVAL_SECS", "0.5"),
        ])
        .unwrap();
        assert_eq!(cfg.unit_id.as_str(), "field_b");
        assert_eq!(cfg.hub_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(cfg.report_interval, Duration::from_millis(500));
    }

    #[test]
    fn invalid_values_are_reported() {
        assert_matches!(
            config(&[("AGENT_ROLE", "sensing"), ("PULSE_PROBABILITY", "1.5")]),
            Err(ConfigError::Invalid { name: "PULSE_PROBABILITY", .. })
        );
        assert_matches!(
            config(&[("AGENT_ROLE", "sensing"), ("REPORT_INTERVAL_SECS", "0")]),
            Err(ConfigError::Invalid { name: "REPORT_INTERVAL_SECS", .. })
        );
        assert_matches!(
            config(&[("AGENT_ROLE", "sensing"), ("UNIT_ID", "a,b")]),
            Err(ConfigError::Invalid { name: "UNIT_ID", .. })
        );
        assert_matches!(
            config(&[("AGENT_ROLE", "hub")]),
            Err(ConfigError::Invalid { name: "AGENT_ROLE", .. })
        );
    }
}
