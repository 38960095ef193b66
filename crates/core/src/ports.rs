//! Well-known ports, unit identifiers and protocol timings.
//!
//! Shared by the hub and both field unit roles so the two sides of every
//! connection agree without configuration.

use std::time::Duration;

/// Hub port receiving telemetry from the Sensing-role unit.
pub const HUB_SENSING_PORT: u16 = 12345;

/// Hub port receiving telemetry from the Emitting-role unit.
pub const HUB_EMITTING_PORT: u16 = 12344;

/// Port every field unit listens on for actuator commands.
pub const COMMAND_PORT: u16 = 12347;

/// Port the Emitting-role unit listens on for heartbeat-loss notifications.
pub const NOTIFY_PORT: u16 = 12346;

/// Unit identifier of the Sensing-role unit.
pub const SENSING_UNIT_ID: &str = "pi_1";

/// Unit identifier of the Emitting-role unit.
pub const EMITTING_UNIT_ID: &str = "pi_2";

/// Observation window for one heartbeat evaluation.
pub const HEARTBEAT_WINDOW: Duration = Duration::from_secs(1);

/// Interval between telemetry cycles on both roles.
pub const REPORT_INTERVAL: Duration = Duration::from_secs(2);

/// Physical width of one liveness pulse.
pub const PULSE_WIDTH: Duration = Duration::from_millis(100);
