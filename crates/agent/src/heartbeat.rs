//! Heartbeat evaluation for the Sensing role.
//!
//! Each cycle watches the liveness sensor for one window. A missed pulse
//! yields `heartbeat = false` for that cycle and asks for a loss
//! notification to the Emitting unit; link transitions are logged once.

use std::sync::Arc;
use std::time::Duration;

use fieldlink_core::Liveness;

use crate::hardware::LivenessSensor;

/// Outcome of one heartbeat evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatCheck {
    /// Flag carried in this cycle's telemetry.
    pub heartbeat: bool,
    /// Whether the Emitting unit must be told the pulse was missed.
    pub notify_peer: bool,
    /// Set when the link state changed with this evaluation.
    pub transition: Option<Liveness>,
}

pub struct HeartbeatMonitor {
    sensor: Arc<dyn LivenessSensor>,
    window: Duration,
    liveness: Liveness,
    consecutive_misses: u32,
}

impl HeartbeatMonitor {
    /// The link starts out assumed established.
    pub fn new(sensor: Arc<dyn LivenessSensor>, window: Duration) -> Self {
        Self {
            sensor,
            window,
            liveness: Liveness::Established,
            consecutive_misses: 0,
        }
    }

    pub fn liveness(&self) -> Liveness {
        self.liveness
    }

    pub fn consecutive_misses(&self) -> u32 {
        self.consecutive_misses
    }

    /// Watch the sensor for one window and record the result.
    pub async fn check(&mut self) -> HeartbeatCheck {
        let observed = self.sensor.observed_within(self.window).await;
        self.record(observed)
    }

    /// Record one observation.
    pub fn record(&mut self, observed: bool) -> HeartbeatCheck {
        if observed {
            self.consecutive_misses = 0;
        } else {
            self.consecutive_misses = self.consecutive_misses.saturating_add(1);
        }

        let next = Liveness::from(observed);
        let transition = (next != self.liveness).then_some(next);
        self.liveness = next;

        match transition {
            Some(Liveness::Lost) => tracing::warn!("Liveness pulse lost"),
            Some(Liveness::Established) => tracing::info!("Liveness pulse re-established"),
            None if !observed => {
                tracing::debug!(misses = self.consecutive_misses, "Liveness pulse still missing");
            }
            None => {}
        }

        HeartbeatCheck {
            heartbeat: observed,
            notify_peer: !observed,
            transition,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::SimulatedSensor;

    fn monitor(probability: f64) -> HeartbeatMonitor {
        HeartbeatMonitor::new(
            Arc::new(SimulatedSensor::new(probability)),
            Duration::from_secs(1),
        )
    }

    #[test]
    fn observed_pulse_keeps_link_established() {
        let mut monitor = monitor(1.0);
        let check = monitor.record(true);
        assert_eq!(
            check,
            HeartbeatCheck {
                heartbeat: true,
                notify_peer: false,
                transition: None,
            }
        );
        assert_eq!(monitor.liveness(), Liveness::Established);
    }

    #[test]
    fn every_miss_requests_notification() {
        let mut monitor = monitor(0.0);

        let first = monitor.record(false);
        assert!(!first.heartbeat);
        assert!(first.notify_peer);
        assert_eq!(first.transition, Some(Liveness::Lost));

        let second = monitor.record(false);
        assert!(second.notify_peer);
        assert_eq!(second.transition, None);
        assert_eq!(monitor.consecutive_misses(), 2);
    }

    #[test]
    fn recovery_resets_misses() {
        let mut monitor = monitor(0.0);
        monitor.record(false);
        monitor.record(false);

        let check = monitor.record(true);
        assert_eq!(check.transition, Some(Liveness::Established));
        assert_eq!(monitor.consecutive_misses(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn check_reads_the_sensor() {
        let mut monitor = monitor(0.0);
        let check = monitor.check().await;
        assert!(!check.heartbeat);
        assert_eq!(monitor.liveness(), Liveness::Lost);
    }
}
