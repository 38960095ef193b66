//! Role-specific telemetry cycles and the agent entry point.
//!
//! Both roles share the same shell: a command listener feeding the
//! actuator task, a supervised telemetry connection, and a fixed-interval
//! cycle that produces one message per tick. The Sensing role evaluates
//! the heartbeat each cycle; the Emitting role fires the liveness pulse
//! and listens for loss notices.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};

use fieldlink_core::ports::HEARTBEAT_WINDOW;
use fieldlink_core::{Role, Telemetry, UnitId, Uptime};

use crate::config::AgentConfig;
use crate::hardware::{Hardware, PulseEmitter, SensorProbe};
use crate::heartbeat::HeartbeatMonitor;
use crate::notify::{self, LOSS_MESSAGE};
use crate::{actuator, listener, sender};

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Failed to bind {what} listener on port {port}: {source}")]
    Bind {
        what: &'static str,
        port: u16,
        #[source]
        source: std::io::Error,
    },
}

/// Behaviour that differs between the two roles.
enum RoleBehaviour {
    Sensing {
        monitor: HeartbeatMonitor,
        peer: SocketAddr,
    },
    Emitting {
        emitter: Arc<dyn PulseEmitter>,
    },
}

/// Produces one telemetry message per cycle.
pub struct RoleCycle {
    unit_id: UnitId,
    probe: Arc<dyn SensorProbe>,
    started: Instant,
    behaviour: RoleBehaviour,
}

impl RoleCycle {
    pub fn sensing(unit_id: UnitId, hardware: &Hardware, peer: SocketAddr) -> Self {
        Self {
            unit_id,
            probe: hardware.probe.clone(),
            started: Instant::now(),
            behaviour: RoleBehaviour::Sensing {
                monitor: HeartbeatMonitor::new(hardware.sensor.clone(), HEARTBEAT_WINDOW),
                peer,
            },
        }
    }

    pub fn emitting(unit_id: UnitId, hardware: &Hardware) -> Self {
        Self {
            unit_id,
            probe: hardware.probe.clone(),
            started: Instant::now(),
            behaviour: RoleBehaviour::Emitting {
                emitter: hardware.emitter.clone(),
            },
        }
    }

    pub fn role(&self) -> Role {
        match self.behaviour {
            RoleBehaviour::Sensing { .. } => Role::Sensing,
            RoleBehaviour::Emitting { .. } => Role::Emitting,
        }
    }

    /// Run one cycle and return the telemetry it produced.
    ///
    /// A missed pulse is reported to the Emitting unit before the
    /// telemetry carrying `heartbeat = false` is produced.
    pub async fn tick(&mut self) -> Telemetry {
        let heartbeat = match &mut self.behaviour {
            RoleBehaviour::Sensing { monitor, peer } => {
                let check = monitor.check().await;
                if check.notify_peer {
                    notify::notify_loss(*peer, LOSS_MESSAGE).await;
                }
                Some(check.heartbeat)
            }
            RoleBehaviour::Emitting { emitter } => {
                emitter.emit().await;
                None
            }
        };

        Telemetry {
            unit_id: self.unit_id.clone(),
            reading: self.probe.read(),
            uptime: Uptime::from(self.started.elapsed()),
            heartbeat,
        }
    }
}

/// Tick `cycle` every `interval`, publishing each message for the sender.
///
/// Returns once the sender side has gone away.
pub async fn run_cycles(
    mut cycle: RoleCycle,
    interval: Duration,
    updates: watch::Sender<Option<Telemetry>>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let telemetry = cycle.tick().await;
        tracing::debug!(
            role = %cycle.role(),
            heartbeat = ?telemetry.heartbeat,
            uptime = %telemetry.uptime,
            "Cycle complete",
        );
        if updates.send(Some(telemetry)).is_err() {
            tracing::warn!("Telemetry sender stopped, ending cycles");
            return;
        }
    }
}

async fn bind(config: &AgentConfig, what: &'static str, port: u16) -> Result<TcpListener, AgentError> {
    TcpListener::bind((config.bind_host, port))
        .await
        .map_err(|source| AgentError::Bind { what, port, source })
}

/// Run a field unit until its telemetry pipeline stops.
pub async fn run(config: AgentConfig, hardware: Hardware) -> Result<(), AgentError> {
    let command_listener = bind(&config, "command", config.command_port).await?;

    let (actuator, _actuator_task) = actuator::spawn(hardware.actuator.clone());
    tokio::spawn(listener::run(command_listener, actuator));

    let cycle = match config.role {
        Role::Sensing => RoleCycle::sensing(config.unit_id.clone(), &hardware, config.peer_addr),
        Role::Emitting => {
            let notice_listener = bind(&config, "notice", config.notify_port).await?;
            tokio::spawn(notify::run_listener(notice_listener));
            RoleCycle::emitting(config.unit_id.clone(), &hardware)
        }
    };

    let (updates_tx, updates_rx) = watch::channel(None);
    let sender_task = tokio::spawn(sender::run(config.hub_addr, updates_rx));

    tracing::info!(
        role = %config.role,
        unit_id = %config.unit_id,
        hub = %config.hub_addr,
        interval_secs = config.report_interval.as_secs_f64(),
        "Field unit running",
    );

    run_cycles(cycle, config.report_interval, updates_tx).await;
    let _ = sender_task.await;
    Ok(())
}
