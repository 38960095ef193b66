//! Actuator owner task.
//!
//! A single task owns the [`ActuatorState`] and the physical output.
//! Commands arrive over a queue and the pending auto-off is a timer in
//! the same `select!`, so command application and expiry are serialized.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use fieldlink_core::actuator::{ActuatorEffect, ActuatorState};
use fieldlink_core::Command;

use crate::hardware::Actuator;

/// Commands waiting for the owner task. Only one listener feeds the queue.
const QUEUE_DEPTH: usize = 8;

struct Request {
    command: Command,
    applied: oneshot::Sender<bool>,
}

#[derive(Debug, thiserror::Error)]
#[error("Actuator task has stopped")]
pub struct ActuatorStopped;

/// Cloneable handle used to submit commands to the owner task.
#[derive(Clone)]
pub struct ActuatorHandle {
    tx: mpsc::Sender<Request>,
}

impl ActuatorHandle {
    /// Submit a command and wait until it has been applied.
    ///
    /// Returns whether the actuator is on afterwards.
    pub async fn apply(&self, command: Command) -> Result<bool, ActuatorStopped> {
        let (applied, rx) = oneshot::channel();
        self.tx
            .send(Request { command, applied })
            .await
            .map_err(|_| ActuatorStopped)?;
        rx.await.map_err(|_| ActuatorStopped)
    }
}

/// Spawn the owner task for `actuator`, switching it off first.
pub fn spawn(actuator: Arc<dyn Actuator>) -> (ActuatorHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
    let task = tokio::spawn(run(actuator, rx));
    (ActuatorHandle { tx }, task)
}

async fn run(actuator: Arc<dyn Actuator>, mut rx: mpsc::Receiver<Request>) {
    let mut state = ActuatorState::default();
    actuator.set_state(false).await;

    loop {
        let deadline = state.deadline();
        let wake = deadline.unwrap_or_else(Instant::now);

        tokio::select! {
            request = rx.recv() => {
                let Some(Request { command, applied }) = request else {
                    tracing::debug!("Actuator queue closed, stopping");
                    break;
                };
                let effect = state.apply(&command, Instant::now());
                apply_effect(actuator.as_ref(), effect).await;
                if let Command::Activate { duration } = command {
                    tracing::info!(duration_secs = duration.as_secs_f64(), "Actuator on");
                }
                // The submitter may have given up waiting.
                let _ = applied.send(state.is_on());
            }
            _ = tokio::time::sleep_until(wake), if deadline.is_some() => {
                let effect = state.expire(Instant::now());
                if effect == ActuatorEffect::SwitchOff {
                    tracing::info!("Actuator activation elapsed");
                }
                apply_effect(actuator.as_ref(), effect).await;
            }
        }
    }
}

async fn apply_effect(actuator: &dyn Actuator, effect: ActuatorEffect) {
    match effect {
        ActuatorEffect::SwitchOn => actuator.set_state(true).await,
        ActuatorEffect::SwitchOff => actuator.set_state(false).await,
        ActuatorEffect::Unchanged => {}
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
