//! Hardware capabilities consumed by the field unit.
//!
//! Pulse detection, pulse generation and the actuator output sit behind
//! async traits so the agent logic never touches pins directly. The
//! simulated backend stands in for the physical wiring: it produces
//! random readings and pulses and logs every output change.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use fieldlink_core::ports::PULSE_WIDTH;
use fieldlink_core::{CapabilityError, SensorReading};

/// Detects the counterpart's liveness pulse.
#[async_trait]
pub trait LivenessSensor: Send + Sync {
    /// Watch for a pulse edge for at most `window`. Returns as soon as one
    /// is seen.
    async fn observed_within(&self, window: Duration) -> bool;
}

/// Generates the liveness pulse.
#[async_trait]
pub trait PulseEmitter: Send + Sync {
    /// Fire a single pulse.
    async fn emit(&self);
}

/// Binary output driven by actuator commands.
#[async_trait]
pub trait Actuator: Send + Sync {
    async fn set_state(&self, on: bool);
}

/// Source of sensor readings for each telemetry cycle.
pub trait SensorProbe: Send + Sync {
    fn read(&self) -> SensorReading;
}

// ---------------------------------------------------------------------------
// Simulated backend
// ---------------------------------------------------------------------------

/// Sensor that sees a pulse with a fixed probability per window.
pub struct SimulatedSensor {
    pulse_probability: f64,
}

impl SimulatedSensor {
    pub fn new(pulse_probability: f64) -> Self {
        Self {
            pulse_probability: pulse_probability.clamp(0.0, 1.0),
        }
    }
}

#[async_trait]
impl LivenessSensor for SimulatedSensor {
    async fn observed_within(&self, window: Duration) -> bool {
        let (seen, after) = {
            let mut rng = rand::rng();
            let seen = rng.random_bool(self.pulse_probability);
            (seen, window.mul_f64(rng.random_range(0.0..1.0)))
        };

        if seen {
            tokio::time::sleep(after).await;
        } else {
            tokio::time::sleep(window).await;
        }
        seen
    }
}

/// Emitter that holds a virtual line high for the pulse width.
pub struct SimulatedEmitter {
    pulse_width: Duration,
    pulses: AtomicU64,
}

impl SimulatedEmitter {
    pub fn new(pulse_width: Duration) -> Self {
        Self {
            pulse_width,
            pulses: AtomicU64::new(0),
        }
    }

    pub fn pulses(&self) -> u64 {
        self.pulses.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl PulseEmitter for SimulatedEmitter {
    async fn emit(&self) {
        tracing::trace!("Pulse line high");
        tokio::time::sleep(self.pulse_width).await;
        tracing::trace!("Pulse line low");
        let count = self.pulses.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(count, "Liveness pulse emitted");
    }
}

/// Actuator that records its state and logs every change.
#[derive(Default)]
pub struct SimulatedActuator {
    on: AtomicBool,
    writes: AtomicU64,
}

impl SimulatedActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_on(&self) -> bool {
        self.on.load(Ordering::SeqCst)
    }

    /// Number of state writes, including writes that did not change state.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Actuator for SimulatedActuator {
    async fn set_state(&self, on: bool) {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let was_on = self.on.swap(on, Ordering::SeqCst);
        if was_on != on {
            tracing::info!(on, "Actuator output switched");
        }
    }
}

/// Probe producing uniformly random percentages.
#[derive(Default)]
pub struct RandomProbe;

impl SensorProbe for RandomProbe {
    fn read(&self) -> SensorReading {
        let mut rng = rand::rng();
        SensorReading::new(
            rng.random_range(0.0..100.0),
            rng.random_range(0.0..100.0),
            rng.random_range(0.0..100.0),
            rng.random_range(0.0..100.0),
        )
    }
}

// ---------------------------------------------------------------------------
// Acquisition
// ---------------------------------------------------------------------------

/// Backend name accepted by [`Hardware::acquire`].
pub const SIMULATED_BACKEND: &str = "simulated";

/// The full set of capabilities a field unit runs with.
#[derive(Clone)]
pub struct Hardware {
    pub sensor: Arc<dyn LivenessSensor>,
    pub emitter: Arc<dyn PulseEmitter>,
    pub actuator: Arc<dyn Actuator>,
    pub probe: Arc<dyn SensorProbe>,
}

impl Hardware {
    /// Acquire every capability from the named backend.
    ///
    /// Failure here is fatal for the agent.
    pub fn acquire(backend: &str, pulse_probability: f64) -> Result<Self, CapabilityError> {
        match backend {
            SIMULATED_BACKEND => {
                tracing::info!(backend, pulse_probability, "Hardware capabilities acquired");
                Ok(Self {
                    sensor: Arc::new(SimulatedSensor::new(pulse_probability)),
                    emitter: Arc::new(SimulatedEmitter::new(PULSE_WIDTH)),
                    actuator: Arc::new(SimulatedActuator::new()),
                    probe: Arc::new(RandomProbe),
                })
            }
            other => Err(CapabilityError::UnknownBackend(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
