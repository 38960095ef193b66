//! Timed actuator state machine.
//!
//! Pure logic: the caller supplies the current instant and applies the
//! returned [`ActuatorEffect`] to the physical output. A single owner
//! drives both command application and expiry, so an expiry can never
//! race a newer activation.

use std::time::Duration;

use tokio::time::Instant;

use crate::command::Command;

/// Stand-in deadline for activations too long to represent.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActuatorState {
    /// Never activated.
    #[default]
    Idle,
    /// On until the deadline passes or a deactivation arrives.
    ActiveUntil(Instant),
    /// Switched off after having been active.
    Off,
}

/// What the owner must do to the physical output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorEffect {
    SwitchOn,
    SwitchOff,
    Unchanged,
}

impl ActuatorState {
    pub fn is_on(&self) -> bool {
        matches!(self, ActuatorState::ActiveUntil(_))
    }

    /// Pending auto-off instant, if active.
    pub fn deadline(&self) -> Option<Instant> {
        match self {
            ActuatorState::ActiveUntil(deadline) => Some(*deadline),
            _ => None,
        }
    }

    /// Apply a command received at `now`.
    ///
    /// A new activation replaces any pending deadline. Deactivating an
    /// actuator that is not on has no effect.
    pub fn apply(&mut self, command: &Command, now: Instant) -> ActuatorEffect {
        match command {
            Command::Activate { duration } => {
                let deadline = now
                    .checked_add(*duration)
                    .unwrap_or_else(|| now + FAR_FUTURE);
                *self = ActuatorState::ActiveUntil(deadline);
                ActuatorEffect::SwitchOn
            }
            Command::Deactivate => {
                if self.is_on() {
                    *self = ActuatorState::Off;
                    ActuatorEffect::SwitchOff
                } else {
                    ActuatorEffect::Unchanged
                }
            }
        }
    }

    /// Switch off if the pending deadline has passed at `now`.
    pub fn expire(&mut self, now: Instant) -> ActuatorEffect {
        match self {
            ActuatorState::ActiveUntil(deadline) if *deadline <= now => {
                *self = ActuatorState::Off;
                ActuatorEffect::SwitchOff
            }
            _ => ActuatorEffect::Unchanged,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn activate(secs: u64) -> Command {
        Command::Activate {
            duration: Duration::from_secs(secs),
        }
    }

    #[test]
    fn activation_sets_deadline() {
        let now = Instant::now();
        let mut state = ActuatorState::default();

        assert_eq!(state.apply(&activate(3), now), ActuatorEffect::SwitchOn);
        assert!(state.is_on());
        assert_eq!(state.deadline(), Some(now + Duration::from_secs(3)));
    }

    #[test]
    fn expires_only_once_deadline_passed() {
        let now = Instant::now();
        let mut state = ActuatorState::default();
        state.apply(&activate(3), now);

        assert_eq!(
            state.expire(now + Duration::from_millis(2_999)),
            ActuatorEffect::Unchanged
        );
        assert!(state.is_on());

        assert_eq!(
            state.expire(now + Duration::from_secs(3)),
            ActuatorEffect::SwitchOff
        );
        assert_eq!(state, ActuatorState::Off);

        // A second expiry check is a no-op.
        assert_eq!(
            state.expire(now + Duration::from_secs(10)),
            ActuatorEffect::Unchanged
        );
    }

    #[test]
    fn newer_activation_supersedes_deadline() {
        let now = Instant::now();
        let mut state = ActuatorState::default();
        state.apply(&activate(2), now);
        state.apply(&activate(5), now + Duration::from_secs(1));

        assert_eq!(
            state.expire(now + Duration::from_secs(2)),
            ActuatorEffect::Unchanged
        );
        assert_eq!(
            state.expire(now + Duration::from_secs(6)),
            ActuatorEffect::SwitchOff
        );
    }

    #[test]
    fn deactivate_cancels_pending_expiry() {
        let now = Instant::now();
        let mut state = ActuatorState::default();
        state.apply(&activate(3), now);

        assert_eq!(state.apply(&Command::Deactivate, now), ActuatorEffect::SwitchOff);
        assert_eq!(state.deadline(), None);
        assert_eq!(
            state.expire(now + Duration::from_secs(3)),
            ActuatorEffect::Unchanged
        );
    }

    #[test]
    fn deactivate_when_off_is_idempotent() {
        let now = Instant::now();
        let mut state = ActuatorState::default();

        assert_eq!(state.apply(&Command::Deactivate, now), ActuatorEffect::Unchanged);
        assert_eq!(state, ActuatorState::Idle);

        state.apply(&activate(1), now);
        state.apply(&Command::Deactivate, now);
        assert_eq!(state.apply(&Command::Deactivate, now), ActuatorEffect::Unchanged);
        assert_eq!(state, ActuatorState::Off);
    }

    #[test]
    fn huge_duration_does_not_overflow() {
        let now = Instant::now();
        let mut state = ActuatorState::default();
        state.apply(
            &Command::Activate {
                duration: Duration::MAX,
            },
            now,
        );
        assert!(state.is_on());
        assert_eq!(state.expire(now + Duration::from_secs(3600)), ActuatorEffect::Unchanged);
    }
}
