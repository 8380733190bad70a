//! Decode routines - attribute reports → semantic writes.
//!
//! Every routine here is a pure function of the message, the device's
//! explicit state and the timing config. None of them touches a timer or the
//! store: they return a [`Decoded`] (writes plus timer requests) that the
//! engine applies afterwards.

pub mod cube;
pub mod occupancy;
pub mod press;
pub mod pulse;
pub mod sensors;
pub mod switches;

use std::time::Duration;

use crate::engine::state::DeviceState;
use crate::engine::timers::TimerKind;
use crate::message::NormalizedMessage;
use crate::store::SemanticWrite;
use crate::types::TimingConfig;

/// What a timer does when it fires.
#[derive(Debug, Clone, PartialEq)]
pub enum TimerAction {
    /// Emit a stored write (the "off" half of a pulse).
    Revert(SemanticWrite),
    /// The occupancy idle timer elapsed.
    OccupancyTimeout,
    /// One period of the `no_motion` counter elapsed.
    NoMotionTick,
}

impl TimerAction {
    /// Run the transition this action stands for.
    pub fn run(&self, state: &mut DeviceState, timing: &TimingConfig) -> Decoded {
        match self {
            TimerAction::Revert(write) => Decoded::from_write(write.clone()),
            TimerAction::OccupancyTimeout => occupancy::on_idle_timeout(&mut state.occupancy, timing),
            TimerAction::NoMotionTick => occupancy::on_no_motion_tick(&mut state.occupancy, timing),
        }
    }
}

/// A timer the engine should (re)arm or cancel for the current device.
#[derive(Debug, Clone, PartialEq)]
pub enum TimerRequest {
    /// Arm a timer, replacing any timer with the same purpose.
    Schedule {
        purpose: String,
        kind: TimerKind,
        delay: Duration,
        action: TimerAction,
    },
    /// Cancel the timer with this purpose, if any.
    Cancel { purpose: String },
}

/// Output of a decode routine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decoded {
    pub writes: Vec<SemanticWrite>,
    pub timers: Vec<TimerRequest>,
}

impl Decoded {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_write(write: SemanticWrite) -> Self {
        Self {
            writes: vec![write],
            timers: Vec::new(),
        }
    }

    pub fn write(&mut self, write: SemanticWrite) -> &mut Self {
        self.writes.push(write);
        self
    }

    pub fn schedule_once(
        &mut self,
        purpose: impl Into<String>,
        delay: Duration,
        action: TimerAction,
    ) -> &mut Self {
        self.timers.push(TimerRequest::Schedule {
            purpose: purpose.into(),
            kind: TimerKind::OneShot,
            delay,
            action,
        });
        self
    }

    pub fn schedule_repeating(
        &mut self,
        purpose: impl Into<String>,
        interval: Duration,
        action: TimerAction,
    ) -> &mut Self {
        self.timers.push(TimerRequest::Schedule {
            purpose: purpose.into(),
            kind: TimerKind::Repeating,
            delay: interval,
            action,
        });
        self
    }

    pub fn cancel(&mut self, purpose: impl Into<String>) -> &mut Self {
        self.timers.push(TimerRequest::Cancel {
            purpose: purpose.into(),
        });
        self
    }

    pub fn extend(&mut self, other: Decoded) {
        self.writes.extend(other.writes);
        self.timers.extend(other.timers);
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.timers.is_empty()
    }

    /// Value written for `key`, if any (last write wins).
    pub fn value_of(&self, key: &str) -> Option<&crate::store::StateValue> {
        self.writes.iter().rev().find(|w| w.key == key).map(|w| &w.value)
    }
}

/// Read a numeric attribute the routine depends on, logging and skipping
/// the field when it is missing or malformed.
pub(crate) fn numeric(msg: &NormalizedMessage, key: &str) -> Option<f64> {
    match msg.require_number(key) {
        Ok(n) => Some(n),
        Err(e) => {
            tracing::debug!(device = %msg.device_id, error = %e, "attribute_skipped");
            None
        }
    }
}

/// Integral variant of [`numeric`].
pub(crate) fn integer(msg: &NormalizedMessage, key: &str) -> Option<i64> {
    match msg.require_integer(key) {
        Ok(n) => Some(n),
        Err(e) => {
            tracing::debug!(device = %msg.device_id, error = %e, "attribute_skipped");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StateValue;

    #[test]
    fn test_builder_collects_in_order() {
        let mut decoded = Decoded::new();
        decoded
            .write(SemanticWrite::boolean("occupancy", true))
            .cancel("no_motion")
            .schedule_once("in_motion", Duration::from_secs(60), TimerAction::OccupancyTimeout);

        assert_eq!(decoded.writes.len(), 1);
        assert_eq!(decoded.timers.len(), 2);
        assert!(matches!(decoded.timers[0], TimerRequest::Cancel { .. }));
        assert_eq!(decoded.value_of("occupancy"), Some(&StateValue::Bool(true)));
    }

    #[test]
    fn test_revert_action_emits_stored_write() {
        let mut state = DeviceState::default();
        let off = SemanticWrite::boolean("click", false);
        let decoded = TimerAction::Revert(off.clone()).run(&mut state, &TimingConfig::default());
        assert_eq!(decoded, Decoded::from_write(off));
    }
}
