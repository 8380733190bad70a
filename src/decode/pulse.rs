//! Pulse emitter - set a state, revert it after a hold window.

use std::time::Duration;

use super::{Decoded, TimerAction};
use crate::store::{SemanticWrite, StateValue};

/// Timer purpose used for the revert of `key`.
pub fn pulse_purpose(key: &str) -> String {
    format!("pulse:{}", key)
}

/// Emit `on` now and `off_value` under the same key after `hold`.
///
/// The revert timer is keyed by the write's key, so a retrigger replaces the
/// pending revert: the state stays "on" until `hold` after the last trigger
/// and reverts exactly once.
pub fn pulse(on: SemanticWrite, off_value: StateValue, hold: Duration) -> Decoded {
    let off = on.with_value(off_value);
    let purpose = pulse_purpose(&on.key);
    let mut decoded = Decoded::from_write(on);
    decoded.schedule_once(purpose, hold, TimerAction::Revert(off));
    decoded
}

/// Boolean pulse: `key` true now, false after `hold`.
pub fn flag(key: &str, hold: Duration) -> Decoded {
    pulse(SemanticWrite::boolean(key, true), StateValue::Bool(false), hold)
}
