//! Press classifier for Aqara push buttons (WXKG01LM, WXKG11LM).
//!
//! The button reports `onOff = 0` on press-down and `onOff = 1` on release;
//! the engine measures the time between them. Double/triple/quad clicks come
//! separately as attribute `32768` and never touch the press session.
//!
//! ```text
//! idle --onOff=0--> pressed --onOff=1--> idle (click | long_click)
//!                   pressed --onOff=0--> pressed (start time reset)
//! idle --onOff=1--> idle (nothing emitted)
//! ```

use std::time::Duration;
use tokio::time::Instant;

use super::{pulse, Decoded};
use crate::message::NormalizedMessage;
use crate::store::SemanticWrite;
use crate::types::TimingConfig;

/// Attribute carrying the multi-click count.
pub const MULTI_CLICK_ATTR: &str = "32768";

/// An in-progress press on one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PressSession {
    pub started_at: Instant,
}

/// Result of classifying a completed press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressKind {
    Short,
    /// Long press; `seconds` is the elapsed time truncated to whole seconds.
    Long { seconds: u64 },
}

/// Classify a press by its duration.
///
/// A press is long once it lasts a whole second, or when the sub-second part
/// exceeds `threshold` (strictly greater, at full precision).
pub fn classify(elapsed: Duration, threshold: Duration) -> PressKind {
    let seconds = elapsed.as_secs();
    if seconds > 0 || u128::from(elapsed.subsec_nanos()) > threshold.as_nanos() {
        PressKind::Long { seconds }
    } else {
        PressKind::Short
    }
}

/// Start (or restart) the press session.
pub fn press_down(session: &mut Option<PressSession>, now: Instant) {
    if session.is_some() {
        tracing::trace!("press_session_restarted");
    }
    *session = Some(PressSession { started_at: now });
}

/// Finish the press session and emit the click it represents.
///
/// A release without a session (duplicate or out-of-order report) emits nothing.
pub fn release(session: &mut Option<PressSession>, now: Instant, timing: &TimingConfig) -> Decoded {
    let Some(started) = session.take() else {
        tracing::debug!("release_without_press_ignored");
        return Decoded::new();
    };

    let elapsed = now.saturating_duration_since(started.started_at);
    match classify(elapsed, timing.long_press_threshold) {
        PressKind::Short => pulse::flag("click", timing.pulse_hold),
        PressKind::Long { seconds } => {
            let mut decoded = pulse::flag("long_click", timing.pulse_hold);
            decoded.write(SemanticWrite::number("click_elapsed", seconds as f64).with_unit("sec"));
            decoded
        }
    }
}

/// Key pulsed for a multi-click count, if the count is one the button sends.
pub fn multi_click_key(count: i64) -> Option<&'static str> {
    match count {
        2 => Some("double_click"),
        3 => Some("triple_click"),
        4 => Some("quad_click"),
        _ => None,
    }
}

/// Decode one report from a push button.
pub fn decode_button(
    msg: &NormalizedMessage,
    session: &mut Option<PressSession>,
    now: Instant,
    timing: &TimingConfig,
) -> Decoded {
    match msg.integer("onOff") {
        Some(0) => {
            press_down(session, now);
            Decoded::new()
        }
        Some(1) => release(session, now, timing),
        _ => match msg.integer(MULTI_CLICK_ATTR).and_then(multi_click_key) {
            Some(key) => pulse::flag(key, timing.pulse_hold),
            None => Decoded::new(),
        },
    }
}
