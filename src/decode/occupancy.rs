//! Occupancy tracker for motion sensors (RTCGQ01LM, RTCGQ11LM).
//!
//! The sensor only ever reports motion; "no motion" is synthesised here:
//!
//! ```text
//!            occupancy=1                      idle timer
//! idle ───────────────────► occupied ───────────────────► idle + counting
//!   ▲                         │  ▲                              │
//!   │                         └──┘ occupancy=1 with idle timer  │ tick: no_motion += 1
//!   │                              armed: timer cancelled       │ stop after the limit
//!   └──────────────── occupancy=1 resets no_motion to 0 ◄───────┘
//! ```
//!
//! Invariant: the idle timer and the `no_motion` counter never run together.

use serde::{Deserialize, Serialize};

use super::Decoded;
use crate::store::SemanticWrite;
use crate::types::TimingConfig;

/// Purpose of the idle (occupied → idle) timer.
pub const IDLE_TIMER: &str = "in_motion";
/// Purpose of the repeating `no_motion` counter.
pub const NO_MOTION_TIMER: &str = "no_motion";

/// Explicit per-device occupancy state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancyState {
    pub occupied: bool,
    pub idle_timer_active: bool,
    /// Whether the `no_motion` counter is running.
    pub counting: bool,
    /// Last value written to `no_motion`.
    pub no_motion_counter: u32,
}

fn occupancy(value: bool) -> SemanticWrite {
    SemanticWrite::boolean("occupancy", value)
}

fn no_motion(seconds: u32) -> SemanticWrite {
    SemanticWrite::number("no_motion", f64::from(seconds)).with_unit("sec")
}

/// A motion report (`occupancy = 1`).
///
/// A second report while the idle timer is armed cancels the timer without
/// re-arming it; the next report arms it again.
pub fn on_motion(state: &mut OccupancyState, timing: &TimingConfig) -> Decoded {
    let mut decoded = Decoded::new();

    state.occupied = true;
    decoded.write(occupancy(true));

    if state.counting {
        state.counting = false;
        decoded.cancel(NO_MOTION_TIMER);
    }
    state.no_motion_counter = 0;
    decoded.write(no_motion(0));

    if state.idle_timer_active {
        state.idle_timer_active = false;
        decoded.cancel(IDLE_TIMER);
    } else {
        state.idle_timer_active = true;
        decoded.schedule_once(
            IDLE_TIMER,
            timing.occupancy_timeout,
            super::TimerAction::OccupancyTimeout,
        );
    }

    decoded
}

/// The idle timer elapsed: occupancy drops and the counter starts.
pub fn on_idle_timeout(state: &mut OccupancyState, timing: &TimingConfig) -> Decoded {
    let mut decoded = Decoded::new();

    state.idle_timer_active = false;
    state.occupied = false;
    decoded.write(occupancy(false));

    if !state.counting {
        state.counting = true;
        state.no_motion_counter = 0;
        decoded.schedule_repeating(
            NO_MOTION_TIMER,
            timing.no_motion_interval,
            super::TimerAction::NoMotionTick,
        );
    }

    decoded
}

/// One counter period elapsed.
///
/// Writes the next value; once `no_motion_limit` has been written the
/// counter cancels itself and the value freezes.
pub fn on_no_motion_tick(state: &mut OccupancyState, timing: &TimingConfig) -> Decoded {
    let mut decoded = Decoded::new();
    if !state.counting {
        return decoded;
    }

    state.no_motion_counter = state.no_motion_counter.saturating_add(1);
    decoded.write(no_motion(state.no_motion_counter));

    if state.no_motion_counter >= timing.no_motion_limit {
        state.counting = false;
        decoded.cancel(NO_MOTION_TIMER);
    }

    decoded
}
