//! Per-device explicit state.

use serde::{Deserialize, Serialize};

use super::timers::TimerInfo;
use crate::decode::occupancy::OccupancyState;
use crate::decode::press::PressSession;

/// Everything the engine remembers about one device between messages.
///
/// Lives only in memory; dropped when the device is removed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceState {
    /// At most one press session per device; a new press-down overwrites it.
    pub press: Option<PressSession>,
    pub occupancy: OccupancyState,
}

/// Diagnostic copy of a device's state and live timers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    pub press_active: bool,
    pub occupancy: OccupancyState,
    pub timers: Vec<TimerInfo>,
}
