//! Mi/Aqara magic cube (MFKZQ01LM) gesture decoding.
//!
//! The cube reports every gesture as one `presentValue` on the multistate
//! input cluster. Faces are numbered 0-5; side 5 carries the MI logo and
//! side 3 the battery door.
//!
//! | presentValue     | gesture                           |
//! |------------------|-----------------------------------|
//! | `x + 512`        | double tap with side `x` on top   |
//! | `x + 256`        | push/slide with side `x` on top   |
//! | `x + 128`        | 180° flip to side `x`             |
//! | `64 + 8*x + y`   | 90° flip from side `x` to side `y`|
//! | `3`              | free fall                         |
//! | `2`              | wake up                           |
//! | `0`              | shake                             |
//!
//! Rotation arrives separately on the analog input cluster, tagged with
//! attribute `65285 = 500`.

use std::time::Duration;

use super::{pulse, Decoded};
use crate::message::NormalizedMessage;
use crate::store::SemanticWrite;

/// Tag value of attribute `65285` on rotation reports.
pub const ROTATION_TAG: i64 = 500;

/// A decoded cube gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CubeGesture {
    Shake,
    Wakeup,
    Fall,
    Flip90 { from: i64, to: i64 },
    Flip180 { side: i64 },
    Slide { side: i64 },
    DoubleTap { side: i64 },
}

impl CubeGesture {
    /// Decode a `presentValue`. Codes outside the table yield `None`.
    ///
    /// Ranges are checked from the highest down, so each code maps to
    /// exactly one gesture.
    pub fn decode(v: i64) -> Option<Self> {
        match v {
            v if v >= 512 => Some(CubeGesture::DoubleTap { side: v - 512 }),
            v if v >= 256 => Some(CubeGesture::Slide { side: v - 256 }),
            v if v >= 128 => Some(CubeGesture::Flip180 { side: v - 128 }),
            v if v >= 64 => Some(CubeGesture::Flip90 {
                from: (v - 64) / 8,
                to: (v - 64) % 8,
            }),
            3 => Some(CubeGesture::Fall),
            2 => Some(CubeGesture::Wakeup),
            0 => Some(CubeGesture::Shake),
            _ => None,
        }
    }

    /// Name of the boolean flag pulsed for this gesture.
    pub fn flag(&self) -> &'static str {
        match self {
            CubeGesture::Shake => "shake",
            CubeGesture::Wakeup => "wakeup",
            CubeGesture::Fall => "fall",
            CubeGesture::Flip90 { .. } => "flip90",
            CubeGesture::Flip180 { .. } => "flip180",
            CubeGesture::Slide { .. } => "slide",
            CubeGesture::DoubleTap { .. } => "tap",
        }
    }

    /// Pulse the gesture flag and write its face indices.
    pub fn to_decoded(&self, hold: Duration) -> Decoded {
        let mut decoded = pulse::flag(self.flag(), hold);
        match *self {
            CubeGesture::Flip90 { from, to } => {
                decoded.write(SemanticWrite::number("flip90_from", from as f64));
                decoded.write(SemanticWrite::number("flip90_to", to as f64));
            }
            CubeGesture::Flip180 { side } => {
                decoded.write(SemanticWrite::number("flip180_side", side as f64));
            }
            CubeGesture::Slide { side } => {
                decoded.write(SemanticWrite::number("slide_side", side as f64));
            }
            CubeGesture::DoubleTap { side } => {
                decoded.write(SemanticWrite::number("tap_side", side as f64));
            }
            CubeGesture::Shake | CubeGesture::Wakeup | CubeGesture::Fall => {}
        }
        decoded
    }
}

/// Decode a multistate-input report from the cube.
pub fn decode_gesture(msg: &NormalizedMessage, hold: Duration) -> Decoded {
    let Some(v) = super::integer(msg, "presentValue") else {
        return Decoded::new();
    };
    match CubeGesture::decode(v) {
        Some(gesture) => gesture.to_decoded(hold),
        None => {
            tracing::debug!(device = %msg.device_id, code = v, "cube_code_ignored");
            Decoded::new()
        }
    }
}

/// Decode an analog-input rotation report from the cube.
pub fn decode_rotation(msg: &NormalizedMessage, hold: Duration) -> Decoded {
    if msg.integer("65285") != Some(ROTATION_TAG) {
        return Decoded::new();
    }
    let Some(angle) = super::numeric(msg, "presentValue") else {
        return Decoded::new();
    };

    let mut decoded = pulse::flag("rotate", hold);
    decoded.write(SemanticWrite::number("rotate_angle", angle).with_unit("°"));
    decoded.write(SemanticWrite::text(
        "rotate_dir",
        if angle < 0.0 { "left" } else { "right" },
    ));
    decoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StateValue;
    use crate::types::DeviceId;
    use proptest::prelude::*;
    use serde_json::json;

    const HOLD: Duration = Duration::from_millis(300);

    #[test]
    fn test_simple_gestures() {
        assert_eq!(CubeGesture::decode(0), Some(CubeGesture::Shake));
        assert_eq!(CubeGesture::decode(2), Some(CubeGesture::Wakeup));
        assert_eq!(CubeGesture::decode(3), Some(CubeGesture::Fall));
        assert_eq!(CubeGesture::decode(1), None);
        assert_eq!(CubeGesture::decode(63), None);
        assert_eq!(CubeGesture::decode(-1), None);
    }

    #[test]
    fn test_range_boundaries() {
        assert_eq!(CubeGesture::decode(512), Some(CubeGesture::DoubleTap { side: 0 }));
        assert_eq!(CubeGesture::decode(511), Some(CubeGesture::Slide { side: 255 }));
        assert_eq!(CubeGesture::decode(258), Some(CubeGesture::Slide { side: 2 }));
        assert_eq!(CubeGesture::decode(133), Some(CubeGesture::Flip180 { side: 5 }));
        assert_eq!(CubeGesture::decode(64), Some(CubeGesture::Flip90 { from: 0, to: 0 }));
        assert_eq!(CubeGesture::decode(127), Some(CubeGesture::Flip90 { from: 7, to: 7 }));
    }

    #[test]
    fn test_flip90_writes_faces() {
        let decoded = CubeGesture::decode(64 + 8 * 2 + 5).unwrap().to_decoded(HOLD);
        assert_eq!(decoded.value_of("flip90"), Some(&StateValue::Bool(true)));
        assert_eq!(decoded.value_of("flip90_from"), Some(&StateValue::Number(2.0)));
        assert_eq!(decoded.value_of("flip90_to"), Some(&StateValue::Number(5.0)));
        assert_eq!(decoded.timers.len(), 1);
    }

    #[test]
    fn test_unmatched_code_is_silent() {
        let msg = NormalizedMessage::new(DeviceId::must("cube"), "lumi.sensor_cube", "genMultistateInput")
            .with_attr("presentValue", json!(17));
        assert!(decode_gesture(&msg, HOLD).is_empty());
    }

    #[test]
    fn test_rotation() {
        let msg = NormalizedMessage::new(DeviceId::must("cube"), "lumi.sensor_cube", "genAnalogInput")
            .with_attr("65285", json!(500))
            .with_attr("presentValue", json!(-23.5));
        let decoded = decode_rotation(&msg, HOLD);

        assert_eq!(decoded.value_of("rotate"), Some(&StateValue::Bool(true)));
        assert_eq!(decoded.value_of("rotate_angle"), Some(&StateValue::Number(-23.5)));
        assert_eq!(decoded.value_of("rotate_dir"), Some(&StateValue::Text("left".into())));
    }

    #[test]
    fn test_rotation_requires_tag() {
        let msg = NormalizedMessage::new(DeviceId::must("cube"), "lumi.sensor_cube", "genAnalogInput")
            .with_attr("65285", json!(360))
            .with_attr("presentValue", json!(12));
        assert!(decode_rotation(&msg, HOLD).is_empty());
    }

    proptest! {
        #[test]
        fn prop_flip90_round_trip(from in 0i64..8, to in 0i64..8) {
            let v = 64 + 8 * from + to;
            prop_assert_eq!(CubeGesture::decode(v), Some(CubeGesture::Flip90 { from, to }));
        }

        #[test]
        fn prop_double_tap_side(side in 0i64..10_000) {
            prop_assert_eq!(CubeGesture::decode(512 + side), Some(CubeGesture::DoubleTap { side }));
        }
    }
}
