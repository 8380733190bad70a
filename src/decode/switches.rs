//! On/off model families: lights, plugs, contacts, wall switches.

use std::time::Duration;

use super::{integer, numeric, pulse, Decoded};
use crate::message::NormalizedMessage;
use crate::store::SemanticWrite;

/// Device class ids of the WXKG02LM wall switch endpoints.
pub const SW2_LEFT_CLASS: u32 = 24321;
pub const SW2_RIGHT_CLASS: u32 = 24322;
pub const SW2_BOTH_CLASS: u32 = 24323;

/// Device class of the QBKG03LM relay endpoints.
pub const NEUTRAL2_RELAY_CLASS: u32 = 256;
/// Device class of the QBKG03LM button endpoints.
pub const NEUTRAL2_BUTTON_CLASS: u32 = 0;

fn on_off(msg: &NormalizedMessage) -> Option<i64> {
    integer(msg, "onOff")
}

/// Controllable output (bulb, plug, in-wall relay): writable `state`.
pub fn output_state(msg: &NormalizedMessage) -> Decoded {
    match on_off(msg) {
        Some(v) => Decoded::from_write(SemanticWrite::boolean("state", v == 1).writable()),
        None => Decoded::new(),
    }
}

/// Door/window magnet (MCCGQ01LM, MCCGQ11LM): `contact`.
pub fn magnet_contact(msg: &NormalizedMessage) -> Decoded {
    match on_off(msg) {
        Some(v) => Decoded::from_write(SemanticWrite::boolean("contact", v == 1)),
        None => Decoded::new(),
    }
}

/// WXKG02LM wireless wall switch: one endpoint per key, no release report.
pub fn wall_switch_86sw2(msg: &NormalizedMessage, hold: Duration) -> Decoded {
    let key = match msg.device_class_id {
        SW2_LEFT_CLASS => "left_click",
        SW2_RIGHT_CLASS => "right_click",
        SW2_BOTH_CLASS => "both_click",
        _ => "click",
    };
    pulse::flag(key, hold)
}

/// QBKG03LM wired double switch.
///
/// Relay endpoints (class 256) report the output state; button endpoints
/// (class 0, endpoints 4/5/6) report down (0), up (1) and double click (2).
pub fn wall_switch_neutral2(msg: &NormalizedMessage) -> Decoded {
    let Some(v) = on_off(msg) else {
        return Decoded::new();
    };
    let mut decoded = Decoded::new();

    match (msg.device_class_id, msg.endpoint_id) {
        (NEUTRAL2_RELAY_CLASS, 2 | 4) => relay_state(&mut decoded, "left_state", v),
        (NEUTRAL2_RELAY_CLASS, 3 | 5) => relay_state(&mut decoded, "right_state", v),
        (NEUTRAL2_BUTTON_CLASS, 4) => button_event(&mut decoded, "left_", v),
        (NEUTRAL2_BUTTON_CLASS, 5) => button_event(&mut decoded, "right_", v),
        (NEUTRAL2_BUTTON_CLASS, 6) => button_event(&mut decoded, "both_", v),
        _ => {}
    }
    decoded
}

fn relay_state(decoded: &mut Decoded, key: &str, v: i64) {
    match v {
        0 => {
            decoded.write(SemanticWrite::boolean(key, false).writable());
        }
        1 => {
            decoded.write(SemanticWrite::boolean(key, true).writable());
        }
        _ => {}
    }
}

fn button_event(decoded: &mut Decoded, prefix: &str, v: i64) {
    match v {
        0 => {
            decoded.write(SemanticWrite::boolean(format!("{}click", prefix), false));
        }
        1 => {
            decoded.write(SemanticWrite::boolean(format!("{}click", prefix), true));
        }
        2 => {
            decoded.write(SemanticWrite::boolean(format!("{}double_click", prefix), true));
        }
        _ => {}
    }
}

/// Fallback for on/off reports no model family claimed.
///
/// Xiaomi switches get a `click` pulse on release; anything else gets the raw
/// on/off value under `click`.
pub fn generic_on_off(msg: &NormalizedMessage, hold: Duration) -> Decoded {
    let Some(v) = msg.number("onOff") else {
        return Decoded::new();
    };
    if msg.model_contains("lumi.sensor_switch") {
        if v == 1.0 {
            pulse::flag("click", hold)
        } else {
            Decoded::new()
        }
    } else {
        Decoded::from_write(SemanticWrite::number("click", v))
    }
}

/// Analog-input power reading on plugs and in-wall relays.
pub fn load_power(msg: &NormalizedMessage) -> Decoded {
    let Some(watts) = numeric(msg, "presentValue") else {
        return Decoded::new();
    };
    let mut decoded = Decoded::from_write(SemanticWrite::number("load_power", watts).with_unit("W"));
    if msg.model_contains("lumi.plug") || msg.model_contains("lumi.ctrl_86plug") {
        decoded.write(SemanticWrite::boolean("in_use", watts > 0.0));
    }
    decoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StateValue;
    use crate::types::DeviceId;
    use serde_json::json;

    const HOLD: Duration = Duration::from_millis(300);

    fn msg(model: &str, cluster: &str) -> NormalizedMessage {
        NormalizedMessage::new(DeviceId::must("dev"), model, cluster)
    }

    #[test]
    fn test_output_state_writable() {
        let decoded = output_state(&msg("lumi.plug", "genOnOff").with_attr("onOff", json!(1)));
        assert_eq!(decoded.value_of("state"), Some(&StateValue::Bool(true)));
        assert!(decoded.writes[0].metadata.writable);
    }

    #[test]
    fn test_magnet_contact() {
        let decoded = magnet_contact(&msg("lumi.sensor_magnet.aq2", "genOnOff").with_attr("onOff", json!(0)));
        assert_eq!(decoded.value_of("contact"), Some(&StateValue::Bool(false)));
        assert!(!decoded.writes[0].metadata.writable);
    }

    #[test]
    fn test_86sw2_keys_by_device_class() {
        let m = msg("lumi.sensor_86sw2\u{0}Un", "genOnOff").with_attr("onOff", json!(1));
        let left = wall_switch_86sw2(&m.clone().with_device_class(SW2_LEFT_CLASS), HOLD);
        assert_eq!(left.value_of("left_click"), Some(&StateValue::Bool(true)));
        let both = wall_switch_86sw2(&m.clone().with_device_class(SW2_BOTH_CLASS), HOLD);
        assert_eq!(both.value_of("both_click"), Some(&StateValue::Bool(true)));
        assert_eq!(both.timers.len(), 1);
    }

    #[test]
    fn test_neutral2_relays_and_buttons() {
        let base = msg("lumi.ctrl_neutral2", "genOnOff");

        let relay = wall_switch_neutral2(
            &base
                .clone()
                .with_device_class(NEUTRAL2_RELAY_CLASS)
                .with_endpoint(3)
                .with_attr("onOff", json!(1)),
        );
        assert_eq!(relay.value_of("right_state"), Some(&StateValue::Bool(true)));

        let down = wall_switch_neutral2(
            &base
                .clone()
                .with_device_class(NEUTRAL2_BUTTON_CLASS)
                .with_endpoint(4)
                .with_attr("onOff", json!(0)),
        );
        assert_eq!(down.value_of("left_click"), Some(&StateValue::Bool(false)));

        let double = wall_switch_neutral2(
            &base
                .with_device_class(NEUTRAL2_BUTTON_CLASS)
                .with_endpoint(6)
                .with_attr("onOff", json!(2)),
        );
        assert_eq!(double.value_of("both_double_click"), Some(&StateValue::Bool(true)));
    }

    #[test]
    fn test_neutral2_unknown_endpoint_ignored() {
        let m = msg("lumi.ctrl_neutral2", "genOnOff")
            .with_device_class(NEUTRAL2_RELAY_CLASS)
            .with_endpoint(1)
            .with_attr("onOff", json!(1));
        assert!(wall_switch_neutral2(&m).is_empty());
    }

    #[test]
    fn test_generic_on_off() {
        let raw = generic_on_off(&msg("some.vendor.switch", "genOnOff").with_attr("onOff", json!(0)), HOLD);
        assert_eq!(raw.value_of("click"), Some(&StateValue::Number(0.0)));
        assert!(raw.timers.is_empty());

        let pulsed = generic_on_off(&msg("lumi.sensor_switch", "genOnOff").with_attr("onOff", json!(1)), HOLD);
        assert_eq!(pulsed.value_of("click"), Some(&StateValue::Bool(true)));
        assert_eq!(pulsed.timers.len(), 1);

        let down = generic_on_off(&msg("lumi.sensor_switch", "genOnOff").with_attr("onOff", json!(0)), HOLD);
        assert!(down.is_empty());
    }

    #[test]
    fn test_load_power() {
        let plug = load_power(&msg("lumi.plug", "genAnalogInput").with_attr("presentValue", json!(12.5)));
        assert_eq!(plug.value_of("load_power"), Some(&StateValue::Number(12.5)));
        assert_eq!(plug.value_of("in_use"), Some(&StateValue::Bool(true)));

        let relay = load_power(&msg("lumi.ctrl_ln1.aq1", "genAnalogInput").with_attr("presentValue", json!(0)));
        assert_eq!(relay.value_of("load_power"), Some(&StateValue::Number(0.0)));
        assert_eq!(relay.value_of("in_use"), None);
    }
}
