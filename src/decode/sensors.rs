//! Numeric sensor clusters - direct scale/offset transforms, no timers.
//!
//! Out-of-range readings propagate as-is (a 3.3V cell reads as 120% battery).

use serde_json::Value;

use super::{numeric, Decoded};
use crate::message::NormalizedMessage;
use crate::store::SemanticWrite;

/// Xiaomi "heartbeat" attribute on newer Aqara sensors (struct keyed by tag).
pub const AQARA_REPORT_ATTR: &str = "65281";
/// Xiaomi "heartbeat" attribute on older Mijia sensors (tagged elements).
pub const MIJIA_REPORT_ATTR: &str = "65282";

/// Millivolts at which the battery percentage reads 0.
const BATTERY_EMPTY_MV: f64 = 2700.0;
/// Millivolts per percentage point.
const BATTERY_MV_PER_PERCENT: f64 = 5.0;

fn scaled(msg: &NormalizedMessage, attr: &str, key: &str, divisor: f64, unit: &str) -> Decoded {
    match numeric(msg, attr) {
        Some(raw) => Decoded::from_write(SemanticWrite::number(key, raw / divisor).with_unit(unit)),
        None => Decoded::new(),
    }
}

/// `msTemperatureMeasurement`: centi-degrees → °C.
pub fn temperature(msg: &NormalizedMessage) -> Decoded {
    scaled(msg, "measuredValue", "temperature", 100.0, "°C")
}

/// `msRelativeHumidity`: centi-percent → %.
pub fn humidity(msg: &NormalizedMessage) -> Decoded {
    scaled(msg, "measuredValue", "humidity", 100.0, "%")
}

/// `msPressureMeasurement`: the scaled value (attribute 16) in tenths of hPa.
pub fn pressure(msg: &NormalizedMessage) -> Decoded {
    scaled(msg, "16", "pressure", 10.0, "hPa")
}

/// `msIlluminanceMeasurement`: raw value, no transform.
pub fn illuminance(msg: &NormalizedMessage) -> Decoded {
    scaled(msg, "measuredValue", "illuminance", 1.0, "lx")
}

/// `lightingColorCtrl`: mired colour temperature.
pub fn color_temperature(msg: &NormalizedMessage) -> Decoded {
    match numeric(msg, "colorTemperature") {
        Some(v) => Decoded::from_write(SemanticWrite::number("colortemp", v).writable()),
        None => Decoded::new(),
    }
}

/// `genLevelCtrl`: current brightness level.
pub fn level(msg: &NormalizedMessage) -> Decoded {
    match numeric(msg, "currentLevel") {
        Some(v) => Decoded::from_write(SemanticWrite::number("level", v).writable()),
        None => Decoded::new(),
    }
}

/// `ssIasZone` status change: water leak / gas / smoke detected.
pub fn ias_zone(msg: &NormalizedMessage) -> Decoded {
    match numeric(msg, "zoneStatus") {
        Some(status) => Decoded::from_write(SemanticWrite::boolean("detected", status == 1.0)),
        None => Decoded::new(),
    }
}

/// Element `idx` of a tagged struct, whether it arrived as an object keyed
/// by tag or as an array.
fn member<'a>(value: &'a Value, idx: usize) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(&idx.to_string()),
        Value::Array(items) => items.get(idx),
        _ => None,
    }
}

/// Battery millivolts from the Xiaomi heartbeat attributes.
///
/// The Mijia layout (`65282[1].elmVal`) wins when both are present.
pub fn battery_millivolts(msg: &NormalizedMessage) -> Option<f64> {
    let mijia = msg
        .attr(MIJIA_REPORT_ATTR)
        .and_then(|v| member(v, 1))
        .and_then(|v| v.get("elmVal"))
        .and_then(crate::message::coerce_number);
    let aqara = msg
        .attr(AQARA_REPORT_ATTR)
        .and_then(|v| member(v, 1))
        .and_then(crate::message::coerce_number);

    let mv = mijia.or(aqara);
    if mv.is_none() && (msg.has_attr(MIJIA_REPORT_ATTR) || msg.has_attr(AQARA_REPORT_ATTR)) {
        tracing::debug!(device = %msg.device_id, "battery_report_unreadable");
    }
    mv
}

/// `genBasic` heartbeat: battery voltage and derived percentage.
pub fn battery(msg: &NormalizedMessage) -> Decoded {
    let Some(mv) = battery_millivolts(msg) else {
        return Decoded::new();
    };
    let mut decoded = Decoded::new();
    decoded.write(SemanticWrite::number("voltage", mv / 1000.0).with_unit("V"));
    decoded.write(
        SemanticWrite::number("battery", (mv - BATTERY_EMPTY_MV) / BATTERY_MV_PER_PERCENT)
            .with_unit("%"),
    );
    decoded
}
