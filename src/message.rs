//! Normalized protocol messages.
//!
//! The protocol layer hands the engine one `NormalizedMessage` per received
//! report. Attribute values arrive as loosely typed JSON (numbers, numeric
//! strings, nested objects for manufacturer-specific attributes), so the
//! accessors here do the coercion once and report what went wrong.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{DeviceId, Error, Result};

/// What kind of indication produced the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    /// `attReport` / `devChange` indications.
    #[default]
    AttributeReport,
    /// `statusChange` indications (IAS zone notifications).
    StatusChange,
}

/// One attribute report from one endpoint of one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedMessage {
    pub device_id: DeviceId,

    /// Free-form model identifier, e.g. `lumi.sensor_switch.aq2`. Empty when
    /// the device never reported one.
    #[serde(default)]
    pub model_id: String,

    #[serde(default)]
    pub endpoint_id: u8,

    /// Cluster name as reported by the stack, e.g. `genOnOff`.
    pub cluster_id: String,

    #[serde(default)]
    pub attributes: Map<String, Value>,

    /// Device (class) id of the reporting endpoint.
    #[serde(default)]
    pub device_class_id: u32,

    #[serde(default)]
    pub kind: ReportKind,
}

impl NormalizedMessage {
    pub fn new(device_id: DeviceId, model_id: impl Into<String>, cluster_id: impl Into<String>) -> Self {
        Self {
            device_id,
            model_id: model_id.into(),
            endpoint_id: 1,
            cluster_id: cluster_id.into(),
            attributes: Map::new(),
            device_class_id: 0,
            kind: ReportKind::AttributeReport,
        }
    }

    pub fn with_endpoint(mut self, endpoint_id: u8) -> Self {
        self.endpoint_id = endpoint_id;
        self
    }

    pub fn with_device_class(mut self, device_class_id: u32) -> Self {
        self.device_class_id = device_class_id;
        self
    }

    pub fn with_kind(mut self, kind: ReportKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Parse one message from a JSON document.
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn has_attr(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    /// Numeric attribute, `None` when absent or not coercible.
    pub fn number(&self, key: &str) -> Option<f64> {
        self.attr(key).and_then(coerce_number)
    }

    /// Integral attribute, `None` when absent, not numeric or fractional.
    pub fn integer(&self, key: &str) -> Option<i64> {
        self.number(key).and_then(as_integer)
    }

    /// Numeric attribute that the decoder needs; absence and wrong type are errors.
    pub fn require_number(&self, key: &str) -> Result<f64> {
        let value = self
            .attr(key)
            .ok_or_else(|| Error::malformed(&self.cluster_id, key, "missing"))?;
        coerce_number(value).ok_or_else(|| {
            Error::malformed(&self.cluster_id, key, format!("expected number, got {}", value))
        })
    }

    /// Integral variant of [`require_number`](Self::require_number).
    pub fn require_integer(&self, key: &str) -> Result<i64> {
        let n = self.require_number(key)?;
        as_integer(n).ok_or_else(|| {
            Error::malformed(&self.cluster_id, key, format!("expected integer, got {}", n))
        })
    }

    pub fn model_contains(&self, pattern: &str) -> bool {
        self.model_id.contains(pattern)
    }
}

/// Coerce a loosely typed attribute value into a number.
///
/// Accepts JSON numbers, numeric strings and booleans (as 1/0).
pub fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn as_integer(n: f64) -> Option<i64> {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Some(n as i64)
    } else {
        None
    }
}
