//! State-store contract and semantic write values.
//!
//! The engine never talks to a concrete home-automation store. It produces
//! `SemanticWrite`s and hands each one to a [`StateStore`] implementation.
//! `MemoryStore` is the in-process implementation used by tests, the replay
//! binary and embedders that poll state instead of subscribing to it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::types::{DeviceId, Result};

// =============================================================================
// Values
// =============================================================================

/// A state value. `Null` means "do not publish" and is dropped by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl StateValue {
    pub fn is_null(&self) -> bool {
        matches!(self, StateValue::Null)
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            StateValue::Bool(_) => ValueType::Boolean,
            StateValue::Text(_) => ValueType::String,
            StateValue::Null | StateValue::Number(_) => ValueType::Number,
        }
    }
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateValue::Null => write!(f, "null"),
            StateValue::Bool(b) => write!(f, "{}", b),
            StateValue::Number(n) => write!(f, "{}", n),
            StateValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for StateValue {
    fn from(b: bool) -> Self {
        StateValue::Bool(b)
    }
}

impl From<f64> for StateValue {
    fn from(n: f64) -> Self {
        StateValue::Number(n)
    }
}

impl From<&str> for StateValue {
    fn from(s: &str) -> Self {
        StateValue::Text(s.to_string())
    }
}

/// Declared type of a state object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Boolean,
    Number,
    String,
}

/// Object metadata sent alongside every write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteMetadata {
    pub value_type: ValueType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Whether users may command this state (switch outputs, light level).
    #[serde(default)]
    pub writable: bool,
}

/// One decoded state change for one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticWrite {
    pub key: String,
    pub value: StateValue,
    pub metadata: WriteMetadata,
}

impl SemanticWrite {
    pub fn new(key: impl Into<String>, value: StateValue) -> Self {
        let value_type = value.value_type();
        Self {
            key: key.into(),
            value,
            metadata: WriteMetadata {
                value_type,
                unit: None,
                writable: false,
            },
        }
    }

    pub fn boolean(key: impl Into<String>, value: bool) -> Self {
        Self::new(key, StateValue::Bool(value))
    }

    pub fn number(key: impl Into<String>, value: f64) -> Self {
        Self::new(key, StateValue::Number(value))
    }

    pub fn text(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(key, StateValue::Text(value.into()))
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.metadata.unit = Some(unit.into());
        self
    }

    pub fn writable(mut self) -> Self {
        self.metadata.writable = true;
        self
    }

    /// Same key and metadata, different value.
    pub fn with_value(&self, value: StateValue) -> Self {
        Self {
            key: self.key.clone(),
            value,
            metadata: self.metadata.clone(),
        }
    }
}

// =============================================================================
// Store contract
// =============================================================================

/// The external key/value state store.
///
/// Writes must be idempotent: the engine may repeat an identical write.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn write(
        &self,
        device_id: &DeviceId,
        key: &str,
        value: &StateValue,
        metadata: &WriteMetadata,
    ) -> Result<()>;
}

// =============================================================================
// MemoryStore
// =============================================================================

/// A write as recorded by [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedWrite {
    pub device_id: DeviceId,
    pub key: String,
    pub value: StateValue,
    pub metadata: WriteMetadata,
    pub written_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    latest: HashMap<(DeviceId, String), StateValue>,
    log: Vec<RecordedWrite>,
}

/// In-memory store keeping the latest value per key and the ordered write log.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Latest value written for `(device, key)`.
    pub fn get(&self, device_id: &DeviceId, key: &str) -> Option<StateValue> {
        self.lock()
            .latest
            .get(&(device_id.clone(), key.to_string()))
            .cloned()
    }

    /// Every write, in order.
    pub fn log(&self) -> Vec<RecordedWrite> {
        self.lock().log.clone()
    }

    /// `(key, value)` pairs written for one device, in order.
    pub fn history(&self, device_id: &DeviceId) -> Vec<(String, StateValue)> {
        self.lock()
            .log
            .iter()
            .filter(|w| &w.device_id == device_id)
            .map(|w| (w.key.clone(), w.value.clone()))
            .collect()
    }

    /// Values written for one key of one device, in order.
    pub fn values(&self, device_id: &DeviceId, key: &str) -> Vec<StateValue> {
        self.lock()
            .log
            .iter()
            .filter(|w| &w.device_id == device_id && w.key == key)
            .map(|w| w.value.clone())
            .collect()
    }

    pub fn write_count(&self) -> usize {
        self.lock().log.len()
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.latest.clear();
        inner.log.clear();
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn write(
        &self,
        device_id: &DeviceId,
        key: &str,
        value: &StateValue,
        metadata: &WriteMetadata,
    ) -> Result<()> {
        let mut inner = self.lock();
        inner
            .latest
            .insert((device_id.clone(), key.to_string()), value.clone());
        inner.log.push(RecordedWrite {
            device_id: device_id.clone(),
            key: key.to_string(),
            value: value.clone(),
            metadata: metadata.clone(),
            written_at: Utc::now(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_set_value_type() {
        assert_eq!(
            SemanticWrite::boolean("contact", true).metadata.value_type,
            ValueType::Boolean
        );
        let w = SemanticWrite::number("voltage", 3.1).with_unit("V");
        assert_eq!(w.metadata.value_type, ValueType::Number);
        assert_eq!(w.metadata.unit.as_deref(), Some("V"));
        assert!(!w.metadata.writable);
        assert!(SemanticWrite::boolean("state", true).writable().metadata.writable);
        assert_eq!(
            SemanticWrite::text("rotate_dir", "left").metadata.value_type,
            ValueType::String
        );
    }

    #[test]
    fn test_value_serialization_is_untagged() {
        assert_eq!(serde_json::to_string(&StateValue::Bool(true)).unwrap(), "true");
        assert_eq!(serde_json::to_string(&StateValue::Number(1.5)).unwrap(), "1.5");
        assert_eq!(serde_json::to_string(&StateValue::Null).unwrap(), "null");
        let parsed: StateValue = serde_json::from_str("\"left\"").unwrap();
        assert_eq!(parsed, StateValue::Text("left".into()));
    }

    #[tokio::test]
    async fn test_memory_store_tracks_latest_and_log() {
        let store = MemoryStore::new();
        let dev = DeviceId::must("dev1");
        let meta = SemanticWrite::boolean("click", true).metadata;

        store.write(&dev, "click", &true.into(), &meta).await.unwrap();
        store.write(&dev, "click", &false.into(), &meta).await.unwrap();

        assert_eq!(store.get(&dev, "click"), Some(StateValue::Bool(false)));
        assert_eq!(
            store.values(&dev, "click"),
            vec![StateValue::Bool(true), StateValue::Bool(false)]
        );
        assert_eq!(store.write_count(), 2);

        store.clear();
        assert_eq!(store.get(&dev, "click"), None);
    }
}
