//! # Zigbee Translator - semantic events from Xiaomi/Aqara attribute reports
//!
//! Turns normalized Zigbee attribute reports into stable, named state values:
//! - Pulsed flags (`click`, `shake`, `flip90`) that revert after a hold window
//! - Short/long press classification and multi-click counts
//! - Occupancy with an idle timeout and a `no_motion` seconds counter
//! - Magic cube gesture and rotation decoding
//! - Scaled sensor readings (temperature, humidity, pressure, battery)
//!
//! ## Architecture
//!
//! The `Engine` owns all mutable per-device state behind a single lock:
//! ```text
//!                       ┌──────────────────────────────────┐
//!   NormalizedMessage → │             Engine               │ → StateStore::write
//!                       │  ┌──────────┐    ┌────────────┐  │
//!                       │  │RuleTable │ →  │  decode::* │  │
//!                       │  └──────────┘    └────────────┘  │
//!                       │  ┌──────────┐    ┌────────────┐  │
//!                       │  │  Timer   │ ←  │DeviceState │  │
//!                       │  │ Registry │    │   (map)    │  │
//!                       │  └──────────┘    └────────────┘  │
//!                       └──────────────────────────────────┘
//! ```
//!
//! Decode routines are pure: they return writes plus timer requests, and the
//! engine applies both.

// Enforce strict safety at compile time
#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

// Re-export public API
pub mod decode;
pub mod engine;
pub mod message;
pub mod rules;
pub mod store;
pub mod types;

// Internal utilities
pub mod observability;

pub use engine::{DeviceSnapshot, Engine, EngineStats, ProcessReport};
pub use message::{NormalizedMessage, ReportKind};
pub use rules::{Rule, RuleTable};
pub use store::{MemoryStore, SemanticWrite, StateStore, StateValue, WriteMetadata};
pub use types::{Config, DeviceId, Error, Result, TimingConfig};
