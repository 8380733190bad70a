//! Core types for the translator.
//!
//! This module provides foundational types used throughout the crate:
//! - **IDs**: Strongly-typed device identity
//! - **Errors**: Application error types with thiserror derives
//! - **Config**: Timing and observability configuration

mod config;
mod errors;
mod ids;

pub use config::{Config, ObservabilityConfig, TimingConfig};
pub use errors::{Error, Result};
pub use ids::DeviceId;
