//! Application error types.
//!
//! All errors use `thiserror` for automatic Error trait derivation. None of
//! them is fatal to the engine: the dispatcher logs and absorbs them.

use thiserror::Error;

/// Application result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error enum for the translator.
#[derive(Error, Debug)]
pub enum Error {
    /// An attribute the decoder expected is missing or has the wrong shape.
    #[error("malformed attribute {attribute} in {cluster}: {reason}")]
    MalformedAttribute {
        cluster: String,
        attribute: String,
        reason: String,
    },

    /// The external state store rejected a write.
    #[error("state store error: {0}")]
    Store(String),

    /// Internal errors (recovered panics, poisoned invariants).
    #[error("internal error: {0}")]
    Internal(String),

    /// Serialization/deserialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

// Convenience constructors
impl Error {
    pub fn malformed(
        cluster: impl Into<String>,
        attribute: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::MalformedAttribute {
            cluster: cluster.into(),
            attribute: attribute.into(),
            reason: reason.into(),
        }
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
