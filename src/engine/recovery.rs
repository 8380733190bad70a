//! Panic isolation for decode rules.
//!
//! A rule that panics on one message must not take down the engine or the
//! other rules matching the same message. The panic is caught, logged and
//! turned into an `Error::Internal`.

use crate::types::{Error, Result};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Run `operation`, converting a panic into an error.
///
/// # Example
/// ```
/// use zigbee_translator::engine::with_recovery;
///
/// let result = with_recovery(|| Ok(21 * 2), "answer");
/// assert_eq!(result.ok(), Some(42));
/// ```
pub fn with_recovery<F, T>(operation: F, operation_name: &str) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    match catch_unwind(AssertUnwindSafe(operation)) {
        Ok(result) => result,
        Err(panic_payload) => {
            let panic_msg = extract_panic_message(&panic_payload);
            tracing::warn!(
                operation = operation_name,
                panic = %panic_msg,
                "panic_recovered"
            );

            Err(Error::internal(format!(
                "panic in {}: {}",
                operation_name, panic_msg
            )))
        }
    }
}

fn extract_panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic (no message)".to_string()
    }
}
