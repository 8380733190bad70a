//! Observability utilities.

use std::sync::OnceLock;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::types::ObservabilityConfig;

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Initialize tracing subscriber once for the process.
///
/// Log format defaults to plain text and can be switched to JSON via
/// `ZIGBEE_LOG_FORMAT=json`. Filter defaults to `info` if `RUST_LOG` is unset.
pub fn init_tracing() {
    init_tracing_with(&ObservabilityConfig::default());
}

/// Same as [`init_tracing`], with the fallback level and format taken from config.
///
/// `RUST_LOG` and `ZIGBEE_LOG_FORMAT` still win over the config values.
pub fn init_tracing_with(config: &ObservabilityConfig) {
    TRACING_INIT.get_or_init(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
        let json = std::env::var("ZIGBEE_LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(config.json_logs);

        let result = if json {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .try_init()
        };

        if let Err(err) = result {
            eprintln!("tracing init skipped: {err}");
        }
    });
}
