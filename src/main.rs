//! zigbee-replay - feed recorded reports through the translator.
//!
//! Reads one `NormalizedMessage` JSON document per line from stdin and prints
//! every resulting state write as a JSON line on stdout. Logs go to stderr.
//! After EOF the replay keeps running for `--drain` so pending pulse reverts
//! and occupancy timers can fire, then shuts the engine down.

use async_trait::async_trait;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

use zigbee_translator::store::{StateStore, StateValue, WriteMetadata};
use zigbee_translator::{Config, DeviceId, Engine, NormalizedMessage, Result};

#[derive(Parser, Debug)]
#[command(name = "zigbee-replay")]
#[command(about = "Replay normalized Zigbee reports and print semantic state writes")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// JSON config file (timings, log level)
    #[arg(long, env = "ZIGBEE_CONFIG")]
    config: Option<PathBuf>,

    /// How long to keep timers running after the last input line
    #[arg(long, default_value = "1s", value_parser = parse_duration)]
    drain: Duration,
}

fn parse_duration(raw: &str) -> std::result::Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(raw).map_err(|e| e.to_string())
}

/// Prints writes as JSON lines.
#[derive(Debug, Default)]
struct StdoutStore;

#[async_trait]
impl StateStore for StdoutStore {
    async fn write(
        &self,
        device_id: &DeviceId,
        key: &str,
        value: &StateValue,
        metadata: &WriteMetadata,
    ) -> Result<()> {
        let line = serde_json::json!({
            "at": chrono::Utc::now(),
            "device": device_id,
            "key": key,
            "value": value,
            "type": metadata.value_type,
            "unit": metadata.unit,
            "writable": metadata.writable,
        });
        println!("{}", serde_json::to_string(&line)?);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };
    zigbee_translator::observability::init_tracing_with(&config.observability);

    let engine = Engine::new(config.timing.clone(), Arc::new(StdoutStore));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut line_no = 0usize;
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        match NormalizedMessage::from_json(trimmed) {
            Ok(msg) => {
                engine.process(&msg).await;
            }
            Err(e) => tracing::warn!(line = line_no, error = %e, "input_line_skipped"),
        }
    }

    tokio::time::sleep(args.drain).await;
    engine.shutdown().await;

    let stats = engine.stats().await;
    tracing::info!(
        messages = stats.messages_processed,
        unmatched = stats.messages_unmatched,
        writes = stats.writes_emitted,
        timers_fired = stats.timers_fired,
        "replay_finished"
    );
    Ok(())
}
