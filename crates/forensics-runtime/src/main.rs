//! # Forensics Node
//!
//! Reads newline-delimited [`IngestionEvent`] JSON from a file (first
//! argument) or stdin, ingests each event in order and writes one JSON
//! result line per event to stdout. Logs go to stderr.
//!
//! ```bash
//! CF_TAINT_MODEL=haircut CF_HAIRCUT_FACTOR=0.9 forensics-node events.ndjson
//! ```

use anyhow::{Context, Result};
use forensics_runtime::{ForensicsConfig, ForensicsContainer, IngestionEvent};
use forensics_telemetry::{encode_metrics, init_telemetry, TelemetryConfig};
use serde_json::json;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let telemetry = init_telemetry(TelemetryConfig::from_env())
        .context("Failed to initialize telemetry")?;

    let config = ForensicsConfig::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let source = std::env::args().nth(1).filter(|arg| arg != "-");
    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match &source {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open {path}"))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };
    info!(
        source = source.as_deref().unwrap_or("stdin"),
        "Starting forensics node"
    );

    let container = ForensicsContainer::in_memory(&config);
    let mut lines = reader.lines();
    let mut stdout = tokio::io::stdout();
    let (mut ingested, mut failed) = (0usize, 0usize);
    let mut line_number = 0usize;

    while let Some(line) = lines.next_line().await.context("Failed to read input")? {
        line_number += 1;
        if line.trim().is_empty() {
            continue;
        }

        let result = match serde_json::from_str::<IngestionEvent>(&line) {
            Ok(event) => match container.ingestion().save_bitcoin_transaction(&event).await {
                Ok(summary) => {
                    ingested += 1;
                    serde_json::to_value(&summary)?
                }
                Err(err) => {
                    failed += 1;
                    json!({ "tx_hash": event.transaction.txid, "error": err.to_string() })
                }
            },
            Err(err) => {
                failed += 1;
                warn!(line = line_number, error = %err, "Skipping unparsable event");
                json!({ "line": line_number, "error": err.to_string() })
            }
        };

        stdout.write_all(format!("{result}\n").as_bytes()).await?;
    }
    stdout.flush().await?;

    container.shutdown();
    info!(ingested, failed, "Ingestion finished");

    if telemetry.metrics_enabled() {
        debug!(metrics = %encode_metrics()?, "Final metrics");
    }
    Ok(())
}
