// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Reads OTLP/JSON log requests from stdin, one per line, and exports them
//! to S2.
//!
//! Configuration comes from the file named by `S2_EXPORTER_CONFIG`
//! (`s2-exporter.yaml` by default, optional) and `S2_EXPORTER_*` variables.
//! `S2_ACCESS_TOKEN` must be set.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

mod batcher;

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use s2_log_exporter::{
    config::log_level::LogLevel, logger::Formatter, AccessToken, BasinExporter, Config,
    ExportLogsServiceRequest, ExportQueue, HttpBasinClient,
};

use crate::batcher::{record_count, Batcher};

const CONFIG_PATH_ENV_VAR: &str = "S2_EXPORTER_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "s2-exporter.yaml";
const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(30);

#[tokio::main]
pub async fn main() -> ExitCode {
    let config_path = env::var(CONFIG_PATH_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = Config::load(Some(config_path.as_path()));

    let log_level = config
        .as_ref()
        .map(|c| c.log_level)
        .unwrap_or_default();
    if let Err(e) = init_logging(log_level) {
        eprintln!("Failed to set up logging: {e}");
        return ExitCode::FAILURE;
    }

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("Error loading configuration from {}: {e}", config_path.display());
            return ExitCode::FAILURE;
        }
    };
    let token = match AccessToken::from_env() {
        Ok(token) => token,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let client = match HttpBasinClient::new(&config, &token) {
        Ok(client) => client,
        Err(e) => {
            error!("Error creating basin client: {e}");
            return ExitCode::FAILURE;
        }
    };

    info!(
        basin = %config.basin_name,
        endpoint = %config.basin_endpoint(),
        stream_prefix = %config.stream_prefix,
        "Starting S2 log forwarder"
    );

    let exporter = Arc::new(BasinExporter::new(&config, Arc::new(client)));
    let queue = ExportQueue::start(Arc::clone(&exporter), &config);

    let shutdown = CancellationToken::new();
    let interrupt = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received interrupt, shutting down");
                interrupt.cancel();
            }
            Err(e) => error!("Failed to listen for interrupt: {e}"),
        }
    });

    let mut outcomes = JoinSet::new();
    forward_stdin(&config, &queue, &mut outcomes, &shutdown).await;

    queue.shutdown(SHUTDOWN_DEADLINE).await;
    while outcomes.join_next().await.is_some() {}

    info!(
        dropped_records = exporter.dropped_records(),
        "S2 log forwarder stopped"
    );
    ExitCode::SUCCESS
}

fn init_logging(log_level: LogLevel) -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::try_new(log_level.as_filter_directive())?)
        .with_writer(std::io::stderr)
        .event_format(Formatter)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    debug!("Logging subsystem enabled");
    Ok(())
}

/// Batches stdin until EOF or `shutdown`, submitting each batch as it fills up
/// or the flush interval passes.
async fn forward_stdin(
    config: &Config,
    queue: &ExportQueue,
    outcomes: &mut JoinSet<()>,
    shutdown: &CancellationToken,
) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut batcher = Batcher::new(config.batch.max_records);

    let mut flush_interval = interval(config.batch.flush_interval);
    flush_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    flush_interval.tick().await; // first tick is immediate

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if let Some(request) = parse_line(&line) {
                        if let Some(batch) = batcher.push(request) {
                            submit(queue, batch, outcomes, shutdown).await;
                        }
                    }
                }
                Ok(None) => {
                    debug!("Reached end of input");
                    break;
                }
                Err(e) => {
                    error!("Failed to read from stdin: {e}");
                    break;
                }
            },
            _ = flush_interval.tick() => {
                if let Some(batch) = batcher.take() {
                    submit(queue, batch, outcomes, shutdown).await;
                }
            }
            () = shutdown.cancelled() => break,
        }
    }

    if let Some(batch) = batcher.take() {
        submit(queue, batch, outcomes, shutdown).await;
    }
}

fn parse_line(line: &str) -> Option<ExportLogsServiceRequest> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(request) => Some(request),
        Err(e) => {
            warn!("Skipping line that is not an OTLP/JSON logs request: {e}");
            None
        }
    }
}

/// Queues `batch`, waiting for room unless `shutdown` fires first, in which
/// case the batch is dropped.
async fn submit(
    queue: &ExportQueue,
    batch: ExportLogsServiceRequest,
    outcomes: &mut JoinSet<()>,
    shutdown: &CancellationToken,
) {
    let records: usize = batch.resource_logs.iter().map(record_count).sum();
    let submitted = tokio::select! {
        biased;
        submitted = queue.submit(batch) => submitted,
        () = shutdown.cancelled() => {
            warn!(records, "Dropping batch: interrupted while waiting for queue room");
            return;
        }
    };
    match submitted {
        Ok(receipt) => {
            debug!(records, "Submitted batch");
            outcomes.spawn(async move {
                match receipt.wait().await {
                    Ok(()) => debug!(records, "Batch exported"),
                    Err(e) => error!(records, "Batch export failed: {e}"),
                }
            });
        }
        Err(e) => error!(records, "Failed to submit batch: {e}"),
    }
}
