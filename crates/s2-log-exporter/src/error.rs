// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use reqwest::StatusCode;
use std::time::Duration;

/// Errors that prevent the exporter from starting.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("basin_name cannot be empty")]
    EmptyBasinName,

    #[error("{0} environment variable is not set")]
    MissingCredential(&'static str),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to load configuration: {0}")]
    Load(String),
}

/// Failure to append a single record to a stream.
///
/// Every variant is treated as retryable by the envelope.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("failed to create stream client: {0}")]
    StreamClient(String),

    #[error("failed to append record: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to append record: backend responded {status}: {message}")]
    Rejected { status: StatusCode, message: String },

    #[error("append cancelled")]
    Cancelled,
}

/// Failure of a whole batch, carrying the stream of the record that failed.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to send log record to stream {stream}: {source}")]
    Dispatch {
        stream: String,
        #[source]
        source: DispatchError,
    },
}

/// Outcome of a batch handed to the [`ExportQueue`](crate::envelope::queue::ExportQueue).
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("sending queue is full")]
    QueueFull,

    #[error("sending queue is shut down")]
    ShuttingDown,

    #[error("batch delivery cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },

    /// The caller stopped waiting. A batch that was already queued is still
    /// delivered or cancelled by the queue.
    #[error("stopped waiting for batch delivery")]
    Abandoned,

    #[error("no more retries left after {attempts} attempts over {elapsed:?}: {last}")]
    RetriesExhausted {
        attempts: u32,
        elapsed: Duration,
        last: String,
    },

    #[error("worker dropped the batch before reporting an outcome")]
    WorkerGone,
}
