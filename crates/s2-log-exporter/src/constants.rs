// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Limits and defaults for exporting to S2.

use std::time::Duration;

/// Maximum size in bytes of a single serialized record.
///
/// S2 meters each record at up to 1 MiB. Larger payloads are dropped before
/// dispatch and never retried.
pub const MAX_RECORD_SIZE_BYTES: usize = 1_024 * 1_024;

/// Environment variable holding the S2 access token.
pub const ACCESS_TOKEN_ENV_VAR: &str = "S2_ACCESS_TOKEN";

/// Prefix for configuration overrides read from the environment.
pub const CONFIG_ENV_PREFIX: &str = "S2_EXPORTER_";

/// Separator for nested keys in environment overrides, e.g.
/// `S2_EXPORTER_RETRY_ON_FAILURE__MAX_INTERVAL`.
pub const CONFIG_ENV_SPLIT: &str = "__";

pub const DEFAULT_SERVICE_NAME_ATTRIBUTE: &str = "service.name";
pub const DEFAULT_NAMESPACE_ATTRIBUTE: &str = "k8s.namespace.name";

pub const DEFAULT_BATCH_MAX_RECORDS: usize = 1000;
pub const DEFAULT_BATCH_FLUSH_INTERVAL: Duration = Duration::from_secs(2);

// Four consumers keep appends to any single stream under S2's per-stream
// request ceiling.
pub const DEFAULT_NUM_CONSUMERS: usize = 4;
pub const DEFAULT_QUEUE_SIZE: usize = 2000;

pub const DEFAULT_RETRY_INITIAL_INTERVAL: Duration = Duration::from_millis(200);
pub const DEFAULT_RETRY_MAX_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_RETRY_MAX_ELAPSED_TIME: Duration = Duration::from_secs(30);
pub const DEFAULT_RETRY_MULTIPLIER: f64 = 1.5;
pub const DEFAULT_RETRY_RANDOMIZATION_FACTOR: f64 = 0.5;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

pub const DEFAULT_STREAM_CACHE_MAX_STREAMS: u64 = 1024;
pub const DEFAULT_STREAM_CACHE_IDLE_TIMEOUT: Duration = Duration::from_secs(60 * 60);
