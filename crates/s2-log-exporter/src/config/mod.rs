// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Exporter configuration.
//!
//! Sources are applied in order, later ones overriding earlier ones:
//!
//! 1. **Defaults** - every field except `basin_name` has one
//! 2. **YAML file** - optional, e.g. `s2-exporter.yaml`
//! 3. **Environment variables** - `S2_EXPORTER_*`, nested keys joined with `__`
//!
//! The configuration is loaded once at startup and never re-read. The access
//! token is not part of it, see [`crate::credentials`].
//!
//! ```yaml
//! basin_name: my-logs
//! stream_prefix: otel
//! resource_attributes:
//!   service_name_attribute: service.name
//!   namespace_attribute: ""
//! retry_on_failure:
//!   max_elapsed_time: 1m
//! ```

pub mod log_level;

use std::fmt;
use std::path::Path;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};
use serde::{Deserialize, Deserializer};

use crate::config::log_level::LogLevel;
use crate::constants::{
    CONFIG_ENV_PREFIX, CONFIG_ENV_SPLIT, DEFAULT_BATCH_FLUSH_INTERVAL, DEFAULT_BATCH_MAX_RECORDS,
    DEFAULT_NAMESPACE_ATTRIBUTE, DEFAULT_NUM_CONSUMERS, DEFAULT_QUEUE_SIZE,
    DEFAULT_RETRY_INITIAL_INTERVAL, DEFAULT_RETRY_MAX_ELAPSED_TIME, DEFAULT_RETRY_MAX_INTERVAL,
    DEFAULT_RETRY_MULTIPLIER, DEFAULT_RETRY_RANDOMIZATION_FACTOR, DEFAULT_SERVICE_NAME_ATTRIBUTE,
    DEFAULT_STREAM_CACHE_IDLE_TIMEOUT, DEFAULT_STREAM_CACHE_MAX_STREAMS, DEFAULT_TIMEOUT,
};
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Basin that receives the logs. Required.
    pub basin_name: String,
    /// Optional prefix for stream names.
    pub stream_prefix: String,
    /// Overrides the basin endpoint, e.g. a local S2 for testing.
    pub endpoint: Option<String>,
    pub resource_attributes: ResourceAttributesConfig,
    pub batch: BatchConfig,
    pub sending_queue: QueueConfig,
    pub retry_on_failure: RetryConfig,
    /// Deadline for a single batch, all of its appends included.
    #[serde(deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
    pub stream_cache: StreamCacheConfig,
    pub log_level: LogLevel,
}

/// Resource attributes that feed the routing key. An empty key disables it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ResourceAttributesConfig {
    pub service_name_attribute: String,
    pub namespace_attribute: String,
}

/// Batching hints for the pipeline in front of the exporter. The dispatch
/// path itself never reads them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub max_records: usize,
    #[serde(deserialize_with = "deserialize_duration")]
    pub flush_interval: Duration,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Workers consuming batches concurrently.
    pub num_consumers: usize,
    /// Batches that may wait for a worker before producers are pushed back.
    pub queue_size: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub enabled: bool,
    #[serde(deserialize_with = "deserialize_duration")]
    pub initial_interval: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    pub max_interval: Duration,
    /// Zero retries forever.
    #[serde(deserialize_with = "deserialize_duration")]
    pub max_elapsed_time: Duration,
    pub multiplier: f64,
    pub randomization_factor: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StreamCacheConfig {
    pub max_streams: u64,
    #[serde(deserialize_with = "deserialize_duration")]
    pub idle_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            basin_name: String::default(),
            stream_prefix: String::default(),
            endpoint: None,
            resource_attributes: ResourceAttributesConfig::default(),
            batch: BatchConfig::default(),
            sending_queue: QueueConfig::default(),
            retry_on_failure: RetryConfig::default(),
            timeout: DEFAULT_TIMEOUT,
            stream_cache: StreamCacheConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}

impl Default for ResourceAttributesConfig {
    fn default() -> Self {
        Self {
            service_name_attribute: DEFAULT_SERVICE_NAME_ATTRIBUTE.to_string(),
            namespace_attribute: DEFAULT_NAMESPACE_ATTRIBUTE.to_string(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_records: DEFAULT_BATCH_MAX_RECORDS,
            flush_interval: DEFAULT_BATCH_FLUSH_INTERVAL,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            num_consumers: DEFAULT_NUM_CONSUMERS,
            queue_size: DEFAULT_QUEUE_SIZE,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_interval: DEFAULT_RETRY_INITIAL_INTERVAL,
            max_interval: DEFAULT_RETRY_MAX_INTERVAL,
            max_elapsed_time: DEFAULT_RETRY_MAX_ELAPSED_TIME,
            multiplier: DEFAULT_RETRY_MULTIPLIER,
            randomization_factor: DEFAULT_RETRY_RANDOMIZATION_FACTOR,
        }
    }
}

impl Default for StreamCacheConfig {
    fn default() -> Self {
        Self {
            max_streams: DEFAULT_STREAM_CACHE_MAX_STREAMS,
            idle_timeout: DEFAULT_STREAM_CACHE_IDLE_TIMEOUT,
        }
    }
}

impl Config {
    /// Load configuration from an optional YAML file and the environment, then
    /// validate it.
    ///
    /// A missing file is not an error; its values are simply absent.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::new();
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config: Config = figment
            .merge(Env::prefixed(CONFIG_ENV_PREFIX).split(CONFIG_ENV_SPLIT))
            .extract()
            .map_err(|e| ConfigError::Load(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.basin_name.trim().is_empty() {
            return Err(ConfigError::EmptyBasinName);
        }

        if self.sending_queue.num_consumers == 0 {
            return Err(ConfigError::Invalid(
                "sending_queue.num_consumers must be greater than 0".to_string(),
            ));
        }
        if self.sending_queue.queue_size == 0 {
            return Err(ConfigError::Invalid(
                "sending_queue.queue_size must be greater than 0".to_string(),
            ));
        }

        if self.timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "timeout must be greater than 0".to_string(),
            ));
        }
        if self.batch.flush_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "batch.flush_interval must be greater than 0".to_string(),
            ));
        }

        let retry = &self.retry_on_failure;
        if retry.multiplier.is_nan() || retry.multiplier < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "retry_on_failure.multiplier must be at least 1, got {}",
                retry.multiplier
            )));
        }
        if !(0.0..=1.0).contains(&retry.randomization_factor) {
            return Err(ConfigError::Invalid(format!(
                "retry_on_failure.randomization_factor must be within [0, 1], got {}",
                retry.randomization_factor
            )));
        }
        if retry.initial_interval > retry.max_interval {
            return Err(ConfigError::Invalid(format!(
                "retry_on_failure.initial_interval ({:?}) exceeds max_interval ({:?})",
                retry.initial_interval, retry.max_interval
            )));
        }

        Ok(())
    }

    /// Base URL of the basin, without a trailing slash.
    #[must_use]
    pub fn basin_endpoint(&self) -> String {
        match &self.endpoint {
            Some(endpoint) if !endpoint.trim().is_empty() => {
                normalize_url(endpoint).trim_end_matches('/').to_string()
            }
            _ => format!("https://{}.b.aws.s2.dev", self.basin_name.trim()),
        }
    }
}

/// Adds an `https://` prefix when the URL has no scheme.
fn normalize_url(url: &str) -> String {
    let url = url.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

/// Parse a duration written as seconds (`2`, `0.5`) or with a unit suffix
/// (`200ms`, `5s`, `1m`, `1h`).
pub fn parse_duration(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    let split = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(value.len());
    let (number, unit) = value.split_at(split);
    let number: f64 = number
        .parse()
        .map_err(|_| format!("invalid duration '{value}'"))?;

    let seconds = match unit.trim() {
        "" | "s" => number,
        "ms" => number / 1_000.0,
        "m" => number * 60.0,
        "h" => number * 3_600.0,
        other => return Err(format!("unknown duration unit '{other}' in '{value}'")),
    };

    Duration::try_from_secs_f64(seconds).map_err(|e| format!("invalid duration '{value}': {e}"))
}

pub fn deserialize_duration<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Duration, D::Error> {
    struct DurationVisitor;
    impl serde::de::Visitor<'_> for DurationVisitor {
        type Value = Duration;
        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            write!(f, "a duration in seconds or a string such as \"200ms\"")
        }
        fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Duration::from_secs(v))
        }
        fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Self::Value, E> {
            u64::try_from(v)
                .map(Duration::from_secs)
                .map_err(|_| E::custom(format!("negative duration: {v}")))
        }
        fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<Self::Value, E> {
            Duration::try_from_secs_f64(v).map_err(E::custom)
        }
        fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Self::Value, E> {
            parse_duration(v).map_err(E::custom)
        }
    }
    deserializer.deserialize_any(DurationVisitor)
}
