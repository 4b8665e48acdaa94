// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Batch delivery.
//!
//! [`BasinExporter::push_logs`] walks a batch in order, one record at a time:
//!
//! 1. serialize the record with its resource
//! 2. drop it with a warning if it is larger than
//!    [`MAX_RECORD_SIZE_BYTES`](crate::constants::MAX_RECORD_SIZE_BYTES)
//! 3. pick its stream
//! 4. append it
//!
//! The first failed append aborts the batch and its error is returned.
//! Records before it have already been delivered, so a retried batch may
//! deliver them again.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceRequest;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::basin::BasinClient;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::constants::MAX_RECORD_SIZE_BYTES;
use crate::consumer::LogsConsumer;
use crate::dispatcher::Dispatcher;
use crate::error::ExportError;
use crate::router::{RoutingKey, StreamRouter};
use crate::serializer::serialize_log_record;

pub struct BasinExporter {
    dispatcher: Dispatcher,
    router: StreamRouter,
    dropped: AtomicU64,
}

impl BasinExporter {
    pub fn new(config: &Config, client: Arc<dyn BasinClient>) -> Self {
        Self::with_clock(config, client, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: &Config,
        client: Arc<dyn BasinClient>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            dispatcher: Dispatcher::new(client),
            router: StreamRouter::new(config, clock),
            dropped: AtomicU64::new(0),
        }
    }

    pub async fn push_logs(
        &self,
        logs: &ExportLogsServiceRequest,
        cancel: &CancellationToken,
    ) -> Result<(), ExportError> {
        for resource_logs in &logs.resource_logs {
            let resource = resource_logs.resource.as_ref();
            let (service, namespace) = self.router.resource_identity(resource);

            for scope_logs in &resource_logs.scope_logs {
                for record in &scope_logs.log_records {
                    let payload = serialize_log_record(record, resource);

                    if payload.len() > MAX_RECORD_SIZE_BYTES {
                        warn!(
                            service = %service,
                            namespace = %namespace,
                            record_size_bytes = payload.len(),
                            max_record_size_bytes = MAX_RECORD_SIZE_BYTES,
                            "Discarding log record: exceeds max record size"
                        );
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        continue;
                    }

                    let stream = self.router.stream_name(&RoutingKey {
                        service: service.clone(),
                        namespace: namespace.clone(),
                        hour_bucket: self.router.hour_bucket(record),
                    });

                    if let Err(e) = self.dispatcher.send(&stream, &payload, cancel).await {
                        error!(stream = %stream, error = %e, "Failed to send log record to stream");
                        return Err(ExportError::Dispatch {
                            stream: stream.into(),
                            source: e,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Records dropped for being oversize since the exporter was created.
    #[must_use]
    pub fn dropped_records(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl LogsConsumer for BasinExporter {
    type Error = ExportError;

    async fn consume_logs(
        &self,
        logs: &ExportLogsServiceRequest,
        cancel: &CancellationToken,
    ) -> Result<(), ExportError> {
        self.push_logs(logs, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basin::testing::RecordingClient;
    use crate::clock::FixedClock;
    use crate::error::DispatchError;
    use crate::serializer::tests::{kv, string_value};
    use chrono::{TimeZone, Utc};
    use opentelemetry_proto::tonic::{
        logs::v1::{LogRecord, ResourceLogs, ScopeLogs},
        resource::v1::Resource,
    };
    use tracing_test::traced_test;

    const JAN_15_10_30: u64 = 1_705_314_600_000_000_000;

    fn config() -> Config {
        Config {
            basin_name: "my-logs".to_string(),
            stream_prefix: "otel".to_string(),
            ..Default::default()
        }
    }

    fn record(body: &str, time_unix_nano: u64) -> LogRecord {
        LogRecord {
            time_unix_nano,
            severity_text: "INFO".to_string(),
            body: Some(string_value(body)),
            ..Default::default()
        }
    }

    fn resource_logs(service: &str, records: Vec<LogRecord>) -> ResourceLogs {
        ResourceLogs {
            resource: Some(Resource {
                attributes: vec![
                    kv("service.name", string_value(service)),
                    kv("k8s.namespace.name", string_value("prod")),
                ],
                ..Default::default()
            }),
            scope_logs: vec![ScopeLogs {
                log_records: records,
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn batch(resource_logs: Vec<ResourceLogs>) -> ExportLogsServiceRequest {
        ExportLogsServiceRequest { resource_logs }
    }

    #[tokio::test]
    async fn test_concrete_scenario() {
        let client = Arc::new(RecordingClient::default());
        let exporter = BasinExporter::new(&config(), client.clone());

        exporter
            .push_logs(
                &batch(vec![resource_logs("api", vec![record("hello", JAN_15_10_30)])]),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let appended = client.appended.lock().unwrap();
        assert_eq!(appended.len(), 1);
        assert_eq!(appended[0].0, "otel-api-2024-01-15-10");
        let payload = String::from_utf8(appended[0].1.clone()).unwrap();
        assert!(payload.contains(r#""timestamp":"2024-01-15T10:30:00Z""#));
        assert!(payload.contains(r#""body":"hello""#));
    }

    #[tokio::test]
    async fn test_records_are_sent_in_order_across_resources() {
        let client = Arc::new(RecordingClient::default());
        let exporter = BasinExporter::new(&config(), client.clone());
        let hour = 3_600 * 1_000_000_000;

        exporter
            .push_logs(
                &batch(vec![
                    resource_logs(
                        "api",
                        vec![record("a", JAN_15_10_30), record("b", JAN_15_10_30 + hour)],
                    ),
                    resource_logs("web", vec![record("c", JAN_15_10_30)]),
                ]),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(
            client.streams(),
            vec![
                "otel-api-2024-01-15-10",
                "otel-api-2024-01-15-11",
                "otel-web-2024-01-15-10",
            ]
        );
    }

    #[tokio::test]
    async fn test_fail_fast_stops_at_first_failure() {
        let client = Arc::new(RecordingClient::failing_on_call(3));
        let exporter = BasinExporter::new(&config(), client.clone());
        let records = (1..=5)
            .map(|i| record(&format!("r{i}"), JAN_15_10_30))
            .collect();

        let result = exporter
            .push_logs(
                &batch(vec![resource_logs("api", records)]),
                &CancellationToken::new(),
            )
            .await;

        match result {
            Err(ExportError::Dispatch { stream, source }) => {
                assert_eq!(stream, "otel-api-2024-01-15-10");
                assert_eq!(source.to_string(), "failed to create stream client: call 3 failed");
            }
            other => panic!("expected dispatch error, got {other:?}"),
        }
        assert_eq!(client.calls(), 3);
        let bodies: Vec<String> = client
            .appended
            .lock()
            .unwrap()
            .iter()
            .map(|(_, body)| {
                let value: serde_json::Value = serde_json::from_slice(body).unwrap();
                value["body"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(bodies, vec!["r1", "r2"]);
    }

    #[tokio::test]
    async fn test_size_boundary() {
        let overhead = serialize_log_record(&record("", JAN_15_10_30), None).len();
        let resource = resource_logs("api", vec![]).resource;
        let overhead_with_resource =
            serialize_log_record(&record("", JAN_15_10_30), resource.as_ref()).len();
        assert!(overhead_with_resource > overhead);

        let exact = "x".repeat(MAX_RECORD_SIZE_BYTES - overhead_with_resource);
        let over = "x".repeat(MAX_RECORD_SIZE_BYTES - overhead_with_resource + 1);

        let client = Arc::new(RecordingClient::default());
        let exporter = BasinExporter::new(&config(), client.clone());
        exporter
            .push_logs(
                &batch(vec![resource_logs(
                    "api",
                    vec![record(&over, JAN_15_10_30), record(&exact, JAN_15_10_30)],
                )]),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let appended = client.appended.lock().unwrap();
        assert_eq!(appended.len(), 1);
        assert_eq!(appended[0].1.len(), MAX_RECORD_SIZE_BYTES);
        assert_eq!(exporter.dropped_records(), 1);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_oversize_record_is_dropped_with_warning() {
        let client = Arc::new(RecordingClient::default());
        let exporter = BasinExporter::new(&config(), client.clone());
        let huge = "x".repeat(MAX_RECORD_SIZE_BYTES);

        exporter
            .push_logs(
                &batch(vec![resource_logs(
                    "api",
                    vec![record(&huge, JAN_15_10_30), record("small", JAN_15_10_30)],
                )]),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(client.calls(), 1);
        assert_eq!(exporter.dropped_records(), 1);
        assert!(logs_contain("Discarding log record: exceeds max record size"));
        assert!(logs_contain("service=api"));
        assert!(logs_contain("namespace=prod"));
        assert!(logs_contain("max_record_size_bytes=1048576"));
    }

    #[tokio::test]
    async fn test_missing_timestamp_routes_by_clock() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 8, 15, 0).unwrap();
        let client = Arc::new(RecordingClient::default());
        let exporter =
            BasinExporter::with_clock(&config(), client.clone(), Arc::new(FixedClock(now)));

        exporter
            .push_logs(
                &batch(vec![resource_logs("api", vec![record("late", 0)])]),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(client.streams(), vec!["otel-api-2024-06-01-08"]);
    }

    #[tokio::test]
    async fn test_empty_batch_succeeds() {
        let client = Arc::new(RecordingClient::default());
        let exporter = BasinExporter::new(&config(), client.clone());
        exporter
            .push_logs(&batch(vec![]), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_batch_reports_cancellation() {
        let client = Arc::new(RecordingClient::default());
        let exporter = BasinExporter::new(&config(), client.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = exporter
            .consume_logs(
                &batch(vec![resource_logs("api", vec![record("a", JAN_15_10_30)])]),
                &cancel,
            )
            .await;

        assert!(matches!(
            result,
            Err(ExportError::Dispatch {
                source: DispatchError::Cancelled,
                ..
            })
        ));
        assert_eq!(client.calls(), 0);
    }
}
