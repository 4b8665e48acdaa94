// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceRequest;
use tokio_util::sync::CancellationToken;

/// Something that accepts whole batches of logs.
///
/// Implemented by [`BasinExporter`](crate::exporter::BasinExporter), which
/// delivers a batch directly, and by
/// [`ExportQueue`](crate::envelope::queue::ExportQueue), which queues it and
/// waits for the retried outcome.
#[async_trait]
pub trait LogsConsumer: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn consume_logs(
        &self,
        logs: &ExportLogsServiceRequest,
        cancel: &CancellationToken,
    ) -> Result<(), Self::Error>;
}
