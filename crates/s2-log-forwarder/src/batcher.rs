// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use opentelemetry_proto::tonic::logs::v1::ResourceLogs;
use s2_log_exporter::ExportLogsServiceRequest;

/// Collects resource logs until a batch holds `max_records` records.
#[derive(Debug)]
pub struct Batcher {
    max_records: usize,
    resource_logs: Vec<ResourceLogs>,
    records: usize,
}

impl Batcher {
    pub fn new(max_records: usize) -> Self {
        Self {
            max_records: max_records.max(1),
            resource_logs: Vec::new(),
            records: 0,
        }
    }

    /// Adds a request and returns a full batch once the threshold is reached.
    /// Requests are never split, so a batch can exceed `max_records`.
    pub fn push(&mut self, request: ExportLogsServiceRequest) -> Option<ExportLogsServiceRequest> {
        for resource_logs in request.resource_logs {
            self.records += record_count(&resource_logs);
            self.resource_logs.push(resource_logs);
        }
        if self.records >= self.max_records {
            self.take()
        } else {
            None
        }
    }

    /// Whatever has been collected, if anything.
    pub fn take(&mut self) -> Option<ExportLogsServiceRequest> {
        if self.resource_logs.is_empty() {
            return None;
        }
        self.records = 0;
        Some(ExportLogsServiceRequest {
            resource_logs: std::mem::take(&mut self.resource_logs),
        })
    }

    pub fn pending_records(&self) -> usize {
        self.records
    }
}

pub fn record_count(resource_logs: &ResourceLogs) -> usize {
    resource_logs
        .scope_logs
        .iter()
        .map(|scope_logs| scope_logs.log_records.len())
        .sum()
}
