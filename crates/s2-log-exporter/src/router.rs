// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Stream selection.
//!
//! A record lands in `{prefix}-{service}-{YYYY-MM-DD-HH}`, where the service
//! comes from the resource and the hour from the record's timestamp in UTC.
//! Records without a timestamp are placed by the current time.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use derive_more::{Display, Into};
use opentelemetry_proto::tonic::{logs::v1::LogRecord, resource::v1::Resource};

use crate::clock::Clock;
use crate::config::Config;
use crate::serializer::{any_value_as_string, unix_nanos_to_datetime};

const HOUR_BUCKET_FORMAT: &str = "%Y-%m-%d-%H";

/// Name of a stream within the basin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Into)]
pub struct StreamName(String);

impl StreamName {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StreamName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoutingKey {
    pub service: String,
    pub namespace: String,
    pub hour_bucket: String,
}

pub struct StreamRouter {
    prefix: String,
    service_attribute: String,
    namespace_attribute: String,
    clock: Arc<dyn Clock>,
}

impl StreamRouter {
    pub fn new(config: &Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            prefix: config.stream_prefix.clone(),
            service_attribute: config.resource_attributes.service_name_attribute.clone(),
            namespace_attribute: config.resource_attributes.namespace_attribute.clone(),
            clock,
        }
    }

    /// Service and namespace of a resource. Looked up once per resource group.
    pub fn resource_identity(&self, resource: Option<&Resource>) -> (String, String) {
        (
            resource_attribute(resource, &self.service_attribute),
            resource_attribute(resource, &self.namespace_attribute),
        )
    }

    pub fn routing_key(&self, resource: Option<&Resource>, record: &LogRecord) -> RoutingKey {
        let (service, namespace) = self.resource_identity(resource);
        RoutingKey {
            service,
            namespace,
            hour_bucket: self.hour_bucket(record),
        }
    }

    pub fn route(&self, resource: Option<&Resource>, record: &LogRecord) -> StreamName {
        self.stream_name(&self.routing_key(resource, record))
    }

    /// The namespace does not take part in the name.
    pub fn stream_name(&self, key: &RoutingKey) -> StreamName {
        StreamName(format!("{}-{}-{}", self.prefix, key.service, key.hour_bucket))
    }

    pub fn hour_bucket(&self, record: &LogRecord) -> String {
        self.event_time(record).format(HOUR_BUCKET_FORMAT).to_string()
    }

    fn event_time(&self, record: &LogRecord) -> DateTime<Utc> {
        if record.time_unix_nano == 0 {
            return self.clock.now();
        }
        unix_nanos_to_datetime(record.time_unix_nano).unwrap_or_else(|| self.clock.now())
    }
}

/// Value of the first `key` attribute on the resource as text, or empty when
/// the key is empty, the resource is missing or the attribute is absent.
pub fn resource_attribute(resource: Option<&Resource>, key: &str) -> String {
    if key.is_empty() {
        return String::new();
    }
    resource
        .and_then(|r| r.attributes.iter().find(|kv| kv.key == key))
        .and_then(|kv| kv.value.as_ref())
        .map(any_value_as_string)
        .unwrap_or_default()
}
