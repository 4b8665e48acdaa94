// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Canonical JSON form of a single log record.
//!
//! The payload is an object with the keys `attributes`, `body`, `resource`,
//! `severity_text` and `timestamp`, written in that order. Attribute maps are
//! sorted by key, so identical records always produce identical bytes.

use std::collections::BTreeMap;

use base64::prelude::{Engine as _, BASE64_STANDARD};
use chrono::{DateTime, SecondsFormat, Utc};
use opentelemetry_proto::tonic::{
    common::v1::{any_value, AnyValue, KeyValue},
    logs::v1::LogRecord,
    resource::v1::Resource,
};
use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use tracing::warn;

#[derive(Serialize)]
struct RecordPayload<'a> {
    attributes: BTreeMap<&'a str, String>,
    body: String,
    resource: BTreeMap<&'a str, String>,
    severity_text: &'a str,
    timestamp: String,
}

/// Serialize a record and its owning resource. Never fails: if encoding
/// breaks, the record body as text is returned instead.
#[must_use]
pub fn serialize_log_record(record: &LogRecord, resource: Option<&Resource>) -> Vec<u8> {
    let body = record
        .body
        .as_ref()
        .map(any_value_as_string)
        .unwrap_or_default();

    let payload = RecordPayload {
        attributes: attributes_as_strings(&record.attributes),
        body,
        resource: attributes_as_strings(
            resource
                .map(|r| r.attributes.as_slice())
                .unwrap_or_default(),
        ),
        severity_text: &record.severity_text,
        timestamp: format_timestamp(record.time_unix_nano),
    };

    match serde_json::to_vec(&payload) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "Failed to encode log record, forwarding raw body");
            payload.body.into_bytes()
        }
    }
}

/// RFC 3339 in UTC with nanosecond precision. Trailing zeros of the
/// fraction are trimmed, and the fraction is left out when it is zero.
#[must_use]
pub fn format_timestamp(time_unix_nano: u64) -> String {
    let formatted = unix_nanos_to_datetime(time_unix_nano)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Nanos, true);
    // always ends with ".nnnnnnnnnZ"
    let seconds = formatted.trim_end_matches('Z');
    let trimmed = seconds.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed}Z")
}

pub(crate) fn unix_nanos_to_datetime(time_unix_nano: u64) -> Option<DateTime<Utc>> {
    let secs = i64::try_from(time_unix_nano / 1_000_000_000).ok()?;
    // always < 1e9
    let nanos = (time_unix_nano % 1_000_000_000) as u32;
    DateTime::from_timestamp(secs, nanos)
}

fn attributes_as_strings(attributes: &[KeyValue]) -> BTreeMap<&str, String> {
    attributes
        .iter()
        .map(|kv| {
            let value = kv.value.as_ref().map(any_value_as_string).unwrap_or_default();
            (kv.key.as_str(), value)
        })
        .collect()
}

/// Text form of an attribute or body value.
#[must_use]
pub fn any_value_as_string(value: &AnyValue) -> String {
    match &value.value {
        None => String::new(),
        Some(any_value::Value::StringValue(s)) => s.clone(),
        Some(any_value::Value::BoolValue(b)) => b.to_string(),
        Some(any_value::Value::IntValue(i)) => i.to_string(),
        Some(any_value::Value::DoubleValue(d)) => format_double(*d),
        Some(any_value::Value::BytesValue(b)) => BASE64_STANDARD.encode(b),
        Some(any_value::Value::ArrayValue(_)) | Some(any_value::Value::KvlistValue(_)) => {
            any_value_to_json(value).to_string()
        }
    }
}

fn format_double(d: f64) -> String {
    if d.is_nan() {
        "NaN".to_string()
    } else if d == f64::INFINITY {
        "+Inf".to_string()
    } else if d == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        d.to_string()
    }
}

fn any_value_to_json(value: &AnyValue) -> JsonValue {
    match &value.value {
        None => JsonValue::Null,
        Some(any_value::Value::StringValue(s)) => json!(s),
        Some(any_value::Value::BoolValue(b)) => json!(b),
        Some(any_value::Value::IntValue(i)) => json!(i),
        // non-finite doubles become null
        Some(any_value::Value::DoubleValue(d)) => json!(d),
        Some(any_value::Value::BytesValue(b)) => json!(BASE64_STANDARD.encode(b)),
        Some(any_value::Value::ArrayValue(array)) => {
            JsonValue::Array(array.values.iter().map(any_value_to_json).collect())
        }
        Some(any_value::Value::KvlistValue(kvlist)) => {
            let map: serde_json::Map<String, JsonValue> = kvlist
                .values
                .iter()
                .map(|kv| {
                    let value = kv.value.as_ref().map_or(JsonValue::Null, any_value_to_json);
                    (kv.key.clone(), value)
                })
                .collect();
            JsonValue::Object(map)
        }
    }
}
