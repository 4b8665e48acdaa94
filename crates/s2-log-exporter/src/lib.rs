// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Export OpenTelemetry log records to S2 streams.
//!
//! Each record of an incoming batch is serialized to JSON, routed to a stream
//! named after its service and UTC hour, and appended to the configured basin.
//!
//! ```text
//!   ExportLogsServiceRequest
//!            │
//!            v
//!   ┌─────────────────┐
//!   │   ExportQueue   │ (bounded queue, N workers, timeout, backoff)
//!   └────────┬────────┘
//!            │
//!            v
//!   ┌─────────────────┐
//!   │  BasinExporter  │ (serialize → size check → route → dispatch)
//!   └────────┬────────┘
//!            │
//!            v
//!   ┌─────────────────┐
//!   │   BasinClient   │ (one append per record)
//!   └─────────────────┘
//! ```

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod basin;
pub mod clock;
pub mod config;
pub mod constants;
pub mod consumer;
pub mod credentials;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod exporter;
pub mod logger;
pub mod router;
pub mod serializer;

pub use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceRequest;

pub use basin::{http::HttpBasinClient, BasinClient};
pub use clock::{Clock, SystemClock};
pub use config::Config;
pub use consumer::LogsConsumer;
pub use credentials::AccessToken;
pub use envelope::queue::{DeliveryReceipt, ExportQueue};
pub use error::{ConfigError, DeliveryError, DispatchError, ExportError};
pub use exporter::BasinExporter;
