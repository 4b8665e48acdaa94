// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Access to the S2 basin.

pub mod http;
pub mod stream_cache;

use async_trait::async_trait;

use crate::error::DispatchError;
use crate::router::StreamName;

/// Appends records to streams of one basin. Streams are created by the
/// backend on first append.
#[async_trait]
pub trait BasinClient: Send + Sync {
    /// Append a single record to `stream`.
    async fn append(&self, stream: &StreamName, body: &[u8]) -> Result<(), DispatchError>;
}
