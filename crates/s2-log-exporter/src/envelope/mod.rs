// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Concurrency, backpressure and retries around a [`LogsConsumer`](crate::consumer::LogsConsumer).

pub mod backoff;
pub mod queue;
pub mod retry;
