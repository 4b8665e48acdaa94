// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::basin::BasinClient;
use crate::error::DispatchError;
use crate::router::StreamName;

/// Sends one serialized record to its stream. Failures are returned as they
/// are; retrying is left to the caller.
#[derive(Clone)]
pub struct Dispatcher {
    client: Arc<dyn BasinClient>,
}

impl Dispatcher {
    pub fn new(client: Arc<dyn BasinClient>) -> Self {
        Self { client }
    }

    pub async fn send(
        &self,
        stream: &StreamName,
        payload: &[u8],
        cancel: &CancellationToken,
    ) -> Result<(), DispatchError> {
        if cancel.is_cancelled() {
            return Err(DispatchError::Cancelled);
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(DispatchError::Cancelled),
            result = self.client.append(stream, payload) => {
                result?;
                debug!(
                    stream = %stream,
                    body_size_bytes = payload.len(),
                    "Sent log record to stream"
                );
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basin::testing::RecordingClient;
    use std::time::Duration;

    #[tokio::test]
    async fn test_send_appends_payload() {
        let client = Arc::new(RecordingClient::default());
        let dispatcher = Dispatcher::new(client.clone());

        dispatcher
            .send(
                &StreamName::from("otel-api-2024-01-15-10"),
                b"{}",
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let appended = client.appended.lock().unwrap();
        assert_eq!(appended.len(), 1);
        assert_eq!(appended[0].0, "otel-api-2024-01-15-10");
        assert_eq!(appended[0].1, b"{}");
    }

    #[tokio::test]
    async fn test_failure_is_returned_unchanged() {
        let dispatcher = Dispatcher::new(Arc::new(RecordingClient::failing_on_call(1)));
        let result = dispatcher
            .send(&StreamName::from("s"), b"x", &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(DispatchError::StreamClient(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_abandons_inflight_append() {
        let client = Arc::new(RecordingClient::stalling(Duration::from_secs(3600)));
        let dispatcher = Dispatcher::new(client.clone());
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let result = dispatcher.send(&StreamName::from("s"), b"x", &cancel).await;
        assert!(matches!(result, Err(DispatchError::Cancelled)));
        assert_eq!(client.calls(), 1);
        assert!(client.appended.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_already_cancelled_never_calls_backend() {
        let client = Arc::new(RecordingClient::default());
        let dispatcher = Dispatcher::new(client.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = dispatcher.send(&StreamName::from("s"), b"x", &cancel).await;
        assert!(matches!(result, Err(DispatchError::Cancelled)));
        assert_eq!(client.calls(), 0);
    }
}
