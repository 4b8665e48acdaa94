// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bounded sending queue served by a fixed pool of workers.
//!
//! ```text
//!   submit ──> [ bounded channel ] ──> worker 1 ─┐
//!                                  ──> worker 2 ─┼─> consumer.consume_logs
//!                                  ──> worker N ─┘     (timeout, backoff)
//! ```
//!
//! Every batch gets its own [`RetryTracker`]. An attempt runs under
//! `timeout` with a child of the queue's cancellation token; failures back
//! off until the retry budget is spent. The outcome is reported through the
//! [`DeliveryReceipt`] returned at submission.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceRequest;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::{Config, RetryConfig};
use crate::consumer::LogsConsumer;
use crate::envelope::backoff::ExponentialBackoff;
use crate::envelope::retry::{DeliveryState, RetryTracker};
use crate::error::DeliveryError;

type DeliveryResult = Result<(), DeliveryError>;

struct QueuedBatch {
    logs: ExportLogsServiceRequest,
    reply: oneshot::Sender<DeliveryResult>,
}

#[derive(Debug, Clone)]
struct DeliveryPolicy {
    timeout: Duration,
    retry: RetryConfig,
}

/// Outcome of a submitted batch, available once it is delivered or given up.
#[derive(Debug)]
pub struct DeliveryReceipt {
    rx: oneshot::Receiver<DeliveryResult>,
}

impl DeliveryReceipt {
    pub async fn wait(self) -> DeliveryResult {
        self.rx.await.unwrap_or(Err(DeliveryError::WorkerGone))
    }
}

pub struct ExportQueue {
    sender: mpsc::Sender<QueuedBatch>,
    workers: JoinSet<()>,
    cancel: CancellationToken,
    queue_size: usize,
}

impl ExportQueue {
    /// Spawns `sending_queue.num_consumers` workers feeding `consumer`.
    ///
    /// Must be called within a Tokio runtime.
    pub fn start<C>(consumer: Arc<C>, config: &Config) -> Self
    where
        C: LogsConsumer + 'static,
    {
        let num_consumers = config.sending_queue.num_consumers.max(1);
        let queue_size = config.sending_queue.queue_size.max(1);

        let (sender, receiver) = mpsc::channel(queue_size);
        let receiver = Arc::new(Mutex::new(receiver));
        let policy = Arc::new(DeliveryPolicy {
            timeout: config.timeout,
            retry: config.retry_on_failure.clone(),
        });
        let cancel = CancellationToken::new();

        let mut workers = JoinSet::new();
        for id in 0..num_consumers {
            let worker = run_worker(
                Arc::clone(&consumer),
                Arc::clone(&receiver),
                Arc::clone(&policy),
                cancel.clone(),
            );
            workers.spawn(worker.instrument(info_span!("export_worker", worker = id)));
        }

        info!(
            num_consumers,
            queue_size,
            timeout = ?config.timeout,
            retry_enabled = config.retry_on_failure.enabled,
            "Started export queue"
        );

        Self {
            sender,
            workers,
            cancel,
            queue_size,
        }
    }

    /// Queues a batch, failing immediately with
    /// [`DeliveryError::QueueFull`] when there is no room.
    pub fn try_submit(
        &self,
        logs: ExportLogsServiceRequest,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .try_send(QueuedBatch { logs, reply })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => DeliveryError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => DeliveryError::ShuttingDown,
            })?;
        Ok(DeliveryReceipt { rx })
    }

    /// Queues a batch, waiting for room.
    pub async fn submit(
        &self,
        logs: ExportLogsServiceRequest,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(QueuedBatch { logs, reply })
            .await
            .map_err(|_| DeliveryError::ShuttingDown)?;
        Ok(DeliveryReceipt { rx })
    }

    /// Batches waiting for a worker.
    #[must_use]
    pub fn queued_batches(&self) -> usize {
        self.queue_size.saturating_sub(self.sender.capacity())
    }

    /// Stops accepting batches and lets the workers drain the queue. Whatever
    /// is still queued, in flight or backing off when `deadline` passes is
    /// cancelled and completes with [`DeliveryError::Cancelled`].
    pub async fn shutdown(self, deadline: Duration) {
        let Self {
            sender,
            mut workers,
            cancel,
            ..
        } = self;
        drop(sender);

        let drained = tokio::time::timeout(deadline, join_all(&mut workers)).await;
        if drained.is_err() {
            warn!(
                deadline = ?deadline,
                "Export queue did not drain before the deadline, cancelling remaining batches"
            );
            cancel.cancel();
            join_all(&mut workers).await;
        }
        info!("Export queue stopped");
    }
}

async fn join_all(workers: &mut JoinSet<()>) {
    while let Some(result) = workers.join_next().await {
        if let Err(e) = result {
            error!("Export worker failed: {}", e);
        }
    }
}

#[async_trait]
impl LogsConsumer for ExportQueue {
    type Error = DeliveryError;

    /// Submits the batch and waits for its outcome. Cancelling stops the wait
    /// with [`DeliveryError::Abandoned`]; a batch already queued stays queued.
    async fn consume_logs(
        &self,
        logs: &ExportLogsServiceRequest,
        cancel: &CancellationToken,
    ) -> Result<(), DeliveryError> {
        let receipt = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(DeliveryError::Abandoned),
            receipt = self.submit(logs.clone()) => receipt?,
        };
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(DeliveryError::Abandoned),
            outcome = receipt.wait() => outcome,
        }
    }
}

async fn run_worker<C>(
    consumer: Arc<C>,
    receiver: Arc<Mutex<mpsc::Receiver<QueuedBatch>>>,
    policy: Arc<DeliveryPolicy>,
    cancel: CancellationToken,
) where
    C: LogsConsumer + 'static,
{
    debug!("Export worker started");
    loop {
        let next = receiver.lock().await.recv().await;
        let Some(batch) = next else {
            break;
        };

        let outcome = deliver(consumer.as_ref(), &batch.logs, &policy, &cancel).await;
        if batch.reply.send(outcome).is_err() {
            debug!("Submitter stopped waiting for the batch outcome");
        }
    }
    debug!("Export worker stopped");
}

async fn deliver<C>(
    consumer: &C,
    logs: &ExportLogsServiceRequest,
    policy: &DeliveryPolicy,
    cancel: &CancellationToken,
) -> DeliveryResult
where
    C: LogsConsumer + ?Sized,
{
    let mut tracker = RetryTracker::new(ExponentialBackoff::from_config(&policy.retry));
    let started = Instant::now();

    loop {
        if cancel.is_cancelled() {
            return Err(DeliveryError::Cancelled {
                attempts: tracker.attempts(),
            });
        }

        let attempt = tracker.start_attempt();
        let attempt_cancel = cancel.child_token();

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                attempt_cancel.cancel();
                return Err(DeliveryError::Cancelled { attempts: attempt });
            }
            outcome = tokio::time::timeout(
                policy.timeout,
                consumer.consume_logs(logs, &attempt_cancel),
            ) => outcome,
        };

        let last_error = match outcome {
            Ok(Ok(())) => {
                tracker.on_success();
                debug!(attempts = attempt, "Batch delivered");
                return Ok(());
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => {
                attempt_cancel.cancel();
                format!("batch timed out after {:?}", policy.timeout)
            }
        };

        let elapsed = started.elapsed();
        match tracker.on_failure(elapsed) {
            DeliveryState::BackingOff { delay, .. } => {
                warn!(
                    attempt,
                    delay = ?delay,
                    error = %last_error,
                    "Exporting failed, will retry"
                );
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => {
                        return Err(DeliveryError::Cancelled { attempts: attempt });
                    }
                    () = tokio::time::sleep(delay) => {}
                }
            }
            _ => {
                error!(
                    attempts = attempt,
                    elapsed = ?elapsed,
                    error = %last_error,
                    "Exporting failed, dropping batch: no more retries left"
                );
                return Err(DeliveryError::RetriesExhausted {
                    attempts: attempt,
                    elapsed,
                    last: last_error,
                });
            }
        }
    }
}
