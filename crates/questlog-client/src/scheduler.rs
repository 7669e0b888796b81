// SPDX-FileCopyrightText: 2026 Questlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic, batched delivery of queued messages.
//!
//! Each dispatch cycle re-queues failed rows according to the retry policy,
//! then drains up to `max_batch_size` pending rows once at least
//! `min_batch_size` are waiting (or unconditionally when forced) and submits
//! them to the transport in row order.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use futures::future::join_all;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use questlog_config::model::ThrottleConfig;
use questlog_core::{
    Message, MessageStatus, Operation, QueueStore, QuestlogError, RequestKey, Response, RowId,
};

use crate::dispatcher::{Delivery, Dispatcher};

/// Drives delivery of the persistent queue.
pub struct DispatchScheduler {
    queue: Arc<dyn QueueStore>,
    dispatcher: Arc<Dispatcher>,
    throttle: Arc<ArcSwap<ThrottleConfig>>,
    flush: Notify,
}

impl DispatchScheduler {
    pub fn new(
        queue: Arc<dyn QueueStore>,
        dispatcher: Arc<Dispatcher>,
        throttle: Arc<ArcSwap<ThrottleConfig>>,
    ) -> Self {
        Self {
            queue,
            dispatcher,
            throttle,
            flush: Notify::new(),
        }
    }

    /// Current throttle snapshot.
    pub fn throttle(&self) -> Arc<ThrottleConfig> {
        self.throttle.load_full()
    }

    /// Ask the background loop to run a forced cycle as soon as possible.
    pub fn request_flush(&self) {
        self.flush.notify_one();
    }

    /// Run one dispatch cycle and return the number of messages submitted.
    ///
    /// Throttle settings are read once, so a config update never changes a
    /// cycle in progress.
    ///
    /// An unforced cycle only sends once `min_batch_size` rows are pending.
    /// A lone row that failed out of an otherwise delivered batch therefore
    /// waits for more rows or for a forced cycle (`Client::flush`, or the
    /// flush `end_session` requests). Lower `min_batch_size` to bound that
    /// wait by `interval_secs`.
    ///
    /// Every row in the batch is settled even if recording one outcome
    /// fails; such rows go back to pending and the first error is returned.
    pub async fn run_cycle(&self, force: bool) -> Result<usize, QuestlogError> {
        let throttle = self.throttle.load_full();

        let requeued = self
            .queue
            .requeue_failed(throttle.retry, throttle.interval())
            .await?;
        if requeued > 0 {
            debug!(requeued, "failed messages returned to pending");
        }

        let pending = self.queue.count(Some(MessageStatus::Pending)).await?;
        if pending == 0 || (!force && pending < u64::from(throttle.min_batch_size)) {
            debug!(pending, min_batch_size = throttle.min_batch_size, force, "dispatch skipped");
            return Ok(0);
        }

        let batch = self.queue.drain(throttle.max_batch_size).await?;
        let submitted = batch.len();
        debug!(submitted, force, "dispatching batch");

        // Requests start in row order; completions may interleave.
        let deliveries = join_all(batch.iter().map(|m| self.dispatcher.deliver(m))).await;
        let mut first_error = None;
        for (message, delivery) in batch.into_iter().zip(deliveries) {
            let row_id = message.row_id;
            if let Err(e) = self.settle(message, delivery).await {
                warn!(row_id, error = %e, "could not record delivery outcome");
                self.release(row_id).await;
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(submitted),
        }
    }

    /// Put a row whose outcome could not be recorded back to pending, so it
    /// is sent again rather than left `Sending` until the next restart.
    async fn release(&self, row_id: RowId) {
        if let Err(e) = self
            .queue
            .update_status(row_id, MessageStatus::Pending)
            .await
        {
            warn!(row_id, error = %e, "row stays in flight until the queue is reopened");
        }
    }

    async fn settle(&self, message: Message, delivery: Delivery) -> Result<(), QuestlogError> {
        let operation = message.operation().unwrap_or(Operation::SendTelemEvents);
        let key = message.client_callback_key.clone().map(RequestKey::from);

        match delivery {
            Delivery::Delivered(reply) => {
                self.queue
                    .update_status(message.row_id, MessageStatus::Sent)
                    .await?;
                debug!(row_id = message.row_id, %operation, "message delivered");
                let response =
                    Response::ok(operation, reply.status, reply.body).with_row(message.row_id);
                self.dispatcher.complete(key, response);
            }
            Delivery::Rejected(reply) => {
                // Final answer from the platform: keep the receipt, report it.
                self.queue
                    .update_status(message.row_id, MessageStatus::Sent)
                    .await?;
                warn!(row_id = message.row_id, status = reply.status, %operation, "message rejected");
                let response = Response::error(operation, format!("server returned {}", reply.status))
                    .with_status_code(reply.status)
                    .with_body(reply.body)
                    .with_row(message.row_id);
                self.dispatcher.complete(key, response);
            }
            Delivery::Retry(reason) => {
                self.queue
                    .update_status(message.row_id, MessageStatus::Failed)
                    .await?;
                debug!(
                    row_id = message.row_id,
                    attempts = message.attempts + 1,
                    reason = %reason,
                    "delivery failed, will retry"
                );
            }
        }
        Ok(())
    }

    /// Spawn the background dispatch loop.
    ///
    /// The loop ticks every `interval_secs` (re-read after each cycle), runs
    /// a forced cycle whenever a flush is requested, and exits when `cancel`
    /// fires.
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut period = self.throttle.load().interval();
            let mut interval = new_interval(period);
            // Skip the first immediate tick.
            interval.tick().await;
            info!(interval_secs = period.as_secs(), "dispatch scheduler started");

            loop {
                let force = tokio::select! {
                    _ = interval.tick() => false,
                    _ = self.flush.notified() => true,
                    _ = cancel.cancelled() => {
                        info!("dispatch scheduler shutting down");
                        break;
                    }
                };

                match self.run_cycle(force).await {
                    Ok(0) => {}
                    Ok(submitted) => debug!(submitted, "dispatch cycle complete"),
                    Err(e) => warn!(error = %e, "dispatch cycle failed (non-fatal)"),
                }

                let current = self.throttle.load().interval();
                if current != period {
                    info!(interval_secs = current.as_secs(), "dispatch interval changed");
                    period = current;
                    interval = new_interval(period);
                    interval.tick().await;
                }
            }
        })
    }
}

fn new_interval(period: Duration) -> tokio::time::Interval {
    // Zero is rejected by validation; guard anyway since `interval` panics on it.
    let mut interval = tokio::time::interval(period.max(Duration::from_millis(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}
