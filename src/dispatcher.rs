//! The single worker that forms batches and fans results back out.

use crate::error::BatchError;
use crate::metrics::Metrics;
use crate::queue::QueueConsumer;
use crate::submission::Submission;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub(crate) struct Dispatcher<In, Out> {
    pub(crate) queue: QueueConsumer<Submission<In, Out>>,
    pub(crate) max_batch: usize,
    pub(crate) max_wait: Duration,
    pub(crate) metrics: Arc<Metrics>,
    /// Count of submissions accepted into the queue but not yet fanned out.
    /// `QueueHandle::offer` increments this the moment an item is accepted;
    /// this loop decrements it by the batch size once fanout completes, so
    /// it never reads as zero while a batch is still being formed or
    /// dispatched. `Batcher::flush` waits for it to reach zero.
    pub(crate) outstanding: Arc<AtomicUsize>,
}

impl<In, Out> Dispatcher<In, Out>
where
    In: Send + 'static,
    Out: Send + 'static,
{
    /// Run the batch cycle until the queue signals shutdown, then hand the
    /// queue consumer back so `close()` can drain whatever is still queued.
    pub(crate) async fn run(mut self) -> QueueConsumer<Submission<In, Out>> {
        loop {
            let first = match self.queue.take().await {
                Some(submission) => submission,
                None => break,
            };

            let Submission {
                input: first_input,
                slot: first_slot,
                enqueue_time: first_enqueue_time,
                executor,
            } = first;

            let mut inputs = Vec::with_capacity(self.max_batch);
            let mut slots = Vec::with_capacity(self.max_batch);
            inputs.push(first_input);
            slots.push(first_slot);

            if self.max_batch > 1 {
                let deadline = first_enqueue_time + self.max_wait;
                let mut more = Vec::new();
                self.queue
                    .take_batch_up_to(self.max_batch - 1, deadline, &mut more)
                    .await;
                for submission in more {
                    inputs.push(submission.input);
                    slots.push(submission.slot);
                }
            }

            let batch_len = inputs.len();
            tracing::debug!(batch_size = batch_len, "dispatching batch");

            let outcome = tokio::task::spawn_blocking(move || executor(inputs)).await;
            self.fan_out(batch_len, slots, outcome);
            self.outstanding.fetch_sub(batch_len, Ordering::Release);
        }

        self.queue
    }

    fn fan_out(
        &self,
        batch_len: usize,
        slots: Vec<crate::slot::SlotSender<Out>>,
        outcome: Result<Result<Vec<Out>, Box<dyn std::error::Error + Send + Sync>>, tokio::task::JoinError>,
    ) {
        let result = match outcome {
            Ok(Ok(outputs)) if outputs.len() == batch_len => {
                self.metrics.record_batch(batch_len, false);
                for (slot, output) in slots.into_iter().zip(outputs) {
                    slot.complete_ok(output);
                }
                return;
            }
            Ok(Ok(outputs)) => {
                tracing::warn!(
                    expected = batch_len,
                    actual = outputs.len(),
                    "executor returned mismatched output length"
                );
                BatchError::ExecutorShapeMismatch {
                    expected: batch_len,
                    actual: outputs.len(),
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "executor raised");
                BatchError::ExecutorError {
                    message: e.to_string(),
                }
            }
            Err(join_err) => {
                tracing::warn!(error = %join_err, "executor task panicked");
                BatchError::ExecutorError {
                    message: join_err.to_string(),
                }
            }
        };

        self.metrics.record_batch(batch_len, true);
        for slot in slots {
            slot.complete_err(result.clone());
        }
    }
}
