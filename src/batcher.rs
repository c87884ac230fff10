//! The coordinator facade: construction, submission, flush, metrics, and
//! shutdown.

use crate::dispatcher::Dispatcher;
use crate::error::BatchError;
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::queue::{self, CloseSignal, QueueConsumer, QueueHandle};
use crate::slot;
use crate::submission::{Executor, Submission};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// How the ingress queue behaves once it is at capacity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Backpressure {
    /// `submit` suspends the caller until space frees up or the coordinator
    /// starts closing.
    #[default]
    Block,
    /// `submit` fails immediately with [`BatchError::QueueFull`].
    Drop,
}

/// Configuration for a [`Batcher`].
///
/// # Example
///
/// ```
/// use llm_autobatch_core::BatcherBuilder;
///
/// let batcher = BatcherBuilder::<i32, i32>::new()
///     .max_batch(8)
///     .max_wait(std::time::Duration::from_millis(10))
///     .build();
/// ```
#[must_use = "builders do nothing unless you call .build()"]
pub struct BatcherBuilder<In, Out> {
    max_batch: usize,
    max_wait: Duration,
    backpressure: Backpressure,
    queue_capacity: Option<usize>,
    _marker: PhantomData<fn(In) -> Out>,
}

impl<In, Out> Default for BatcherBuilder<In, Out> {
    fn default() -> Self {
        Self {
            max_batch: 32,
            max_wait: Duration::from_millis(10),
            backpressure: Backpressure::default(),
            queue_capacity: None,
            _marker: PhantomData,
        }
    }
}

impl<In, Out> BatcherBuilder<In, Out>
where
    In: Send + 'static,
    Out: Send + 'static,
{
    /// Defaults: `max_batch = 32`, `max_wait = 10ms`, `backpressure = block`,
    /// `queue_capacity = max(max_batch * 8, 1024)`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Upper bound on items per executor call. Must be at least 1.
    pub fn max_batch(mut self, max_batch: usize) -> Self {
        self.max_batch = max_batch;
        self
    }

    /// Latency cap for batch formation. A value of `Duration::ZERO` yields
    /// greedy, opportunistic batching (only what is already enqueued).
    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Backpressure policy applied once the ingress queue is full.
    pub fn backpressure(mut self, backpressure: Backpressure) -> Self {
        self.backpressure = backpressure;
        self
    }

    /// Override the ingress queue capacity. Defaults to
    /// `max(max_batch * 8, 1024)`.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    /// Build the coordinator and start its dispatcher.
    ///
    /// # Panics
    ///
    /// Panics if `max_batch` is 0. That is a caller programming error, not
    /// a runtime condition.
    pub fn build(self) -> Batcher<In, Out> {
        assert!(self.max_batch >= 1, "max_batch must be at least 1");

        let capacity = self
            .queue_capacity
            .unwrap_or_else(|| queue::default_capacity(self.max_batch));

        let outstanding = Arc::new(AtomicUsize::new(0));
        let (queue_tx, queue_rx, close_signal) =
            queue::channel(capacity, self.backpressure, Arc::clone(&outstanding));
        let metrics = Arc::new(Metrics::default());

        let dispatcher = Dispatcher {
            queue: queue_rx,
            max_batch: self.max_batch,
            max_wait: self.max_wait,
            metrics: Arc::clone(&metrics),
            outstanding: Arc::clone(&outstanding),
        };

        tracing::info!(
            max_batch = self.max_batch,
            max_wait_ms = self.max_wait.as_millis() as u64,
            backpressure = ?self.backpressure,
            queue_capacity = capacity,
            "batcher started"
        );

        let handle = tokio::spawn(dispatcher.run());

        Batcher {
            queue: queue_tx,
            metrics,
            outstanding,
            lifecycle: Arc::new(Mutex::new(Lifecycle::Active {
                close_signal,
                handle,
            })),
        }
    }
}

enum Lifecycle<In, Out> {
    Active {
        close_signal: CloseSignal,
        handle: JoinHandle<QueueConsumer<Submission<In, Out>>>,
    },
    Closed,
}

/// The batching coordinator: coalesces single-item `submit` calls into
/// list-based executor invocations.
///
/// Cheaply `Clone`-able. Every clone shares the same ingress queue,
/// dispatcher, and metrics.
pub struct Batcher<In, Out> {
    queue: QueueHandle<Submission<In, Out>>,
    metrics: Arc<Metrics>,
    outstanding: Arc<AtomicUsize>,
    lifecycle: Arc<Mutex<Lifecycle<In, Out>>>,
}

impl<In, Out> Clone for Batcher<In, Out> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            metrics: Arc::clone(&self.metrics),
            outstanding: Arc::clone(&self.outstanding),
            lifecycle: Arc::clone(&self.lifecycle),
        }
    }
}

impl<In, Out> Batcher<In, Out>
where
    In: Send + 'static,
    Out: Send + 'static,
{
    /// Start building a coordinator with default configuration.
    pub fn builder() -> BatcherBuilder<In, Out> {
        BatcherBuilder::new()
    }

    /// Submit one input and block until its corresponding output (or error)
    /// is produced. `executor` is used only if this submission becomes item
    /// 0 of its batch: the first submission's executor wins for that batch,
    /// for the discouraged case where callers pass different executors to
    /// the same coordinator.
    pub async fn submit(&self, input: In, executor: Executor<In, Out>) -> Result<Out, BatchError> {
        let (slot_tx, slot_rx) = slot::slot();
        let submission = Submission {
            input,
            slot: slot_tx,
            enqueue_time: Instant::now(),
            executor,
        };

        self.queue.offer(submission).await.map_err(|err| {
            if matches!(err, BatchError::QueueFull) {
                self.metrics.record_drop();
                tracing::warn!("submission rejected: queue full");
            }
            err
        })?;

        slot_rx.wait().await
    }

    /// Block until every submission accepted so far has been completed, as
    /// observed at some single instant. Submissions made during the call
    /// itself may still be pending once it returns.
    pub async fn flush(&self) {
        while self.outstanding.load(Ordering::Acquire) != 0 {
            tokio::task::yield_now().await;
        }
    }

    /// A consistent, independently owned snapshot of the counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Idempotent shutdown: stop accepting new submissions, let the
    /// dispatcher finish any in-flight batch, then fail every submission
    /// still sitting in the queue with [`BatchError::Shutdown`].
    ///
    /// After `close()` returns, [`Batcher::submit`] fails fast with
    /// `Shutdown`.
    pub async fn close(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        let (close_signal, handle) = match std::mem::replace(&mut *lifecycle, Lifecycle::Closed) {
            Lifecycle::Active {
                close_signal,
                handle,
            } => (close_signal, handle),
            Lifecycle::Closed => return,
        };

        tracing::info!("batcher closing");
        close_signal.fire();

        let mut remaining_queue = match handle.await {
            Ok(queue) => queue,
            Err(join_err) => {
                tracing::warn!(error = %join_err, "dispatcher task panicked during close");
                return;
            }
        };

        let mut dropped = 0usize;
        remaining_queue.drain_remaining(|submission| {
            submission.slot.complete_err(BatchError::Shutdown);
            dropped += 1;
        });
        if dropped > 0 {
            self.outstanding.fetch_sub(dropped, Ordering::Release);
            tracing::info!(dropped, "failed queued submissions on close");
        }
    }
}
