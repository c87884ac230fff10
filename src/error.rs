//! Error types for the batching coordinator.

use thiserror::Error;

/// Errors surfaced to a submitter from [`crate::Batcher::submit`].
#[derive(Debug, Error, Clone)]
pub enum BatchError {
    /// The ingress queue was at capacity and the coordinator's backpressure
    /// policy is [`crate::Backpressure::Drop`].
    #[error("queue full")]
    QueueFull,

    /// The coordinator is closing or closed; the submission was rejected, or
    /// a pending slot was completed with shutdown because `close()` ran
    /// before the batch containing it could be dispatched.
    #[error("batcher is shutting down")]
    Shutdown,

    /// The executor raised while processing the batch containing this
    /// submission. Delivered identically to every submitter in that batch.
    #[error("executor error: {message}")]
    ExecutorError {
        /// The executor's error message, propagated verbatim.
        message: String,
    },

    /// The executor returned a result list whose length differs from the
    /// input list it was given. A species of [`BatchError::ExecutorError`];
    /// see [`BatchError::is_executor_error`].
    #[error("executor returned {actual} outputs for {expected} inputs")]
    ExecutorShapeMismatch {
        /// Number of inputs the executor was called with.
        expected: usize,
        /// Number of outputs the executor returned.
        actual: usize,
    },
}

impl BatchError {
    /// Whether this error originates from the executor (a raised error or a
    /// shape mismatch), as opposed to queueing/lifecycle conditions.
    pub fn is_executor_error(&self) -> bool {
        matches!(
            self,
            BatchError::ExecutorError { .. } | BatchError::ExecutorShapeMismatch { .. }
        )
    }

    /// Whether this error means the submission never reached an executor at
    /// all (queue full or shutdown), as opposed to failing during dispatch.
    pub fn is_pre_dispatch(&self) -> bool {
        matches!(self, BatchError::QueueFull | BatchError::Shutdown)
    }
}
