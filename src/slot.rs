//! The single-shot response rendezvous between a submitter and the dispatcher.

use crate::error::BatchError;
use tokio::sync::oneshot;

/// The writer half of a [`Slot`], held by the dispatcher while a submission
/// is in flight.
///
/// `complete_ok`/`complete_err` each consume `self`, which is what makes a
/// second completion a compile-time impossibility rather than a runtime
/// check: the dispatcher cannot hold two live handles to the same slot.
pub(crate) struct SlotSender<T> {
    inner: oneshot::Sender<Result<T, BatchError>>,
}

/// The reader half of a [`Slot`], held by the submitter that is blocked in
/// [`crate::Batcher::submit`].
pub(crate) struct SlotReceiver<T> {
    inner: oneshot::Receiver<Result<T, BatchError>>,
}

/// Create a fresh single-shot rendezvous.
pub(crate) fn slot<T>() -> (SlotSender<T>, SlotReceiver<T>) {
    let (tx, rx) = oneshot::channel();
    (SlotSender { inner: tx }, SlotReceiver { inner: rx })
}

impl<T> SlotSender<T> {
    /// Complete the slot with a successful value.
    ///
    /// If the submitter has already abandoned its receiver (e.g. it wrapped
    /// `submit` with its own timeout and gave up), the send fails silently.
    /// A completion on an abandoned slot is dropped, not an error.
    pub(crate) fn complete_ok(self, value: T) {
        let _ = self.inner.send(Ok(value));
    }

    /// Complete the slot with an error. Same abandonment semantics as
    /// [`Self::complete_ok`].
    pub(crate) fn complete_err(self, err: BatchError) {
        let _ = self.inner.send(Err(err));
    }
}

impl<T> SlotReceiver<T> {
    /// Block until the slot is completed. Resolves to `Err(BatchError::Shutdown)`
    /// if the sender was dropped without completing it (e.g. the dispatcher
    /// panicked or the process is tearing down a still-pending batch).
    pub(crate) async fn wait(self) -> Result<T, BatchError> {
        match self.inner.await {
            Ok(result) => result,
            Err(_recv_error) => Err(BatchError::Shutdown),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_success() {
        let (tx, rx) = slot::<i32>();
        tx.complete_ok(42);
        assert_eq!(rx.wait().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn delivers_error() {
        let (tx, rx) = slot::<i32>();
        tx.complete_err(BatchError::QueueFull);
        assert!(matches!(rx.wait().await, Err(BatchError::QueueFull)));
    }

    #[tokio::test]
    async fn dropped_sender_yields_shutdown() {
        let (tx, rx) = slot::<i32>();
        drop(tx);
        assert!(matches!(rx.wait().await, Err(BatchError::Shutdown)));
    }

    #[tokio::test]
    async fn dropped_receiver_is_silently_tolerated() {
        let (tx, rx) = slot::<i32>();
        drop(rx);
        // Must not panic: the sender side discards completions on an
        // abandoned slot.
        tx.complete_ok(7);
    }
}
