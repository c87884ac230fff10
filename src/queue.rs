//! The bounded, single-consumer ingress queue between submitters and the
//! dispatcher.

use crate::error::BatchError;
use crate::Backpressure;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};

/// Default ingress queue capacity when not overridden: `max(max_batch * 8, 1024)`.
pub(crate) fn default_capacity(max_batch: usize) -> usize {
    (max_batch.saturating_mul(8)).max(1024)
}

/// Producer-facing half of the queue. Cheaply `Clone`-able; every submitter
/// thread holds one.
#[derive(Clone)]
pub(crate) struct QueueHandle<T> {
    tx: mpsc::Sender<T>,
    closing: watch::Receiver<bool>,
    policy: Backpressure,
    outstanding: Arc<AtomicUsize>,
}

/// Dispatcher-facing half of the queue. Exactly one task owns this.
pub(crate) struct QueueConsumer<T> {
    rx: mpsc::Receiver<T>,
    closing: watch::Receiver<bool>,
}

/// Signals the closing transition to every [`QueueHandle`] blocked in
/// `offer` under the `block` policy.
pub(crate) struct CloseSignal {
    tx: watch::Sender<bool>,
}

impl CloseSignal {
    pub(crate) fn fire(&self) {
        let _ = self.tx.send(true);
    }
}

/// Build a fresh queue with the given capacity and backpressure policy.
/// `outstanding` is incremented on every successful `offer` and decremented
/// by the dispatcher once a batch is fanned out (and by `close()` for
/// whatever is drained unprocessed), so it always counts submissions that
/// have been accepted but not yet completed.
pub(crate) fn channel<T>(
    capacity: usize,
    policy: Backpressure,
    outstanding: Arc<AtomicUsize>,
) -> (QueueHandle<T>, QueueConsumer<T>, CloseSignal) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let (close_tx, close_rx) = watch::channel(false);
    (
        QueueHandle {
            tx,
            closing: close_rx.clone(),
            policy,
            outstanding,
        },
        QueueConsumer {
            rx,
            closing: close_rx,
        },
        CloseSignal { tx: close_tx },
    )
}

impl<T: Send> QueueHandle<T> {
    /// Offer an item to the queue, honoring the configured backpressure
    /// policy. Under `block`, suspends the caller until space frees up or
    /// the coordinator starts closing. Under `drop`, fails fast when full.
    ///
    /// A successful offer increments the shared outstanding count before
    /// this function returns, so a concurrent `flush()` can never observe
    /// the item as neither queued nor counted.
    pub(crate) async fn offer(&self, item: T) -> Result<(), BatchError> {
        if *self.closing.borrow() {
            return Err(BatchError::Shutdown);
        }
        let result = match self.policy {
            Backpressure::Drop => match self.tx.try_send(item) {
                Ok(()) => Ok(()),
                Err(mpsc::error::TrySendError::Full(_)) => Err(BatchError::QueueFull),
                Err(mpsc::error::TrySendError::Closed(_)) => Err(BatchError::Shutdown),
            },
            Backpressure::Block => {
                let mut closing = self.closing.clone();
                tokio::select! {
                    biased;
                    _ = closing.changed() => Err(BatchError::Shutdown),
                    result = self.tx.send(item) => result.map_err(|_| BatchError::Shutdown),
                }
            }
        };
        if result.is_ok() {
            self.outstanding.fetch_add(1, Ordering::Release);
        }
        result
    }
}

impl<T> QueueConsumer<T> {
    /// Block for the next item with no deadline. Returns `None` once every
    /// [`QueueHandle`] has been dropped, or once the coordinator starts
    /// closing while no item has arrived yet. There is no in-flight batch
    /// to complete in that case, so the dispatcher exits directly.
    pub(crate) async fn take(&mut self) -> Option<T> {
        if *self.closing.borrow() {
            return None;
        }
        tokio::select! {
            biased;
            item = self.rx.recv() => item,
            _ = self.closing.changed() => None,
        }
    }

    /// Drain whatever is left in the queue without waiting, failing each
    /// item via `fail`. Used by `close()` after the dispatcher has exited to
    /// complete any submissions that were queued but never picked up.
    pub(crate) fn drain_remaining(&mut self, mut fail: impl FnMut(T)) {
        while let Ok(item) = self.rx.try_recv() {
            fail(item);
        }
    }

    /// Dequeue additional items, appending to `batch`, until either `batch`
    /// reaches `limit` items or `deadline` passes. Once `deadline` has
    /// already passed this degrades to a non-blocking drain of whatever is
    /// immediately available, which is how `max_wait == 0` is expressed.
    pub(crate) async fn take_batch_up_to(&mut self, limit: usize, deadline: Instant, batch: &mut Vec<T>) {
        while batch.len() < limit {
            if Instant::now() >= deadline {
                match self.rx.try_recv() {
                    Ok(item) => batch.push(item),
                    Err(_) => break,
                }
                continue;
            }

            match tokio::time::timeout_at(deadline.into(), self.rx.recv()).await {
                Ok(Some(item)) => batch.push(item),
                Ok(None) => break,
                Err(_elapsed) => break,
            }
        }
    }
}
