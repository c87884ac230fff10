//! The unit of work moving through the ingress queue.

use crate::slot::SlotSender;
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Instant;

/// A user-supplied callable from an ordered list of inputs to an ordered
/// list of outputs of the same length and index correspondence.
///
/// The coordinator treats this as an opaque handle: it never inspects `In`
/// or `Out`, and it never calls the executor concurrently with itself. The
/// executor may do blocking I/O or CPU work, so the dispatcher runs it via
/// [`tokio::task::spawn_blocking`] rather than inline (see `dispatcher.rs`).
pub type Executor<In, Out> =
    Arc<dyn Fn(Vec<In>) -> Result<Vec<Out>, Box<dyn StdError + Send + Sync>> + Send + Sync>;

/// One pending call, in transit from a submitter to the dispatcher.
pub(crate) struct Submission<In, Out> {
    pub(crate) input: In,
    pub(crate) slot: SlotSender<Out>,
    pub(crate) enqueue_time: Instant,
    pub(crate) executor: Executor<In, Out>,
}
