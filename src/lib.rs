//! A batching coordinator for coalescing many single-item calls into fewer,
//! larger list-based calls to an expensive executor (an LLM inference
//! endpoint, a model invocation, or any other list-in/list-out callable).
//!
//! Each caller submits one input and blocks until it receives exactly its
//! own output. Under the hood, a shared [`Batcher`] groups pending inputs
//! into batches bounded by a size cap and a latency cap, dispatches one
//! batch to the caller-supplied executor, and fans the ordered results back
//! to the original callers.
//!
//! This crate is the coordinator only: the queue, the batch-forming
//! policy, the timeout/size triggers, the dispatch-and-fanout machinery, the
//! backpressure discipline, and the metrics. The executor itself (an HTTP
//! client, a tensor-framework call, anything else) is supplied by the
//! caller at each [`Batcher::submit`] and is opaque to the coordinator.
//!
//! # Quick Start
//!
//! ```
//! use llm_autobatch_core::{Batcher, Executor};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let batcher = Batcher::<i32, i32>::builder()
//!         .max_batch(8)
//!         .max_wait(std::time::Duration::from_millis(10))
//!         .build();
//!
//!     let executor: Executor<i32, i32> = Arc::new(|items: Vec<i32>| {
//!         Ok(items.into_iter().map(|x| x * 2).collect())
//!     });
//!
//!     let result = batcher.submit(21, executor).await.unwrap();
//!     assert_eq!(result, 42);
//!
//!     batcher.close().await;
//! }
//! ```

mod batcher;
mod dispatcher;
mod error;
mod metrics;
mod queue;
mod slot;
mod submission;

pub use batcher::{Backpressure, Batcher, BatcherBuilder};
pub use error::BatchError;
pub use metrics::MetricsSnapshot;
pub use submission::Executor;
