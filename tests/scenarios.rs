//! End-to-end batching scenarios covering throughput, backpressure,
//! executor failure fanout, shape mismatches, and shutdown behavior.

use llm_autobatch_core::{Backpressure, BatchError, Batcher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn identity_executor() -> llm_autobatch_core::Executor<i32, i32> {
    Arc::new(|items: Vec<i32>| Ok(items))
}

fn doubling_executor() -> llm_autobatch_core::Executor<i32, i32> {
    Arc::new(|items: Vec<i32>| Ok(items.into_iter().map(|x| x * 2).collect()))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn identity_throughput() {
    let batcher = Batcher::<i32, i32>::builder()
        .max_batch(8)
        .max_wait(Duration::from_millis(10))
        .build();

    let mut handles = Vec::new();
    for i in 0..20 {
        let batcher = batcher.clone();
        handles.push(tokio::spawn(async move {
            batcher.submit(i, identity_executor()).await.unwrap()
        }));
    }

    let mut results: Vec<i32> = Vec::new();
    for h in handles {
        results.push(h.await.unwrap());
    }
    results.sort();
    assert_eq!(results, (0..20).collect::<Vec<_>>());
    assert_eq!(batcher.metrics().total_items, 20);

    batcher.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn doubling() {
    let batcher = Batcher::<i32, i32>::builder()
        .max_batch(8)
        .max_wait(Duration::from_millis(10))
        .build();

    let mut handles = Vec::new();
    for i in 0..20 {
        let batcher = batcher.clone();
        handles.push(tokio::spawn(async move {
            batcher.submit(i, doubling_executor()).await.unwrap()
        }));
    }

    let mut results: Vec<i32> = Vec::new();
    for h in handles {
        results.push(h.await.unwrap());
    }
    results.sort();
    assert_eq!(results, (0..20).map(|x| x * 2).collect::<Vec<_>>());

    batcher.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn drop_backpressure() {
    let batcher = Batcher::<i32, i32>::builder()
        .max_batch(2)
        .max_wait(Duration::from_millis(50))
        .backpressure(Backpressure::Drop)
        .queue_capacity(4)
        .build();

    let slow_executor: llm_autobatch_core::Executor<i32, i32> = Arc::new(|items: Vec<i32>| {
        std::thread::sleep(Duration::from_millis(50));
        Ok(items)
    });

    let mut handles = Vec::new();
    for i in 0..10 {
        let batcher = batcher.clone();
        let executor = Arc::clone(&slow_executor);
        handles.push(tokio::spawn(
            async move { batcher.submit(i, executor).await },
        ));
    }

    let mut saw_queue_full = false;
    for h in handles {
        match h.await.unwrap() {
            Ok(v) => assert!((0..10).contains(&v)),
            Err(BatchError::QueueFull) => saw_queue_full = true,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert!(saw_queue_full, "expected at least one QueueFull rejection");
    assert!(batcher.metrics().total_dropped >= 1);

    batcher.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn executor_error_fanout() {
    let batcher = Batcher::<i32, i32>::builder()
        .max_batch(4)
        .max_wait(Duration::from_millis(5))
        .build();

    let failing: llm_autobatch_core::Executor<i32, i32> =
        Arc::new(|_items: Vec<i32>| Err("boom".into()));

    let mut handles = Vec::new();
    for i in 0..4 {
        let batcher = batcher.clone();
        let executor = Arc::clone(&failing);
        handles.push(tokio::spawn(
            async move { batcher.submit(i, executor).await },
        ));
    }

    for h in handles {
        let err = h.await.unwrap().unwrap_err();
        assert!(err.is_executor_error());
        assert!(matches!(err, BatchError::ExecutorError { .. }));
    }

    assert_eq!(batcher.metrics().total_errors, 4);

    // The coordinator stays usable after a failed batch.
    let ok = batcher.submit(7, identity_executor()).await.unwrap();
    assert_eq!(ok, 7);

    batcher.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn shape_mismatch_is_an_executor_error() {
    let batcher = Batcher::<i32, i32>::builder()
        .max_batch(4)
        .max_wait(Duration::from_millis(20))
        .build();

    let short: llm_autobatch_core::Executor<i32, i32> =
        Arc::new(|items: Vec<i32>| Ok(items.into_iter().take(1).collect()));

    let mut handles = Vec::new();
    for i in 0..3 {
        let batcher = batcher.clone();
        let executor = Arc::clone(&short);
        handles.push(tokio::spawn(
            async move { batcher.submit(i, executor).await },
        ));
    }

    for h in handles {
        let err = h.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            BatchError::ExecutorShapeMismatch {
                expected: 3,
                actual: 1
            }
        ));
    }

    batcher.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn close_while_pending_never_blocks_a_caller() {
    let batcher = Batcher::<i32, i32>::builder()
        .max_batch(4)
        .max_wait(Duration::from_millis(200))
        .build();

    let slow: llm_autobatch_core::Executor<i32, i32> = Arc::new(|items: Vec<i32>| {
        std::thread::sleep(Duration::from_millis(100));
        Ok(items)
    });

    let mut handles = Vec::new();
    for i in 0..12 {
        let batcher = batcher.clone();
        let executor = Arc::clone(&slow);
        handles.push(tokio::spawn(
            async move { batcher.submit(i, executor).await },
        ));
    }

    tokio::time::sleep(Duration::from_millis(10)).await;
    batcher.close().await;

    for h in handles {
        match h.await.unwrap() {
            Ok(v) => assert!((0..12).contains(&v)),
            Err(BatchError::Shutdown) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    // close() is idempotent.
    batcher.close().await;
    assert!(matches!(
        batcher.submit(0, identity_executor()).await,
        Err(BatchError::Shutdown)
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn max_batch_one_degenerates_to_no_batching() {
    let batcher = Batcher::<i32, i32>::builder()
        .max_batch(1)
        .max_wait(Duration::from_millis(10))
        .build();

    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = Arc::clone(&calls);
    let executor: llm_autobatch_core::Executor<i32, i32> = Arc::new(move |items: Vec<i32>| {
        calls_clone.fetch_add(1, Ordering::SeqCst);
        assert_eq!(items.len(), 1);
        Ok(items)
    });

    for i in 0..5 {
        batcher.submit(i, Arc::clone(&executor)).await.unwrap();
    }

    let snap = batcher.metrics();
    assert_eq!(snap.total_batches, snap.total_items);
    assert_eq!(calls.load(Ordering::SeqCst), 5);

    batcher.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn flush_waits_for_in_flight_batch() {
    let batcher = Batcher::<i32, i32>::builder()
        .max_batch(4)
        .max_wait(Duration::from_millis(200))
        .build();

    let slow: llm_autobatch_core::Executor<i32, i32> = Arc::new(|items: Vec<i32>| {
        std::thread::sleep(Duration::from_millis(50));
        Ok(items)
    });

    let batcher2 = batcher.clone();
    let submitted = tokio::spawn(async move { batcher2.submit(1, slow).await });

    tokio::time::sleep(Duration::from_millis(5)).await;
    batcher.flush().await;

    assert!(submitted.await.unwrap().is_ok());
    assert!(batcher.metrics().total_items >= 1);

    batcher.close().await;
}
