//! Integration tests for the core-async runtime facade.

use core_async::{runtime, sync, task, time};
use std::sync::Arc;

#[core_async::test]
async fn test_task_spawn() {
    let handle = task::spawn(async { 42 });
    let result = handle.await.unwrap();
    assert_eq!(result, 42);
}

#[core_async::test]
async fn test_timeout_success() {
    let result = time::timeout(time::Duration::from_millis(200), async {
        time::sleep(time::Duration::from_millis(5)).await;
        42
    })
    .await;

    assert_eq!(result.unwrap(), 42);
}

#[core_async::test]
async fn test_timeout_failure() {
    let result = time::timeout(time::Duration::from_millis(5), async {
        time::sleep(time::Duration::from_millis(200)).await;
        42
    })
    .await;

    assert!(result.is_err());
}

#[core_async::test]
async fn test_mutex_shared_between_tasks() {
    let mutex = Arc::new(sync::Mutex::new(0));
    let mutex_clone = mutex.clone();

    let handle = task::spawn(async move {
        let mut guard = mutex_clone.lock().await;
        *guard += 1;
    });

    handle.await.unwrap();

    assert_eq!(*mutex.lock().await, 1);
}

#[core_async::test]
async fn test_semaphore_bounds_permits() {
    let semaphore = sync::Semaphore::new(2);
    let first = semaphore.acquire().await.unwrap();
    let _second = semaphore.acquire().await.unwrap();
    assert_eq!(semaphore.available_permits(), 0);

    drop(first);
    assert_eq!(semaphore.available_permits(), 1);
}

#[core_async::test]
async fn test_cancellation_token_propagates_to_children() {
    let token = sync::CancellationToken::new();
    let child = token.child_token();
    assert!(!child.is_cancelled());

    token.cancel();

    assert!(child.is_cancelled());
    child.cancelled().await;
}

#[core_async::test]
async fn test_broadcast_channel() {
    let (tx, mut rx) = sync::broadcast::channel(4);
    tx.send("phase").unwrap();
    assert_eq!(rx.recv().await.unwrap(), "phase");
}

#[test]
fn test_block_on_outside_runtime() {
    assert!(!runtime::in_runtime());
    let value = runtime::block_on(async { runtime::in_runtime() });
    assert!(value);
}
