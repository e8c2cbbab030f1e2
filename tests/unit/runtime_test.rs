//! Tests for runtime adapters

use std::time::Duration;

use prometheus_tier_scheduler::core::Spawn;
use prometheus_tier_scheduler::runtime::TokioSpawner;
use tokio::sync::oneshot;

#[test]
fn test_current_outside_runtime_fails() {
    assert!(TokioSpawner::current().is_err());
}

#[tokio::test]
async fn test_current_spawns_onto_runtime() {
    let spawner = TokioSpawner::current().unwrap();
    let (tx, rx) = oneshot::channel();
    spawner.spawn(Box::pin(async move {
        let _ = tx.send("ran");
    }));
    let value = tokio::time::timeout(Duration::from_secs(1), rx)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(value, "ran");
}

#[test]
fn test_explicit_handle_from_other_runtime() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .unwrap();
    let spawner = TokioSpawner::new(runtime.handle().clone());
    let (tx, rx) = oneshot::channel();
    spawner.spawn(Box::pin(async move {
        let _ = tx.send(7_u8);
    }));
    assert_eq!(runtime.block_on(rx).unwrap(), 7);
}
