//! Connection pool over real TCP connections to a mock detection service.

use std::io;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use detector_client::config::PoolConfig;
use detector_client::pool::{ChannelPool, PoolError};
use detector_client::TcpFactory;

mod common;

fn pool_config(initial_cap: usize, max_idle: usize, max_active: usize) -> PoolConfig {
    PoolConfig {
        initial_cap,
        max_idle,
        max_active,
        idle_timeout_secs: 30,
    }
}

#[tokio::test]
async fn borrows_pings_and_returns() {
    let (addr, detector) = common::start_mock_detector().await;
    let factory = TcpFactory::new(addr.to_string(), Duration::from_secs(1));
    let pool = ChannelPool::new(&pool_config(2, 4, 8), factory).await.unwrap();
    assert_eq!(pool.len(), 2);

    let mut conn = pool.get().await.unwrap();
    pool.ping(&mut conn).await.unwrap();
    pool.put(conn).await.unwrap();

    assert_eq!(pool.len(), 2);
    // One heartbeat from `get` re-validating the idle entry, one from `ping`.
    assert_eq!(detector.heartbeats.load(Ordering::SeqCst), 2);

    pool.release().await;
    assert_eq!(pool.len(), 0);
}

#[tokio::test]
async fn dead_idle_connections_are_replaced() {
    let (addr, detector) = common::start_mock_detector().await;
    let factory = TcpFactory::new(addr.to_string(), Duration::from_secs(1));
    let pool = ChannelPool::new(&pool_config(2, 2, 4), factory).await.unwrap();

    detector.alive.store(false, Ordering::SeqCst);
    let _conn = pool.get().await.unwrap();

    // Both idle connections failed their heartbeat and a third was dialed.
    assert_eq!(pool.len(), 0);
    assert_eq!(pool.status().opening, 1);
    tokio::time::timeout(Duration::from_secs(5), async {
        while detector.accepted.load(Ordering::SeqCst) < 3 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("third connection never reached the detector");
}

#[tokio::test]
async fn factory_errors_pass_through() {
    let addr = common::closed_port().await;
    let factory = TcpFactory::new(addr.to_string(), Duration::from_secs(1));
    let pool = ChannelPool::new(&pool_config(0, 1, 1), factory).await.unwrap();

    match pool.get().await {
        Err(PoolError::Factory(e)) => assert_eq!(e.kind(), io::ErrorKind::ConnectionRefused),
        other => panic!("expected factory error, got {:?}", other.map(|_| ())),
    }
    assert_eq!(pool.status().opening, 0);
}

#[tokio::test]
async fn fill_fails_when_detector_is_down() {
    let addr = common::closed_port().await;
    let factory = TcpFactory::new(addr.to_string(), Duration::from_secs(1));
    let err = ChannelPool::new(&pool_config(1, 1, 1), factory).await.err();
    assert!(matches!(err, Some(PoolError::Fill(_))));
}

#[tokio::test]
async fn saturated_pool_hands_over_returned_connection() {
    let (addr, detector) = common::start_mock_detector().await;
    let factory = TcpFactory::new(addr.to_string(), Duration::from_secs(1));
    let pool = Arc::new(ChannelPool::new(&pool_config(0, 1, 1), factory).await.unwrap());

    let conn = pool.get().await.unwrap();
    let waiter = tokio::spawn({
        let pool = pool.clone();
        async move { pool.get().await }
    });
    while pool.status().waiting == 0 {
        tokio::task::yield_now().await;
    }

    pool.put(conn).await.unwrap();
    let handed = waiter.await.unwrap().unwrap();
    assert!(detector.accepted.load(Ordering::SeqCst) <= 1);
    pool.put(handed).await.unwrap();
    assert_eq!(pool.status().opening, 1);
}
