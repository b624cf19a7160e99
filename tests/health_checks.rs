//! Check strategies and the health check service against mock endpoints.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use detector_client::config::{CheckProtocol, HealthCheckConfig};
use detector_client::health::http::HttpStatusCheck;
use detector_client::health::native::HeartbeatCheck;
use detector_client::health::{
    run_check, CheckError, CheckStrategy, HealthCheckService, ProbeFuture,
};

mod common;

const TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::test]
async fn native_check_passes_against_live_detector() {
    let (a, _) = common::start_mock_detector().await;
    let (b, detector_b) = common::start_mock_detector().await;

    let addresses = vec![a.to_string(), b.to_string()];
    assert_eq!(run_check(&HeartbeatCheck, &addresses, TIMEOUT).await, Ok(()));
    assert_eq!(detector_b.heartbeats.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn native_check_names_the_failing_address() {
    let (live, _) = common::start_mock_detector().await;
    let dead = common::closed_port().await;

    let addresses = vec![live.to_string(), dead.to_string()];
    match run_check(&HeartbeatCheck, &addresses, TIMEOUT).await {
        Err(CheckError::EndpointFailure { address, .. }) => assert_eq!(address, dead.to_string()),
        other => panic!("expected endpoint failure, got {:?}", other),
    }
}

#[tokio::test]
async fn native_check_fails_when_heartbeat_is_refused() {
    let (addr, detector) = common::start_mock_detector().await;
    detector.alive.store(false, Ordering::SeqCst);

    let err = run_check(&HeartbeatCheck, &[addr.to_string()], TIMEOUT)
        .await
        .unwrap_err();
    assert!(matches!(err, CheckError::EndpointFailure { .. }));
}

#[tokio::test]
async fn http_check_expects_200() {
    let up = common::start_http_backend(200, "ok").await;
    let check = HttpStatusCheck::new(false);
    assert_eq!(run_check(&check, &[up.to_string()], TIMEOUT).await, Ok(()));
}

#[tokio::test]
async fn http_check_reports_response_body() {
    let down = Arc::new(AtomicBool::new(false));
    let addr = common::start_switchable_http_backend(down, 503, "maintenance").await;
    let check = HttpStatusCheck::new(false);

    let err = run_check(&check, &[addr.to_string()], TIMEOUT).await.unwrap_err();
    assert_eq!(
        err,
        CheckError::EndpointFailure {
            address: addr.to_string(),
            reason: "maintenance".into(),
        }
    );
}

#[tokio::test]
async fn service_tracks_http_endpoint() {
    let up = Arc::new(AtomicBool::new(false));
    let addr = common::start_switchable_http_backend(up.clone(), 500, "boom").await;

    let service = HealthCheckService::start();
    service
        .update_config(HealthCheckConfig {
            interval_secs: 1,
            health_threshold: 1,
            unhealth_threshold: 1,
            addresses: vec![addr.to_string()],
            timeout_ms: 1000,
            protocol: CheckProtocol::Http,
            enable_tls: false,
        })
        .unwrap();

    tokio::time::timeout(Duration::from_secs(10), async {
        while service.is_healthy() {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .expect("service never reported unhealthy");
    assert!(service.detail().contains("boom"));

    up.store(true, Ordering::SeqCst);
    tokio::time::timeout(Duration::from_secs(10), async {
        while !service.is_healthy() {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .expect("service never recovered");

    service.close().await;
}

/// Records probe start/end per strategy generation.
struct Recording {
    generation: u64,
    delay: Duration,
    log: Arc<Mutex<Vec<(u64, &'static str)>>>,
}

impl CheckStrategy for Recording {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn probe(&self, _address: &str, _timeout: Duration) -> ProbeFuture {
        let generation = self.generation;
        let delay = self.delay;
        let log = self.log.clone();
        Box::pin(async move {
            log.lock().unwrap().push((generation, "start"));
            tokio::time::sleep(delay).await;
            log.lock().unwrap().push((generation, "end"));
            Ok(())
        })
    }
}

#[tokio::test(start_paused = true)]
async fn reconfiguration_waits_for_in_flight_tick() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let builder_log = log.clone();
    let service = HealthCheckService::with_strategy_builder(Arc::new(
        move |config: &HealthCheckConfig| {
            Arc::new(Recording {
                generation: config.interval_secs,
                delay: Duration::from_millis(500),
                log: builder_log.clone(),
            }) as Arc<dyn CheckStrategy>
        },
    ));

    let base = HealthCheckConfig {
        addresses: vec!["127.0.0.1:1".into()],
        ..Default::default()
    };
    service
        .update_config(HealthCheckConfig {
            interval_secs: 1,
            ..base.clone()
        })
        .unwrap();

    let contains = |entry: (u64, &'static str)| log.lock().unwrap().contains(&entry);
    while !contains((1, "start")) {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    service
        .update_config(HealthCheckConfig {
            interval_secs: 2,
            ..base
        })
        .unwrap();
    while !contains((2, "end")) {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let log = log.lock().unwrap().clone();
    let first_end = log.iter().position(|e| *e == (1, "end")).unwrap();
    let second_start = log.iter().position(|e| *e == (2, "start")).unwrap();
    assert!(first_end < second_start, "log was {:?}", log);
    assert_eq!(log.iter().filter(|e| e.0 == 1).count(), 2);

    // Stats restarted with the new configuration.
    while service.stats().count == 0 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(service.stats().count, 1);
    service.close().await;
}
