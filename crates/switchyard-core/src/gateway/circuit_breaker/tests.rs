use super::*;
use std::time::Duration;

fn upstream(msg: &str) -> GatewayError {
    GatewayError::Upstream { provider: "p1".to_string(), message: msg.to_string() }
}

fn breaker(max_failures: u32, success_threshold: u32) -> CircuitBreaker {
    CircuitBreaker::new(
        "p1",
        CircuitBreakerConfig {
            max_failures,
            open_timeout: Duration::from_secs(60),
            success_threshold,
        },
    )
}

#[tokio::test(start_paused = true)]
async fn test_circuit_breaker_opens_after_failures() {
    let cb = breaker(3, 2);

    assert!(cb.allow().is_ok());
    assert_eq!(cb.state(), CircuitState::Closed);

    cb.record_failure(&upstream("error 1"));
    cb.record_failure(&upstream("error 2"));
    assert!(cb.allow().is_ok());

    cb.record_failure(&upstream("error 3"));
    assert_eq!(cb.state(), CircuitState::Open);
    assert_eq!(
        cb.allow().unwrap_err(),
        GatewayError::CircuitOpen { provider: "p1".to_string() }
    );
    assert_eq!(cb.trips(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_circuit_breaker_success_resets_failures() {
    let cb = breaker(3, 2);

    cb.record_failure(&upstream("error"));
    cb.record_failure(&upstream("error"));
    cb.record_success();
    cb.record_failure(&upstream("error"));
    cb.record_failure(&upstream("error"));

    assert!(cb.allow().is_ok());
    assert_eq!(cb.state(), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_open_rejects_until_timeout() {
    let cb = breaker(1, 1);
    cb.record_failure(&upstream("boom"));

    tokio::time::advance(Duration::from_secs(59)).await;
    assert!(cb.allow().is_err());
    assert_eq!(cb.state(), CircuitState::Open);

    tokio::time::advance(Duration::from_secs(1)).await;
    assert!(cb.allow().is_ok());
    assert_eq!(cb.state(), CircuitState::HalfOpen);
}

#[tokio::test(start_paused = true)]
async fn test_circuit_breaker_half_open_recovery() {
    let cb = breaker(2, 2);

    cb.record_failure(&upstream("error"));
    cb.record_failure(&upstream("error"));
    assert_eq!(cb.state(), CircuitState::Open);

    tokio::time::advance(Duration::from_secs(61)).await;

    assert!(cb.allow().is_ok());
    assert_eq!(cb.state(), CircuitState::HalfOpen);

    cb.record_success();
    assert_eq!(cb.state(), CircuitState::HalfOpen);
    cb.record_success();
    assert_eq!(cb.state(), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_half_open_failure_reopens_and_restarts_timer() {
    let cb = breaker(1, 2);
    cb.record_failure(&upstream("error"));
    tokio::time::advance(Duration::from_secs(60)).await;
    assert!(cb.allow().is_ok());

    cb.record_success();
    cb.record_failure(&upstream("still broken"));
    assert_eq!(cb.state(), CircuitState::Open);
    assert_eq!(cb.trips(), 2);

    tokio::time::advance(Duration::from_secs(30)).await;
    assert!(cb.allow().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_half_open_counters_start_at_zero() {
    let cb = breaker(2, 2);
    cb.record_failure(&upstream("error"));
    cb.record_failure(&upstream("error"));
    tokio::time::advance(Duration::from_secs(60)).await;
    assert!(cb.allow().is_ok());

    let snapshot = cb.snapshot();
    assert_eq!(snapshot.state, CircuitState::HalfOpen);
    assert_eq!(snapshot.failures, 0);
    assert_eq!(snapshot.successes, 0);
    assert!(snapshot.last_failure_reason.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_set_creates_breakers_lazily() {
    let set = CircuitBreakerSet::new(CircuitBreakerConfig {
        max_failures: 1,
        open_timeout: Duration::from_secs(60),
        success_threshold: 1,
    });

    assert_eq!(set.state("unseen"), CircuitState::Closed);
    assert!(set.snapshots().is_empty());

    set.get("b").record_failure(&upstream("down"));
    set.get("a").record_success();

    let a = set.get("a");
    let a_again = set.get("a");
    assert!(Arc::ptr_eq(&a, &a_again));

    let providers: Vec<String> = set.snapshots().into_iter().map(|s| s.provider).collect();
    assert_eq!(providers, vec!["a", "b"]);

    let summary = set.summary();
    assert_eq!(summary.open, 1);
    assert_eq!(summary.closed, 1);
    assert_eq!(summary.total_trips, 1);
}

#[tokio::test(start_paused = true)]
async fn test_breakers_are_independent() {
    let set = CircuitBreakerSet::new(CircuitBreakerConfig {
        max_failures: 2,
        open_timeout: Duration::from_secs(60),
        success_threshold: 1,
    });

    set.get("p1").record_failure(&upstream("x"));
    set.get("p1").record_failure(&upstream("x"));
    assert_eq!(set.state("p1"), CircuitState::Open);
    assert!(set.get("p2").allow().is_ok());
}
