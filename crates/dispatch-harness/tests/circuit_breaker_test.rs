use std::time::Duration;

use dispatch_harness::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};

fn fast_config() -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        failure_threshold: 3,
        cool_off: Duration::from_millis(80),
    }
}

#[test]
fn starts_closed_for_every_key() {
    let cb = CircuitBreaker::new(fast_config());
    assert_eq!(cb.state("openai", "small text"), CircuitState::Closed);
    assert_eq!(cb.state("anthropic", "embedding"), CircuitState::Closed);
}

#[test]
fn trips_independently_per_capability_on_the_same_provider() {
    let cb = CircuitBreaker::new(fast_config());

    for _ in 0..3 {
        cb.on_failure("openai", "small text");
    }

    assert!(cb.is_open("openai", "small text"));
    assert!(!cb.is_open("openai", "embedding"));
}

#[tokio::test]
async fn half_open_probe_that_succeeds_closes_the_circuit() {
    let cb = CircuitBreaker::new(fast_config());

    for _ in 0..3 {
        cb.on_failure("openai", "small text");
    }
    assert!(cb.is_open("openai", "small text"));

    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(!cb.is_open("openai", "small text"));
    assert_eq!(cb.state("openai", "small text"), CircuitState::HalfOpen);

    cb.on_success("openai", "small text");
    assert_eq!(cb.state("openai", "small text"), CircuitState::Closed);
}

#[tokio::test]
async fn half_open_probe_that_fails_reopens_without_another_full_streak() {
    let cb = CircuitBreaker::new(fast_config());

    for _ in 0..3 {
        cb.on_failure("openai", "small text");
    }
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!cb.is_open("openai", "small text"));

    cb.on_failure("openai", "small text");
    assert!(cb.is_open("openai", "small text"));
}

#[test]
fn manual_reset_clears_only_the_targeted_key() {
    let cb = CircuitBreaker::new(fast_config());

    for _ in 0..3 {
        cb.on_failure("openai", "small text");
        cb.on_failure("anthropic", "small text");
    }
    assert!(cb.is_open("openai", "small text"));
    assert!(cb.is_open("anthropic", "small text"));

    cb.reset("openai", "small text");

    assert!(!cb.is_open("openai", "small text"));
    assert!(cb.is_open("anthropic", "small text"));
}
