//! Breaker state transitions driven through the router with a manual
//! clock: open on repeated failure, trial after the cool-down, close or
//! reopen on the trial's outcome.

use std::sync::Arc;
use std::time::Duration;

use tickergate_tests::*;

const COOL_DOWN: Duration = Duration::from_secs(300);

fn tight_breaker() -> BreakerConfig {
    BreakerConfig {
        failure_threshold: 2,
        failure_window: Duration::from_secs(120),
        cool_down: COOL_DOWN,
    }
}

fn breaker_state(router: &DataRouter, provider: ProviderId) -> BreakerState {
    router
        .provider_status(provider)
        .expect("provider is registered")
        .breaker
        .state
}

/// Drive `count` distinct failing queries through a single-provider chain.
async fn fail_times(router: &DataRouter, provider: &ScriptedProvider, count: usize) {
    for i in 0..count {
        provider.enqueue_failure(FetchError::timeout("upstream stalled"));
        let query = prices_query(&format!("SYM{i}"));
        router
            .prices(&query)
            .await
            .expect_err("scripted failure must surface");
    }
}

#[tokio::test]
async fn breaker_opens_at_the_failure_threshold() {
    let provider = Arc::new(ScriptedProvider::new(ProviderId::Yahoo));
    let clock = ManualClock::new();
    let router = router_with(
        chain_config(&[ProviderId::Yahoo], tight_breaker()),
        vec![Arc::clone(&provider)],
        &clock,
    );

    fail_times(&router, &provider, 1).await;
    assert_eq!(breaker_state(&router, ProviderId::Yahoo), BreakerState::Closed);

    fail_times(&router, &provider, 1).await;
    assert_eq!(breaker_state(&router, ProviderId::Yahoo), BreakerState::Open);
}

#[tokio::test]
async fn open_breaker_short_circuits_until_the_cool_down_elapses() {
    let provider = Arc::new(ScriptedProvider::new(ProviderId::Yahoo));
    let clock = ManualClock::new();
    let router = router_with(
        chain_config(&[ProviderId::Yahoo], tight_breaker()),
        vec![Arc::clone(&provider)],
        &clock,
    );

    fail_times(&router, &provider, 2).await;
    let calls_when_opened = provider.calls();

    // Still inside the cool-down: the chain is skipped, not attempted.
    clock.advance(COOL_DOWN - Duration::from_secs(1));
    let error = router
        .prices(&prices_query("SKIP"))
        .await
        .expect_err("no provider is eligible");
    assert_eq!(
        error.attempts()[0].outcome,
        AttemptOutcome::SkippedOpenBreaker
    );
    assert_eq!(provider.calls(), calls_when_opened);
}

#[tokio::test]
async fn trial_success_after_cool_down_closes_the_breaker() {
    let provider = Arc::new(ScriptedProvider::new(ProviderId::Yahoo));
    let clock = ManualClock::new();
    let router = router_with(
        chain_config(&[ProviderId::Yahoo], tight_breaker()),
        vec![Arc::clone(&provider)],
        &clock,
    );

    fail_times(&router, &provider, 2).await;
    assert_eq!(breaker_state(&router, ProviderId::Yahoo), BreakerState::Open);

    clock.advance(COOL_DOWN);
    provider.enqueue_prices(sample_bars());
    let routed = router
        .prices(&prices_query("TRIAL"))
        .await
        .expect("trial succeeds");

    assert_eq!(routed.source, ProviderId::Yahoo);
    assert_eq!(breaker_state(&router, ProviderId::Yahoo), BreakerState::Closed);

    // Healthy again: further queries go straight through.
    provider.enqueue_prices(sample_bars());
    router
        .prices(&prices_query("AFTER"))
        .await
        .expect("closed breaker serves");
}

#[tokio::test]
async fn trial_failure_reopens_for_another_full_cool_down() {
    let provider = Arc::new(ScriptedProvider::new(ProviderId::Yahoo));
    let clock = ManualClock::new();
    let router = router_with(
        chain_config(&[ProviderId::Yahoo], tight_breaker()),
        vec![Arc::clone(&provider)],
        &clock,
    );

    fail_times(&router, &provider, 2).await;
    clock.advance(COOL_DOWN);

    // The trial itself fails.
    fail_times(&router, &provider, 1).await;
    assert_eq!(breaker_state(&router, ProviderId::Yahoo), BreakerState::Open);

    // A fresh cool-down applies from the failed trial, not the original trip.
    clock.advance(COOL_DOWN - Duration::from_secs(1));
    let error = router
        .prices(&prices_query("STILL"))
        .await
        .expect_err("still cooling down");
    assert_eq!(
        error.attempts()[0].outcome,
        AttemptOutcome::SkippedOpenBreaker
    );

    clock.advance(Duration::from_secs(1));
    provider.enqueue_prices(sample_bars());
    router
        .prices(&prices_query("RETRY"))
        .await
        .expect("second trial succeeds");
    assert_eq!(breaker_state(&router, ProviderId::Yahoo), BreakerState::Closed);
}

#[tokio::test]
async fn not_found_during_a_trial_proves_recovery() {
    let provider = Arc::new(ScriptedProvider::new(ProviderId::Yahoo));
    let clock = ManualClock::new();
    let router = router_with(
        chain_config(&[ProviderId::Yahoo], tight_breaker()),
        vec![Arc::clone(&provider)],
        &clock,
    );

    fail_times(&router, &provider, 2).await;
    clock.advance(COOL_DOWN);

    // The upstream answers promptly, just without data for this symbol.
    provider.enqueue_failure(FetchError::not_found("no such symbol"));
    router
        .prices(&prices_query("ZZZZ"))
        .await
        .expect_err("miss still surfaces to the caller");

    assert_eq!(breaker_state(&router, ProviderId::Yahoo), BreakerState::Closed);
}

#[tokio::test]
async fn failures_outside_the_window_do_not_accumulate() {
    let provider = Arc::new(ScriptedProvider::new(ProviderId::Yahoo));
    let clock = ManualClock::new();
    let router = router_with(
        chain_config(&[ProviderId::Yahoo], tight_breaker()),
        vec![Arc::clone(&provider)],
        &clock,
    );

    fail_times(&router, &provider, 1).await;
    // Let the first failure age out of the 120s window.
    clock.advance(Duration::from_secs(121));
    fail_times(&router, &provider, 1).await;

    assert_eq!(breaker_state(&router, ProviderId::Yahoo), BreakerState::Closed);
}

#[tokio::test]
async fn rate_limit_retry_hint_extends_the_open_period() {
    let provider = Arc::new(ScriptedProvider::new(ProviderId::Yahoo));
    let clock = ManualClock::new();
    let router = router_with(
        chain_config(&[ProviderId::Yahoo], tight_breaker()),
        vec![Arc::clone(&provider)],
        &clock,
    );

    let long_hint = COOL_DOWN + Duration::from_secs(300);
    for i in 0..2 {
        provider.enqueue_failure(FetchError::rate_limited(
            "quota spent",
            Some(long_hint),
        ));
        router
            .prices(&prices_query(&format!("RL{i}")))
            .await
            .expect_err("scripted failure must surface");
    }
    assert_eq!(breaker_state(&router, ProviderId::Yahoo), BreakerState::Open);

    // The configured cool-down alone is not enough when the upstream asked
    // for a longer back-off.
    clock.advance(COOL_DOWN);
    let error = router
        .prices(&prices_query("EARLY"))
        .await
        .expect_err("still backing off");
    assert_eq!(
        error.attempts()[0].outcome,
        AttemptOutcome::SkippedOpenBreaker
    );

    clock.advance(Duration::from_secs(300));
    provider.enqueue_prices(sample_bars());
    router
        .prices(&prices_query("LATER"))
        .await
        .expect("back-off honored, trial allowed");
}

#[tokio::test]
async fn operator_reset_restores_a_tripped_provider() {
    let provider = Arc::new(ScriptedProvider::new(ProviderId::Yahoo));
    let clock = ManualClock::new();
    let router = router_with(
        chain_config(&[ProviderId::Yahoo], tight_breaker()),
        vec![Arc::clone(&provider)],
        &clock,
    );

    fail_times(&router, &provider, 2).await;
    assert_eq!(breaker_state(&router, ProviderId::Yahoo), BreakerState::Open);

    assert!(router.reset_provider(ProviderId::Yahoo));
    assert_eq!(breaker_state(&router, ProviderId::Yahoo), BreakerState::Closed);

    provider.enqueue_prices(sample_bars());
    router
        .prices(&prices_query("FRESH"))
        .await
        .expect("reset provider serves immediately");
}
