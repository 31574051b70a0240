//! Per-provider circuit breaker.
//!
//! State machine: Closed (calls pass) -> Open (calls short-circuited) ->
//! HalfOpen (one trial call probes recovery). The Open->HalfOpen edge is
//! time-triggered against an injected [`Clock`], never a background timer.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::UtcDateTime;

/// Breaker state visible to the router and the health surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Breaker thresholds and timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerConfig {
    /// Consecutive failures that trip Closed -> Open.
    pub failure_threshold: u32,
    /// Failures further apart than this do not accumulate.
    pub failure_window: Duration,
    /// How long Open lasts before a trial call is admitted.
    pub cool_down: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            failure_window: Duration::from_secs(120),
            cool_down: Duration::from_secs(60),
        }
    }
}

/// Decision returned by [`CircuitBreaker::acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPermit {
    /// Breaker is Closed; call normally.
    Allowed,
    /// Breaker moved to HalfOpen and this caller holds the single trial slot.
    Trial,
    /// Breaker is Open (or a trial is already in flight); do not call.
    Rejected,
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
    open_until: Option<Instant>,
    trial_in_flight: bool,
    total_requests: u64,
    successful_requests: u64,
    rate_limited_requests: u64,
    last_success: Option<UtcDateTime>,
    last_failure: Option<UtcDateTime>,
    last_rate_limited: Option<UtcDateTime>,
}

impl BreakerInner {
    fn new() -> Self {
        Self {
            state: BreakerState::Closed,
            consecutive_failures: 0,
            last_failure_at: None,
            open_until: None,
            trial_in_flight: false,
            total_requests: 0,
            successful_requests: 0,
            rate_limited_requests: 0,
            last_success: None,
            last_failure: None,
            last_rate_limited: None,
        }
    }
}

/// Read-only breaker snapshot for telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerSnapshot {
    pub state: BreakerState,
    pub consecutive_failures: u32,
    pub total_requests: u64,
    pub successful_requests: u64,
    /// Failures that were throttling, not outage.
    pub rate_limited_requests: u64,
    pub last_success: Option<UtcDateTime>,
    pub last_failure: Option<UtcDateTime>,
    pub last_rate_limited: Option<UtcDateTime>,
}

/// Thread-safe per-provider health gate.
pub struct CircuitBreaker {
    config: BreakerConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            inner: Mutex::new(BreakerInner::new()),
        }
    }

    /// Gate a call. At most one caller receives [`CallPermit::Trial`] per
    /// HalfOpen episode; concurrent callers during the trial are rejected
    /// as if the breaker were still Open.
    pub fn acquire(&self) -> CallPermit {
        let now = self.clock.now();
        let mut inner = self.lock();

        match inner.state {
            BreakerState::Closed => CallPermit::Allowed,
            BreakerState::HalfOpen => CallPermit::Rejected,
            BreakerState::Open => {
                let cooled = inner.open_until.is_some_and(|until| now >= until);
                if cooled {
                    inner.state = BreakerState::HalfOpen;
                    inner.trial_in_flight = true;
                    inner.open_until = None;
                    CallPermit::Trial
                } else {
                    CallPermit::Rejected
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        let was_open = inner.state != BreakerState::Closed;

        inner.state = BreakerState::Closed;
        inner.consecutive_failures = 0;
        inner.last_failure_at = None;
        inner.open_until = None;
        inner.trial_in_flight = false;
        inner.total_requests += 1;
        inner.successful_requests += 1;
        inner.last_success = Some(UtcDateTime::now());

        if was_open {
            tracing::info!(state = "closed", "circuit breaker recovered");
        }
    }

    /// Record a health-eroding failure. `min_open` extends the Open period
    /// beyond the default cool-down.
    pub fn record_failure(&self, min_open: Option<Duration>) {
        self.record_failure_kind(min_open, false);
    }

    /// Record a rate-limit response. Erodes health like any failure but is
    /// counted separately so operators can tell throttling from outage;
    /// `retry_after` floors the Open period when the breaker trips.
    pub fn record_rate_limited(&self, retry_after: Option<Duration>) {
        self.record_failure_kind(retry_after, true);
    }

    fn record_failure_kind(&self, min_open: Option<Duration>, rate_limited: bool) {
        let now = self.clock.now();
        let mut inner = self.lock();

        inner.total_requests += 1;
        inner.last_failure = Some(UtcDateTime::now());
        if rate_limited {
            inner.rate_limited_requests += 1;
            inner.last_rate_limited = Some(UtcDateTime::now());
        }

        // Failures outside the rolling window restart the streak.
        let within_window = inner
            .last_failure_at
            .is_some_and(|at| now.duration_since(at) <= self.config.failure_window);
        inner.consecutive_failures = if within_window {
            inner.consecutive_failures.saturating_add(1)
        } else {
            1
        };
        inner.last_failure_at = Some(now);

        let failed_trial = inner.state == BreakerState::HalfOpen;
        let tripped = inner.consecutive_failures >= self.config.failure_threshold;

        if failed_trial || tripped {
            let hold = self.config.cool_down.max(min_open.unwrap_or(Duration::ZERO));
            inner.state = BreakerState::Open;
            inner.open_until = Some(now + hold);
            inner.trial_in_flight = false;
            tracing::warn!(
                state = "open",
                consecutive_failures = inner.consecutive_failures,
                hold_secs = hold.as_secs(),
                "circuit breaker opened"
            );
        }
    }

    /// Release a trial slot without recording any health signal
    /// (caller-cancelled attempts).
    pub fn abandon_trial(&self) {
        let mut inner = self.lock();
        if inner.state == BreakerState::HalfOpen && inner.trial_in_flight {
            let now = self.clock.now();
            inner.state = BreakerState::Open;
            inner.open_until = Some(now + self.config.cool_down);
            inner.trial_in_flight = false;
        }
    }

    /// Forget all accumulated health state (operator reset).
    pub fn reset(&self) {
        let mut inner = self.lock();
        *inner = BreakerInner::new();
    }

    pub fn state(&self) -> BreakerState {
        self.lock().state
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        BreakerSnapshot {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            total_requests: inner.total_requests,
            successful_requests: inner.successful_requests,
            rate_limited_requests: inner.rate_limited_requests,
            last_success: inner.last_success,
            last_failure: inner.last_failure,
            last_rate_limited: inner.last_rate_limited,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerInner> {
        self.inner
            .lock()
            .expect("circuit breaker lock is not poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn breaker(threshold: u32, cool_down: Duration) -> (CircuitBreaker, ManualClock) {
        let clock = ManualClock::new();
        let breaker = CircuitBreaker::new(
            BreakerConfig {
                failure_threshold: threshold,
                failure_window: Duration::from_secs(600),
                cool_down,
            },
            Arc::new(clock.clone()),
        );
        (breaker, clock)
    }

    #[test]
    fn opens_after_threshold_consecutive_failures() {
        let (breaker, _clock) = breaker(3, Duration::from_secs(60));

        breaker.record_failure(None);
        breaker.record_failure(None);
        assert_eq!(breaker.state(), BreakerState::Closed);

        breaker.record_failure(None);
        assert_eq!(breaker.state(), BreakerState::Open);
        assert_eq!(breaker.acquire(), CallPermit::Rejected);
    }

    #[test]
    fn success_while_closed_resets_the_streak() {
        let (breaker, _clock) = breaker(3, Duration::from_secs(60));

        breaker.record_failure(None);
        breaker.record_failure(None);
        breaker.record_success();
        breaker.record_failure(None);
        breaker.record_failure(None);

        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn stays_open_for_the_full_cool_down_regardless_of_call_volume() {
        let (breaker, clock) = breaker(1, Duration::from_secs(60));
        breaker.record_failure(None);

        for _ in 0..50 {
            assert_eq!(breaker.acquire(), CallPermit::Rejected);
        }

        clock.advance(Duration::from_secs(59));
        assert_eq!(breaker.acquire(), CallPermit::Rejected);

        clock.advance(Duration::from_secs(1));
        assert_eq!(breaker.acquire(), CallPermit::Trial);
    }

    #[test]
    fn half_open_admits_exactly_one_trial() {
        let (breaker, clock) = breaker(1, Duration::from_secs(30));
        breaker.record_failure(None);
        clock.advance(Duration::from_secs(30));

        assert_eq!(breaker.acquire(), CallPermit::Trial);
        assert_eq!(breaker.acquire(), CallPermit::Rejected);

        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert_eq!(breaker.acquire(), CallPermit::Allowed);
    }

    #[test]
    fn failed_trial_reopens_and_restarts_the_timer() {
        let (breaker, clock) = breaker(1, Duration::from_secs(30));
        breaker.record_failure(None);
        clock.advance(Duration::from_secs(30));
        assert_eq!(breaker.acquire(), CallPermit::Trial);

        breaker.record_failure(None);
        assert_eq!(breaker.state(), BreakerState::Open);

        clock.advance(Duration::from_secs(29));
        assert_eq!(breaker.acquire(), CallPermit::Rejected);
        clock.advance(Duration::from_secs(1));
        assert_eq!(breaker.acquire(), CallPermit::Trial);
    }

    #[test]
    fn rate_limit_hint_extends_the_open_period() {
        let (breaker, clock) = breaker(1, Duration::from_secs(30));
        breaker.record_rate_limited(Some(Duration::from_secs(120)));

        clock.advance(Duration::from_secs(60));
        assert_eq!(breaker.acquire(), CallPermit::Rejected);

        clock.advance(Duration::from_secs(60));
        assert_eq!(breaker.acquire(), CallPermit::Trial);
    }

    #[test]
    fn throttling_is_counted_apart_from_outage() {
        let (breaker, _clock) = breaker(5, Duration::from_secs(60));

        breaker.record_failure(None);
        breaker.record_rate_limited(Some(Duration::from_secs(30)));

        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.total_requests, 2);
        assert_eq!(snapshot.rate_limited_requests, 1);
        assert_eq!(snapshot.consecutive_failures, 2);
        assert!(snapshot.last_rate_limited.is_some());
        assert!(snapshot.last_failure.is_some());
    }

    #[test]
    fn failures_outside_the_window_do_not_accumulate() {
        let clock = ManualClock::new();
        let breaker = CircuitBreaker::new(
            BreakerConfig {
                failure_threshold: 2,
                failure_window: Duration::from_secs(10),
                cool_down: Duration::from_secs(30),
            },
            Arc::new(clock.clone()),
        );

        breaker.record_failure(None);
        clock.advance(Duration::from_secs(11));
        breaker.record_failure(None);

        assert_eq!(breaker.state(), BreakerState::Closed);
        assert_eq!(breaker.snapshot().consecutive_failures, 1);
    }

    #[test]
    fn abandoned_trial_leaves_no_health_signal() {
        let (breaker, clock) = breaker(1, Duration::from_secs(30));
        breaker.record_failure(None);
        let before = breaker.snapshot();

        clock.advance(Duration::from_secs(30));
        assert_eq!(breaker.acquire(), CallPermit::Trial);
        breaker.abandon_trial();

        let after = breaker.snapshot();
        assert_eq!(after.total_requests, before.total_requests);
        assert_eq!(after.state, BreakerState::Open);
    }
}
