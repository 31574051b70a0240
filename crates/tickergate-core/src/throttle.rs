//! Local per-provider rate budgets.
//!
//! Free-tier upstreams enforce hard request quotas; spending the budget on
//! requests that will be refused wastes it. Each adapter carries a
//! [`RateGate`] sized to its provider's quota and converts an exhausted
//! budget into the rate-limit failure (with a retry-after hint) before any
//! network call happens.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Quota configuration for one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatePolicy {
    pub window: Duration,
    pub max_requests: u32,
}

impl RatePolicy {
    pub const fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
        }
    }
}

/// In-process rate gate backed by governor's GCRA limiter.
#[derive(Clone)]
pub struct RateGate {
    limiter: Arc<DirectRateLimiter>,
    retry_hint: Duration,
}

impl RateGate {
    pub fn new(policy: RatePolicy) -> Self {
        let limit = policy.max_requests.max(1);
        let burst = NonZeroU32::new(limit).expect("limit is clamped to at least one");

        let seconds_per_cell = (policy.window.as_secs_f64() / f64::from(limit)).max(0.001);
        let period = Duration::from_secs_f64(seconds_per_cell);
        let quota = Quota::with_period(period)
            .expect("period is always greater than zero")
            .allow_burst(burst);

        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
            retry_hint: period,
        }
    }

    /// Claim one request slot. On an empty budget returns the suggested
    /// wait before the next slot frees up.
    pub fn acquire(&self) -> Result<(), Duration> {
        if self.limiter.check().is_ok() {
            Ok(())
        } else {
            Err(self.retry_hint)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_once_budget_is_spent() {
        let gate = RateGate::new(RatePolicy::new(Duration::from_secs(60), 2));

        assert!(gate.acquire().is_ok());
        assert!(gate.acquire().is_ok());

        let hint = gate.acquire().expect_err("third request must be refused");
        assert!(hint > Duration::ZERO);
    }

    #[test]
    fn zero_request_policy_is_clamped_to_one() {
        let gate = RateGate::new(RatePolicy::new(Duration::from_secs(1), 0));
        assert!(gate.acquire().is_ok());
    }
}
