use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

#[derive(Clone)]
enum Gate {
    Unlimited,
    /// A zero hint: the provider has no budget at all.
    Blocked,
    Limited(Arc<DirectRateLimiter>),
}

/// Per-client request gate derived from a provider's `rate_limit_hint`
/// (requests per minute).
///
/// The gate only answers yes/no; it never sleeps. When budget is missing the
/// adapter fails fast with a rate-limit error and leaves backoff to callers.
#[derive(Clone)]
pub struct RateGate {
    gate: Gate,
}

impl RateGate {
    pub fn unlimited() -> Self {
        Self {
            gate: Gate::Unlimited,
        }
    }

    pub fn per_minute(requests: u32) -> Self {
        let gate = match NonZeroU32::new(requests) {
            None => Gate::Blocked,
            Some(requests) => Gate::Limited(Arc::new(RateLimiter::direct(
                Quota::per_minute(requests),
            ))),
        };
        Self { gate }
    }

    pub fn from_hint(hint: Option<u32>) -> Self {
        match hint {
            None => Self::unlimited(),
            Some(requests) => Self::per_minute(requests),
        }
    }

    /// Consumes one unit of budget if available.
    pub fn try_acquire(&self) -> bool {
        match &self.gate {
            Gate::Unlimited => true,
            Gate::Blocked => false,
            Gate::Limited(limiter) => limiter.check().is_ok(),
        }
    }
}

impl std::fmt::Debug for RateGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self.gate {
            Gate::Unlimited => "unlimited",
            Gate::Blocked => "blocked",
            Gate::Limited(_) => "limited",
        };
        f.debug_struct("RateGate").field("gate", &label).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_gate_never_blocks() {
        let gate = RateGate::unlimited();
        for _ in 0..1_000 {
            assert!(gate.try_acquire());
        }
    }

    #[test]
    fn zero_hint_blocks_every_request() {
        let gate = RateGate::per_minute(0);
        assert!(!gate.try_acquire());
    }

    #[test]
    fn budget_runs_out_within_the_window() {
        let gate = RateGate::per_minute(2);
        assert!(gate.try_acquire());
        assert!(gate.try_acquire());
        assert!(!gate.try_acquire());
    }

    #[test]
    fn missing_hint_means_unlimited() {
        let gate = RateGate::from_hint(None);
        assert!(gate.try_acquire());
    }
}
