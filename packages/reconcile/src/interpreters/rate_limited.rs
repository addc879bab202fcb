//! Fixed-delay pacing for outbound interpretation calls.
//!
//! One pacer is shared by every external call a run makes, using the
//! governor crate. No adaptive backoff.

use governor::{Quota, RateLimiter};
use std::sync::Arc;
use std::time::Duration;

type DefaultRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Allows one call per period.
///
/// Callers await [`CallPacer::ready`] before starting a call and start any
/// per-call timeout only afterwards, so time spent waiting for a permit is
/// never charged to the call.
#[derive(Clone, Default)]
pub struct CallPacer {
    limiter: Option<Arc<DefaultRateLimiter>>,
}

impl CallPacer {
    /// Allow one call per `delay`. A zero delay disables pacing.
    pub fn new(delay: Duration) -> Self {
        let limiter = Quota::with_period(delay).map(|quota| Arc::new(RateLimiter::direct(quota)));
        Self { limiter }
    }

    /// Create with a custom quota.
    pub fn with_quota(quota: Quota) -> Self {
        Self {
            limiter: Some(Arc::new(RateLimiter::direct(quota))),
        }
    }

    /// A pacer that never waits.
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn is_limited(&self) -> bool {
        self.limiter.is_some()
    }

    /// Wait until the next call may start.
    pub async fn ready(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}

impl std::fmt::Debug for CallPacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallPacer")
            .field("limited", &self.is_limited())
            .finish()
    }
}
