//! Client-side request throttling
//!
//! Dynamics applies service protection limits per user. Pacing requests
//! with a token bucket keeps long paged extractions below them.

use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as Governor};
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::trace;

type DirectLimiter = Governor<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// Token bucket shared by every request of one client
#[derive(Clone)]
pub struct RateLimiter {
    limiter: Arc<DirectLimiter>,
    per_second: u32,
}

impl RateLimiter {
    /// Steady rate with a burst of one second's worth of requests
    pub fn per_second(per_second: u32) -> Self {
        Self::with_burst(per_second, per_second)
    }

    /// Zero for either value is treated as one
    pub fn with_burst(per_second: u32, burst: u32) -> Self {
        let rate = NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: Arc::new(Governor::direct(Quota::per_second(rate).allow_burst(burst))),
            per_second: rate.get(),
        }
    }

    pub fn requests_per_second(&self) -> u32 {
        self.per_second
    }

    /// Take a permit, sleeping until one is available
    pub async fn wait(&self) {
        if self.try_acquire() {
            return;
        }
        trace!("Request rate limit reached, waiting");
        self.limiter.until_ready().await;
    }

    /// Take a permit only if one is available now
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("per_second", &self.per_second)
            .finish()
    }
}
