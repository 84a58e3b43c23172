//! Rate Limiting Infrastructure
//!
//! Common rate limiting abstractions. The counting algorithms live in
//! the store implementation; callers pick a strategy per key.

use std::time::Duration;

/// Counting algorithm for a rate limit window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitStrategy {
    /// Per-key log of request timestamps; the window slides with "now".
    /// Exact, at the cost of one row per recorded request.
    SlidingWindow,
    /// Single counter per `floor(now / window)` bucket. Cheaper, but up
    /// to 2x the limit can pass across a bucket boundary.
    FixedWindow,
}

impl RateLimitStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SlidingWindow => "sliding_window",
            Self::FixedWindow => "fixed_window",
        }
    }
}

/// Rate limit configuration for one key class
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests allowed in the window
    pub max_requests: u32,
    /// Time window duration
    pub window: Duration,
    /// Counting algorithm
    pub strategy: RateLimitStrategy,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 60,
            window: Duration::from_secs(60),
            strategy: RateLimitStrategy::FixedWindow,
        }
    }
}

impl RateLimitConfig {
    pub fn new(max_requests: u32, window_secs: u64, strategy: RateLimitStrategy) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(window_secs),
            strategy,
        }
    }

    pub fn sliding(max_requests: u32, window_secs: u64) -> Self {
        Self::new(max_requests, window_secs, RateLimitStrategy::SlidingWindow)
    }

    pub fn fixed(max_requests: u32, window_secs: u64) -> Self {
        Self::new(max_requests, window_secs, RateLimitStrategy::FixedWindow)
    }

    pub fn window_ms(&self) -> i64 {
        self.window.as_millis() as i64
    }
}

/// Rate limit check result
///
/// `reset_at_ms` is when capacity next frees up: the end of the current
/// bucket (fixed) or when the oldest counted request leaves the window
/// (sliding). Populated on allowed results too, so clients can
/// self-throttle.
#[derive(Debug, Clone)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at_ms: i64,
}

impl RateLimitResult {
    /// Seconds until capacity frees up, measured from `now_ms`.
    /// Zero when the request was allowed.
    pub fn retry_after_secs(&self, now_ms: i64) -> u64 {
        if self.allowed {
            return 0;
        }
        let delta_ms = (self.reset_at_ms - now_ms).max(0);
        // Round up so "retry after" never undershoots
        (delta_ms as u64).div_ceil(1000)
    }
}

/// Trait for rate limit storage backends
///
/// The whole trim/count/record sequence must execute atomically in the
/// store; a rejected request must not be recorded.
#[trait_variant::make(RateLimitStore: Send)]
pub trait LocalRateLimitStore {
    /// Check the limit for `key` and record the request if allowed
    async fn check_and_record(
        &self,
        key: &str,
        config: &RateLimitConfig,
    ) -> Result<RateLimitResult, Box<dyn std::error::Error + Send + Sync>>;
}
