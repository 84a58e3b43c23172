//! Rate Limit Gate
//!
//! Per-route rate limiting over a shared counter store. Strategy,
//! limits, and key derivation are configured per route with a global
//! fallback. The gate never blocks on a broken store: errors and
//! timeouts fail open, because availability beats strictness on this
//! path.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use platform::rate_limit::{RateLimitConfig, RateLimitResult, RateLimitStore};

/// How the caller key is derived for a route
///
/// The routing shell picks the concrete key accordingly: client IP
/// (first forwarded-for hop, else direct peer) for anonymous routes, a
/// per-account key for authenticated ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    ClientIp,
    Account,
}

/// Limit configuration for one route
#[derive(Debug, Clone)]
pub struct RouteLimit {
    pub config: RateLimitConfig,
    pub key_source: KeySource,
    /// Caller keys never limited on this route (e.g. health probes,
    /// internal addresses)
    pub exempt_keys: Vec<String>,
}

impl RouteLimit {
    pub fn new(config: RateLimitConfig, key_source: KeySource) -> Self {
        Self {
            config,
            key_source,
            exempt_keys: Vec::new(),
        }
    }

    pub fn with_exempt_keys(mut self, keys: Vec<String>) -> Self {
        self.exempt_keys = keys;
        self
    }
}

/// Per-route limit table with a global default
#[derive(Debug, Clone)]
pub struct RouteLimits {
    routes: HashMap<String, RouteLimit>,
    default: RouteLimit,
}

impl Default for RouteLimits {
    fn default() -> Self {
        Self {
            routes: HashMap::new(),
            default: RouteLimit::new(RateLimitConfig::fixed(60, 60), KeySource::ClientIp),
        }
    }
}

impl RouteLimits {
    pub fn new(default: RouteLimit) -> Self {
        Self {
            routes: HashMap::new(),
            default,
        }
    }

    /// Register a route-specific limit
    pub fn with_route(mut self, route: impl Into<String>, limit: RouteLimit) -> Self {
        self.routes.insert(route.into(), limit);
        self
    }

    /// Look up the limit for a route, falling back to the default
    pub fn get(&self, route: &str) -> &RouteLimit {
        self.routes.get(route).unwrap_or(&self.default)
    }

    /// Preset for the credential endpoints: sliding windows, strict on
    /// the brute-forceable routes, looser on refresh
    pub fn auth_defaults() -> Self {
        Self::default()
            .with_route(
                "auth/register",
                RouteLimit::new(RateLimitConfig::sliding(5, 60), KeySource::ClientIp),
            )
            .with_route(
                "auth/login",
                RouteLimit::new(RateLimitConfig::sliding(10, 60), KeySource::ClientIp),
            )
            .with_route(
                "auth/refresh",
                RouteLimit::new(RateLimitConfig::sliding(30, 60), KeySource::ClientIp),
            )
            .with_route(
                "auth/password",
                RouteLimit::new(RateLimitConfig::sliding(5, 60), KeySource::Account),
            )
    }
}

/// Outcome of a rate limit check
///
/// The metadata fields are populated on allowed responses too, so
/// clients can self-throttle before hitting the limit.
#[derive(Debug, Clone)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at_ms: i64,
    pub retry_after_secs: u64,
}

impl RateLimitDecision {
    fn from_result(result: RateLimitResult, now_ms: i64) -> Self {
        Self {
            allowed: result.allowed,
            limit: result.limit,
            remaining: result.remaining,
            reset_at_ms: result.reset_at_ms,
            retry_after_secs: result.retry_after_secs(now_ms),
        }
    }

    /// Decision used for exempt callers and for store failures
    fn open(config: &RateLimitConfig, now_ms: i64) -> Self {
        Self {
            allowed: true,
            limit: config.max_requests,
            remaining: config.max_requests,
            reset_at_ms: now_ms + config.window_ms(),
            retry_after_secs: 0,
        }
    }
}

/// Rate limit gate over a shared counter store
pub struct RateLimiter<S>
where
    S: RateLimitStore,
{
    store: Arc<S>,
    limits: RouteLimits,
    /// Budget for one store round-trip; timeouts fail open
    store_timeout: Duration,
}

impl<S> RateLimiter<S>
where
    S: RateLimitStore,
{
    pub fn new(store: Arc<S>, limits: RouteLimits) -> Self {
        Self {
            store,
            limits,
            store_timeout: Duration::from_secs(1),
        }
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Key derivation configured for a route (for the routing shell)
    pub fn key_source(&self, route: &str) -> KeySource {
        self.limits.get(route).key_source
    }

    /// Check the limit for (route, caller) and record the request if
    /// allowed
    ///
    /// Infallible by design: store faults are logged and the request is
    /// let through.
    pub async fn check(&self, route: &str, caller_key: &str) -> RateLimitDecision {
        let route_limit = self.limits.get(route);
        let now_ms = Utc::now().timestamp_millis();

        if route_limit.exempt_keys.iter().any(|k| k == caller_key) {
            return RateLimitDecision::open(&route_limit.config, now_ms);
        }

        // Counter key is (route, caller); one caller's buckets are
        // independent across routes
        let key = format!("{route}:{caller_key}");

        let outcome = tokio::time::timeout(
            self.store_timeout,
            self.store.check_and_record(&key, &route_limit.config),
        )
        .await;

        match outcome {
            Ok(Ok(result)) => {
                let decision = RateLimitDecision::from_result(result, now_ms);
                if !decision.allowed {
                    tracing::warn!(
                        route = route,
                        caller = caller_key,
                        retry_after_secs = decision.retry_after_secs,
                        "Rate limit exceeded"
                    );
                }
                decision
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    error = %e,
                    route = route,
                    "Rate limit store error; failing open"
                );
                RateLimitDecision::open(&route_limit.config, now_ms)
            }
            Err(_) => {
                tracing::warn!(route = route, "Rate limit store timeout; failing open");
                RateLimitDecision::open(&route_limit.config, now_ms)
            }
        }
    }
}
