//! Request spacing for the public services the pipeline calls.
//!
//! Each service gets a governor limiter for its steady rate. A 429 adds a
//! back-off deadline taken from the response's `Retry-After` header, and
//! every later request waits it out before asking the governor. Nothing is
//! retried here; the caller reports the 429 as an error.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::header::{HeaderMap, RETRY_AFTER};

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Back-off used when a 429 carries no usable `Retry-After`.
const DEFAULT_BACKOFF: Duration = Duration::from_secs(5);
/// Upper bound on any single back-off, whatever the service asks for.
const MAX_BACKOFF: Duration = Duration::from_secs(120);

pub struct ServiceLimiter {
    governor: DirectLimiter,
    backoff_until: ArcSwapOption<Instant>,
}

impl ServiceLimiter {
    /// Limiter allowing `n` requests per second (at least one).
    pub fn per_second(n: u32) -> Self {
        let n = NonZeroU32::new(n).unwrap_or(NonZeroU32::MIN);
        Self {
            governor: DirectLimiter::direct(Quota::per_second(n)),
            backoff_until: ArcSwapOption::empty(),
        }
    }

    /// Wait out any back-off, then for a governor permit.
    pub async fn acquire(&self) {
        let remaining = self.backoff_remaining();
        if !remaining.is_zero() {
            tracing::debug!(wait_ms = remaining.as_millis() as u64, "backing off after 429");
            tokio::time::sleep(remaining).await;
        }
        self.governor.until_ready().await;
    }

    /// Record a 429. The deadline only ever moves later.
    pub fn on_rate_limited(&self, retry_after: Option<Duration>) {
        let wait = retry_after.unwrap_or(DEFAULT_BACKOFF).min(MAX_BACKOFF);
        let until = Instant::now() + wait;
        let extends = self
            .backoff_until
            .load()
            .as_deref()
            .is_none_or(|current| *current < until);
        if extends {
            self.backoff_until.store(Some(Arc::new(until)));
        }
    }

    /// Time left before requests may go out again.
    pub fn backoff_remaining(&self) -> Duration {
        self.backoff_until
            .load()
            .as_deref()
            .map(|until| until.saturating_duration_since(Instant::now()))
            .unwrap_or_default()
    }
}

/// Limiters for the public services the pipeline talks to.
pub struct RateLimiters {
    pub crossref: ServiceLimiter,
    pub speech: ServiceLimiter,
}

impl Default for RateLimiters {
    fn default() -> Self {
        Self::new(false)
    }
}

impl RateLimiters {
    /// CrossRef allows a faster rate to clients identifying themselves with a mailto.
    pub fn new(has_crossref_mailto: bool) -> Self {
        let crossref_rate = if has_crossref_mailto { 3 } else { 1 };
        Self {
            crossref: ServiceLimiter::per_second(crossref_rate),
            speech: ServiceLimiter::per_second(5),
        }
    }
}

pub fn is_rate_limited(resp: &reqwest::Response) -> bool {
    resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS
}

/// `Retry-After` as delta-seconds. HTTP-date values are not interpreted.
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(retry: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(RETRY_AFTER, HeaderValue::from_str(retry).unwrap());
        h
    }

    #[test]
    fn retry_after_reads_seconds() {
        assert_eq!(retry_after(&headers(" 7 ")), Some(Duration::from_secs(7)));
        assert_eq!(retry_after(&headers("Wed, 21 Oct 2026 07:28:00 GMT")), None);
        assert_eq!(retry_after(&HeaderMap::new()), None);
    }

    #[test]
    fn fresh_limiter_has_no_backoff() {
        let limiter = ServiceLimiter::per_second(0);
        assert_eq!(limiter.backoff_remaining(), Duration::ZERO);
    }

    #[test]
    fn backoff_follows_retry_after_and_is_capped() {
        let limiter = ServiceLimiter::per_second(10);
        limiter.on_rate_limited(Some(Duration::from_secs(30)));
        let remaining = limiter.backoff_remaining();
        assert!(remaining > Duration::from_secs(25) && remaining <= Duration::from_secs(30));

        limiter.on_rate_limited(Some(Duration::from_secs(3600)));
        assert!(limiter.backoff_remaining() <= MAX_BACKOFF);
        assert!(limiter.backoff_remaining() > Duration::from_secs(60));
    }

    #[test]
    fn shorter_backoff_does_not_shorten_deadline() {
        let limiter = ServiceLimiter::per_second(10);
        limiter.on_rate_limited(Some(Duration::from_secs(60)));
        limiter.on_rate_limited(Some(Duration::from_secs(1)));
        assert!(limiter.backoff_remaining() > Duration::from_secs(50));
    }

    #[test]
    fn missing_header_uses_default_backoff() {
        let limiter = ServiceLimiter::per_second(10);
        limiter.on_rate_limited(None);
        let remaining = limiter.backoff_remaining();
        assert!(remaining > Duration::ZERO && remaining <= DEFAULT_BACKOFF);
    }

    #[tokio::test]
    async fn acquire_allows_first_request_immediately() {
        let limiter = ServiceLimiter::per_second(1);
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn acquire_waits_out_backoff() {
        let limiter = ServiceLimiter::per_second(10);
        limiter.on_rate_limited(Some(Duration::from_secs(1)));
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(900));
    }
}
