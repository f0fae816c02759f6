//! Per-user requests-per-minute gate.
//!
//! Each user gets a token bucket holding up to `rpm` tokens that refills at
//! `rpm / 60` tokens per second.

use dashmap::DashMap;
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

const WINDOW: Duration = Duration::from_secs(60);

/// Rate limit metadata for response headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitInfo {
    pub limit: u32,
    pub remaining: u32,
    /// Seconds until the bucket is full again
    pub reset_after_secs: u64,
}

impl RateLimitInfo {
    /// Standard `X-RateLimit-*` header pairs.
    pub fn headers(&self) -> [(&'static str, String); 3] {
        [
            ("X-RateLimit-Limit", self.limit.to_string()),
            ("X-RateLimit-Remaining", self.remaining.to_string()),
            ("X-RateLimit-Reset", self.reset_after_secs.to_string()),
        ]
    }
}

#[derive(Debug)]
struct TokenBucket {
    capacity: u32,
    tokens: f64,
    last_refill: Instant,
    last_used: Instant,
}

impl TokenBucket {
    fn new(capacity: u32, now: Instant) -> Self {
        Self { capacity, tokens: f64::from(capacity), last_refill: now, last_used: now }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        let capacity = f64::from(self.capacity);
        self.tokens = (self.tokens + elapsed * capacity / WINDOW.as_secs_f64()).min(capacity);
        self.last_refill = now;
    }

    /// Capacity follows the user's current limit without granting a burst.
    fn resize(&mut self, capacity: u32) {
        if capacity != self.capacity {
            self.capacity = capacity;
            self.tokens = self.tokens.min(f64::from(capacity));
        }
    }

    fn info(&self) -> RateLimitInfo {
        let capacity = f64::from(self.capacity);
        let missing = capacity - self.tokens;
        let reset_after_secs = if missing <= 0.0 || self.capacity == 0 {
            0
        } else {
            (missing * WINDOW.as_secs_f64() / capacity).ceil() as u64
        };
        RateLimitInfo {
            limit: self.capacity,
            remaining: self.tokens.floor().max(0.0) as u32,
            reset_after_secs,
        }
    }
}

/// Token buckets keyed by user id.
#[derive(Debug, Default)]
pub struct RpmLimiter {
    buckets: DashMap<String, TokenBucket>,
}

impl RpmLimiter {
    pub fn new() -> Self {
        Self { buckets: DashMap::new() }
    }

    /// Take one token for `uid` under a limit of `rpm` requests per minute.
    ///
    /// `Err` carries the metadata of the refused request.
    pub fn try_acquire(&self, uid: &str, rpm: u32) -> Result<RateLimitInfo, RateLimitInfo> {
        let now = Instant::now();
        let mut bucket =
            self.buckets.entry(uid.to_string()).or_insert_with(|| TokenBucket::new(rpm, now));
        bucket.resize(rpm);
        bucket.refill(now);
        bucket.last_used = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            Ok(bucket.info())
        } else {
            let mut info = bucket.info();
            info.remaining = 0;
            info.reset_after_secs = info.reset_after_secs.max(1);
            Err(info)
        }
    }

    /// Drop buckets that are full again and unused for a whole window.
    pub fn prune_idle(&self) {
        let now = Instant::now();
        self.buckets.retain(|_, bucket| {
            bucket.refill(now);
            bucket.tokens < f64::from(bucket.capacity)
                || now.saturating_duration_since(bucket.last_used) < WINDOW
        });
    }

    pub fn tracked_users(&self) -> usize {
        self.buckets.len()
    }
}
