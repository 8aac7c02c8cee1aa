//! Per-client token buckets.
//!
//! # Design
//! - Tokens are fixed-point (`TOKEN_SCALE` micro-tokens per token) so refill is
//!   exact integer arithmetic on elapsed microseconds.
//! - The bucket map sits behind a read-preferring lock; each bucket has its own
//!   mutex so one client never waits on another. Creation goes through the write
//!   lock's entry API, so a race on a new key still leaves one bucket.
//! - Idle buckets are evicted on a timer. An evicted client starts over with a
//!   full bucket.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;
use viddl_core::ClientKey;
use viddl_telemetry::Metrics;

use super::lock;

const TOKEN_SCALE: u128 = 1_000_000;

/// Bucket shape shared by every client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateSettings {
    /// Capacity, and the token count of a new bucket.
    pub burst: u32,
    /// Time to earn back one token.
    pub refill_interval: Duration,
    /// Inactivity after which a bucket is evicted.
    pub idle_ttl: Duration,
}

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    /// Whether a token was consumed.
    pub allowed: bool,
    /// Bucket capacity.
    pub limit: u32,
    /// Whole tokens left after this check.
    pub remaining: u32,
    /// Wait until the next token; zero when allowed.
    pub retry_after: Duration,
}

#[derive(Debug)]
struct RateBucket {
    tokens: u128,
    last_refill: Instant,
    last_seen: Instant,
}

impl RateBucket {
    fn full(settings: &RateSettings, now: Instant) -> Self {
        Self {
            tokens: capacity(settings),
            last_refill: now,
            last_seen: now,
        }
    }

    fn refill(&mut self, settings: &RateSettings, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        if elapsed.is_zero() {
            return;
        }
        let capacity = capacity(settings);
        let interval_micros = settings.refill_interval.as_micros();
        if interval_micros == 0 {
            self.tokens = capacity;
            self.last_refill = now;
            return;
        }
        let earned = TOKEN_SCALE.saturating_mul(elapsed.as_micros()) / interval_micros;
        if earned > 0 {
            self.tokens = self.tokens.saturating_add(earned).min(capacity);
            self.last_refill = now;
        }
    }

    fn retry_delay(&self, settings: &RateSettings) -> Duration {
        let deficit = TOKEN_SCALE.saturating_sub(self.tokens);
        let micros = deficit
            .saturating_mul(settings.refill_interval.as_micros())
            .div_ceil(TOKEN_SCALE);
        Duration::from_micros(u64::try_from(micros).unwrap_or(u64::MAX))
    }
}

fn capacity(settings: &RateSettings) -> u128 {
    u128::from(settings.burst) * TOKEN_SCALE
}

/// Token-bucket limiter keyed by [`ClientKey`].
pub struct RateAdmission {
    settings: RateSettings,
    buckets: RwLock<HashMap<ClientKey, Arc<Mutex<RateBucket>>>>,
    telemetry: Metrics,
}

impl RateAdmission {
    /// Empty limiter.
    #[must_use]
    pub fn new(settings: RateSettings, telemetry: Metrics) -> Self {
        Self {
            settings,
            buckets: RwLock::new(HashMap::new()),
            telemetry,
        }
    }

    /// Bucket shape in force.
    #[must_use]
    pub const fn settings(&self) -> RateSettings {
        self.settings
    }

    /// Consume a token for `key` if one is available.
    #[must_use]
    pub fn allow(&self, key: &ClientKey) -> bool {
        self.evaluate(key, Instant::now()).allowed
    }

    /// [`RateAdmission::allow`] against an explicit clock, reporting header values.
    #[must_use]
    pub fn evaluate(&self, key: &ClientKey, now: Instant) -> RateDecision {
        let bucket = self.bucket(key, now);
        let mut bucket = lock(&bucket);
        bucket.last_seen = now;
        bucket.refill(&self.settings, now);

        if bucket.tokens >= TOKEN_SCALE {
            bucket.tokens -= TOKEN_SCALE;
            RateDecision {
                allowed: true,
                limit: self.settings.burst,
                remaining: u32::try_from(bucket.tokens / TOKEN_SCALE).unwrap_or(u32::MAX),
                retry_after: Duration::ZERO,
            }
        } else {
            RateDecision {
                allowed: false,
                limit: self.settings.burst,
                remaining: 0,
                retry_after: bucket.retry_delay(&self.settings),
            }
        }
    }

    fn bucket(&self, key: &ClientKey, now: Instant) -> Arc<Mutex<RateBucket>> {
        if let Some(bucket) = self
            .buckets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
        {
            return Arc::clone(bucket);
        }

        let mut buckets = self
            .buckets
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let bucket = Arc::clone(
            buckets
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(RateBucket::full(&self.settings, now)))),
        );
        self.telemetry.set_rate_buckets(buckets.len());
        bucket
    }

    /// Drop buckets idle for longer than the configured TTL; returns how many went.
    pub fn evict_idle(&self, now: Instant) -> usize {
        let mut buckets = self
            .buckets
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = buckets.len();
        let ttl = self.settings.idle_ttl;
        buckets.retain(|_, bucket| now.saturating_duration_since(lock(bucket).last_seen) < ttl);
        let evicted = before - buckets.len();
        self.telemetry.set_rate_buckets(buckets.len());
        drop(buckets);
        if evicted > 0 {
            debug!(evicted, "evicted idle rate buckets");
        }
        evicted
    }

    /// Number of tracked clients.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.buckets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Run [`RateAdmission::evict_idle`] every `interval` for the life of the runtime.
    pub fn spawn_evictor(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                limiter.evict_idle(Instant::now());
            }
        })
    }
}
