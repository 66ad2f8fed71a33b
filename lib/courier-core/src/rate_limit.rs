//! Token-bucket rate limiting keyed by route identity.
//!
//! A bucket holds `max_calls` tokens and refills completely once `interval`
//! has elapsed since the last refill. Callers never get rejected: they take a
//! token or learn how long to wait, then try again. Blocking callers sleep the
//! thread with [`TokenBucket::acquire_blocking`]; async callers sleep their
//! task and retry [`TokenBucket::try_acquire_at`].
//!
//! Buckets live in a process-wide registry keyed by [`RouteKey`], so every
//! client instance built from one declared route shares a single bucket.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::{ConfigError, RouteKey};

/// Rate limit of a route: at most `max_calls` per `interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RateLimit {
    max_calls: u32,
    interval: Duration,
}

impl RateLimit {
    /// Create a rate limit. Both values must be non-zero.
    pub fn new(max_calls: u32, interval: Duration) -> Result<Self, ConfigError> {
        if max_calls == 0 {
            return Err(ConfigError::InvalidRateLimit(
                "max_calls must be at least 1".to_string(),
            ));
        }
        if interval.is_zero() {
            return Err(ConfigError::InvalidRateLimit(
                "interval must be positive".to_string(),
            ));
        }
        Ok(Self {
            max_calls,
            interval,
        })
    }

    /// Create a rate limit with the interval given in seconds.
    pub fn from_secs(max_calls: u32, interval: f64) -> Result<Self, ConfigError> {
        let interval = Duration::try_from_secs_f64(interval).map_err(|err| {
            ConfigError::InvalidRateLimit(format!("interval of {interval} seconds: {err}"))
        })?;
        Self::new(max_calls, interval)
    }

    /// Bucket capacity.
    #[must_use]
    pub const fn max_calls(&self) -> u32 {
        self.max_calls
    }

    /// Refill period.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }
}

#[derive(Debug)]
struct BucketState {
    tokens: u32,
    /// `None` until the first acquisition.
    last_refill: Option<Instant>,
}

/// A token bucket guarded by a mutex.
#[derive(Debug)]
pub struct TokenBucket {
    limit: RateLimit,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// A full bucket. Its refill clock starts on the first acquisition.
    #[must_use]
    pub const fn new(limit: RateLimit) -> Self {
        Self {
            limit,
            state: Mutex::new(BucketState {
                tokens: limit.max_calls,
                last_refill: None,
            }),
        }
    }

    /// The limit this bucket enforces.
    #[must_use]
    pub const fn limit(&self) -> RateLimit {
        self.limit
    }

    fn lock(&self) -> MutexGuard<'_, BucketState> {
        // The state is two plain fields, always left consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take a token at `now`, or return how long until the next refill.
    ///
    /// Refill and consumption happen under one lock, so a token is never
    /// spent twice and a refill never happens twice for one interval.
    pub fn try_acquire_at(&self, now: Instant) -> Result<(), Duration> {
        let mut state = self.lock();
        let last_refill = *state.last_refill.get_or_insert(now);
        let elapsed = now.saturating_duration_since(last_refill);

        if elapsed >= self.limit.interval {
            state.tokens = self.limit.max_calls;
            state.last_refill = Some(now);
        }

        if state.tokens > 0 {
            state.tokens -= 1;
            Ok(())
        } else {
            Err(self.limit.interval.saturating_sub(elapsed))
        }
    }

    /// Take a token now, or return how long until the next refill.
    pub fn try_acquire(&self) -> Result<(), Duration> {
        self.try_acquire_at(Instant::now())
    }

    /// Take a token, sleeping the current thread until one is available.
    pub fn acquire_blocking(&self) {
        loop {
            match self.try_acquire() {
                Ok(()) => return,
                Err(wait) => {
                    debug!(?wait, "rate limited, blocking until refill");
                    std::thread::sleep(wait);
                }
            }
        }
    }

    /// Tokens left in the current interval.
    #[must_use]
    pub fn available(&self) -> u32 {
        self.lock().tokens
    }
}

static BUCKETS: LazyLock<Mutex<HashMap<RouteKey, Arc<TokenBucket>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// The process-wide bucket for `key`, created on first use.
///
/// Buckets are never dropped. The limit of the first caller wins.
pub fn bucket_for(key: &RouteKey, limit: RateLimit) -> Arc<TokenBucket> {
    let mut buckets = BUCKETS.lock().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(
        buckets
            .entry(key.clone())
            .or_insert_with(|| Arc::new(TokenBucket::new(limit))),
    )
}
