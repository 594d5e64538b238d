//! Client-side rate limiting and retry scheduling.
//!
//! InSales reports how much of the per-account request budget has been used in
//! an `API-Usage-Limit: <current>/<limit>` response header. [`Throttle`] maps
//! that usage to an extra delay before the next request, and [`ThrottleState`]
//! keeps the shared "do not send before" instant that every request of an
//! account waits on.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Upper bound for any single computed delay.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(60);

/// Request budget usage parsed from the `API-Usage-Limit` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    /// Requests made in the current window.
    pub current: u64,
    /// Requests allowed per window. Never zero.
    pub limit: u64,
}

impl FromStr for Usage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (current, limit) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| format!("expected '<current>/<limit>', got {s:?}"))?;
        let current = current
            .trim()
            .parse()
            .map_err(|e| format!("invalid current usage in {s:?}: {e}"))?;
        let limit = limit
            .trim()
            .parse()
            .map_err(|e| format!("invalid usage limit in {s:?}: {e}"))?;
        if limit == 0 {
            return Err(format!("usage limit must be positive, got {s:?}"));
        }
        Ok(Self { current, limit })
    }
}

/// Default throttle curve: `0.1 + (current / limit)^16 * 8.5` seconds.
///
/// Stays close to 100ms until usage approaches the limit, then grows sharply
/// (about 3.8s at 95%, 8.6s at 100%).
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn default_delay(usage: Usage) -> Duration {
    let limit = usage.limit as f64;
    let used = 1.0 - (limit - usage.current as f64) / limit;
    Duration::try_from_secs_f64(0.1 + used.powi(16) * 8.5).unwrap_or(Duration::MAX)
}

/// A custom throttle curve.
pub type ThrottleFn = Arc<dyn Fn(Usage) -> Duration + Send + Sync>;

/// How (and whether) to slow down in response to reported usage.
#[derive(Clone, Default)]
pub enum Throttle {
    /// Ignore the usage header.
    #[default]
    Disabled,
    /// Use [`default_delay`].
    Default,
    /// Use a caller-supplied curve.
    Custom(ThrottleFn),
}

impl Throttle {
    /// Wrap a closure as a custom throttle curve.
    pub fn custom<F>(curve: F) -> Self
    where
        F: Fn(Usage) -> Duration + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(curve))
    }

    /// Whether the usage header should be read at all.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }

    /// Extra delay for the given usage, or `None` when throttling is disabled.
    #[must_use]
    pub fn delay(&self, usage: Usage) -> Option<Duration> {
        match self {
            Self::Disabled => None,
            Self::Default => Some(default_delay(usage)),
            Self::Custom(curve) => Some(curve(usage)),
        }
    }
}

impl fmt::Debug for Throttle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => f.write_str("Disabled"),
            Self::Default => f.write_str("Default"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl From<bool> for Throttle {
    fn from(enabled: bool) -> Self {
        if enabled { Self::Default } else { Self::Disabled }
    }
}

#[derive(Debug, Clone, Copy)]
struct Timeline {
    last_request: Instant,
    retry_after: Instant,
}

/// Shared retry/throttle timeline of one account.
///
/// All reads and updates go through a single mutex, so concurrent requests
/// that race to push `retry_after` forward never lose each other's updates.
/// Every computed delay is capped at `last_request + max_wait`.
#[derive(Debug)]
pub struct ThrottleState {
    max_wait: Duration,
    timeline: Mutex<Timeline>,
}

impl ThrottleState {
    /// Create a state that lets the first request through immediately.
    #[must_use]
    pub fn new(max_wait: Duration) -> Self {
        let now = Instant::now();
        Self {
            max_wait,
            timeline: Mutex::new(Timeline {
                last_request: now,
                retry_after: now,
            }),
        }
    }

    /// The cap applied to every computed delay.
    #[must_use]
    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    /// When the most recent request was started.
    #[must_use]
    pub fn last_request(&self) -> Instant {
        self.timeline.lock().last_request
    }

    /// Instant before which no request may start.
    #[must_use]
    pub fn retry_after(&self) -> Instant {
        self.timeline.lock().retry_after
    }

    /// Try to start a request at `now`.
    ///
    /// Returns `None` and records `now` as the latest request start if the
    /// gate is open, or `Some(wait)` with the remaining time otherwise.
    pub fn try_start(&self, now: Instant) -> Option<Duration> {
        let mut timeline = self.timeline.lock();
        if now >= timeline.retry_after {
            timeline.last_request = now;
            None
        } else {
            Some(timeline.retry_after - now)
        }
    }

    /// Block new requests for `delay` after the latest request start.
    ///
    /// Used after a transport failure or a 503. Returns the new `retry_after`.
    pub fn retry_in(&self, delay: Duration) -> Instant {
        let mut timeline = self.timeline.lock();
        timeline.retry_after = timeline.last_request + delay.min(self.max_wait);
        timeline.retry_after
    }

    /// Push `retry_after` further by `delay`, starting from whichever of the
    /// latest request start and the current `retry_after` is later.
    ///
    /// Returns the new `retry_after`.
    pub fn extend(&self, delay: Duration) -> Instant {
        let mut timeline = self.timeline.lock();
        let base = timeline.last_request.max(timeline.retry_after);
        let ceiling = timeline.last_request + self.max_wait;
        timeline.retry_after = base.checked_add(delay).map_or(ceiling, |t| t.min(ceiling));
        timeline.retry_after
    }
}

impl Default for ThrottleState {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_WAIT)
    }
}
