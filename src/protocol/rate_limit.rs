//! Per-instance minimum-interval gate for outbound events.
//!
//! Every capability controller owns one [`RateLimiter`]. The first check
//! always passes; later checks pass only once `min_interval` has elapsed
//! since the last *successful* check, and a pass moves the clock forward.
//! Rejected checks change nothing, so excess events are clipped, never
//! queued.
//!
//! ```text
//!  t=0     t=0.4   t=1.0   t=1.2   t=2.5
//!  pass    reject  pass    reject  pass
//!  └─────── 1 s ───┘└──── 1 s ─────┘
//! ```
//!
//! The clock update happens under a critical section, so two tasks racing
//! on the same limiter can never both observe "allowed".

use core::cell::Cell;
use core::time::Duration;

use embassy_sync::blocking_mutex::CriticalSectionMutex;

use crate::adapters::time::monotonic_now;

/// Named interval presets, selected per controller at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitPreset {
    /// State changes: at most one event per second.
    State,
    /// Sensor readings: at most one event per minute.
    Sensor,
}

impl RateLimitPreset {
    /// Minimum interval between two allowed events.
    pub const fn interval(self) -> Duration {
        match self {
            Self::State => Duration::from_secs(1),
            Self::Sensor => Duration::from_secs(60),
        }
    }
}

/// Default time provider type.
pub type PlatformClock = fn() -> Duration;

/// A passed check. Handing it back with [`RateLimiter::release`] restores
/// the limiter to where it was before the check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grant {
    previous: Option<Duration>,
    at: Duration,
}

/// Minimum-interval rate limiter.
///
/// Generic over its time provider so tests can drive a fake clock.
pub struct RateLimiter<C = PlatformClock>
where
    C: Fn() -> Duration,
{
    min_interval: Duration,
    last_allowed: CriticalSectionMutex<Cell<Option<Duration>>>,
    clock: C,
}

impl RateLimiter<PlatformClock> {
    /// Limiter on the platform monotonic clock.
    pub fn new(min_interval: Duration) -> Self {
        Self::new_with_time_provider(min_interval, monotonic_now as PlatformClock)
    }

    /// Limiter using one of the fixed presets.
    pub fn from_preset(preset: RateLimitPreset) -> Self {
        Self::new(preset.interval())
    }
}

impl<C> RateLimiter<C>
where
    C: Fn() -> Duration,
{
    pub fn new_with_time_provider(min_interval: Duration, clock: C) -> Self {
        Self {
            min_interval,
            last_allowed: CriticalSectionMutex::new(Cell::new(None)),
            clock,
        }
    }

    /// Returns `true` and advances the clock if an event may be sent now.
    pub fn check(&self) -> bool {
        self.acquire().is_some()
    }

    /// Like [`check`](Self::check), but returns the grant so it can be
    /// released if the event never leaves.
    pub fn acquire(&self) -> Option<Grant> {
        let now = (self.clock)();
        self.last_allowed.lock(|last| {
            let previous = last.get();
            let allowed = match previous {
                None => true,
                Some(prev) => now.saturating_sub(prev) >= self.min_interval,
            };
            if !allowed {
                return None;
            }
            last.set(Some(now));
            Some(Grant { previous, at: now })
        })
    }

    /// Undo `grant`. No-op if another check has passed since.
    pub fn release(&self, grant: Grant) {
        self.last_allowed.lock(|last| {
            if last.get() == Some(grant.at) {
                last.set(grant.previous);
            }
        });
    }

    /// Time until the next [`check`](Self::check) would pass (zero if it would now).
    pub fn time_until_next(&self) -> Duration {
        let now = (self.clock)();
        self.last_allowed.lock(|last| match last.get() {
            None => Duration::ZERO,
            Some(prev) => self.min_interval.saturating_sub(now.saturating_sub(prev)),
        })
    }

    /// Forget the last allowed event; the next check passes.
    pub fn reset(&self) {
        self.last_allowed.lock(|last| last.set(None));
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

// ── Tests ────────────────────────────────────────────────────
