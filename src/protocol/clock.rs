//! Broker-synchronised Unix time.
//!
//! The broker sends its current time in a `{"timestamp": …}` control message
//! right after connect, and every inbound payload carries `createdAt`. Each
//! of those re-anchors the clock; between anchors it advances with the local
//! monotonic timer. Outbound payloads are stamped from [`BrokerClock::now`]
//! at send time.
//!
//! Written only by the receive path, read by the send task. The timestamp
//! frame is unsigned, so any value must be tolerated: the clock saturates
//! at `u64::MAX`.

use core::cell::Cell;
use core::time::Duration;

use embassy_sync::blocking_mutex::CriticalSectionMutex;

use crate::adapters::time::monotonic_now;

#[derive(Clone, Copy)]
struct Anchor {
    unix_secs: u64,
    at: Duration,
}

pub struct BrokerClock<C = fn() -> Duration>
where
    C: Fn() -> Duration,
{
    anchor: CriticalSectionMutex<Cell<Option<Anchor>>>,
    clock: C,
}

impl BrokerClock {
    pub fn new() -> Self {
        Self::new_with_time_provider(monotonic_now)
    }
}

impl Default for BrokerClock {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> BrokerClock<C>
where
    C: Fn() -> Duration,
{
    pub fn new_with_time_provider(clock: C) -> Self {
        Self {
            anchor: CriticalSectionMutex::new(Cell::new(None)),
            clock,
        }
    }

    /// Re-anchor to a broker-provided Unix timestamp (seconds).
    pub fn sync(&self, unix_secs: u64) {
        let at = (self.clock)();
        self.anchor.lock(|a| a.set(Some(Anchor { unix_secs, at })));
    }

    /// Current broker time in Unix seconds, or 0 before the first sync.
    pub fn now(&self) -> u64 {
        let local = (self.clock)();
        self.anchor.lock(|a| match a.get() {
            Some(anchor) => anchor
                .unix_secs
                .saturating_add(local.saturating_sub(anchor.at).as_secs()),
            None => 0,
        })
    }

    pub fn is_synced(&self) -> bool {
        self.anchor.lock(|a| a.get().is_some())
    }
}
