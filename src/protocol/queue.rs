//! Bounded outbound message queue.
//!
//! Many producers (application tasks sending events, the receive path
//! enqueuing responses) and one consumer (the send task). Backed by an
//! `embassy-sync` bounded channel so producers never block: a full queue
//! rejects the push with [`SdkError::QueueFull`] and leaves its contents
//! untouched.
//!
//! ```text
//! ┌──────────────┐
//! │ app task A   │──┐  push (never blocks)
//! ├──────────────┤  │  ┌────────────────────┐  pop (bounded wait)  ┌───────────┐
//! │ app task B   │──┼─▶│ OutboundQueue [16] │─────────────────────▶│ send task │
//! ├──────────────┤  │  └────────────────────┘                      └───────────┘
//! │ receive path │──┘
//! └──────────────┘
//! ```
//!
//! Entries are already-serialised messages. The queue owns each entry until
//! it is popped; the popper owns it from then on.

use core::time::Duration;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, TrySendError};
use futures_lite::future;
use log::warn;

use crate::config::QUEUE_CAPACITY;
use crate::error::{Result, SdkError};

/// Serialised outbound message (header + payload, not yet signed).
pub type QueueEntry = String;

/// Bounded MPSC queue of serialised outbound messages.
pub struct OutboundQueue {
    channel: Channel<CriticalSectionRawMutex, QueueEntry, QUEUE_CAPACITY>,
}

impl OutboundQueue {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Enqueue a message. Fails immediately with `QueueFull` when at capacity.
    pub fn push(&self, entry: QueueEntry) -> Result<()> {
        match self.channel.try_send(entry) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_dropped)) => {
                warn!("TX: outbound queue full ({QUEUE_CAPACITY}), dropping message");
                Err(SdkError::QueueFull)
            }
        }
    }

    /// Dequeue without waiting.
    pub fn try_pop(&self) -> Option<QueueEntry> {
        self.channel.try_receive().ok()
    }

    /// Dequeue, waiting at most `timeout` for a message to arrive.
    ///
    /// The wait is reactor-driven (no busy-spinning); `None` means the
    /// timeout elapsed with the queue still empty.
    pub async fn pop(&self, timeout: Duration) -> Option<QueueEntry> {
        future::or(async { Some(self.channel.receive().await) }, async {
            async_io_mini::Timer::after(timeout).await;
            None
        })
        .await
    }

    /// Blocking form of [`pop`](Self::pop) for synchronous callers.
    pub fn pop_blocking(&self, timeout: Duration) -> Option<QueueEntry> {
        future::block_on(self.pop(timeout))
    }

    /// Drop every pending message (used on teardown). Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let mut dropped = 0;
        while self.channel.try_receive().is_ok() {
            dropped += 1;
        }
        dropped
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.channel.is_full()
    }

    pub const fn capacity(&self) -> usize {
        QUEUE_CAPACITY
    }
}

impl Default for OutboundQueue {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ────────────────────────────────────────────────────
