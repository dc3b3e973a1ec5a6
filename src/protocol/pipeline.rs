//! Send/receive pipeline.
//!
//! Receive side runs in the transport's callback context:
//!
//! ```text
//!  on_data ─▶ flood gate ─▶ classify ─┬─ timestamp ─▶ clock.sync
//!                                     └─ signed ─▶ verify ─▶ decode ─▶ clock.sync(createdAt)
//!                                                                   └─▶ Dispatcher ─▶ Outbox
//! ```
//!
//! Send side is a single task on its own thread, driven by an
//! `edge-executor` [`LocalExecutor`]:
//!
//! ```text
//!  Outbox.queue ─▶ pop(timeout) ─▶ seal(now, secret) ─▶ transport.send
//! ```
//!
//! The queue is the only hand-off between the two sides. Application code
//! enqueues events through an [`EventSender`] from any thread.

use core::cell::RefCell;
use core::time::Duration;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread::JoinHandle;

use burster::Limiter;
use edge_executor::LocalExecutor;
use embassy_sync::blocking_mutex::CriticalSectionMutex;
use log::{debug, error, info, warn};

use crate::adapters::time::monotonic_now;
use crate::device::registry::Dispatcher;
use crate::error::{Result, SdkError};

use super::clock::BrokerClock;
use super::envelope::{Event, Inbound, Payload, classify, decode_payload, encode, seal};
use super::queue::OutboundQueue;
use super::signature::verify;
use super::transport::{Transport, TransportEvents};

/// Inbound frames per second accepted before the flood gate drops them.
const INBOUND_RATE: u64 = 10;
/// Inbound burst capacity.
const INBOUND_BURST: u64 = 10;

// ── Counters ─────────────────────────────────────────────────

/// Pipeline counters. Relaxed atomics; read via [`PipelineStats::snapshot`].
#[derive(Default)]
pub struct PipelineStats {
    received: AtomicU32,
    throttled: AtomicU32,
    malformed: AtomicU32,
    rejected_signature: AtomicU32,
    dispatched: AtomicU32,
    sent: AtomicU32,
    send_failed: AtomicU32,
    dropped_offline: AtomicU32,
}

/// Point-in-time copy of [`PipelineStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub received: u32,
    pub throttled: u32,
    pub malformed: u32,
    pub rejected_signature: u32,
    pub dispatched: u32,
    pub sent: u32,
    pub send_failed: u32,
    pub dropped_offline: u32,
}

impl PipelineStats {
    fn bump(counter: &AtomicU32) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let get = |c: &AtomicU32| c.load(Ordering::Relaxed);
        StatsSnapshot {
            received: get(&self.received),
            throttled: get(&self.throttled),
            malformed: get(&self.malformed),
            rejected_signature: get(&self.rejected_signature),
            dispatched: get(&self.dispatched),
            sent: get(&self.sent),
            send_failed: get(&self.send_failed),
            dropped_offline: get(&self.dropped_offline),
        }
    }
}

// ── Outbox ───────────────────────────────────────────────────

/// Outbound queue plus the lifecycle flags the send path consults.
#[derive(Default)]
pub struct Outbox {
    queue: OutboundQueue,
    running: AtomicBool,
    connected: AtomicBool,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode `payload` and enqueue it unsigned.
    pub fn enqueue(&self, payload: &Payload) -> Result<()> {
        let entry = encode(payload)?;
        self.queue.push(entry)
    }

    pub fn queue(&self) -> &OutboundQueue {
        &self.queue
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }
}

/// Cloneable handle for emitting events from application code.
#[derive(Clone)]
pub struct EventSender {
    outbox: Arc<Outbox>,
}

impl EventSender {
    pub(crate) fn new(outbox: Arc<Outbox>) -> Self {
        Self { outbox }
    }

    /// Enqueue an event for transmission.
    ///
    /// Fails with [`SdkError::NotStarted`] after the SDK stopped,
    /// [`SdkError::NotConnected`] while the link is down, and
    /// [`SdkError::QueueFull`] when the outbound queue is saturated.
    pub fn send(&self, event: Event) -> Result<()> {
        if !self.outbox.is_running() {
            return Err(SdkError::NotStarted);
        }
        if !self.outbox.is_connected() {
            debug!("TX: link down, refusing {} event for {}", event.action, event.device_id);
            return Err(SdkError::NotConnected);
        }
        self.outbox.enqueue(&Payload::Event(event))
    }

    pub fn is_connected(&self) -> bool {
        self.outbox.is_connected()
    }
}

// ── Receive path ─────────────────────────────────────────────

/// What the receive path did with one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Received {
    /// Clock control message applied.
    ClockSync,
    /// Request routed and its response enqueued.
    Dispatched,
    /// Valid payload that needs no action (acks for our events, etc).
    Ignored,
    /// Dropped by the inbound flood gate.
    Throttled,
}

/// Receive side of the pipeline; registered with the transport as its
/// [`TransportEvents`].
pub struct Receiver {
    dispatcher: Dispatcher,
    outbox: Arc<Outbox>,
    clock: Arc<BrokerClock>,
    stats: Arc<PipelineStats>,
    secret: Arc<str>,
    flood_gate: CriticalSectionMutex<RefCell<burster::TokenBucket<fn() -> Duration>>>,
}

impl Receiver {
    pub fn new(
        dispatcher: Dispatcher,
        outbox: Arc<Outbox>,
        clock: Arc<BrokerClock>,
        stats: Arc<PipelineStats>,
        secret: Arc<str>,
    ) -> Self {
        Self {
            dispatcher,
            outbox,
            clock,
            stats,
            secret,
            flood_gate: CriticalSectionMutex::new(RefCell::new(
                burster::TokenBucket::new_with_time_provider(
                    INBOUND_RATE,
                    INBOUND_BURST,
                    monotonic_now as fn() -> Duration,
                ),
            )),
        }
    }

    fn admit(&self) -> bool {
        self.flood_gate
            .lock(|gate| gate.borrow_mut().try_consume(1).is_ok())
    }

    /// Process one inbound text frame end to end.
    pub fn handle_frame(&self, raw: &str) -> Result<Received> {
        PipelineStats::bump(&self.stats.received);
        if !self.admit() {
            PipelineStats::bump(&self.stats.throttled);
            warn!("RX: inbound flood, dropping frame");
            return Ok(Received::Throttled);
        }

        let (payload_text, signature) = match classify(raw) {
            Ok(Inbound::Timestamp(ts)) => {
                self.clock.sync(ts);
                debug!("RX: broker time {}", ts);
                return Ok(Received::ClockSync);
            }
            Ok(Inbound::Signed {
                payload_text,
                signature,
            }) => (payload_text, signature),
            Err(e) => {
                PipelineStats::bump(&self.stats.malformed);
                return Err(e);
            }
        };

        if let Err(e) = verify(self.secret.as_bytes(), payload_text, &signature) {
            PipelineStats::bump(&self.stats.rejected_signature);
            return Err(e);
        }

        let payload = decode_payload(payload_text).inspect_err(|_| {
            PipelineStats::bump(&self.stats.malformed);
        })?;
        if payload.created_at() > 0 {
            self.clock.sync(payload.created_at());
        }

        match payload {
            Payload::Request(request) => {
                self.dispatcher.dispatch(&request)?;
                PipelineStats::bump(&self.stats.dispatched);
                Ok(Received::Dispatched)
            }
            Payload::Response(r) => {
                debug!("RX: response {} for {} ignored", r.action, r.device_id);
                Ok(Received::Ignored)
            }
            Payload::Event(e) => {
                debug!("RX: event {} for {} ignored", e.action, e.device_id);
                Ok(Received::Ignored)
            }
        }
    }
}

impl TransportEvents for Receiver {
    fn on_connected(&self) {
        self.outbox.set_connected(true);
        info!("RX: connected to broker");
    }

    fn on_disconnected(&self) {
        self.outbox.set_connected(false);
        warn!("RX: disconnected from broker");
    }

    fn on_data(&self, data: &[u8]) {
        let Ok(text) = core::str::from_utf8(data) else {
            PipelineStats::bump(&self.stats.malformed);
            warn!("RX: non-UTF-8 frame ({} bytes) dropped", data.len());
            return;
        };
        match self.handle_frame(text) {
            Ok(_) => {}
            Err(SdkError::SignatureInvalid) => {
                warn!("RX: dropped frame with invalid signature");
            }
            Err(e) => warn!("RX: dropped frame: {}", e),
        }
    }
}

// ── Send path ────────────────────────────────────────────────

/// Everything the send task owns.
pub struct SendTask<T: Transport> {
    pub transport: Arc<T>,
    pub outbox: Arc<Outbox>,
    pub clock: Arc<BrokerClock>,
    pub stats: Arc<PipelineStats>,
    pub secret: Arc<str>,
    pub pop_timeout: Duration,
}

impl<T: Transport> SendTask<T> {
    /// Run the send loop on a dedicated thread until the outbox stops running.
    pub fn spawn(self, stack_size: usize) -> Result<JoinHandle<()>> {
        std::thread::Builder::new()
            .name("sinric-tx".into())
            .stack_size(stack_size)
            .spawn(move || self.run())
            .map_err(|e| {
                error!("TX: failed to spawn send task: {}", e);
                SdkError::Transport
            })
    }

    fn run(self) {
        let executor: LocalExecutor<'_, 4> = LocalExecutor::new();
        let task = executor.spawn(self.send_loop());
        futures_lite::future::block_on(executor.run(task));
    }

    async fn send_loop(self) {
        info!("TX: send task started");
        while self.outbox.is_running() {
            let Some(entry) = self.outbox.queue().pop(self.pop_timeout).await else {
                continue;
            };
            self.transmit(&entry);
        }
        info!("TX: send task stopped");
    }

    /// Seal and send one queue entry. Entries popped while offline are dropped.
    fn transmit(&self, entry: &str) {
        if !self.transport.is_connected() {
            PipelineStats::bump(&self.stats.dropped_offline);
            warn!("TX: link down, dropping message");
            return;
        }
        let wire = match seal(entry, self.clock.now(), self.secret.as_bytes()) {
            Ok(wire) => wire,
            Err(e) => {
                PipelineStats::bump(&self.stats.send_failed);
                error!("TX: cannot seal message: {}", e);
                return;
            }
        };
        match self.transport.send(wire.as_bytes()) {
            Ok(()) => {
                PipelineStats::bump(&self.stats.sent);
                debug!("TX: {} bytes", wire.len());
            }
            Err(e) => {
                PipelineStats::bump(&self.stats.send_failed);
                error!("TX: send failed: {}", e);
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────
