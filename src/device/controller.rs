//! Generic capability controller.
//!
//! One [`Controller<S>`] implements the whole request/event contract for a
//! capability; the [`CapabilitySpec`] type parameter only supplies the
//! action names, the value type and its JSON mapping. Devices hold their
//! controllers as `Box<dyn Capability>` and offer each request to them in
//! registration order until one claims it.
//!
//! ```text
//!  request ──▶ owns action? ──no──▶ decline (next controller)
//!                  │yes
//!                  ▼
//!             decode value ──fail──▶ decline
//!                  │
//!                  ▼
//!         callback(&mut value) ──▶ Handled { success, echo(value) }
//! ```
//!
//! Controllers are cheap handles (`Arc` inside): the application keeps one
//! clone to register callbacks and send events, the device owns another.
//! A controller never refers back to its device; the device passes its id
//! into every call.

use core::cell::RefCell;
use std::sync::Arc;

use embassy_sync::blocking_mutex::CriticalSectionMutex;
use log::{debug, warn};
use serde_json::Value;

use crate::config::MAX_DEVICE_ID_LEN;
use crate::error::{Result, SdkError};
use crate::protocol::envelope::{Cause, Event, Request};
use crate::protocol::pipeline::EventSender;
use crate::protocol::rate_limit::{RateLimitPreset, RateLimiter};

/// Instance identifier for multi-instance capabilities (mode, range, toggle).
pub type InstanceId = heapless::String<MAX_DEVICE_ID_LEN>;

// ───────────────────────────────────────────────────────────────
// Capability description
// ───────────────────────────────────────────────────────────────

/// Static description of one capability: value type, action names, JSON mapping.
pub trait CapabilitySpec: Send + Sync + 'static {
    /// Value handed to the application callback.
    type Value: Send + 'static;

    /// Short name for logs.
    const NAME: &'static str;
    /// Actions carrying an absolute value.
    const SET_ACTIONS: &'static [&'static str];
    /// Actions carrying a relative change.
    const ADJUST_ACTIONS: &'static [&'static str] = &[];
    /// Action name used for outbound events.
    const EVENT_ACTION: &'static str;
    /// Event rate preset.
    const PRESET: RateLimitPreset = RateLimitPreset::State;

    /// Decode the value of a set action. `None` rejects the request.
    fn decode(action: &str, value: &Value) -> Option<Self::Value>;

    /// Decode the delta of an adjust action. `None` rejects the request.
    fn decode_adjust(action: &str, value: &Value) -> Option<Self::Value> {
        let _ = (action, value);
        None
    }

    /// JSON form used in responses and events.
    fn encode(value: &Self::Value) -> Value;
}

// ───────────────────────────────────────────────────────────────
// Object-safe face used by devices
// ───────────────────────────────────────────────────────────────

/// Outcome of a request a controller claimed.
#[derive(Debug, Clone, PartialEq)]
pub struct Handled {
    /// The application callback's verdict.
    pub success: bool,
    /// Value to echo in the response (after any callback transformation).
    pub value: Value,
}

/// A unit of protocol behaviour a device can chain.
pub trait Capability: Send + Sync {
    fn name(&self) -> &'static str;

    /// Claim and execute `request`, or return `None` to let the next
    /// capability try.
    fn handle_request(&self, device_id: &str, request: &Request) -> Option<Handled>;
}

// ───────────────────────────────────────────────────────────────
// Controller
// ───────────────────────────────────────────────────────────────

/// Application callback: receives the device id and a mutable value, returns success.
pub type Callback<V> = Arc<dyn Fn(&str, &mut V) -> bool + Send + Sync>;

type CallbackSlot<V> = CriticalSectionMutex<RefCell<Option<Callback<V>>>>;

struct Inner<S: CapabilitySpec> {
    instance_id: Option<InstanceId>,
    on_set: CallbackSlot<S::Value>,
    on_adjust: CallbackSlot<S::Value>,
    limiter: RateLimiter,
}

/// Typed controller for capability `S`.
pub struct Controller<S: CapabilitySpec> {
    inner: Arc<Inner<S>>,
}

impl<S: CapabilitySpec> Clone for Controller<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: CapabilitySpec> Default for Controller<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: CapabilitySpec> Controller<S> {
    /// Controller for the device-level (instance-less) capability.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Controller bound to one `instanceId`; it only claims requests for that instance.
    pub fn for_instance(instance_id: &str) -> Result<Self> {
        if instance_id.is_empty() {
            return Err(SdkError::InvalidArgument("instance id empty"));
        }
        let id = InstanceId::try_from(instance_id)
            .map_err(|()| SdkError::InvalidArgument("instance id too long"))?;
        Ok(Self::build(Some(id)))
    }

    fn build(instance_id: Option<InstanceId>) -> Self {
        Self {
            inner: Arc::new(Inner {
                instance_id,
                on_set: CriticalSectionMutex::new(RefCell::new(None)),
                on_adjust: CriticalSectionMutex::new(RefCell::new(None)),
                limiter: RateLimiter::from_preset(S::PRESET),
            }),
        }
    }

    /// Register the handler for set actions. Replaces any previous one.
    pub fn set_callback<F>(&self, callback: F)
    where
        F: Fn(&str, &mut S::Value) -> bool + Send + Sync + 'static,
    {
        let cb: Callback<S::Value> = Arc::new(callback);
        self.inner.on_set.lock(|slot| *slot.borrow_mut() = Some(cb));
    }

    /// Register the handler for adjust actions. Replaces any previous one.
    ///
    /// The callback receives the delta and must overwrite it with the new
    /// absolute value; that absolute value is what the response reports.
    pub fn set_adjust_callback<F>(&self, callback: F)
    where
        F: Fn(&str, &mut S::Value) -> bool + Send + Sync + 'static,
    {
        let cb: Callback<S::Value> = Arc::new(callback);
        self.inner.on_adjust.lock(|slot| *slot.borrow_mut() = Some(cb));
    }

    pub fn instance_id(&self) -> Option<&str> {
        self.inner.instance_id.as_deref()
    }

    /// Whether this controller claims `action` (ignoring instance ids).
    pub fn owns(&self, action: &str) -> bool {
        S::SET_ACTIONS.contains(&action) || S::ADJUST_ACTIONS.contains(&action)
    }

    /// Report a state change to the broker.
    ///
    /// Gated by this controller's rate limiter: a second event inside the
    /// preset interval returns [`SdkError::RateLimited`] without enqueuing.
    /// An event refused by the sender does not count against the interval.
    pub fn send_event(
        &self,
        sender: &EventSender,
        device_id: &str,
        value: S::Value,
        cause: Cause,
    ) -> Result<()> {
        if device_id.is_empty() {
            return Err(SdkError::InvalidArgument("device id empty"));
        }
        let Some(grant) = self.inner.limiter.acquire() else {
            warn!(
                "REG[{}]: {} event rate limited, retry in {:?}",
                device_id,
                S::NAME,
                self.inner.limiter.time_until_next()
            );
            return Err(SdkError::RateLimited);
        };
        let event = Event::new(
            device_id,
            self.instance_id(),
            S::EVENT_ACTION,
            cause,
            S::encode(&value),
        );
        // Only an enqueued event spends the interval.
        sender.send(event).inspect_err(|_| self.inner.limiter.release(grant))
    }

    fn callback(slot: &CallbackSlot<S::Value>) -> Option<Callback<S::Value>> {
        // Clone out of the lock so the callback never runs inside it.
        slot.lock(|s| s.borrow().clone())
    }
}

impl<S: CapabilitySpec> Capability for Controller<S> {
    fn name(&self) -> &'static str {
        S::NAME
    }

    fn handle_request(&self, device_id: &str, request: &Request) -> Option<Handled> {
        if request.instance_id.as_deref() != self.instance_id() {
            return None;
        }
        let action = request.action.as_str();

        let (decoded, slot) = if S::SET_ACTIONS.contains(&action) {
            (S::decode(action, &request.value), &self.inner.on_set)
        } else if S::ADJUST_ACTIONS.contains(&action) {
            (S::decode_adjust(action, &request.value), &self.inner.on_adjust)
        } else {
            return None;
        };

        let Some(mut value) = decoded else {
            warn!("REG[{}]: {} invalid value for {}: {}", device_id, S::NAME, action, request.value);
            return None;
        };
        let Some(callback) = Self::callback(slot) else {
            warn!("REG[{}]: {} has no callback for {}", device_id, S::NAME, action);
            return None;
        };

        let success = callback(device_id, &mut value);
        debug!("REG[{}]: {} {} -> {}", device_id, S::NAME, action, success);
        Some(Handled {
            success,
            value: S::encode(&value),
        })
    }
}

// ── Tests ────────────────────────────────────────────────────
