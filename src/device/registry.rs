//! Device registry and request dispatch.
//!
//! The registry is a bounded table of [`Device`]s keyed by id. Inbound
//! requests are routed to the device, whose capabilities are offered the
//! request in registration order; the first one that claims it produces
//! the response. The table lock is held only to look up the device, so
//! application callbacks never run under it.

use core::cell::RefCell;
use std::sync::Arc;

use embassy_sync::blocking_mutex::CriticalSectionMutex;
use log::{debug, info, warn};
use serde_json::{Map, Value};

use super::controller::{Capability, Handled};
use crate::config::{MAX_DEVICE_ID_LEN, MAX_DEVICES};
use crate::error::{Result, SdkError};
use crate::protocol::envelope::{
    MESSAGE_DEVICE_ERROR, MESSAGE_NO_HANDLER, MESSAGE_OK, Payload, Request, Response,
};
use crate::protocol::pipeline::Outbox;

pub type DeviceId = heapless::String<MAX_DEVICE_ID_LEN>;

/// Product category, used for logs and diagnostics only; behaviour comes
/// from the capabilities attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Switch,
    DimSwitch,
    Light,
    Fan,
    Blinds,
    GarageDoor,
    Thermostat,
    WindowAc,
    Tv,
    Speaker,
    Lock,
    Doorbell,
    ContactSensor,
    MotionSensor,
    TemperatureSensor,
    Custom,
}

// ── Device ───────────────────────────────────────────────────

pub struct Device {
    id: DeviceId,
    kind: DeviceKind,
    capabilities: Vec<Box<dyn Capability>>,
}

impl Device {
    pub fn new(id: &str, kind: DeviceKind) -> Result<Self> {
        if id.is_empty() {
            return Err(SdkError::InvalidArgument("device id empty"));
        }
        let id = DeviceId::try_from(id).map_err(|()| SdkError::InvalidArgument("device id too long"))?;
        Ok(Self {
            id,
            kind,
            capabilities: Vec::new(),
        })
    }

    /// Append a capability. Order matters: earlier capabilities see requests first.
    pub fn with_capability(mut self, capability: impl Capability + 'static) -> Self {
        self.add_capability(capability);
        self
    }

    pub fn add_capability(&mut self, capability: impl Capability + 'static) {
        self.capabilities.push(Box::new(capability));
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    pub fn capability_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.capabilities.iter().map(|c| c.name())
    }

    /// Offer `request` to each capability in order; the first claim wins.
    pub fn handle(&self, request: &Request) -> Option<Handled> {
        self.capabilities
            .iter()
            .find_map(|c| c.handle_request(&self.id, request))
    }
}

// ── Registry ─────────────────────────────────────────────────

pub struct Registry {
    devices: CriticalSectionMutex<RefCell<heapless::Vec<Arc<Device>, MAX_DEVICES>>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            devices: CriticalSectionMutex::new(RefCell::new(heapless::Vec::new())),
        }
    }

    pub fn register(&self, device: Device) -> Result<()> {
        let id = device.id.clone();
        let kind = device.kind;
        let capabilities: Vec<_> = device.capability_names().collect();
        self.devices.lock(|cell| {
            let mut devices = cell.borrow_mut();
            if devices.iter().any(|d| d.id == id) {
                return Err(SdkError::AlreadyRegistered);
            }
            devices
                .push(Arc::new(device))
                .map_err(|_| SdkError::CapacityExceeded)
        })?;
        info!("REG[{}]: registered {:?} [{}]", id, kind, capabilities.join(", "));
        Ok(())
    }

    pub fn unregister(&self, id: &str) -> Result<()> {
        self.devices.lock(|cell| {
            let mut devices = cell.borrow_mut();
            let pos = devices
                .iter()
                .position(|d| d.id.as_str() == id)
                .ok_or(SdkError::NotFound)?;
            devices.remove(pos);
            Ok(())
        })?;
        info!("REG[{}]: unregistered", id);
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.devices.lock(|cell| cell.borrow().iter().any(|d| d.id.as_str() == id))
    }

    pub fn len(&self) -> usize {
        self.devices.lock(|cell| cell.borrow().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered ids in registration order.
    pub fn device_ids(&self) -> Vec<String> {
        self.devices
            .lock(|cell| cell.borrow().iter().map(|d| d.id.as_str().into()).collect())
    }

    fn lookup(&self, id: &str) -> Option<Arc<Device>> {
        self.devices
            .lock(|cell| cell.borrow().iter().find(|d| d.id.as_str() == id).cloned())
    }

    /// Route `request` to its device and build the response.
    ///
    /// Unknown devices and unclaimed actions answer `success: false` with
    /// [`MESSAGE_NO_HANDLER`]; a callback returning `false` answers with
    /// [`MESSAGE_DEVICE_ERROR`] and the (possibly modified) value.
    pub fn handle(&self, request: &Request) -> Response {
        let no_handler = || {
            Response::for_request(request, false, MESSAGE_NO_HANDLER, Value::Object(Map::new()))
        };

        let Some(device) = self.lookup(&request.device_id) else {
            warn!("REG[{}]: unknown device for {}", request.device_id, request.action);
            return no_handler();
        };
        match device.handle(request) {
            Some(Handled { success: true, value }) => {
                Response::for_request(request, true, MESSAGE_OK, value)
            }
            Some(Handled { success: false, value }) => {
                Response::for_request(request, false, MESSAGE_DEVICE_ERROR, value)
            }
            None => {
                warn!("REG[{}]: no capability handles {}", request.device_id, request.action);
                no_handler()
            }
        }
    }
}

// ── Dispatcher ───────────────────────────────────────────────

/// Connects the registry to the outbound queue: every request routed
/// produces exactly one enqueued response.
pub struct Dispatcher {
    registry: Arc<Registry>,
    outbox: Arc<Outbox>,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>, outbox: Arc<Outbox>) -> Self {
        Self { registry, outbox }
    }

    pub fn dispatch(&self, request: &Request) -> Result<()> {
        let response = self.registry.handle(request);
        debug!(
            "REG[{}]: {} -> {} ({})",
            response.device_id, response.action, response.success, response.message
        );
        self.outbox.enqueue(&Payload::Response(response))
    }
}

// ── Tests ────────────────────────────────────────────────────
