//! SDK lifecycle.
//!
//! The lifecycle is a typestate: operations that need a live pipeline only
//! exist on [`Sdk<Running<T>>`], so "send before start" cannot compile.
//!
//! ```text
//!  SdkConfig ──init──▶ Sdk<Initialized> ──start(transport)──▶ Sdk<Running<T>>
//!                            ▲                                      │
//!                            └────────────────stop──────────────────┘
//! ```
//!
//! Devices may be added or removed in either state. The connect headers
//! list the ids registered at `start`; devices added later are announced
//! on the next start.

use core::fmt;
use core::time::Duration;
use std::sync::Arc;
use std::thread::JoinHandle;

use log::{info, warn};

use crate::adapters::identity::read_mac;
use crate::config::SdkConfig;
use crate::device::registry::{Device, Dispatcher, Registry};
use crate::error::{Result, SdkError};
use crate::protocol::clock::BrokerClock;
use crate::protocol::pipeline::{EventSender, Outbox, PipelineStats, Receiver, SendTask, StatsSnapshot};
use crate::protocol::transport::{ConnectHeaders, Transport};

/// State shared by every lifecycle stage.
struct Core {
    config: SdkConfig,
    secret: Arc<str>,
    registry: Arc<Registry>,
    outbox: Arc<Outbox>,
    clock: Arc<BrokerClock>,
    stats: Arc<PipelineStats>,
}

/// Configured, not connected.
pub struct Initialized;

/// Connected (or connecting) with the send task running.
pub struct Running<T: Transport> {
    transport: Arc<T>,
    outbox: Arc<Outbox>,
    send_task: Option<JoinHandle<()>>,
}

impl<T: Transport> Running<T> {
    /// Stop the send task, drop queued messages, close the link. Idempotent.
    fn shutdown(&mut self) {
        let Some(handle) = self.send_task.take() else {
            return;
        };
        self.outbox.set_running(false);
        if handle.join().is_err() {
            warn!("SDK: send task panicked");
        }
        let dropped = self.outbox.queue().clear();
        if dropped > 0 {
            info!("SDK: discarded {} queued messages", dropped);
        }
        self.transport.disconnect();
        self.outbox.set_connected(false);
    }
}

impl<T: Transport> Drop for Running<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

pub struct Sdk<S> {
    core: Core,
    state: S,
}

/// A failed [`Sdk::start`]; hands the initialized SDK back.
pub struct StartFailure {
    pub sdk: Sdk<Initialized>,
    pub error: SdkError,
}

impl fmt::Debug for StartFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StartFailure").field("error", &self.error).finish()
    }
}

impl fmt::Display for StartFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "start failed: {}", self.error)
    }
}

// ── Any state ────────────────────────────────────────────────

impl<S> Sdk<S> {
    pub fn add_device(&self, device: Device) -> Result<()> {
        self.core.registry.register(device)
    }

    pub fn remove_device(&self, id: &str) -> Result<()> {
        self.core.registry.unregister(id)
    }

    pub fn registry(&self) -> &Registry {
        &self.core.registry
    }

    pub fn config(&self) -> &SdkConfig {
        &self.core.config
    }

    /// Broker time in Unix seconds (0 until the first sync).
    pub fn broker_time(&self) -> u64 {
        self.core.clock.now()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.core.stats.snapshot()
    }
}

// ── Initialized ──────────────────────────────────────────────

impl Sdk<Initialized> {
    pub fn init(config: SdkConfig) -> Result<Self> {
        config.validate()?;
        info!(
            "SDK: init v{} ({}), broker {}",
            config.sdk_version, config.platform, config.server_uri
        );
        Ok(Self {
            core: Core {
                secret: config.app_secret.as_str().into(),
                config,
                registry: Arc::new(Registry::new()),
                outbox: Arc::new(Outbox::new()),
                clock: Arc::new(BrokerClock::new()),
                stats: Arc::new(PipelineStats::default()),
            },
            state: Initialized,
        })
    }

    /// Spawn the send task and connect `transport`.
    ///
    /// Returns once the connect attempt is under way; events are refused
    /// with [`SdkError::NotConnected`] until the transport reports the link up.
    pub fn start<T: Transport>(
        self,
        transport: Arc<T>,
    ) -> core::result::Result<Sdk<Running<T>>, StartFailure> {
        let core = &self.core;
        core.outbox.queue().clear();
        core.outbox.set_connected(false);
        core.outbox.set_running(true);

        let send_task = SendTask {
            transport: Arc::clone(&transport),
            outbox: Arc::clone(&core.outbox),
            clock: Arc::clone(&core.clock),
            stats: Arc::clone(&core.stats),
            secret: Arc::clone(&core.secret),
            pop_timeout: Duration::from_millis(u64::from(core.config.queue_pop_timeout_ms)),
        }
        .spawn(core.config.send_task_stack_size);
        let handle = match send_task {
            Ok(handle) => handle,
            Err(error) => {
                core.outbox.set_running(false);
                return Err(StartFailure { sdk: self, error });
            }
        };

        let mut running = Running {
            transport,
            outbox: Arc::clone(&core.outbox),
            send_task: Some(handle),
        };

        let receiver = Receiver::new(
            Dispatcher::new(Arc::clone(&core.registry), Arc::clone(&core.outbox)),
            Arc::clone(&core.outbox),
            Arc::clone(&core.clock),
            Arc::clone(&core.stats),
            Arc::clone(&core.secret),
        );
        let device_ids = core.registry.device_ids();
        let headers = ConnectHeaders::build(&core.config, &device_ids, &read_mac());

        if let Err(error) =
            running
                .transport
                .connect(&core.config.server_uri, &headers, Arc::new(receiver))
        {
            warn!("SDK: connect to {} failed: {}", core.config.server_uri, error);
            running.shutdown();
            return Err(StartFailure { sdk: self, error });
        }

        info!("SDK: started with {} devices", device_ids.len());
        Ok(Sdk {
            core: self.core,
            state: running,
        })
    }
}

// ── Running ──────────────────────────────────────────────────

impl<T: Transport> Sdk<Running<T>> {
    /// Handle for sending events from any thread.
    pub fn event_sender(&self) -> EventSender {
        EventSender::new(Arc::clone(&self.core.outbox))
    }

    pub fn is_connected(&self) -> bool {
        self.core.outbox.is_connected()
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.state.transport
    }

    /// Tear down the pipeline. Queued messages that were not sent are discarded.
    pub fn stop(mut self) -> Sdk<Initialized> {
        self.state.shutdown();
        info!("SDK: stopped");
        Sdk {
            core: self.core,
            state: Initialized,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::capabilities::PowerStateController;
    use crate::device::registry::DeviceKind;
    use crate::protocol::envelope::{Cause, Event};
    use crate::protocol::transport::MemoryTransport;
    use serde_json::json;

    fn config() -> SdkConfig {
        let mut c = SdkConfig::new("app-key", "app-secret");
        c.queue_pop_timeout_ms = 10;
        c
    }

    #[test]
    fn init_validates_config() {
        assert!(Sdk::init(SdkConfig::default()).is_err());
        assert!(Sdk::init(config()).is_ok());
    }

    #[test]
    fn start_announces_registered_devices() {
        let sdk = Sdk::init(config()).unwrap();
        sdk.add_device(Device::new("dev1", DeviceKind::Switch).unwrap()).unwrap();
        sdk.add_device(Device::new("dev2", DeviceKind::Light).unwrap()).unwrap();

        let transport = Arc::new(MemoryTransport::new());
        let sdk = sdk.start(Arc::clone(&transport)).unwrap();
        assert!(sdk.is_connected());

        let headers = transport.connect_headers().unwrap();
        assert_eq!(headers.get("deviceids"), Some("dev1;dev2"));
        assert_eq!(headers.get("appkey"), Some("app-key"));
        sdk.stop();
    }

    #[test]
    fn stopped_sender_reports_not_started() {
        let sdk = Sdk::init(config()).unwrap();
        let running = sdk.start(Arc::new(MemoryTransport::new())).unwrap();
        let tx = running.event_sender();
        let sdk = running.stop();

        let ev = Event::new("dev1", None, "setPowerState", Cause::PhysicalInteraction, json!({}));
        assert_eq!(tx.send(ev), Err(SdkError::NotStarted));
        assert_eq!(sdk.stats().sent, 0);
    }

    #[test]
    fn restart_after_stop() {
        let sdk = Sdk::init(config()).unwrap();
        let power = PowerStateController::new();
        sdk.add_device(Device::new("dev1", DeviceKind::Switch).unwrap().with_capability(power))
            .unwrap();

        let sdk = sdk.start(Arc::new(MemoryTransport::new())).unwrap().stop();
        let sdk = sdk.start(Arc::new(MemoryTransport::new())).unwrap();
        assert!(sdk.is_connected());
        assert_eq!(sdk.registry().len(), 1);
    }
}
