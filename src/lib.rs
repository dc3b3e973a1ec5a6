//! Device-side SDK for the Sinric Pro broker.
//!
//! Registers devices built from capability controllers, verifies and
//! dispatches signed requests from the broker, and sends signed,
//! rate-limited state events back. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]`; everything else builds and tests on the
//! host.
//!
//! ```ignore
//! use std::sync::Arc;
//! use sinric_sdk::device::capabilities::PowerStateController;
//! use sinric_sdk::device::registry::{Device, DeviceKind};
//! use sinric_sdk::protocol::envelope::Cause;
//! use sinric_sdk::{Sdk, SdkConfig};
//!
//! let sdk = Sdk::init(SdkConfig::new(APP_KEY, APP_SECRET))?;
//! let power = PowerStateController::new();
//! power.set_callback(|_device, on| relay.set(*on));
//! sdk.add_device(Device::new("5f36...", DeviceKind::Switch)?.with_capability(power.clone()))?;
//!
//! let sdk = sdk.start(Arc::new(EspWsTransport::new())).map_err(|f| f.error)?;
//! let events = sdk.event_sender();
//! power.send_event(&events, "5f36...", true, Cause::PhysicalInteraction)?;
//! ```

#![deny(unused_must_use)]

pub mod adapters;
pub mod config;
pub mod device;
pub mod protocol;
pub mod sdk;

mod error;

pub use config::SdkConfig;
pub use error::{Result, SdkError};
pub use sdk::{Initialized, Running, Sdk, StartFailure};
