//! SDK configuration
//!
//! Credentials and connection parameters supplied by the application.
//! Limits that protect device memory (queue depth, device count, rate
//! presets) are compile-time constants and deliberately not listed here.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SdkError};

/// Default broker endpoint.
pub const DEFAULT_SERVER_URI: &str = "ws://ws.sinric.pro:80";

/// Maximum number of registered devices.
pub const MAX_DEVICES: usize = 10;

/// Maximum device id length in bytes.
pub const MAX_DEVICE_ID_LEN: usize = 32;

/// Outbound queue depth (messages).
pub const QUEUE_CAPACITY: usize = 16;

/// Core SDK configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SdkConfig {
    // --- Credentials ---
    /// Application key (sent in the connect headers)
    pub app_key: String,
    /// Application secret (HMAC key, never transmitted)
    pub app_secret: String,

    // --- Connection ---
    /// Broker WebSocket URI
    pub server_uri: String,
    /// Ask the broker to replay the last known device states after connect
    pub restore_device_states: bool,
    /// Platform string reported at connect
    pub platform: String,
    /// SDK version string reported at connect
    pub sdk_version: String,
    /// Station IP address, filled in by the application after network bring-up
    pub ip_address: Option<String>,

    // --- Send task ---
    /// Bounded wait on each queue pop so the send task can observe shutdown (ms)
    pub queue_pop_timeout_ms: u32,
    /// Stack size of the send task thread (bytes)
    pub send_task_stack_size: usize,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            app_key: String::new(),
            app_secret: String::new(),

            server_uri: DEFAULT_SERVER_URI.into(),
            restore_device_states: false,
            platform: "ESP32".into(),
            sdk_version: env!("CARGO_PKG_VERSION").into(),
            ip_address: None,

            queue_pop_timeout_ms: 100,
            send_task_stack_size: 8 * 1024,
        }
    }
}

impl SdkConfig {
    /// Convenience constructor with credentials and defaults for everything else.
    pub fn new(app_key: &str, app_secret: &str) -> Self {
        Self {
            app_key: app_key.into(),
            app_secret: app_secret.into(),
            ..Self::default()
        }
    }

    /// Reject configurations the SDK cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.app_key.is_empty() {
            return Err(SdkError::InvalidArgument("app key empty"));
        }
        if self.app_secret.is_empty() {
            return Err(SdkError::InvalidArgument("app secret empty"));
        }
        if self.server_uri.is_empty() {
            return Err(SdkError::InvalidArgument("server uri empty"));
        }
        if self.queue_pop_timeout_ms == 0 {
            return Err(SdkError::InvalidArgument("queue pop timeout zero"));
        }
        Ok(())
    }
}
