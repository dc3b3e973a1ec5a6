//! Transport boundary: the broker link as seen by the SDK.
//!
//! The SDK needs exactly four things from a transport: connect with
//! identifying headers and a set of callbacks, send a text frame, report
//! whether the link is up, and (on teardown) disconnect. Reconnect policy,
//! TLS and certificates stay inside the transport.
//!
//! Concrete implementations:
//! - [`MemoryTransport`]: records frames in memory (host tests, simulation)
//! - `EspWsTransport`: ESP-IDF WebSocket client (`target_os = "espidf"`)
//!
//! Callbacks arrive on the transport's own thread; see
//! [`TransportEvents`].

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::adapters::identity::{format_mac, MacAddress};
use crate::config::SdkConfig;
use crate::error::{Result, SdkError};

/// Callbacks the transport invokes from its own context.
///
/// Implementations must return quickly; `on_data` runs request handlers
/// synchronously.
pub trait TransportEvents: Send + Sync {
    fn on_connected(&self);
    fn on_disconnected(&self);
    fn on_data(&self, data: &[u8]);
}

/// Text-frame transport to the broker.
pub trait Transport: Send + Sync + 'static {
    /// Open the link. Returns once the attempt is started; `on_connected`
    /// reports when it is up.
    fn connect(
        &self,
        uri: &str,
        headers: &ConnectHeaders,
        events: Arc<dyn TransportEvents>,
    ) -> Result<()>;

    /// Send one complete text frame.
    fn send(&self, data: &[u8]) -> Result<()>;

    fn is_connected(&self) -> bool;

    /// Close the link. The default does nothing.
    fn disconnect(&self) {}
}

// ── Connect headers ──────────────────────────────────────────

/// Identifying headers sent with the connect request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectHeaders {
    entries: Vec<(&'static str, String)>,
}

impl ConnectHeaders {
    /// Build the broker's connect headers.
    ///
    /// `device_ids` are joined with `;` in the order given.
    pub fn build(config: &SdkConfig, device_ids: &[String], mac: &MacAddress) -> Self {
        let entries = vec![
            ("appkey", config.app_key.clone()),
            ("deviceids", device_ids.join(";")),
            (
                "restoredevicestates",
                if config.restore_device_states { "true" } else { "false" }.into(),
            ),
            (
                "ip",
                config.ip_address.clone().unwrap_or_else(|| "0.0.0.0".into()),
            ),
            ("mac", format_mac(mac).as_str().into()),
            ("platform", config.platform.clone()),
            ("SDKVersion", config.sdk_version.clone()),
        ];
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.entries.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// Render as raw HTTP header lines (`Name: value\r\n`).
    pub fn to_http_lines(&self) -> String {
        self.iter().map(|(k, v)| format!("{k}: {v}\r\n")).collect()
    }
}

// ── In-memory transport ──────────────────────────────────────

/// Transport that keeps sent frames in memory and lets the caller inject
/// inbound frames. Connects instantly.
#[derive(Default)]
pub struct MemoryTransport {
    connected: AtomicBool,
    fail_sends: AtomicBool,
    sent: Mutex<Vec<String>>,
    events: Mutex<Option<Arc<dyn TransportEvents>>>,
    headers: Mutex<Option<ConnectHeaders>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an inbound frame as if it arrived from the broker.
    pub fn inject(&self, frame: &str) {
        let events = self.events.lock().ok().and_then(|e| e.clone());
        if let Some(events) = events {
            events.on_data(frame.as_bytes());
        }
    }

    /// Simulate the link dropping.
    pub fn drop_link(&self) {
        self.connected.store(false, Ordering::SeqCst);
        let events = self.events.lock().ok().and_then(|e| e.clone());
        if let Some(events) = events {
            events.on_disconnected();
        }
    }

    /// Make subsequent sends fail.
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Take every frame sent so far.
    pub fn take_sent(&self) -> Vec<String> {
        self.sent
            .lock()
            .map(|mut s| core::mem::take(&mut *s))
            .unwrap_or_default()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn connect_headers(&self) -> Option<ConnectHeaders> {
        self.headers.lock().ok().and_then(|h| h.clone())
    }
}

impl Transport for MemoryTransport {
    fn connect(
        &self,
        _uri: &str,
        headers: &ConnectHeaders,
        events: Arc<dyn TransportEvents>,
    ) -> Result<()> {
        if let Ok(mut h) = self.headers.lock() {
            *h = Some(headers.clone());
        }
        if let Ok(mut e) = self.events.lock() {
            *e = Some(Arc::clone(&events));
        }
        self.connected.store(true, Ordering::SeqCst);
        events.on_connected();
        Ok(())
    }

    fn send(&self, data: &[u8]) -> Result<()> {
        if !self.is_connected() || self.fail_sends.load(Ordering::SeqCst) {
            return Err(SdkError::Transport);
        }
        let text = core::str::from_utf8(data).map_err(|_| SdkError::Transport)?;
        self.sent
            .lock()
            .map_err(|_| SdkError::Transport)?
            .push(text.into());
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        if let Ok(mut e) = self.events.lock() {
            *e = None;
        }
    }
}

// ── Tests ────────────────────────────────────────────────────
