//! WebSocket transport adapter (ESP-IDF).
//!
//! Implements [`Transport`] on top of `esp_idf_svc::ws::client`. The
//! ESP-IDF client owns reconnection: after a drop it retries on its own
//! and each successful reconnect is reported through `on_connected`
//! again. Connect headers are passed as raw `Name: value\r\n` lines.
//!
//! Events arrive on the client's internal task; text and binary frames
//! are both handed to `on_data` as bytes.

use core::time::Duration;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use esp_idf_svc::io::EspIOError;
use esp_idf_svc::ws::FrameType;
use esp_idf_svc::ws::client::{
    EspWebSocketClient, EspWebSocketClientConfig, WebSocketEvent, WebSocketEventType,
};
use log::{debug, error, info, warn};

use crate::error::{Result, SdkError};
use crate::protocol::transport::{ConnectHeaders, Transport, TransportEvents};

/// Time allowed for the client to come up before `connect` gives up.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Delay between automatic reconnect attempts.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

pub struct EspWsTransport {
    client: Mutex<Option<EspWebSocketClient<'static>>>,
    connected: Arc<AtomicBool>,
}

impl Default for EspWsTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl EspWsTransport {
    pub fn new() -> Self {
        Self {
            client: Mutex::new(None),
            connected: Arc::new(AtomicBool::new(false)),
        }
    }
}

fn on_ws_event(
    event: &core::result::Result<WebSocketEvent<'_>, EspIOError>,
    connected: &AtomicBool,
    events: &dyn TransportEvents,
) {
    let event = match event {
        Ok(event) => event,
        Err(e) => {
            warn!("WS: client error: {:?}", e);
            return;
        }
    };
    match &event.event_type {
        WebSocketEventType::Connected => {
            connected.store(true, Ordering::Release);
            events.on_connected();
        }
        WebSocketEventType::Disconnected | WebSocketEventType::Closed => {
            if connected.swap(false, Ordering::AcqRel) {
                events.on_disconnected();
            }
        }
        WebSocketEventType::Text(text) => events.on_data(text.as_bytes()),
        WebSocketEventType::Binary(data) => events.on_data(data),
        other => debug!("WS: {:?}", other),
    }
}

impl Transport for EspWsTransport {
    fn connect(
        &self,
        uri: &str,
        headers: &ConnectHeaders,
        events: Arc<dyn TransportEvents>,
    ) -> Result<()> {
        let header_text = headers.to_http_lines();
        let config = EspWebSocketClientConfig {
            headers: Some(&header_text),
            reconnect_timeout_ms: RECONNECT_DELAY,
            ..Default::default()
        };

        let connected = Arc::clone(&self.connected);
        let client = EspWebSocketClient::new(uri, &config, CONNECT_TIMEOUT, move |event| {
            on_ws_event(event, &connected, events.as_ref());
        })
        .map_err(|e| {
            error!("WS: client init failed for {}: {:?}", uri, e);
            SdkError::Transport
        })?;

        let mut slot = self.client.lock().map_err(|_| SdkError::Transport)?;
        *slot = Some(client);
        info!("WS: connecting to {}", uri);
        Ok(())
    }

    fn send(&self, data: &[u8]) -> Result<()> {
        let mut slot = self.client.lock().map_err(|_| SdkError::Transport)?;
        let client = slot.as_mut().ok_or(SdkError::NotConnected)?;
        client.send(FrameType::Text(false), data).map_err(|e| {
            warn!("WS: send failed: {:?}", e);
            SdkError::Transport
        })
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn disconnect(&self) {
        // Dropping the client stops its task and closes the socket.
        if let Ok(mut slot) = self.client.lock() {
            slot.take();
        }
        self.connected.store(false, Ordering::Release);
        info!("WS: disconnected");
    }
}
