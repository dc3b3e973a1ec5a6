//! Simulated broker for integration tests.
//!
//! Wraps the SDK's `MemoryTransport`: signs requests the way the broker
//! does, injects them, and collects verified outbound payloads.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Value, json};
use sinric_sdk::device::registry::{Device, DeviceKind};
use sinric_sdk::protocol::envelope::{Inbound, classify};
use sinric_sdk::protocol::signature::{sign, verify};
use sinric_sdk::protocol::transport::MemoryTransport;
use sinric_sdk::sdk::{Initialized, Running};
use sinric_sdk::{Sdk, SdkConfig};

pub const APP_KEY: &str = "d3d1c6a2-app-key";
pub const APP_SECRET: &str = "7f2a9c1e-app-secret";

pub struct Broker {
    pub transport: Arc<MemoryTransport>,
    next_token: u32,
}

#[allow(dead_code)]
impl Broker {
    pub fn new() -> Self {
        Self {
            transport: Arc::new(MemoryTransport::new()),
            next_token: 0,
        }
    }

    /// Build a signed request frame.
    pub fn request(&mut self, device: &str, action: &str, value: Value) -> (String, String) {
        self.next_token += 1;
        let token = format!("rt-{}", self.next_token);
        let payload = json!({
            "action": action,
            "clientId": "test-client",
            "createdAt": 1_700_000_000u64,
            "deviceId": device,
            "replyToken": token,
            "type": "request",
            "value": value,
        });
        (signed(&payload.to_string(), APP_SECRET), token)
    }

    /// Same as [`Broker::request`] with an `instanceId`.
    pub fn instance_request(
        &mut self,
        device: &str,
        instance: &str,
        action: &str,
        value: Value,
    ) -> (String, String) {
        self.next_token += 1;
        let token = format!("rt-{}", self.next_token);
        let payload = json!({
            "action": action,
            "createdAt": 1_700_000_000u64,
            "deviceId": device,
            "instanceId": instance,
            "replyToken": token,
            "type": "request",
            "value": value,
        });
        (signed(&payload.to_string(), APP_SECRET), token)
    }

    pub fn send(&self, frame: &str) {
        self.transport.inject(frame);
    }

    /// Wait until at least `n` frames were sent, then return all verified payloads.
    pub fn collect(&self, n: usize, timeout: Duration) -> Vec<Value> {
        let deadline = Instant::now() + timeout;
        while self.transport.sent_count() < n && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        self.transport
            .take_sent()
            .iter()
            .map(|frame| verified_payload(frame))
            .collect()
    }

    /// Wait long enough to be confident nothing more is sent.
    pub fn quiet(&self) -> Vec<Value> {
        std::thread::sleep(Duration::from_millis(150));
        self.collect(0, Duration::ZERO)
    }
}

pub fn signed(payload: &str, secret: &str) -> String {
    let sig = sign(secret.as_bytes(), payload);
    format!(
        r#"{{"header":{{"payloadVersion":2,"signatureVersion":1}},"payload":{payload},"signature":{{"HMAC":"{sig}"}}}}"#
    )
}

/// Check the frame's signature with the app secret and return its payload.
pub fn verified_payload(frame: &str) -> Value {
    let Inbound::Signed { payload_text, signature } = classify(frame).unwrap() else {
        panic!("outbound frame must be signed: {frame}");
    };
    verify(APP_SECRET.as_bytes(), payload_text, &signature).unwrap();
    serde_json::from_str(payload_text).unwrap()
}

pub fn config() -> SdkConfig {
    let mut c = SdkConfig::new(APP_KEY, APP_SECRET);
    c.queue_pop_timeout_ms = 10;
    c.send_task_stack_size = 32 * 1024;
    c
}

#[allow(dead_code)]
pub fn sdk_with(devices: Vec<Device>) -> Sdk<Initialized> {
    let sdk = Sdk::init(config()).unwrap();
    for d in devices {
        sdk.add_device(d).unwrap();
    }
    sdk
}

#[allow(dead_code)]
pub fn start(sdk: Sdk<Initialized>, broker: &Broker) -> Sdk<Running<MemoryTransport>> {
    sdk.start(Arc::clone(&broker.transport)).unwrap()
}

#[allow(dead_code)]
pub fn device(id: &str, kind: DeviceKind) -> Device {
    Device::new(id, kind).unwrap()
}
