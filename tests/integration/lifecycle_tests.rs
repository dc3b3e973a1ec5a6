//! Init / start / stop and registry behaviour through the public SDK surface.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use sinric_sdk::device::capabilities::PowerStateController;
use sinric_sdk::device::registry::DeviceKind;
use sinric_sdk::protocol::envelope::Cause;
use sinric_sdk::protocol::transport::{MemoryTransport, Transport};
use sinric_sdk::{Sdk, SdkConfig, SdkError};

use crate::broker::{APP_KEY, Broker, config, device, sdk_with, start};

#[test]
fn init_rejects_missing_credentials() {
    assert!(matches!(
        Sdk::init(SdkConfig::new("", "secret")),
        Err(SdkError::InvalidArgument(_))
    ));
    assert!(matches!(
        Sdk::init(SdkConfig::new(APP_KEY, "")),
        Err(SdkError::InvalidArgument(_))
    ));
}

#[test]
fn connect_headers_identify_the_device() {
    let broker = Broker::new();
    let sdk = start(
        sdk_with(vec![
            device("aa11", DeviceKind::Switch),
            device("bb22", DeviceKind::Fan),
        ]),
        &broker,
    );

    let headers = broker.transport.connect_headers().unwrap();
    assert_eq!(headers.get("appkey"), Some(APP_KEY));
    assert_eq!(headers.get("deviceids"), Some("aa11;bb22"));
    assert_eq!(headers.get("restoredevicestates"), Some("false"));
    assert_eq!(headers.get("platform"), Some("ESP32"));
    assert_eq!(headers.get("mac").map(str::len), Some(17));
    sdk.stop();
}

#[test]
fn registry_limits_hold_through_the_sdk() {
    let sdk = Sdk::init(config()).unwrap();
    for i in 0..10 {
        sdk.add_device(device(&format!("dev{i}"), DeviceKind::Switch)).unwrap();
    }
    assert_eq!(
        sdk.add_device(device("dev10", DeviceKind::Switch)),
        Err(SdkError::CapacityExceeded)
    );
    assert_eq!(
        sdk.add_device(device("dev3", DeviceKind::Switch)),
        Err(SdkError::AlreadyRegistered)
    );
    sdk.remove_device("dev3").unwrap();
    assert_eq!(sdk.remove_device("dev3"), Err(SdkError::NotFound));
    sdk.add_device(device("dev3", DeviceKind::Switch)).unwrap();
    assert_eq!(sdk.registry().len(), 10);
}

#[test]
fn removed_device_answers_no_handler() {
    let power = PowerStateController::new();
    power.set_callback(|_, _| true);

    let mut broker = Broker::new();
    let sdk = start(
        sdk_with(vec![device("abc123", DeviceKind::Switch).with_capability(power)]),
        &broker,
    );
    sdk.remove_device("abc123").unwrap();

    let (frame, _) = broker.request("abc123", "setPowerState", json!({"state": "On"}));
    broker.send(&frame);
    let out = broker.collect(1, Duration::from_secs(2));
    assert_eq!(out[0]["message"], "no handler");
    sdk.stop();
}

#[test]
fn stop_then_restart_keeps_devices() {
    let power = PowerStateController::new();
    let sdk = sdk_with(vec![device("abc123", DeviceKind::Switch).with_capability(power.clone())]);

    let first = Broker::new();
    let running = start(sdk, &first);
    let stale_sender = running.event_sender();
    let sdk = running.stop();
    assert!(!first.transport.is_connected());

    assert_eq!(
        power.send_event(&stale_sender, "abc123", true, Cause::AppInteraction),
        Err(SdkError::NotStarted)
    );

    let second = Broker::new();
    let running = sdk.start(Arc::clone(&second.transport)).unwrap();
    assert_eq!(running.registry().device_ids(), vec!["abc123".to_string()]);
    assert_eq!(
        second.transport.connect_headers().unwrap().get("deviceids"),
        Some("abc123")
    );
    running.stop();
}

#[test]
fn dropping_a_running_sdk_shuts_down() {
    let transport = Arc::new(MemoryTransport::new());
    {
        let sdk = Sdk::init(config()).unwrap();
        let _running = sdk.start(Arc::clone(&transport)).unwrap();
    }
    assert!(!transport.is_connected());
}
