//! Broker request → callback → signed response.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use sinric_sdk::device::capabilities::{
    BrightnessController, ModeController, PowerStateController, RangeController, ThermostatController,
    ThermostatMode,
};
use sinric_sdk::device::registry::DeviceKind;

use crate::broker::{Broker, device, sdk_with, signed, start};

const WAIT: Duration = Duration::from_secs(2);

#[test]
fn power_on_request_reaches_callback_and_is_answered() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let power = PowerStateController::new();
    let log = Arc::clone(&seen);
    power.set_callback(move |id, on| {
        log.lock().unwrap().push((id.to_string(), *on));
        true
    });

    let mut broker = Broker::new();
    let sdk = start(
        sdk_with(vec![device("abc123", DeviceKind::Switch).with_capability(power)]),
        &broker,
    );

    let (frame, token) = broker.request("abc123", "setPowerState", json!({"state": "On"}));
    broker.send(&frame);

    let out = broker.collect(1, WAIT);
    assert_eq!(out.len(), 1);
    let resp = &out[0];
    assert_eq!(resp["type"], "response");
    assert_eq!(resp["success"], true);
    assert_eq!(resp["message"], "OK");
    assert_eq!(resp["replyToken"], token.as_str());
    assert_eq!(resp["clientId"], "test-client");
    assert_eq!(resp["value"], json!({"state": "On"}));
    assert_eq!(*seen.lock().unwrap(), vec![("abc123".to_string(), true)]);

    assert_eq!(sdk.stats().dispatched, 1);
    sdk.stop();
}

#[test]
fn adjust_brightness_reports_absolute_level() {
    let level = Arc::new(AtomicI32::new(70));
    let brightness = BrightnessController::new();
    let current = Arc::clone(&level);
    brightness.set_adjust_callback(move |_, delta| {
        let next = (current.load(Ordering::SeqCst) + *delta).clamp(0, 100);
        current.store(next, Ordering::SeqCst);
        *delta = next;
        true
    });

    let mut broker = Broker::new();
    let sdk = start(
        sdk_with(vec![device("lamp", DeviceKind::Light).with_capability(brightness)]),
        &broker,
    );

    let (frame, _) = broker.request("lamp", "adjustBrightness", json!({"brightnessDelta": 10}));
    broker.send(&frame);

    let out = broker.collect(1, WAIT);
    assert_eq!(out[0]["value"], json!({"brightness": 80}));
    assert_eq!(level.load(Ordering::SeqCst), 80);
    sdk.stop();
}

#[test]
fn failing_callback_answers_device_error() {
    let power = PowerStateController::new();
    power.set_callback(|_, _| false);

    let mut broker = Broker::new();
    let sdk = start(
        sdk_with(vec![device("abc123", DeviceKind::Switch).with_capability(power)]),
        &broker,
    );

    let (frame, _) = broker.request("abc123", "setPowerState", json!({"state": "Off"}));
    broker.send(&frame);

    let out = broker.collect(1, WAIT);
    assert_eq!(out[0]["success"], false);
    assert_eq!(out[0]["message"], "device returned an error");
    sdk.stop();
}

#[test]
fn unknown_device_and_unknown_action_answer_no_handler() {
    let power = PowerStateController::new();
    power.set_callback(|_, _| true);

    let mut broker = Broker::new();
    let sdk = start(
        sdk_with(vec![device("abc123", DeviceKind::Switch).with_capability(power)]),
        &broker,
    );

    let (ghost, _) = broker.request("ghost", "setPowerState", json!({"state": "On"}));
    let (odd, _) = broker.request("abc123", "setVolume", json!({"volume": 3}));
    broker.send(&ghost);
    broker.send(&odd);

    let out = broker.collect(2, WAIT);
    assert_eq!(out.len(), 2);
    for resp in &out {
        assert_eq!(resp["success"], false);
        assert_eq!(resp["message"], "no handler");
    }
    sdk.stop();
}

#[test]
fn invalid_value_still_gets_a_response() {
    let called = Arc::new(AtomicBool::new(false));
    let power = PowerStateController::new();
    let flag = Arc::clone(&called);
    power.set_callback(move |_, _| {
        flag.store(true, Ordering::SeqCst);
        true
    });

    let mut broker = Broker::new();
    let sdk = start(
        sdk_with(vec![device("abc123", DeviceKind::Switch).with_capability(power)]),
        &broker,
    );

    let (frame, _) = broker.request("abc123", "setPowerState", json!({"state": 42}));
    broker.send(&frame);

    let out = broker.collect(1, WAIT);
    assert_eq!(out[0]["success"], false);
    assert!(!called.load(Ordering::SeqCst));
    sdk.stop();
}

#[test]
fn bad_signature_is_dropped_without_response() {
    let calls = Arc::new(AtomicUsize::new(0));
    let power = PowerStateController::new();
    let c = Arc::clone(&calls);
    power.set_callback(move |_, _| {
        c.fetch_add(1, Ordering::SeqCst);
        true
    });

    let broker = Broker::new();
    let sdk = start(
        sdk_with(vec![device("abc123", DeviceKind::Switch).with_capability(power)]),
        &broker,
    );

    let payload = r#"{"action":"setPowerState","createdAt":1700000000,"deviceId":"abc123","replyToken":"rt-x","type":"request","value":{"state":"On"}}"#;
    broker.send(&signed(payload, "not-the-secret"));

    assert!(broker.quiet().is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(sdk.stats().rejected_signature, 1);
    sdk.stop();
}

#[test]
fn instance_requests_route_to_matching_controller() {
    let fan = RangeController::for_instance("fanSpeed").unwrap();
    let swing = RangeController::for_instance("swing").unwrap();
    let fan_hits = Arc::new(AtomicUsize::new(0));
    let swing_hits = Arc::new(AtomicUsize::new(0));
    let f = Arc::clone(&fan_hits);
    fan.set_callback(move |_, _| {
        f.fetch_add(1, Ordering::SeqCst);
        true
    });
    let s = Arc::clone(&swing_hits);
    swing.set_callback(move |_, _| {
        s.fetch_add(1, Ordering::SeqCst);
        true
    });
    let mode = ModeController::for_instance("preset").unwrap();
    mode.set_callback(|_, m| {
        *m = m.to_uppercase();
        true
    });

    let mut broker = Broker::new();
    let sdk = start(
        sdk_with(vec![
            device("ac1", DeviceKind::WindowAc)
                .with_capability(fan)
                .with_capability(swing)
                .with_capability(mode),
        ]),
        &broker,
    );

    let (a, _) = broker.instance_request("ac1", "swing", "setRangeValue", json!({"rangeValue": 2}));
    let (b, _) = broker.instance_request("ac1", "preset", "setMode", json!({"mode": "eco"}));
    broker.send(&a);
    broker.send(&b);

    let out = broker.collect(2, WAIT);
    assert_eq!(fan_hits.load(Ordering::SeqCst), 0);
    assert_eq!(swing_hits.load(Ordering::SeqCst), 1);
    assert_eq!(out[0]["instanceId"], "swing");
    assert_eq!(out[1]["instanceId"], "preset");
    assert_eq!(out[1]["value"], json!({"mode": "ECO"}));
    sdk.stop();
}

#[test]
fn thermostat_mode_round_trip() {
    let mode = Arc::new(Mutex::new(None));
    let thermostat = ThermostatController::new();
    let m = Arc::clone(&mode);
    thermostat.set_callback(move |_, requested| {
        *m.lock().unwrap() = Some(*requested);
        true
    });

    let mut broker = Broker::new();
    let sdk = start(
        sdk_with(vec![device("thermo", DeviceKind::Thermostat).with_capability(thermostat)]),
        &broker,
    );

    let (frame, _) = broker.request("thermo", "setThermostatMode", json!({"thermostatMode": "HEAT"}));
    broker.send(&frame);

    let out = broker.collect(1, WAIT);
    assert_eq!(out[0]["value"], json!({"thermostatMode": "HEAT"}));
    assert_eq!(*mode.lock().unwrap(), Some(ThermostatMode::Heat));
    sdk.stop();
}
