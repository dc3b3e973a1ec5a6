//! Application events → rate limiter → queue → signed frames.

use std::time::Duration;

use serde_json::json;
use sinric_sdk::SdkError;
use sinric_sdk::device::capabilities::{
    BrightnessController, Climate, DoorbellButton, PowerStateController, TemperatureSensor,
};
use sinric_sdk::device::registry::DeviceKind;
use sinric_sdk::protocol::envelope::Cause;

use crate::broker::{Broker, device, sdk_with, start};

const WAIT: Duration = Duration::from_secs(2);

#[test]
fn second_event_within_interval_is_rate_limited() {
    let power = PowerStateController::new();
    let broker = Broker::new();
    let sdk = start(
        sdk_with(vec![device("abc123", DeviceKind::Switch).with_capability(power.clone())]),
        &broker,
    );
    let events = sdk.event_sender();

    assert_eq!(power.send_event(&events, "abc123", true, Cause::PhysicalInteraction), Ok(()));
    std::thread::sleep(Duration::from_millis(500));
    assert_eq!(
        power.send_event(&events, "abc123", false, Cause::PhysicalInteraction),
        Err(SdkError::RateLimited)
    );

    let out = broker.collect(1, WAIT);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0]["type"], "event");
    assert_eq!(out[0]["action"], "setPowerState");
    assert_eq!(out[0]["cause"]["type"], "PHYSICAL_INTERACTION");
    assert_eq!(out[0]["value"], json!({"state": "On"}));
    assert!(broker.quiet().is_empty());
    sdk.stop();
}

#[test]
fn limiters_are_per_controller() {
    let power = PowerStateController::new();
    let brightness = BrightnessController::new();
    let broker = Broker::new();
    let sdk = start(
        sdk_with(vec![
            device("lamp", DeviceKind::Light)
                .with_capability(power.clone())
                .with_capability(brightness.clone()),
        ]),
        &broker,
    );
    let events = sdk.event_sender();

    power.send_event(&events, "lamp", true, Cause::AppInteraction).unwrap();
    brightness.send_event(&events, "lamp", 80, Cause::AppInteraction).unwrap();

    let out = broker.collect(2, WAIT);
    assert_eq!(out.len(), 2);
    assert_eq!(out[1]["value"], json!({"brightness": 80}));
    sdk.stop();
}

#[test]
fn events_carry_broker_time_and_fresh_tokens() {
    let bell = DoorbellButton::new();
    let broker = Broker::new();
    let sdk = start(
        sdk_with(vec![device("door", DeviceKind::Doorbell).with_capability(bell.clone())]),
        &broker,
    );
    broker.send(r#"{"timestamp":1700000600}"#);

    let events = sdk.event_sender();
    bell.send_event(&events, "door", (), Cause::PhysicalInteraction).unwrap();

    let out = broker.collect(1, WAIT);
    let created = out[0]["createdAt"].as_u64().unwrap();
    assert!((1_700_000_600..=1_700_000_602).contains(&created));
    assert_eq!(out[0]["action"], "DoorbellPress");
    assert_eq!(out[0]["value"], json!({"state": "pressed"}));
    assert_eq!(out[0]["replyToken"].as_str().unwrap().len(), 36);
    sdk.stop();
}

#[test]
fn sensor_preset_allows_one_reading_per_minute() {
    let sensor = TemperatureSensor::new();
    let broker = Broker::new();
    let sdk = start(
        sdk_with(vec![
            device("t1", DeviceKind::TemperatureSensor).with_capability(sensor.clone()),
        ]),
        &broker,
    );
    let events = sdk.event_sender();
    let reading = Climate { temperature: 21.5, humidity: Some(40.0) };

    sensor.send_event(&events, "t1", reading, Cause::PeriodicPoll).unwrap();
    std::thread::sleep(Duration::from_millis(1100));
    assert_eq!(
        sensor.send_event(&events, "t1", reading, Cause::PeriodicPoll),
        Err(SdkError::RateLimited)
    );

    let out = broker.collect(1, WAIT);
    assert_eq!(out[0]["action"], "currentTemperature");
    assert_eq!(out[0]["value"], json!({"temperature": 21.5, "humidity": 40.0}));
    sdk.stop();
}

#[test]
fn events_refused_while_link_is_down() {
    let power = PowerStateController::new();
    let broker = Broker::new();
    let sdk = start(
        sdk_with(vec![device("abc123", DeviceKind::Switch).with_capability(power.clone())]),
        &broker,
    );
    let events = sdk.event_sender();

    broker.transport.drop_link();
    assert!(!sdk.is_connected());
    assert_eq!(
        power.send_event(&events, "abc123", true, Cause::PhysicalInteraction),
        Err(SdkError::NotConnected)
    );
    assert!(broker.quiet().is_empty());
    sdk.stop();
}

#[test]
fn refused_event_does_not_spend_the_interval() {
    let power = PowerStateController::new();
    let broker = Broker::new();
    let sdk = start(
        sdk_with(vec![device("abc123", DeviceKind::Switch).with_capability(power.clone())]),
        &broker,
    );

    broker.transport.drop_link();
    assert_eq!(
        power.send_event(&sdk.event_sender(), "abc123", true, Cause::PhysicalInteraction),
        Err(SdkError::NotConnected)
    );

    let broker = Broker::new();
    let sdk = start(sdk.stop(), &broker);
    assert_eq!(
        power.send_event(&sdk.event_sender(), "abc123", true, Cause::PhysicalInteraction),
        Ok(())
    );
    assert_eq!(broker.collect(1, WAIT).len(), 1);
    sdk.stop();
}

#[test]
fn absurd_broker_time_does_not_stall_sending() {
    let power = PowerStateController::new();
    let broker = Broker::new();
    let sdk = start(
        sdk_with(vec![device("abc123", DeviceKind::Switch).with_capability(power.clone())]),
        &broker,
    );

    broker.send(r#"{"timestamp":18446744073709551615}"#);
    std::thread::sleep(Duration::from_millis(1100));
    power
        .send_event(&sdk.event_sender(), "abc123", true, Cause::PhysicalInteraction)
        .unwrap();

    let out = broker.collect(1, WAIT);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0]["createdAt"].as_u64(), Some(u64::MAX));
    assert_eq!(sdk.stats().sent, 1);
    sdk.stop();
}

#[test]
fn send_failures_are_counted_not_retried() {
    let power = PowerStateController::new();
    let broker = Broker::new();
    let sdk = start(
        sdk_with(vec![device("abc123", DeviceKind::Switch).with_capability(power.clone())]),
        &broker,
    );
    broker.transport.set_fail_sends(true);

    power
        .send_event(&sdk.event_sender(), "abc123", true, Cause::PhysicalInteraction)
        .unwrap();
    std::thread::sleep(Duration::from_millis(150));
    assert_eq!(sdk.stats().send_failed, 1);

    broker.transport.set_fail_sends(false);
    assert!(broker.quiet().is_empty());
    sdk.stop();
}
