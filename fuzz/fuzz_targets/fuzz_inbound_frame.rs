//! Fuzz target: the inbound receive path.
//!
//! Feeds arbitrary frames through `Receiver::handle_frame` with a registered
//! switch. Unsigned garbage must be rejected without panicking and must
//! never reach the application callback.
//!
//! cargo fuzz run fuzz_inbound_frame

#![no_main]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use libfuzzer_sys::fuzz_target;
use sinric_sdk::device::capabilities::PowerStateController;
use sinric_sdk::device::registry::{Device, DeviceKind, Dispatcher, Registry};
use sinric_sdk::protocol::clock::BrokerClock;
use sinric_sdk::protocol::pipeline::{Outbox, PipelineStats, Receiver};

static CALLS: AtomicUsize = AtomicUsize::new(0);

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };

    let power = PowerStateController::new();
    power.set_callback(|_, _| {
        CALLS.fetch_add(1, Ordering::Relaxed);
        true
    });
    let registry = Arc::new(Registry::new());
    if let Ok(device) = Device::new("abc123", DeviceKind::Switch) {
        let _ = registry.register(device.with_capability(power));
    }
    let outbox = Arc::new(Outbox::new());
    let receiver = Receiver::new(
        Dispatcher::new(registry, Arc::clone(&outbox)),
        Arc::clone(&outbox),
        Arc::new(BrokerClock::new()),
        Arc::new(PipelineStats::default()),
        "fuzz-secret".into(),
    );

    let before = CALLS.load(Ordering::Relaxed);
    let _ = receiver.handle_frame(text);
    // A forged HMAC is a 2^-256 event; anything else must not reach the device.
    assert_eq!(CALLS.load(Ordering::Relaxed), before);
    assert!(outbox.queue().is_empty());
});
