//! Monotonic time source.
//!
//! - **`target_os = "espidf"`**: wraps `esp_timer_get_time()` from the
//!   ESP-IDF high-resolution timer (microsecond precision, monotonic).
//! - **`not(target_os = "espidf")`**: uses `std::time::Instant` anchored
//!   at first use, for host-side testing.
//!
//! Rate limiters and the broker clock read time exclusively through
//! [`monotonic_now`], so both behave identically on device and host.

use core::time::Duration;

/// Time elapsed since boot (monotonic).
#[cfg(target_os = "espidf")]
pub fn monotonic_now() -> Duration {
    // SAFETY: esp_timer_get_time has no preconditions once the system
    // timer is running, which ESP-IDF guarantees before app_main.
    let us = unsafe { esp_idf_svc::sys::esp_timer_get_time() };
    Duration::from_micros(us as u64)
}

/// Time elapsed since first use (monotonic).
#[cfg(not(target_os = "espidf"))]
pub fn monotonic_now() -> Duration {
    use std::time::Instant;
    static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
    START.get_or_init(Instant::now).elapsed()
}
