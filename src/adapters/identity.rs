//! Device identity and entropy.
//!
//! - Station MAC address, reported to the broker in the connect headers
//!   as `AA:BB:CC:DD:EE:FF`.
//! - Random bytes for event reply tokens. Tokens only need to be unlikely
//!   to collide, so the host fallback uses `RandomState` rather than a
//!   cryptographic generator.

use core::fmt::Write;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Colon-separated MAC string, e.g. `DE:AD:BE:EF:CA:FE`.
pub type MacString = heapless::String<17>;

/// Reply token text: a version-4 UUID (36 chars).
pub type TokenString = heapless::String<36>;

/// Read the station MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    // SAFETY: the buffer is exactly the 6 bytes the call writes.
    unsafe {
        esp_idf_svc::sys::esp_read_mac(
            mac.as_mut_ptr(),
            esp_idf_svc::sys::esp_mac_type_t_ESP_MAC_WIFI_STA,
        );
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

/// Format a MAC as upper-case, colon-separated hex.
pub fn format_mac(mac: &MacAddress) -> MacString {
    let mut s = MacString::new();
    let _ = write!(
        s,
        "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    );
    s
}

/// Fill `buf` with random data.
///
/// ESP-IDF: delegates to the hardware RNG via `esp_fill_random`.
#[cfg(target_os = "espidf")]
pub fn fill_random(buf: &mut [u8]) {
    // SAFETY: esp_fill_random writes exactly `len` bytes into the
    // provided buffer, which is valid and exclusively borrowed.
    unsafe {
        esp_idf_svc::sys::esp_fill_random(buf.as_mut_ptr().cast(), buf.len());
    }
}

/// Simulation: `RandomState` seeds are randomised per process and per call.
#[cfg(not(target_os = "espidf"))]
pub fn fill_random(buf: &mut [u8]) {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    for chunk in buf.chunks_mut(8) {
        let mut h = RandomState::new().build_hasher();
        h.write_usize(chunk.as_ptr() as usize);
        let val = h.finish().to_le_bytes();
        let len = chunk.len().min(val.len());
        chunk[..len].copy_from_slice(&val[..len]);
    }
}

/// Generate a fresh reply token in UUID v4 layout.
pub fn reply_token() -> TokenString {
    let mut b = [0u8; 16];
    fill_random(&mut b);
    b[6] = (b[6] & 0x0F) | 0x40;
    b[8] = (b[8] & 0x3F) | 0x80;

    let mut s = TokenString::new();
    for (i, byte) in b.iter().enumerate() {
        if matches!(i, 4 | 6 | 8 | 10) {
            let _ = s.push('-');
        }
        let _ = write!(s, "{byte:02x}");
    }
    s
}
