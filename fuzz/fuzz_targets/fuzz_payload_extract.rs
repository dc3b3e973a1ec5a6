//! Fuzz target: `extract_payload_text`
//!
//! Drives arbitrary text into the brace-counting payload extractor and
//! asserts that it never panics and that any slice it returns is a
//! brace-delimited substring of the input.
//!
//! cargo fuzz run fuzz_payload_extract

#![no_main]

use libfuzzer_sys::fuzz_target;
use sinric_sdk::protocol::signature::extract_payload_text;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };
    if let Some(payload) = extract_payload_text(text) {
        assert!(payload.starts_with('{') && payload.ends_with('}'));
        assert!(text.contains(payload));
    }
});
