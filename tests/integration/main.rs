//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that drives a full SDK instance over the
//! in-memory transport. All tests run on the host with no network.

mod broker;
mod event_tests;
mod lifecycle_tests;
mod request_tests;
