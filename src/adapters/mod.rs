//! Adapters: platform services behind plain functions and the transport trait.
//!
//! | Adapter        | Provides                     | Backed by (espidf / host)          |
//! |----------------|------------------------------|------------------------------------|
//! | `time`         | monotonic clock, uptime      | `esp_timer` / `std::time::Instant` |
//! | `identity`     | MAC, random bytes, tokens    | eFuse + RNG / fixed MAC + hasher   |
//! | `ws_transport` | [`Transport`](crate::protocol::transport::Transport) | ESP-IDF WebSocket client (espidf only) |

pub mod identity;
pub mod time;

#[cfg(target_os = "espidf")]
pub mod ws_transport;
