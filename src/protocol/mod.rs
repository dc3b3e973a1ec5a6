//! Broker protocol stack.
//!
//! ```text
//!  ┌──────────────┐  requests   ┌────────────┐  responses  ┌──────────────┐
//!  │  Transport   │────────────▶│  Receiver  │────────────▶│              │
//!  │ (WebSocket)  │             │  verify +  │             │ OutboundQueue│
//!  │              │◀────────────│  dispatch  │   events    │  (bounded)   │
//!  └──────────────┘   sealed    └────────────┘◀────────────┤              │
//!         ▲           frames                 EventSender   └──────┬───────┘
//!         └───────────────────── SendTask ◀───────────────────────┘
//! ```
//!
//! - [`envelope`]: JSON envelope types, encode/seal/classify
//! - [`signature`]: HMAC-SHA256 signing over raw payload text
//! - [`queue`]: bounded outbound queue
//! - [`rate_limit`]: per-controller event limiter
//! - [`clock`]: broker-synchronised time
//! - [`pipeline`]: receive path, send task, counters
//! - [`transport`]: transport traits and the in-memory transport

pub mod clock;
pub mod envelope;
pub mod pipeline;
pub mod queue;
pub mod rate_limit;
pub mod signature;
pub mod transport;
