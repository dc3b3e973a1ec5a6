//! Devices and their capabilities.
//!
//! - [`controller`]: the generic [`Controller<S>`](controller::Controller)
//!   and the [`Capability`](controller::Capability) trait devices chain over
//! - [`capabilities`]: the catalogue of capability descriptions
//! - [`registry`]: [`Device`](registry::Device), the bounded
//!   [`Registry`](registry::Registry) and the request
//!   [`Dispatcher`](registry::Dispatcher)

pub mod capabilities;
pub mod controller;
pub mod registry;
