//! Unified error type for the SDK.
//!
//! A single `SdkError` enum that every subsystem returns, so application
//! code can match on one type regardless of which layer rejected a call.
//! All variants are `Copy` so they pass through callbacks and log lines
//! without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level SDK error
// ---------------------------------------------------------------------------

/// Every fallible SDK operation funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdkError {
    /// Malformed call into the API (empty id, empty secret, bad config).
    InvalidArgument(&'static str),
    /// No device registered under the requested id.
    NotFound,
    /// A device with the same id is already registered.
    AlreadyRegistered,
    /// The registry already holds the maximum number of devices.
    CapacityExceeded,
    /// The capability's rate limiter rejected the event. Retry later.
    RateLimited,
    /// Inbound message failed HMAC verification and was dropped.
    SignatureInvalid,
    /// The outbound queue is full; the message was not enqueued.
    QueueFull,
    /// The transport link to the broker is down.
    NotConnected,
    /// The send pipeline is not running.
    NotStarted,
    /// Inbound text could not be decoded as an envelope.
    Malformed(&'static str),
    /// The transport refused an operation (connect or send).
    Transport,
}

impl SdkError {
    /// Whether the caller may reasonably retry the same operation later.
    ///
    /// None of these are fatal; the worst case is one dropped message.
    pub const fn is_recoverable(self) -> bool {
        matches!(self, Self::RateLimited | Self::QueueFull | Self::NotConnected)
    }
}

impl fmt::Display for SdkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(what) => write!(f, "invalid argument: {what}"),
            Self::NotFound => write!(f, "device not found"),
            Self::AlreadyRegistered => write!(f, "device already registered"),
            Self::CapacityExceeded => write!(f, "device capacity exceeded"),
            Self::RateLimited => write!(f, "rate limited"),
            Self::SignatureInvalid => write!(f, "signature invalid"),
            Self::QueueFull => write!(f, "outbound queue full"),
            Self::NotConnected => write!(f, "not connected"),
            Self::NotStarted => write!(f, "not started"),
            Self::Malformed(what) => write!(f, "malformed message: {what}"),
            Self::Transport => write!(f, "transport error"),
        }
    }
}

impl core::error::Error for SdkError {}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// SDK-wide `Result` alias.
pub type Result<T> = core::result::Result<T, SdkError>;
