//! Message envelope codec.
//!
//! Wire format (JSON text frames):
//! ```text
//! {
//!   "header":    { "payloadVersion": 2, "signatureVersion": 1 },
//!   "payload":   { "type": "request" | "response" | "event",
//!                  "action", "deviceId", "instanceId"?, "replyToken",
//!                  "clientId"?, "createdAt", "cause"?, "success"?,
//!                  "message"?, "value": { … } },
//!   "signature": { "HMAC": base64(HMAC-SHA256(secret, <payload text>)) }
//! }
//! ```
//!
//! Outbound messages are encoded *unsigned* into the outbound queue and
//! sealed by the send task: [`seal`] stamps `createdAt` with the broker time
//! at transmission and signs the exact payload text it emits.
//!
//! A bare `{"timestamp": …}` frame without a payload is a clock control
//! message, reported by [`classify`] as [`Inbound::Timestamp`].

use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::adapters::identity::reply_token;
use crate::error::{Result, SdkError};

use super::queue::QueueEntry;
use super::signature::{extract_payload_text, sign};

pub const PAYLOAD_VERSION: u32 = 2;
pub const SIGNATURE_VERSION: u32 = 1;

/// Response message for a successfully handled request.
pub const MESSAGE_OK: &str = "OK";
/// Response message when no controller claimed the request.
pub const MESSAGE_NO_HANDLER: &str = "no handler";
/// Response message when the application callback reported failure.
pub const MESSAGE_DEVICE_ERROR: &str = "device returned an error";

// ── Envelope parts ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    pub payload_version: u32,
    pub signature_version: u32,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            payload_version: PAYLOAD_VERSION,
            signature_version: SIGNATURE_VERSION,
        }
    }
}

/// Why an event was generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Cause {
    /// Someone operated the device by hand.
    PhysicalInteraction,
    /// Periodic sensor report.
    PeriodicPoll,
    /// Change requested by voice assistant.
    VoiceInteraction,
    /// Change requested from the app.
    AppInteraction,
    /// Alert-worthy condition (doorbell, alarm).
    Alert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CauseBlock {
    #[serde(rename = "type")]
    pub kind: Cause,
}

/// Inbound command from the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub action: String,
    pub device_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    pub reply_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default)]
    pub created_at: u64,
    #[serde(default)]
    pub value: Value,
}

/// Device answer to a [`Request`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub action: String,
    pub device_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    pub reply_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default)]
    pub created_at: u64,
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub value: Value,
}

impl Response {
    /// Build a response echoing the request's correlation fields verbatim.
    pub fn for_request(req: &Request, success: bool, message: &str, value: Value) -> Self {
        Self {
            action: req.action.clone(),
            device_id: req.device_id.clone(),
            instance_id: req.instance_id.clone(),
            reply_token: req.reply_token.clone(),
            client_id: req.client_id.clone(),
            created_at: 0,
            success,
            message: message.into(),
            value,
        }
    }
}

/// Device-initiated state report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub action: String,
    pub device_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    pub reply_token: String,
    #[serde(default)]
    pub created_at: u64,
    pub cause: CauseBlock,
    #[serde(default)]
    pub value: Value,
}

impl Event {
    /// New event with a fresh reply token. `createdAt` is filled in at send time.
    pub fn new(
        device_id: &str,
        instance_id: Option<&str>,
        action: &str,
        cause: Cause,
        value: Value,
    ) -> Self {
        Self {
            action: action.into(),
            device_id: device_id.into(),
            instance_id: instance_id.map(Into::into),
            reply_token: reply_token().as_str().into(),
            created_at: 0,
            cause: CauseBlock { kind: cause },
            value,
        }
    }
}

/// The `payload` object, tagged by its `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Payload {
    Request(Request),
    Response(Response),
    Event(Event),
}

impl Payload {
    pub fn created_at(&self) -> u64 {
        match self {
            Self::Request(r) => r.created_at,
            Self::Response(r) => r.created_at,
            Self::Event(e) => e.created_at,
        }
    }
}

// ── Encode ───────────────────────────────────────────────────

#[derive(Serialize)]
struct Unsigned<'a> {
    header: Header,
    payload: &'a Payload,
}

/// Serialise a payload into an unsigned queue entry.
pub fn encode(payload: &Payload) -> Result<QueueEntry> {
    serde_json::to_string(&Unsigned {
        header: Header::default(),
        payload,
    })
    .map_err(|_| SdkError::InvalidArgument("payload not serialisable"))
}

/// Stamp `createdAt` and sign an unsigned queue entry, producing wire text.
///
/// The payload is serialised once and the same text is both signed and
/// embedded, so the receiver's extracted bytes match the signed bytes.
pub fn seal(entry: &str, now_unix: u64, secret: &[u8]) -> Result<String> {
    let mut msg: Value =
        serde_json::from_str(entry).map_err(|_| SdkError::Malformed("queue entry"))?;
    let payload = msg
        .get_mut("payload")
        .and_then(Value::as_object_mut)
        .ok_or(SdkError::Malformed("queue entry without payload"))?;
    payload.insert("createdAt".into(), Value::from(now_unix));

    let payload_text = serde_json::to_string(payload)
        .map_err(|_| SdkError::Malformed("payload not serialisable"))?;
    let header_text = match msg.get("header") {
        Some(h) => serde_json::to_string(h).map_err(|_| SdkError::Malformed("header"))?,
        None => serde_json::to_string(&Header::default())
            .map_err(|_| SdkError::Malformed("header"))?,
    };
    let signature = sign(secret, &payload_text);

    Ok(format!(
        r#"{{"header":{header_text},"payload":{payload_text},"signature":{{"HMAC":"{signature}"}}}}"#
    ))
}

// ── Decode ───────────────────────────────────────────────────

#[derive(Deserialize)]
struct SignatureBlock {
    #[serde(rename = "HMAC")]
    hmac: String,
}

#[derive(Deserialize)]
struct Outer {
    #[serde(default)]
    timestamp: Option<u64>,
    #[serde(default)]
    payload: Option<IgnoredAny>,
    #[serde(default)]
    signature: Option<SignatureBlock>,
}

/// First-stage view of an inbound frame.
#[derive(Debug, PartialEq, Eq)]
pub enum Inbound<'a> {
    /// Clock control message (`timestamp` without `payload`).
    Timestamp(u64),
    /// Signed envelope; `payload_text` borrows the raw frame.
    Signed {
        payload_text: &'a str,
        signature: String,
    },
}

/// Split an inbound frame into its control/signed form without decoding the payload.
pub fn classify(raw: &str) -> Result<Inbound<'_>> {
    let outer: Outer = serde_json::from_str(raw).map_err(|_| SdkError::Malformed("not json"))?;

    if outer.payload.is_none() {
        return outer
            .timestamp
            .map(Inbound::Timestamp)
            .ok_or(SdkError::Malformed("no payload"));
    }

    let signature = outer
        .signature
        .ok_or(SdkError::Malformed("no signature"))?
        .hmac;
    let payload_text = extract_payload_text(raw).ok_or(SdkError::Malformed("payload not an object"))?;
    Ok(Inbound::Signed {
        payload_text,
        signature,
    })
}

/// Decode verified payload text.
pub fn decode_payload(payload_text: &str) -> Result<Payload> {
    serde_json::from_str(payload_text).map_err(|_| SdkError::Malformed("payload"))
}

// ── Tests ────────────────────────────────────────────────────
