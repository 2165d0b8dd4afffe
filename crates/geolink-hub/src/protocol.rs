//! Hub wire protocol: negotiation payloads, the JSON hub message framing,
//! and the location payloads riding inside invocations.
//!
//! Every hub message is a JSON object terminated by the ASCII record
//! separator (`0x1E`). A connection starts with a handshake record in each
//! direction; after that, messages are distinguished by their numeric
//! `type` field.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::HubError;

/// Terminator after every JSON record on the wire.
pub const RECORD_SEPARATOR: char = '\u{1e}';

// ---------------------------------------------------------------------------
// Hub method names
// ---------------------------------------------------------------------------

/// Remote method and event names used by the location hub.
pub mod methods {
    /// Server → client: another peer reported a location.
    pub const RECEIVE_LAT_LON: &str = "ReceiveLatLon";
    /// Client → server: publish our location, arguments `(lat, lon, userName)`.
    pub const SEND_LAT_LON: &str = "SendLatLon";
}

// ---------------------------------------------------------------------------
// Location payloads
// ---------------------------------------------------------------------------

/// One location sample from a peer.
///
/// Coordinates are passed through as received; nothing here validates them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationEvent {
    /// Unique identity of the reporting user, e.g. an email address.
    #[serde(rename = "userName")]
    pub peer_id: String,
    pub lat: f64,
    pub lon: f64,
}

impl LocationEvent {
    pub fn new(peer_id: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self {
            peer_id: peer_id.into(),
            lat,
            lon,
        }
    }

    /// Decode the first argument of a `ReceiveLatLon` invocation.
    pub fn from_arguments(arguments: &[Value]) -> Result<Self, HubError> {
        let first = arguments.first().ok_or_else(|| {
            HubError::Protocol(format!("{} invoked without arguments", methods::RECEIVE_LAT_LON))
        })?;
        serde_json::from_value(first.clone()).map_err(|e| {
            HubError::Protocol(format!("malformed {} payload: {e}", methods::RECEIVE_LAT_LON))
        })
    }

    /// Positional arguments for a `SendLatLon` invocation.
    pub fn to_send_arguments(&self) -> Vec<Value> {
        vec![
            Value::from(self.lat),
            Value::from(self.lon),
            Value::from(self.peer_id.clone()),
        ]
    }
}

// ---------------------------------------------------------------------------
// Negotiation
// ---------------------------------------------------------------------------

/// A transport advertised by the negotiate response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableTransport {
    pub transport: String,
    #[serde(default)]
    pub transfer_formats: Vec<String>,
}

/// Body of a successful `POST <endpoint>/negotiate` response.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegotiateResponse {
    #[serde(default)]
    pub connection_id: Option<String>,
    #[serde(default)]
    pub connection_token: Option<String>,
    #[serde(default)]
    pub negotiate_version: u32,
    #[serde(default)]
    pub available_transports: Vec<AvailableTransport>,
    /// Redirect target; when present the client must negotiate again there.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl std::fmt::Debug for NegotiateResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NegotiateResponse")
            .field("connection_id", &self.connection_id)
            .field(
                "connection_token",
                &self.connection_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("negotiate_version", &self.negotiate_version)
            .field("available_transports", &self.available_transports)
            .field("url", &self.url)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("error", &self.error)
            .finish()
    }
}

impl NegotiateResponse {
    /// The id to pass as `?id=` when opening the connection.
    ///
    /// Version 1 servers hand out a separate connection token; version 0
    /// servers only have the connection id.
    pub fn connection_key(&self) -> Option<&str> {
        self.connection_token
            .as_deref()
            .or(self.connection_id.as_deref())
    }

    /// Whether the server advertises `transport` with the text format.
    pub fn supports(&self, transport: &str) -> bool {
        self.available_transports.iter().any(|t| {
            t.transport == transport && t.transfer_formats.iter().any(|f| f == "Text")
        })
    }
}

// ---------------------------------------------------------------------------
// Handshake
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct HandshakeRequest<'a> {
    protocol: &'a str,
    version: u32,
}

#[derive(Debug, Deserialize)]
struct HandshakeResponse {
    #[serde(default)]
    error: Option<String>,
}

/// The handshake record the client sends first on every transport.
pub fn handshake_request() -> String {
    let body = serde_json::to_string(&HandshakeRequest {
        protocol: "json",
        version: 1,
    })
    .unwrap_or_else(|_| r#"{"protocol":"json","version":1}"#.to_string());
    format!("{body}{RECORD_SEPARATOR}")
}

/// Interpret the server's handshake record.
pub fn parse_handshake_response(record: &str) -> Result<(), HubError> {
    let response: HandshakeResponse = serde_json::from_str(record)
        .map_err(|e| HubError::NegotiationFailed(format!("malformed handshake response: {e}")))?;
    match response.error {
        Some(error) => Err(HubError::NegotiationFailed(format!(
            "handshake rejected: {error}"
        ))),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Hub messages
// ---------------------------------------------------------------------------

mod kinds {
    pub const INVOCATION: u64 = 1;
    pub const COMPLETION: u64 = 3;
    pub const PING: u64 = 6;
    pub const CLOSE: u64 = 7;
}

/// A decoded hub message.
#[derive(Debug, Clone, PartialEq)]
pub enum HubMessage {
    Invocation {
        invocation_id: Option<String>,
        target: String,
        arguments: Vec<Value>,
    },
    Completion {
        invocation_id: String,
        result: Option<Value>,
        error: Option<String>,
    },
    Ping,
    Close {
        error: Option<String>,
        allow_reconnect: Option<bool>,
    },
    /// A message kind this client does not act on (streams, acks, ...).
    Other(u64),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMessage {
    #[serde(rename = "type")]
    kind: u64,
    #[serde(default)]
    invocation_id: Option<String>,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    arguments: Vec<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    allow_reconnect: Option<bool>,
}

impl HubMessage {
    /// Serialize to one wire record, separator included.
    pub fn encode(&self) -> String {
        let body = match self {
            HubMessage::Invocation {
                invocation_id,
                target,
                arguments,
            } => {
                let mut obj = serde_json::json!({
                    "type": kinds::INVOCATION,
                    "target": target,
                    "arguments": arguments,
                });
                if let Some(id) = invocation_id {
                    obj["invocationId"] = Value::from(id.clone());
                }
                obj
            }
            HubMessage::Completion {
                invocation_id,
                result,
                error,
            } => {
                let mut obj = serde_json::json!({
                    "type": kinds::COMPLETION,
                    "invocationId": invocation_id,
                });
                if let Some(result) = result {
                    obj["result"] = result.clone();
                }
                if let Some(error) = error {
                    obj["error"] = Value::from(error.clone());
                }
                obj
            }
            HubMessage::Ping => serde_json::json!({ "type": kinds::PING }),
            HubMessage::Close {
                error,
                allow_reconnect,
            } => {
                let mut obj = serde_json::json!({ "type": kinds::CLOSE });
                if let Some(error) = error {
                    obj["error"] = Value::from(error.clone());
                }
                if let Some(allow) = allow_reconnect {
                    obj["allowReconnect"] = Value::from(*allow);
                }
                obj
            }
            HubMessage::Other(kind) => serde_json::json!({ "type": kind }),
        };
        format!("{body}{RECORD_SEPARATOR}")
    }

    /// Decode one record (without its separator).
    pub fn decode(record: &str) -> Result<Self, HubError> {
        let raw: RawMessage = serde_json::from_str(record)
            .map_err(|e| HubError::Protocol(format!("malformed hub message: {e}")))?;
        let message = match raw.kind {
            kinds::INVOCATION => HubMessage::Invocation {
                invocation_id: raw.invocation_id,
                target: raw.target.ok_or_else(|| {
                    HubError::Protocol("invocation without a target".into())
                })?,
                arguments: raw.arguments,
            },
            kinds::COMPLETION => HubMessage::Completion {
                invocation_id: raw.invocation_id.ok_or_else(|| {
                    HubError::Protocol("completion without an invocation id".into())
                })?,
                result: raw.result,
                error: raw.error,
            },
            kinds::PING => HubMessage::Ping,
            kinds::CLOSE => HubMessage::Close {
                error: raw.error,
                allow_reconnect: raw.allow_reconnect,
            },
            other => HubMessage::Other(other),
        };
        Ok(message)
    }
}

// ---------------------------------------------------------------------------
// Record reassembly
// ---------------------------------------------------------------------------

/// Reassembles separator-terminated records from arbitrarily split chunks.
#[derive(Debug, Default)]
pub struct RecordReader {
    partial: String,
}

impl RecordReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns every record it completed, in order.
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        self.partial.push_str(chunk);
        let mut records = Vec::new();
        while let Some(pos) = self.partial.find(RECORD_SEPARATOR) {
            let record: String = self.partial.drain(..=pos).collect();
            let record = record.trim_end_matches(RECORD_SEPARATOR);
            if !record.is_empty() {
                records.push(record.to_string());
            }
        }
        records
    }

    /// Bytes received that are not yet part of a complete record.
    pub fn pending(&self) -> &str {
        &self.partial
    }
}
