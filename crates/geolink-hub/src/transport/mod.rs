//! Transport seam between the session state machine and the network.
//!
//! The session only ever talks to a [`HubTransport`]: one call to probe the
//! endpoint (`negotiate`), one to open a message-level link (`connect`).
//! [`SignalRTransport`] is the real implementation; tests substitute an
//! in-memory one.

mod long_polling;
mod signalr;
mod sse;
mod websocket;

use std::fmt;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::endpoint::Endpoint;
use crate::error::HubError;
use crate::protocol::{HubMessage, NegotiateResponse};

pub use signalr::SignalRTransport;

// ---------------------------------------------------------------------------
// Transport kinds
// ---------------------------------------------------------------------------

/// Streaming transports a hub may offer, richest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportKind {
    WebSockets,
    ServerSentEvents,
    LongPolling,
}

impl TransportKind {
    /// Preference order used when the caller does not restrict transports.
    pub const ALL: [TransportKind; 3] = [
        TransportKind::WebSockets,
        TransportKind::ServerSentEvents,
        TransportKind::LongPolling,
    ];

    /// Name used in the negotiate response's `availableTransports`.
    pub fn wire_name(self) -> &'static str {
        match self {
            TransportKind::WebSockets => "WebSockets",
            TransportKind::ServerSentEvents => "ServerSentEvents",
            TransportKind::LongPolling => "LongPolling",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

// ---------------------------------------------------------------------------
// Negotiation + links
// ---------------------------------------------------------------------------

/// Result of a successful probe: where to connect and with what id.
#[derive(Debug, Clone)]
pub struct Negotiation {
    /// Endpoint after following any negotiate redirects.
    pub endpoint: Endpoint,
    pub response: NegotiateResponse,
    /// Bearer token handed out by a redirecting negotiate response.
    pub access_token: Option<String>,
}

/// Inbound hub messages, in the order the server produced them.
pub type MessageStream = BoxStream<'static, Result<HubMessage, HubError>>;

/// Outbound half of an established link.
#[async_trait]
pub trait HubWriter: Send {
    async fn write(&mut self, message: &HubMessage) -> Result<(), HubError>;

    /// Best-effort shutdown; errors are swallowed.
    async fn close(&mut self);
}

/// A handshaken, message-level connection to the hub.
pub struct HubLink {
    pub transport: TransportKind,
    pub writer: Box<dyn HubWriter>,
    pub reader: MessageStream,
}

impl fmt::Debug for HubLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubLink")
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}

/// Something that can probe a hub endpoint and open links to it.
#[async_trait]
pub trait HubTransport: Send + Sync + 'static {
    /// Lightweight probe of `<endpoint>/negotiate`.
    ///
    /// Network failures and non-success statuses are
    /// [`HubError::EndpointUnreachable`].
    async fn negotiate(&self, endpoint: &Endpoint) -> Result<Negotiation, HubError>;

    /// Open a streaming link using the outcome of `negotiate`, falling back
    /// across transports. Failure is [`HubError::NegotiationFailed`].
    async fn connect(&self, negotiation: &Negotiation) -> Result<HubLink, HubError>;
}

// ---------------------------------------------------------------------------
// Raw text links (internal)
// ---------------------------------------------------------------------------

/// Outbound side of a transport before any hub framing is applied.
#[async_trait]
pub(crate) trait TextSink: Send {
    async fn send_text(&mut self, text: String) -> Result<(), HubError>;
    async fn close(&mut self);
}

/// A raw transport connection: text chunks in, text chunks out.
///
/// Chunks carry no framing guarantees; records may be split or batched.
pub(crate) struct TextLink {
    pub(crate) sink: Box<dyn TextSink>,
    pub(crate) source: BoxStream<'static, Result<String, HubError>>,
}
