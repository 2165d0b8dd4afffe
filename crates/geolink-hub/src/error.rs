//! Error taxonomy for hub connectivity and outbound sends.

use std::time::Duration;

/// Failures raised while probing, connecting to, or talking to a hub.
///
/// These never cross the session boundary as panics or `Err` values; the
/// session renders them into its `last_error` diagnostic.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HubError {
    /// The negotiate probe failed (network error or non-success status).
    #[error("hub endpoint not accessible: {endpoint}. The server may be down or the URL is incorrect ({reason})")]
    EndpointUnreachable { endpoint: String, reason: String },

    /// The probe succeeded but no transport could be established.
    #[error("negotiation failed: {0}")]
    NegotiationFailed(String),

    /// An established connection closed unexpectedly.
    #[error("transport dropped: {0}")]
    TransportDropped(String),

    /// The server sent something we could not make sense of.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("{0} timed out after {1:?}")]
    Timeout(&'static str, Duration),
}

/// Outcome of a failed `send`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    /// The session is not in a state that can carry outbound samples.
    #[error("not connected to hub")]
    NotConnected,

    /// The transport rejected or lost the sample.
    #[error("transport failure: {0}")]
    TransportFailure(String),
}
