//! Real-time location relay core.
//!
//! A [`HubSession`] owns one logical connection to a remote hub: it probes
//! the endpoint, negotiates a streaming transport, reconnects with bounded
//! random backoff after a drop, and falls back to a synthetic event
//! generator when the hub cannot be reached. Inbound location events are
//! fanned out to subscribers; the [`PresenceTracker`] folds them into a live
//! peer set where silent peers expire.

pub mod endpoint;
pub mod error;
pub mod mock;
pub mod presence;
pub mod protocol;
pub mod session;
pub mod sharing;
pub mod transport;

mod ticker;

pub use endpoint::Endpoint;
pub use error::{HubError, SendError};
pub use mock::{MockConfig, MOCK_PEER_ID};
pub use presence::{PeerRecord, PresenceConfig, PresenceTracker};
pub use protocol::LocationEvent;
pub use session::{
    ConnectionState, HubConfig, HubSession, ReconnectPolicy, SessionStatus, SubscriptionId,
};
pub use sharing::{
    LocationSharer, LocationSource, SharingConfig, SharingError, SharingStats, SimulatedSource,
};
pub use transport::{
    HubLink, HubTransport, HubWriter, MessageStream, Negotiation, SignalRTransport, TransportKind,
};
