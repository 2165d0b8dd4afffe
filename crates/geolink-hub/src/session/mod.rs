//! Transport session manager.
//!
//! `open` → probe (`TestingEndpoint`) → connect (`Connecting`) → `Connected`.
//! A failed probe or connect lands in `Failed` and arms a one-shot switch to
//! `MockActive`. A dropped link goes to `Reconnecting` with a bounded number
//! of randomly delayed attempts before giving up in `Disconnected`.

mod actor;
mod client;
mod subscribers;
mod types;

#[cfg(test)]
mod tests;

pub use client::HubSession;
pub use types::{ConnectionState, HubConfig, ReconnectPolicy, SessionStatus, SubscriptionId};
