//! Hub endpoint value and the URLs derived from it.

use std::fmt;

use reqwest::Url;

use crate::error::HubError;

/// Immutable URL identifying a remote hub.
///
/// The raw string is kept as supplied; it is only parsed when a derived URL
/// is needed, so a malformed endpoint surfaces as an unreachable endpoint
/// during the probe instead of failing session creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint(String);

impl Endpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn parse(&self) -> Result<Url, HubError> {
        Url::parse(&self.0).map_err(|e| HubError::EndpointUnreachable {
            endpoint: self.0.clone(),
            reason: format!("invalid URL: {e}"),
        })
    }

    /// `<endpoint>/negotiate?negotiateVersion=1`, keeping existing query pairs.
    pub fn negotiate_url(&self) -> Result<Url, HubError> {
        let mut url = self.parse()?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| HubError::EndpointUnreachable {
                endpoint: self.0.clone(),
                reason: "URL cannot have a path".into(),
            })?;
            segments.pop_if_empty().push("negotiate");
        }
        url.query_pairs_mut().append_pair("negotiateVersion", "1");
        Ok(url)
    }

    /// The endpoint with `id=<connection id>` appended, for HTTP transports.
    pub fn connection_url(&self, connection_id: &str) -> Result<Url, HubError> {
        let mut url = self.parse()?;
        url.query_pairs_mut().append_pair("id", connection_id);
        Ok(url)
    }

    /// The connection URL with its scheme rewritten to `ws`/`wss`.
    pub fn websocket_url(&self, connection_id: &str) -> Result<Url, HubError> {
        let mut url = self.connection_url(connection_id)?;
        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            "http" | "ws" => "ws",
            other => {
                return Err(HubError::NegotiationFailed(format!(
                    "cannot open a WebSocket over scheme '{other}'"
                )))
            }
        };
        url.set_scheme(scheme).map_err(|_| {
            HubError::NegotiationFailed(format!("cannot rewrite scheme of {}", self.0))
        })?;
        Ok(url)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Endpoint {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

impl From<String> for Endpoint {
    fn from(url: String) -> Self {
        Self(url)
    }
}
