//! HTTP long-polling transport, plus the POST sink shared with SSE.

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use tracing::debug;

use super::{TextLink, TextSink};
use crate::error::HubError;

pub(super) fn authorize(request: RequestBuilder, access_token: Option<&str>) -> RequestBuilder {
    match access_token {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

/// Sends each outbound chunk as the body of a POST to the connection URL.
pub(super) struct HttpSink {
    pub(super) client: Client,
    pub(super) url: Url,
    pub(super) access_token: Option<String>,
    /// Long polling tells the server to end the poll with a DELETE.
    pub(super) delete_on_close: bool,
}

#[async_trait]
impl TextSink for HttpSink {
    async fn send_text(&mut self, text: String) -> Result<(), HubError> {
        let request = self
            .client
            .post(self.url.clone())
            .header("Content-Type", "text/plain;charset=UTF-8")
            .body(text);
        let response = authorize(request, self.access_token.as_deref())
            .send()
            .await
            .map_err(|e| HubError::TransportDropped(format!("POST: {e}")))?;
        if !response.status().is_success() {
            return Err(HubError::TransportDropped(format!(
                "POST returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn close(&mut self) {
        if self.delete_on_close {
            let request = self.client.delete(self.url.clone());
            let _ = authorize(request, self.access_token.as_deref()).send().await;
        }
    }
}

struct PollState {
    client: Client,
    url: Url,
    access_token: Option<String>,
    closed: bool,
}

async fn poll_once(state: &PollState) -> Result<Option<String>, HubError> {
    let request = state.client.get(state.url.clone());
    let response = authorize(request, state.access_token.as_deref())
        .send()
        .await
        .map_err(|e| HubError::TransportDropped(format!("poll: {e}")))?;
    match response.status() {
        StatusCode::NO_CONTENT => Ok(None),
        status if status.is_success() => response
            .text()
            .await
            .map(Some)
            .map_err(|e| HubError::TransportDropped(format!("poll body: {e}"))),
        status => Err(HubError::TransportDropped(format!("poll returned {status}"))),
    }
}

/// Start polling `url`. The first poll must succeed for the transport to
/// count as established.
pub(crate) async fn open(
    client: Client,
    url: Url,
    access_token: Option<String>,
) -> Result<TextLink, HubError> {
    let state = PollState {
        client: client.clone(),
        url: url.clone(),
        access_token: access_token.clone(),
        closed: false,
    };
    let first = poll_once(&state)
        .await
        .map_err(|e| HubError::NegotiationFailed(format!("LongPolling: {e}")))?
        .ok_or_else(|| HubError::NegotiationFailed("LongPolling: closed on first poll".into()))?;
    debug!("long-polling transport open");

    let polls = stream::unfold(state, |mut state| async move {
        loop {
            if state.closed {
                return None;
            }
            match poll_once(&state).await {
                Ok(Some(body)) if body.is_empty() => continue,
                Ok(Some(body)) => return Some((Ok(body), state)),
                Ok(None) => {
                    debug!("server ended the long poll");
                    return None;
                }
                Err(e) => {
                    state.closed = true;
                    return Some((Err(e), state));
                }
            }
        }
    });
    let source = stream::iter((!first.is_empty()).then(|| Ok(first)))
        .chain(polls)
        .boxed();

    Ok(TextLink {
        sink: Box::new(HttpSink {
            client,
            url,
            access_token,
            delete_on_close: true,
        }),
        source,
    })
}
