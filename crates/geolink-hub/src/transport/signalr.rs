//! SignalR-style hub transport over HTTP negotiation plus one of three
//! streaming transports.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use reqwest::Client;
use tracing::{debug, info, warn};

use super::long_polling::authorize;
use super::{
    long_polling, sse, websocket, HubLink, HubTransport, HubWriter, Negotiation, TextLink,
    TextSink, TransportKind,
};
use crate::endpoint::Endpoint;
use crate::error::HubError;
use crate::protocol::{
    handshake_request, parse_handshake_response, HubMessage, NegotiateResponse, RecordReader,
};
use crate::session::HubConfig;

/// Negotiate redirects followed before giving up.
const MAX_REDIRECTS: usize = 100;

/// Talks the JSON hub protocol over WebSockets, server-sent events or long
/// polling, in the configured preference order.
#[derive(Debug, Clone)]
pub struct SignalRTransport {
    client: Client,
    probe_timeout: Duration,
    connect_timeout: Duration,
    transports: Vec<TransportKind>,
}

impl SignalRTransport {
    pub fn new(config: &HubConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(client: Client, config: &HubConfig) -> Self {
        Self {
            client,
            probe_timeout: config.probe_timeout,
            connect_timeout: config.connect_timeout,
            transports: config.transports.clone(),
        }
    }

    async fn negotiate_once(
        &self,
        endpoint: &Endpoint,
        access_token: Option<&str>,
    ) -> Result<NegotiateResponse, HubError> {
        let url = endpoint.negotiate_url()?;
        let unreachable = |reason: String| HubError::EndpointUnreachable {
            endpoint: endpoint.to_string(),
            reason,
        };

        debug!(url = %url, "negotiating");
        let request = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .timeout(self.probe_timeout);
        let response = authorize(request, access_token)
            .send()
            .await
            .map_err(|e| unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(unreachable(format!("negotiate returned {status}")));
        }

        response
            .json::<NegotiateResponse>()
            .await
            .map_err(|e| HubError::NegotiationFailed(format!("malformed negotiate response: {e}")))
    }

    async fn open_text_link(
        &self,
        kind: TransportKind,
        negotiation: &Negotiation,
        connection_id: &str,
    ) -> Result<TextLink, HubError> {
        let token = negotiation.access_token.clone();
        match kind {
            TransportKind::WebSockets => {
                let url = negotiation.endpoint.websocket_url(connection_id)?;
                websocket::open(url, token.as_deref()).await
            }
            TransportKind::ServerSentEvents => {
                let url = negotiation.endpoint.connection_url(connection_id)?;
                sse::open(self.client.clone(), url, token).await
            }
            TransportKind::LongPolling => {
                let url = negotiation.endpoint.connection_url(connection_id)?;
                long_polling::open(self.client.clone(), url, token).await
            }
        }
    }

    async fn start(
        &self,
        kind: TransportKind,
        negotiation: &Negotiation,
        connection_id: &str,
    ) -> Result<HubLink, HubError> {
        let link = self.open_text_link(kind, negotiation, connection_id).await?;
        handshake(kind, link).await
    }

    /// Negotiate starting at `start`, following redirects.
    async fn negotiate_from(
        &self,
        start: Endpoint,
        mut access_token: Option<String>,
    ) -> Result<Negotiation, HubError> {
        let mut current = start;

        for _ in 0..MAX_REDIRECTS {
            let response = self.negotiate_once(&current, access_token.as_deref()).await?;
            if let Some(error) = &response.error {
                return Err(HubError::NegotiationFailed(error.clone()));
            }
            match response.url.clone() {
                Some(redirect) => {
                    info!(from = %current, to = %redirect, "negotiate redirected");
                    current = Endpoint::new(redirect);
                    access_token = response.access_token.clone();
                }
                None => {
                    debug!(?response, "negotiate succeeded");
                    return Ok(Negotiation {
                        endpoint: current,
                        response,
                        access_token,
                    });
                }
            }
        }

        Err(HubError::NegotiationFailed(format!(
            "more than {MAX_REDIRECTS} negotiate redirects"
        )))
    }
}

#[async_trait]
impl HubTransport for SignalRTransport {
    async fn negotiate(&self, endpoint: &Endpoint) -> Result<Negotiation, HubError> {
        self.negotiate_from(endpoint.clone(), None).await
    }

    async fn connect(&self, negotiation: &Negotiation) -> Result<HubLink, HubError> {
        let mut current = negotiation.clone();
        let mut needs_fresh_token = false;
        let mut failures = Vec::new();

        for kind in &self.transports {
            // A failed start burns the connection token.
            if needs_fresh_token {
                debug!(transport = %kind, "renegotiating before next transport");
                match self
                    .negotiate_from(current.endpoint.clone(), current.access_token.clone())
                    .await
                {
                    Ok(fresh) => {
                        current = fresh;
                        needs_fresh_token = false;
                    }
                    Err(e) => {
                        warn!(error = %e, "renegotiation failed");
                        failures.push(format!("renegotiate: {e}"));
                        break;
                    }
                }
            }

            if !current.response.supports(kind.wire_name()) {
                debug!(transport = %kind, "transport not offered by server");
                failures.push(format!("{kind}: not offered by server"));
                continue;
            }
            let connection_id = current
                .response
                .connection_key()
                .ok_or_else(|| {
                    HubError::NegotiationFailed("negotiate response carried no connection id".into())
                })?
                .to_string();

            match tokio::time::timeout(
                self.connect_timeout,
                self.start(*kind, &current, &connection_id),
            )
            .await
            {
                Ok(Ok(link)) => {
                    info!(transport = %kind, endpoint = %current.endpoint, "hub link established");
                    return Ok(link);
                }
                Ok(Err(e)) => {
                    warn!(transport = %kind, error = %e, "transport failed, trying next");
                    failures.push(format!("{kind}: {e}"));
                    needs_fresh_token = true;
                }
                Err(_elapsed) => {
                    let e = HubError::Timeout("transport start", self.connect_timeout);
                    warn!(transport = %kind, error = %e, "transport failed, trying next");
                    failures.push(format!("{kind}: {e}"));
                    needs_fresh_token = true;
                }
            }
        }

        Err(HubError::NegotiationFailed(format!(
            "unable to connect with any transport ({})",
            failures.join("; ")
        )))
    }
}

// ---------------------------------------------------------------------------
// Handshake + framing
// ---------------------------------------------------------------------------

struct RecordWriter {
    sink: Box<dyn TextSink>,
}

#[async_trait]
impl HubWriter for RecordWriter {
    async fn write(&mut self, message: &HubMessage) -> Result<(), HubError> {
        self.sink.send_text(message.encode()).await
    }

    async fn close(&mut self) {
        self.sink.close().await;
    }
}

struct Decoder {
    source: BoxStream<'static, Result<String, HubError>>,
    reader: RecordReader,
    queued: VecDeque<String>,
}

/// Exchange handshake records, then expose the link as hub messages.
async fn handshake(kind: TransportKind, link: TextLink) -> Result<HubLink, HubError> {
    let TextLink { mut sink, mut source } = link;
    sink.send_text(handshake_request()).await?;

    let mut reader = RecordReader::new();
    let mut queued = VecDeque::new();
    loop {
        match source.next().await {
            Some(Ok(chunk)) => {
                let mut records = reader.push(&chunk).into_iter();
                if let Some(first) = records.next() {
                    parse_handshake_response(&first)?;
                    queued.extend(records);
                    break;
                }
            }
            Some(Err(e)) => return Err(e),
            None => {
                return Err(HubError::NegotiationFailed(
                    "connection closed during handshake".into(),
                ))
            }
        }
    }
    debug!(transport = %kind, "handshake complete");

    let decoder = Decoder {
        source,
        reader,
        queued,
    };
    let reader = stream::unfold(decoder, |mut decoder| async move {
        loop {
            if let Some(record) = decoder.queued.pop_front() {
                return Some((HubMessage::decode(&record), decoder));
            }
            match decoder.source.next().await {
                Some(Ok(chunk)) => {
                    let records = decoder.reader.push(&chunk);
                    decoder.queued.extend(records);
                }
                Some(Err(e)) => return Some((Err(e), decoder)),
                None => return None,
            }
        }
    })
    .boxed();

    Ok(HubLink {
        transport: kind,
        writer: Box::new(RecordWriter { sink }),
        reader,
    })
}
