//! Server-sent events transport: a streaming GET for inbound data, POSTs for
//! outbound.

use futures_util::{stream, StreamExt};
use reqwest::{Client, Url};
use tracing::debug;

use super::long_polling::{authorize, HttpSink};
use super::TextLink;
use crate::error::HubError;

/// Incremental `text/event-stream` parser yielding each event's data.
#[derive(Debug, Default)]
pub(crate) struct EventStreamParser {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl EventStreamParser {
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);
            if line.is_empty() {
                if !self.data.is_empty() {
                    events.push(self.data.join("\n"));
                    self.data.clear();
                }
            } else if let Some(value) = line.strip_prefix("data:") {
                self.data.push(value.strip_prefix(' ').unwrap_or(value).to_string());
            }
            // Comments (":") and other fields (event, id, retry) are unused.
        }
        events
    }
}

pub(crate) async fn open(
    client: Client,
    url: Url,
    access_token: Option<String>,
) -> Result<TextLink, HubError> {
    let request = client
        .get(url.clone())
        .header("Accept", "text/event-stream");
    let response = authorize(request, access_token.as_deref())
        .send()
        .await
        .map_err(|e| HubError::NegotiationFailed(format!("ServerSentEvents: {e}")))?;
    if !response.status().is_success() {
        return Err(HubError::NegotiationFailed(format!(
            "ServerSentEvents: server returned {}",
            response.status()
        )));
    }
    debug!("server-sent events transport open");

    let mut parser = EventStreamParser::default();
    let source = response
        .bytes_stream()
        .flat_map(move |chunk| {
            let items: Vec<Result<String, HubError>> = match chunk {
                Ok(bytes) => parser.push(&bytes).into_iter().map(Ok).collect(),
                Err(e) => vec![Err(HubError::TransportDropped(format!(
                    "ServerSentEvents: {e}"
                )))],
            };
            stream::iter(items)
        })
        .boxed();

    Ok(TextLink {
        sink: Box::new(HttpSink {
            client,
            url,
            access_token,
            delete_on_close: false,
        }),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_data_lines_until_blank_line() {
        let mut parser = EventStreamParser::default();
        assert!(parser.push(b"data: {\"type\":6}").is_empty());
        assert!(parser.push(b"\ndata: second\n").is_empty());
        let events = parser.push(b"\n");
        assert_eq!(events, vec!["{\"type\":6}\nsecond".to_string()]);
    }

    #[test]
    fn ignores_comments_and_crlf() {
        let mut parser = EventStreamParser::default();
        let events = parser.push(b":keep-alive\r\n\r\ndata:x\r\n\r\n");
        assert_eq!(events, vec!["x".to_string()]);
    }
}
