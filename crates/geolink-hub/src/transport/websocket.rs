//! Full-duplex WebSocket transport.

use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use reqwest::Url;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::debug;

use super::{TextLink, TextSink};
use crate::error::HubError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct WsSink(SplitSink<WsStream, WsMessage>);

#[async_trait]
impl TextSink for WsSink {
    async fn send_text(&mut self, text: String) -> Result<(), HubError> {
        self.0
            .send(WsMessage::Text(text.into()))
            .await
            .map_err(|e| HubError::TransportDropped(format!("WebSocket send: {e}")))
    }

    async fn close(&mut self) {
        let _ = self.0.close().await;
    }
}

/// Open a WebSocket to `url` (already rewritten to `ws`/`wss`).
pub(crate) async fn open(url: Url, access_token: Option<&str>) -> Result<TextLink, HubError> {
    let mut request = url
        .as_str()
        .into_client_request()
        .map_err(|e| HubError::NegotiationFailed(format!("WebSocket request: {e}")))?;
    if let Some(token) = access_token {
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| HubError::NegotiationFailed(format!("invalid access token: {e}")))?;
        request.headers_mut().insert("Authorization", value);
    }

    let (stream, _) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| HubError::NegotiationFailed(format!("WebSocket connect: {e}")))?;
    debug!("WebSocket transport open");

    let (sink, source) = stream.split();
    let source = source
        .filter_map(|frame| async move {
            match frame {
                Ok(WsMessage::Text(text)) => Some(Ok(text.as_str().to_owned())),
                Ok(WsMessage::Binary(bytes)) => Some(
                    String::from_utf8(bytes.to_vec())
                        .map_err(|e| HubError::Protocol(format!("non-UTF-8 frame: {e}"))),
                ),
                Ok(WsMessage::Close(frame)) => {
                    debug!(?frame, "WebSocket closed by server");
                    None
                }
                Ok(_) => None,
                Err(e) => Some(Err(HubError::TransportDropped(format!("WebSocket: {e}")))),
            }
        })
        .boxed();

    Ok(TextLink {
        sink: Box::new(WsSink(sink)),
        source,
    })
}
