use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};

use super::*;
use crate::endpoint::Endpoint;
use crate::error::{HubError, SendError};
use crate::mock::{MockConfig, MOCK_PEER_ID};
use crate::protocol::{methods, HubMessage, LocationEvent, NegotiateResponse};
use crate::transport::{HubLink, HubTransport, HubWriter, Negotiation, TransportKind};

const ENDPOINT: &str = "https://hub.test/Hub";

// ---------------------------------------------------------------------------
// In-memory hub
// ---------------------------------------------------------------------------

/// Server side of one fake link.
struct FakeServer {
    inbound: mpsc::UnboundedSender<Result<HubMessage, HubError>>,
    sent: Arc<Mutex<Vec<HubMessage>>>,
    closed: Arc<AtomicBool>,
    stalled: Arc<AtomicBool>,
}

impl FakeServer {
    fn link() -> (FakeServer, HubLink) {
        let (inbound, rx) = mpsc::unbounded_channel();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let stalled = Arc::new(AtomicBool::new(false));
        let reader = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|message| (message, rx))
        })
        .boxed();
        let link = HubLink {
            transport: TransportKind::WebSockets,
            writer: Box::new(FakeWriter {
                sent: Arc::clone(&sent),
                closed: Arc::clone(&closed),
                stalled: Arc::clone(&stalled),
            }),
            reader,
        };
        (
            FakeServer {
                inbound,
                sent,
                closed,
                stalled,
            },
            link,
        )
    }

    fn push(&self, message: HubMessage) {
        let _ = self.inbound.send(Ok(message));
    }

    fn location(&self, peer: &str, lat: f64, lon: f64) {
        self.push(HubMessage::Invocation {
            invocation_id: None,
            target: methods::RECEIVE_LAT_LON.into(),
            arguments: vec![serde_json::json!({ "userName": peer, "lat": lat, "lon": lon })],
        });
    }

    /// Make every later write hang forever.
    fn stall(&self) {
        self.stalled.store(true, Ordering::SeqCst);
    }

    fn sent(&self) -> Vec<HubMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Invocation id of the most recent outbound `SendLatLon`.
    fn last_send_id(&self) -> String {
        self.sent()
            .into_iter()
            .rev()
            .find_map(|message| match message {
                HubMessage::Invocation {
                    invocation_id: Some(id),
                    target,
                    ..
                } if target == methods::SEND_LAT_LON => Some(id),
                _ => None,
            })
            .expect("no SendLatLon invocation")
    }

    fn complete(&self, invocation_id: String, error: Option<&str>) {
        self.push(HubMessage::Completion {
            invocation_id,
            result: None,
            error: error.map(str::to_string),
        });
    }
}

struct FakeWriter {
    sent: Arc<Mutex<Vec<HubMessage>>>,
    closed: Arc<AtomicBool>,
    stalled: Arc<AtomicBool>,
}

#[async_trait]
impl HubWriter for FakeWriter {
    async fn write(&mut self, message: &HubMessage) -> Result<(), HubError> {
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.closed.load(Ordering::SeqCst) {
            return Err(HubError::TransportDropped("writer closed".into()));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct FakeTransport {
    reachable: bool,
    links: Mutex<VecDeque<HubLink>>,
    negotiate_calls: AtomicUsize,
    connect_attempts: Mutex<Vec<Instant>>,
}

impl FakeTransport {
    fn unreachable() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Reachable hub handing out `links` in order; later connects fail.
    fn serving(links: Vec<HubLink>) -> Arc<Self> {
        Arc::new(Self {
            reachable: true,
            links: Mutex::new(links.into()),
            ..Self::default()
        })
    }

    fn connect_attempts(&self) -> Vec<Instant> {
        self.connect_attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl HubTransport for FakeTransport {
    async fn negotiate(&self, endpoint: &Endpoint) -> Result<Negotiation, HubError> {
        self.negotiate_calls.fetch_add(1, Ordering::SeqCst);
        if !self.reachable {
            return Err(HubError::EndpointUnreachable {
                endpoint: endpoint.to_string(),
                reason: "connection refused".into(),
            });
        }
        Ok(Negotiation {
            endpoint: endpoint.clone(),
            response: NegotiateResponse::default(),
            access_token: None,
        })
    }

    async fn connect(&self, _negotiation: &Negotiation) -> Result<HubLink, HubError> {
        self.connect_attempts.lock().unwrap().push(Instant::now());
        self.links
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| HubError::NegotiationFailed("no transport could be started".into()))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Let the session task run until it blocks, without advancing time.
async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

fn record(session: &HubSession) -> Arc<Mutex<Vec<LocationEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    session.on_location_received(move |event| sink.lock().unwrap().push(event.clone()));
    events
}

fn mock_config() -> HubConfig {
    HubConfig {
        start_in_mock_mode: true,
        ..HubConfig::default()
    }
}

async fn connected_session(links: Vec<HubLink>) -> (HubSession, Arc<FakeTransport>) {
    let transport = FakeTransport::serving(links);
    let session = HubSession::open(ENDPOINT, HubConfig::default(), transport.clone());
    settle().await;
    assert_eq!(session.state(), ConnectionState::Connected);
    (session, transport)
}

fn in_reconnect_window(delay: Duration) -> bool {
    delay >= Duration::from_millis(2000) && delay < Duration::from_millis(12000)
}

// ---------------------------------------------------------------------------
// Probe, connect, fallback
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn unreachable_endpoint_fails_then_falls_back_to_mock() {
    let session = HubSession::open(ENDPOINT, HubConfig::default(), FakeTransport::unreachable());
    assert_eq!(session.state(), ConnectionState::TestingEndpoint);
    assert!(!session.is_connected());
    let events = record(&session);

    settle().await;
    let status = session.status();
    assert_eq!(status.state, ConnectionState::Failed);
    assert!(!status.is_connected());
    let error = status.last_error.expect("failure must be reported");
    assert!(error.starts_with("Connection failed:"), "{error}");
    assert!(error.contains(ENDPOINT), "{error}");

    sleep(Duration::from_millis(1999)).await;
    assert_eq!(session.state(), ConnectionState::Failed);

    sleep(Duration::from_millis(2)).await;
    settle().await;
    let status = session.status();
    assert_eq!(status.state, ConnectionState::MockActive);
    assert!(status.is_connected());
    assert!(status.mock_mode);
    assert_eq!(status.last_error, None);

    sleep(Duration::from_millis(3000)).await;
    settle().await;
    assert_eq!(events.lock().unwrap().len(), 1);
    assert_eq!(events.lock().unwrap()[0].peer_id, MOCK_PEER_ID);

    sleep(Duration::from_millis(6000)).await;
    settle().await;
    assert_eq!(events.lock().unwrap().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn failed_connect_also_falls_back_to_mock() {
    let session = HubSession::open(ENDPOINT, HubConfig::default(), FakeTransport::serving(vec![]));
    settle().await;
    assert_eq!(session.state(), ConnectionState::Failed);
    assert!(session
        .last_error()
        .unwrap()
        .contains("negotiation failed"));

    sleep(Duration::from_millis(2001)).await;
    settle().await;
    assert_eq!(session.state(), ConnectionState::MockActive);
}

#[tokio::test(start_paused = true)]
async fn connected_session_delivers_events_in_order() {
    let (server, link) = FakeServer::link();
    let (session, _transport) = connected_session(vec![link]).await;
    let status = session.status();
    assert!(status.is_connected());
    assert_eq!(status.transport, Some(TransportKind::WebSockets));
    assert_eq!(status.last_error, None);

    let events = record(&session);
    let other = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&other);
    session.subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    server.location("a@x.com", 1.0, 2.0);
    server.location("b@x.com", 3.0, 4.0);
    server.location("a@x.com", 5.0, 6.0);
    settle().await;

    let events = events.lock().unwrap();
    let peers: Vec<&str> = events.iter().map(|e| e.peer_id.as_str()).collect();
    assert_eq!(peers, ["a@x.com", "b@x.com", "a@x.com"]);
    assert_eq!(events[2], LocationEvent::new("a@x.com", 5.0, 6.0));
    assert_eq!(other.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn malformed_inbound_messages_are_ignored() {
    let (server, link) = FakeServer::link();
    let (session, _transport) = connected_session(vec![link]).await;
    let events = record(&session);

    server.push(HubMessage::Invocation {
        invocation_id: None,
        target: methods::RECEIVE_LAT_LON.into(),
        arguments: vec![],
    });
    let _ = server
        .inbound
        .send(Err(HubError::Protocol("malformed hub message".into())));
    server.push(HubMessage::Other(4));
    server.location("a@x.com", 1.0, 1.0);
    settle().await;

    assert_eq!(session.state(), ConnectionState::Connected);
    assert_eq!(events.lock().unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// Reconnect
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn drop_then_three_failed_reconnects_ends_disconnected() {
    let (server, link) = FakeServer::link();
    let (session, transport) = connected_session(vec![link]).await;

    let dropped_at = Instant::now();
    drop(server);
    settle().await;
    let status = session.status();
    assert_eq!(status.state, ConnectionState::Reconnecting);
    assert!(!status.is_connected());
    assert_eq!(status.reconnect_attempt, 1);
    assert_eq!(
        status.last_error.as_deref(),
        Some("Connection lost, attempting to reconnect...")
    );

    sleep(Duration::from_secs(40)).await;
    settle().await;
    let status = session.status();
    assert_eq!(status.state, ConnectionState::Disconnected);
    assert!(!status.last_error.unwrap_or_default().is_empty());

    let attempts = transport.connect_attempts();
    assert_eq!(attempts.len(), 4, "initial connect plus three reconnects");
    let mut previous = dropped_at;
    for attempt in &attempts[1..] {
        let delay = *attempt - previous;
        assert!(in_reconnect_window(delay), "delay {delay:?} out of window");
        previous = *attempt;
    }

    sleep(Duration::from_secs(60)).await;
    settle().await;
    assert_eq!(transport.connect_attempts().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn successful_reconnect_restores_connection() {
    let (first, link1) = FakeServer::link();
    let (second, link2) = FakeServer::link();
    let (session, _transport) = connected_session(vec![link1, link2]).await;
    let events = record(&session);

    drop(first);
    settle().await;
    assert_eq!(session.state(), ConnectionState::Reconnecting);

    sleep(Duration::from_millis(12000)).await;
    settle().await;
    let status = session.status();
    assert_eq!(status.state, ConnectionState::Connected);
    assert_eq!(status.last_error, None);
    assert_eq!(status.reconnect_attempt, 0);

    second.location("b@x.com", 7.0, 8.0);
    settle().await;
    assert_eq!(events.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn server_close_without_reconnect_disconnects() {
    let (server, link) = FakeServer::link();
    let (session, transport) = connected_session(vec![link]).await;

    server.push(HubMessage::Close {
        error: Some("bye".into()),
        allow_reconnect: Some(false),
    });
    settle().await;
    assert_eq!(session.state(), ConnectionState::Disconnected);
    assert_eq!(session.last_error().as_deref(), Some("Connection closed: bye"));

    sleep(Duration::from_secs(60)).await;
    settle().await;
    assert_eq!(session.state(), ConnectionState::Disconnected);
    assert_eq!(transport.connect_attempts().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn keepalive_pings_and_server_silence_triggers_reconnect() {
    let (server, link) = FakeServer::link();
    let (session, _transport) = connected_session(vec![link]).await;

    sleep(Duration::from_millis(15_001)).await;
    settle().await;
    assert!(server.sent().contains(&HubMessage::Ping));

    sleep(Duration::from_millis(14_000)).await;
    server.push(HubMessage::Ping);
    settle().await;

    sleep(Duration::from_millis(25_000)).await;
    settle().await;
    assert_eq!(session.state(), ConnectionState::Connected);

    sleep(Duration::from_millis(6_000)).await;
    settle().await;
    assert_eq!(session.state(), ConnectionState::Reconnecting);
}

// ---------------------------------------------------------------------------
// Send
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn send_while_not_connected_is_rejected_without_io() {
    let session = HubSession::open(ENDPOINT, HubConfig::default(), FakeTransport::unreachable());
    settle().await;
    assert_eq!(session.state(), ConnectionState::Failed);

    let result = session.send(1.0, 2.0, "a@x.com").await;
    assert_eq!(result, Err(SendError::NotConnected));
    assert_eq!(
        session.last_error().as_deref(),
        Some("Cannot send location: not connected to hub")
    );
    assert_eq!(session.state(), ConnectionState::Failed);
}

#[tokio::test(start_paused = true)]
async fn send_in_mock_mode_succeeds_trivially() {
    let session = HubSession::open(ENDPOINT, mock_config(), FakeTransport::unreachable());
    settle().await;
    assert_eq!(session.state(), ConnectionState::MockActive);
    assert_eq!(session.send(1.0, 2.0, "a@x.com").await, Ok(()));
}

#[tokio::test(start_paused = true)]
async fn send_awaits_hub_completion() {
    let (server, link) = FakeServer::link();
    let (session, _transport) = connected_session(vec![link]).await;

    let sender = session.clone();
    let pending = tokio::spawn(async move { sender.send(1.5, 2.5, "a@x.com").await });
    settle().await;
    assert!(!pending.is_finished());

    let invocation = server.last_send_id();
    let sent = server.sent();
    let Some(HubMessage::Invocation { arguments, .. }) = sent.last() else {
        panic!("expected an invocation, got {sent:?}");
    };
    assert_eq!(
        arguments,
        &vec![
            serde_json::json!(1.5),
            serde_json::json!(2.5),
            serde_json::json!("a@x.com")
        ]
    );

    server.complete(invocation, None);
    assert_eq!(pending.await.unwrap(), Ok(()));

    let sender = session.clone();
    let rejected = tokio::spawn(async move { sender.send(0.0, 0.0, "a@x.com").await });
    settle().await;
    server.complete(server.last_send_id(), Some("rejected"));
    assert_eq!(
        rejected.await.unwrap(),
        Err(SendError::TransportFailure("rejected".into()))
    );
    assert_eq!(session.last_error().as_deref(), Some("Send failed: rejected"));
    assert_eq!(session.state(), ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn pending_send_fails_when_link_drops() {
    let (server, link) = FakeServer::link();
    let (session, _transport) = connected_session(vec![link]).await;

    let sender = session.clone();
    let pending = tokio::spawn(async move { sender.send(1.0, 1.0, "a@x.com").await });
    settle().await;
    drop(server);

    let result = pending.await.unwrap();
    assert!(matches!(result, Err(SendError::TransportFailure(_))), "{result:?}");
    assert_eq!(session.state(), ConnectionState::Reconnecting);
}

#[tokio::test(start_paused = true)]
async fn pending_send_fails_not_connected_on_close() {
    let (_server, link) = FakeServer::link();
    let (session, _transport) = connected_session(vec![link]).await;

    let sender = session.clone();
    let pending = tokio::spawn(async move { sender.send(1.0, 1.0, "a@x.com").await });
    settle().await;
    session.close().await;

    assert_eq!(pending.await.unwrap(), Err(SendError::NotConnected));
}

#[tokio::test(start_paused = true)]
async fn close_preempts_a_stalled_send() {
    let (server, link) = FakeServer::link();
    let (session, _transport) = connected_session(vec![link]).await;
    server.stall();

    let sender = session.clone();
    let pending = tokio::spawn(async move { sender.send(1.0, 1.0, "a@x.com").await });
    settle().await;
    assert!(!pending.is_finished());

    let closed = tokio::time::timeout(Duration::from_secs(1), session.close()).await;
    assert!(closed.is_ok(), "close must not wait for a stalled write");
    assert_eq!(session.state(), ConnectionState::Disconnected);
    assert_eq!(pending.await.unwrap(), Err(SendError::NotConnected));
    assert!(server.closed.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn stalled_send_times_out_and_counts_as_a_drop() {
    let (server, link) = FakeServer::link();
    let (session, _transport) = connected_session(vec![link]).await;
    server.stall();

    let sender = session.clone();
    let pending = tokio::spawn(async move { sender.send(1.0, 1.0, "a@x.com").await });
    sleep(Duration::from_millis(14_999)).await;
    settle().await;
    assert!(!pending.is_finished());
    assert_eq!(session.state(), ConnectionState::Connected);

    sleep(Duration::from_millis(2)).await;
    settle().await;
    let result = pending.await.unwrap();
    assert!(matches!(result, Err(SendError::TransportFailure(_))), "{result:?}");
    assert_eq!(session.state(), ConnectionState::Reconnecting);
}

#[tokio::test(start_paused = true)]
async fn commands_during_a_stalled_send_run_afterwards() {
    let (server, link) = FakeServer::link();
    let (session, _transport) = connected_session(vec![link]).await;
    server.stall();

    let sender = session.clone();
    let pending = tokio::spawn(async move { sender.send(1.0, 1.0, "a@x.com").await });
    settle().await;
    session.set_mock_mode(true);
    settle().await;
    assert_eq!(session.state(), ConnectionState::Connected);

    sleep(Duration::from_millis(15_001)).await;
    settle().await;
    assert!(pending.is_finished());
    let status = session.status();
    assert_eq!(status.state, ConnectionState::MockActive);
    assert!(status.mock_mode);
}

// ---------------------------------------------------------------------------
// Degenerate periods
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn zero_mock_interval_still_generates_events() {
    let config = HubConfig {
        start_in_mock_mode: true,
        mock: MockConfig {
            interval: Duration::ZERO,
            ..MockConfig::default()
        },
        ..HubConfig::default()
    };
    let session = HubSession::open(ENDPOINT, config, FakeTransport::unreachable());
    let events = record(&session);

    sleep(Duration::from_millis(100)).await;
    settle().await;
    assert_eq!(session.state(), ConnectionState::MockActive);
    assert!(!events.lock().unwrap().is_empty());
    assert_eq!(session.send(1.0, 2.0, "a@x.com").await, Ok(()));
}

#[tokio::test(start_paused = true)]
async fn zero_keepalive_interval_still_pings() {
    let (server, link) = FakeServer::link();
    let config = HubConfig {
        keepalive_interval: Duration::ZERO,
        ..HubConfig::default()
    };
    let session = HubSession::open(ENDPOINT, config, FakeTransport::serving(vec![link]));
    settle().await;
    assert_eq!(session.state(), ConnectionState::Connected);

    sleep(Duration::from_millis(50)).await;
    settle().await;
    assert_eq!(session.state(), ConnectionState::Connected);
    assert!(server.sent().contains(&HubMessage::Ping));
}

// ---------------------------------------------------------------------------
// Mock mode + teardown
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn toggling_mock_mode_swaps_transport_path() {
    let (first, link1) = FakeServer::link();
    let (_second, link2) = FakeServer::link();
    let (session, transport) = connected_session(vec![link1, link2]).await;

    session.set_mock_mode(true);
    settle().await;
    let status = session.status();
    assert_eq!(status.state, ConnectionState::MockActive);
    assert!(status.mock_mode);
    assert_eq!(status.transport, None);
    assert!(first.closed.load(Ordering::SeqCst));

    session.toggle_mock_mode();
    settle().await;
    let status = session.status();
    assert_eq!(status.state, ConnectionState::Connected);
    assert!(!status.mock_mode);
    assert_eq!(transport.negotiate_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn mock_events_reach_every_subscriber() {
    let session = HubSession::open(ENDPOINT, mock_config(), FakeTransport::unreachable());
    let primary = record(&session);
    let extra = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&extra);
    let id = session.subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    sleep(Duration::from_millis(3001)).await;
    settle().await;
    assert!(session.unsubscribe(id));
    sleep(Duration::from_millis(3000)).await;
    settle().await;

    assert_eq!(primary.lock().unwrap().len(), 2);
    assert_eq!(extra.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn close_stops_all_callbacks() {
    let session = HubSession::open(ENDPOINT, mock_config(), FakeTransport::unreachable());
    let events = record(&session);

    sleep(Duration::from_millis(3001)).await;
    settle().await;
    assert_eq!(events.lock().unwrap().len(), 1);

    session.close().await;
    assert_eq!(session.state(), ConnectionState::Disconnected);
    assert!(!session.is_connected());

    sleep(Duration::from_secs(30)).await;
    settle().await;
    assert_eq!(events.lock().unwrap().len(), 1);

    // Idempotent.
    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn close_cancels_pending_fallback() {
    let session = HubSession::open(ENDPOINT, HubConfig::default(), FakeTransport::unreachable());
    let events = record(&session);
    settle().await;
    assert_eq!(session.state(), ConnectionState::Failed);

    session.close().await;
    sleep(Duration::from_secs(10)).await;
    settle().await;

    let status = session.status();
    assert_eq!(status.state, ConnectionState::Disconnected);
    assert!(!status.mock_mode);
    assert!(events.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn close_cancels_pending_reconnect() {
    let (server, link) = FakeServer::link();
    let (session, transport) = connected_session(vec![link]).await;
    drop(server);
    settle().await;
    assert_eq!(session.state(), ConnectionState::Reconnecting);

    session.close().await;
    sleep(Duration::from_secs(60)).await;
    settle().await;
    assert_eq!(transport.connect_attempts().len(), 1);
    assert_eq!(session.state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn dropping_last_handle_stops_callbacks() {
    let session = HubSession::open(ENDPOINT, mock_config(), FakeTransport::unreachable());
    let events = record(&session);
    let clone = session.clone();
    drop(session);

    sleep(Duration::from_millis(3001)).await;
    settle().await;
    assert_eq!(events.lock().unwrap().len(), 1, "a clone keeps the session alive");

    drop(clone);
    sleep(Duration::from_secs(30)).await;
    settle().await;
    assert_eq!(events.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn status_changes_are_observable() {
    let session = HubSession::open(ENDPOINT, HubConfig::default(), FakeTransport::unreachable());
    let mut status = session.watch_status();
    assert_eq!(status.borrow_and_update().state, ConnectionState::TestingEndpoint);

    status.changed().await.unwrap();
    assert_eq!(status.borrow_and_update().state, ConnectionState::Failed);

    status.changed().await.unwrap();
    assert_eq!(status.borrow_and_update().state, ConnectionState::MockActive);
}
