//! The session task: a single-threaded state machine driven by commands,
//! timers, in-flight network operations and inbound hub messages.

use std::collections::{HashMap, VecDeque};
use std::future::{pending, Future};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use geolink_common::SessionId;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep_until, Instant, Interval};
use tracing::{debug, info, warn};

use super::subscribers::Subscribers;
use super::types::{Command, ConnectionState, HubConfig, SessionStatus};
use crate::endpoint::Endpoint;
use crate::error::{HubError, SendError};
use crate::protocol::{methods, HubMessage, LocationEvent};
use crate::ticker::delayed_ticker;
use crate::transport::{HubLink, HubTransport, Negotiation};

/// How long `close` waits for the transport to shut down politely.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// The one state-machine timer a session may have armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Timer {
    FallbackToMock,
    Reconnect { attempt: u32 },
}

enum Outcome {
    Probed(Result<Negotiation, HubError>),
    Connected(Result<HubLink, HubError>),
    Reconnected {
        attempt: u32,
        result: Result<HubLink, HubError>,
    },
}

type Operation = Pin<Box<dyn Future<Output = Outcome> + Send>>;

/// Why the session is finishing.
enum CloseRequest {
    Caller(oneshot::Sender<()>),
    HandlesDropped,
}

enum WriteError {
    /// The transport rejected the write.
    Failed(HubError),
    /// The write did not finish within `send_timeout`.
    Stalled(HubError),
    /// A close arrived before the write finished.
    Interrupted,
}

type SendReply = oneshot::Sender<Result<(), SendError>>;

pub(crate) struct SessionActor {
    id: SessionId,
    endpoint: Endpoint,
    config: HubConfig,
    transport: Arc<dyn HubTransport>,
    subscribers: Arc<Subscribers>,
    commands: mpsc::UnboundedReceiver<Command>,
    status_tx: watch::Sender<SessionStatus>,
    status: SessionStatus,

    operation: Option<Operation>,
    timer: Option<(Instant, Timer)>,
    mock_ticker: Option<Interval>,

    link: Option<HubLink>,
    keepalive: Option<Interval>,
    last_received: Instant,
    next_invocation_id: u64,
    pending_sends: HashMap<String, SendReply>,

    /// Commands received while a write was in flight.
    deferred: VecDeque<Command>,
    close_request: Option<CloseRequest>,
}

impl SessionActor {
    pub(crate) fn new(
        id: SessionId,
        endpoint: Endpoint,
        config: HubConfig,
        transport: Arc<dyn HubTransport>,
        subscribers: Arc<Subscribers>,
        commands: mpsc::UnboundedReceiver<Command>,
        status_tx: watch::Sender<SessionStatus>,
    ) -> Self {
        let status = status_tx.borrow().clone();
        Self {
            id,
            endpoint,
            config,
            transport,
            subscribers,
            commands,
            status_tx,
            status,
            operation: None,
            timer: None,
            mock_ticker: None,
            link: None,
            keepalive: None,
            last_received: Instant::now(),
            next_invocation_id: 0,
            pending_sends: HashMap::new(),
            deferred: VecDeque::new(),
            close_request: None,
        }
    }

    pub(crate) async fn run(mut self) {
        if self.status.mock_mode {
            self.start_mock();
        } else {
            self.start_probe();
        }

        loop {
            if let Some(request) = self.close_request.take() {
                self.finish(request).await;
                break;
            }
            if let Some(command) = self.deferred.pop_front() {
                if !self.handle_command(Some(command)).await {
                    break;
                }
                continue;
            }

            let timer_deadline = self.timer.map(|(at, _)| at);
            let server_deadline = self
                .link
                .as_ref()
                .map(|_| self.last_received + self.config.server_timeout);

            tokio::select! {
                command = self.commands.recv() => {
                    if !self.handle_command(command).await {
                        break;
                    }
                }
                outcome = run_operation(&mut self.operation) => {
                    self.operation = None;
                    self.handle_outcome(outcome);
                }
                _ = sleep_until_opt(timer_deadline) => {
                    if let Some((_, timer)) = self.timer.take() {
                        self.fire(timer);
                    }
                }
                _ = tick_opt(&mut self.mock_ticker) => self.emit_mock(),
                message = next_message(&mut self.link) => self.handle_inbound(message).await,
                _ = tick_opt(&mut self.keepalive) => self.send_ping().await,
                _ = sleep_until_opt(server_deadline) => {
                    let err = HubError::Timeout("server activity", self.config.server_timeout);
                    self.link_lost(err).await;
                }
            }
        }
    }

    // -- status -------------------------------------------------------------

    fn transition(&mut self, state: ConnectionState, last_error: Option<String>) {
        let previous = self.status.state;
        self.status.state = state;
        self.status.last_error = last_error;
        if previous != state {
            info!(session = %self.id, from = ?previous, to = ?state, "state transition");
        }
        self.publish();
    }

    /// Notify watchers only when something they can observe changed.
    fn publish(&self) {
        self.status_tx.send_if_modified(|current| {
            if *current == self.status {
                return false;
            }
            *current = self.status.clone();
            true
        });
    }

    // -- commands -----------------------------------------------------------

    /// Returns `false` once the session is finished.
    async fn handle_command(&mut self, command: Option<Command>) -> bool {
        match command {
            Some(Command::Send { event, reply }) => self.send_location(event, reply).await,
            Some(Command::SetMockMode(enabled)) => self.set_mock_mode(enabled).await,
            Some(Command::ToggleMockMode) => self.set_mock_mode(!self.status.mock_mode).await,
            Some(Command::Close { reply }) => {
                self.finish(CloseRequest::Caller(reply)).await;
                return false;
            }
            None => {
                self.finish(CloseRequest::HandlesDropped).await;
                return false;
            }
        }
        true
    }

    async fn finish(&mut self, request: CloseRequest) {
        if matches!(request, CloseRequest::HandlesDropped) {
            debug!(session = %self.id, "all handles dropped");
        }
        self.shutdown().await;
        if let CloseRequest::Caller(reply) = request {
            let _ = reply.send(());
        }
    }

    async fn send_location(&mut self, event: LocationEvent, reply: SendReply) {
        if self.status.mock_mode {
            debug!(session = %self.id, peer = %event.peer_id, lat = event.lat, lon = event.lon, "mock location sent");
            let _ = reply.send(Ok(()));
            return;
        }

        if self.status.state != ConnectionState::Connected || self.link.is_none() {
            warn!(session = %self.id, state = ?self.status.state, "cannot send location: not connected");
            self.status.last_error = Some("Cannot send location: not connected to hub".into());
            self.publish();
            let _ = reply.send(Err(SendError::NotConnected));
            return;
        }

        let invocation_id = self.next_invocation_id.to_string();
        self.next_invocation_id += 1;
        let message = HubMessage::Invocation {
            invocation_id: Some(invocation_id.clone()),
            target: methods::SEND_LAT_LON.to_string(),
            arguments: event.to_send_arguments(),
        };

        match self.write_to_link(&message).await {
            Ok(()) => {
                debug!(session = %self.id, invocation = %invocation_id, peer = %event.peer_id, "location sent");
                self.pending_sends.insert(invocation_id, reply);
            }
            Err(WriteError::Failed(e)) => {
                warn!(session = %self.id, error = %e, "send failed");
                self.status.last_error = Some(format!("Send failed: {e}"));
                self.publish();
                let _ = reply.send(Err(SendError::TransportFailure(e.to_string())));
            }
            Err(WriteError::Stalled(e)) => {
                let _ = reply.send(Err(SendError::TransportFailure(e.to_string())));
                self.link_lost(e).await;
            }
            Err(WriteError::Interrupted) => {
                let _ = reply.send(Err(SendError::NotConnected));
            }
        }
    }

    /// Write one message to the live link, bounded by `send_timeout`.
    /// Commands arriving meanwhile are queued, except a close, which
    /// abandons the write.
    async fn write_to_link(&mut self, message: &HubMessage) -> Result<(), WriteError> {
        let limit = self.config.send_timeout;
        let Some(link) = self.link.as_mut() else {
            return Err(WriteError::Failed(HubError::TransportDropped(
                "no live link".into(),
            )));
        };
        let write = tokio::time::timeout(limit, link.writer.write(message));
        tokio::pin!(write);

        loop {
            tokio::select! {
                written = &mut write => {
                    return match written {
                        Ok(result) => result.map_err(WriteError::Failed),
                        Err(_elapsed) => Err(WriteError::Stalled(HubError::Timeout("hub write", limit))),
                    };
                }
                command = self.commands.recv() => match command {
                    Some(Command::Close { reply }) => {
                        self.close_request = Some(CloseRequest::Caller(reply));
                        return Err(WriteError::Interrupted);
                    }
                    None => {
                        self.close_request = Some(CloseRequest::HandlesDropped);
                        return Err(WriteError::Interrupted);
                    }
                    Some(command) => self.deferred.push_back(command),
                }
            }
        }
    }

    async fn set_mock_mode(&mut self, enabled: bool) {
        if enabled == self.status.mock_mode {
            return;
        }
        self.status.mock_mode = enabled;
        self.status.last_error = None;
        if enabled {
            self.teardown_link(SendError::NotConnected).await;
            self.start_mock();
        } else {
            info!(session = %self.id, "mock mode stopped");
            self.mock_ticker = None;
            self.start_probe();
        }
    }

    // -- connection sequence -------------------------------------------------

    fn start_probe(&mut self) {
        self.timer = None;
        self.status.reconnect_attempt = 0;
        self.status.transport = None;
        self.transition(ConnectionState::TestingEndpoint, None);
        info!(session = %self.id, endpoint = %self.endpoint, "testing hub endpoint");

        let transport = Arc::clone(&self.transport);
        let endpoint = self.endpoint.clone();
        self.operation = Some(Box::pin(async move {
            Outcome::Probed(transport.negotiate(&endpoint).await)
        }));
    }

    fn handle_outcome(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Probed(Ok(negotiation)) => {
                debug!(session = %self.id, endpoint = %negotiation.endpoint, "endpoint probe succeeded");
                self.transition(ConnectionState::Connecting, None);
                let transport = Arc::clone(&self.transport);
                self.operation = Some(Box::pin(async move {
                    Outcome::Connected(transport.connect(&negotiation).await)
                }));
            }
            Outcome::Probed(Err(e)) | Outcome::Connected(Err(e)) => self.connection_failed(e),
            Outcome::Connected(Ok(link)) => self.install_link(link),
            Outcome::Reconnected {
                result: Ok(link), ..
            } => self.install_link(link),
            Outcome::Reconnected {
                attempt,
                result: Err(e),
            } => {
                warn!(session = %self.id, attempt = attempt + 1, error = %e, "reconnect attempt failed");
                self.schedule_reconnect(attempt + 1, &e);
            }
        }
    }

    fn connection_failed(&mut self, error: HubError) {
        warn!(session = %self.id, endpoint = %self.endpoint, error = %error, "hub connection failed");
        self.transition(
            ConnectionState::Failed,
            Some(format!("Connection failed: {error}")),
        );
        let at = Instant::now() + self.config.mock.fallback_delay;
        self.timer = Some((at, Timer::FallbackToMock));
        info!(
            session = %self.id,
            delay_ms = self.config.mock.fallback_delay.as_millis() as u64,
            "falling back to mock mode"
        );
    }

    fn install_link(&mut self, link: HubLink) {
        let now = Instant::now();
        self.status.transport = Some(link.transport);
        self.status.reconnect_attempt = 0;
        self.last_received = now;

        self.keepalive = Some(delayed_ticker("keepalive", self.config.keepalive_interval));

        info!(session = %self.id, transport = %link.transport, "connected to hub");
        self.link = Some(link);
        self.transition(ConnectionState::Connected, None);
    }

    fn schedule_reconnect(&mut self, attempt: u32, cause: &HubError) {
        match self.config.reconnect.delay_for(attempt) {
            Some(delay) => {
                self.status.reconnect_attempt = attempt + 1;
                self.timer = Some((Instant::now() + delay, Timer::Reconnect { attempt }));
                info!(
                    session = %self.id,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "scheduling reconnect"
                );
                self.transition(
                    ConnectionState::Reconnecting,
                    Some("Connection lost, attempting to reconnect...".into()),
                );
            }
            None => {
                self.status.reconnect_attempt = 0;
                warn!(session = %self.id, attempts = attempt, "reconnect attempts exhausted");
                self.transition(
                    ConnectionState::Disconnected,
                    Some(format!(
                        "Connection closed: gave up after {attempt} reconnect attempts ({cause})"
                    )),
                );
            }
        }
    }

    fn fire(&mut self, timer: Timer) {
        match timer {
            Timer::FallbackToMock => {
                info!(session = %self.id, "auto-switching to mock mode after connection failure");
                self.status.mock_mode = true;
                self.start_mock();
            }
            Timer::Reconnect { attempt } => {
                debug!(session = %self.id, attempt = attempt + 1, "reconnecting");
                let transport = Arc::clone(&self.transport);
                let endpoint = self.endpoint.clone();
                self.operation = Some(Box::pin(async move {
                    let result = match transport.negotiate(&endpoint).await {
                        Ok(negotiation) => transport.connect(&negotiation).await,
                        Err(e) => Err(e),
                    };
                    Outcome::Reconnected { attempt, result }
                }));
            }
        }
    }

    // -- live link -----------------------------------------------------------

    async fn handle_inbound(&mut self, message: Option<Result<HubMessage, HubError>>) {
        let message = match message {
            Some(Ok(message)) => message,
            Some(Err(HubError::Protocol(reason))) => {
                warn!(session = %self.id, %reason, "ignoring malformed hub message");
                return;
            }
            Some(Err(e)) => return self.link_lost(e).await,
            None => {
                return self
                    .link_lost(HubError::TransportDropped("server closed the stream".into()))
                    .await
            }
        };
        self.last_received = Instant::now();

        match message {
            HubMessage::Invocation {
                target, arguments, ..
            } if target == methods::RECEIVE_LAT_LON => {
                match LocationEvent::from_arguments(&arguments) {
                    Ok(event) => {
                        debug!(session = %self.id, peer = %event.peer_id, lat = event.lat, lon = event.lon, "location received");
                        self.subscribers.dispatch(&event);
                    }
                    Err(e) => warn!(session = %self.id, error = %e, "dropping location event"),
                }
            }
            HubMessage::Invocation { target, .. } => {
                debug!(session = %self.id, %target, "no handler for hub method");
            }
            HubMessage::Completion {
                invocation_id,
                error,
                ..
            } => {
                let Some(reply) = self.pending_sends.remove(&invocation_id) else {
                    debug!(session = %self.id, invocation = %invocation_id, "completion for unknown invocation");
                    return;
                };
                let result = match error {
                    None => Ok(()),
                    Some(error) => {
                        warn!(session = %self.id, invocation = %invocation_id, %error, "hub rejected location");
                        self.status.last_error = Some(format!("Send failed: {error}"));
                        self.publish();
                        Err(SendError::TransportFailure(error))
                    }
                };
                let _ = reply.send(result);
            }
            HubMessage::Ping => {}
            HubMessage::Close {
                error,
                allow_reconnect,
            } => {
                if allow_reconnect == Some(false) {
                    info!(session = %self.id, ?error, "hub closed the connection");
                    self.teardown_link(SendError::TransportFailure("connection closed".into()))
                        .await;
                    let last_error = error.map(|e| format!("Connection closed: {e}"));
                    self.transition(ConnectionState::Disconnected, last_error);
                } else {
                    let reason = error.unwrap_or_else(|| "server closed the connection".into());
                    self.link_lost(HubError::TransportDropped(reason)).await;
                }
            }
            HubMessage::Other(kind) => {
                debug!(session = %self.id, kind, "ignoring hub message");
            }
        }
    }

    async fn send_ping(&mut self) {
        if self.link.is_none() {
            return;
        }
        match self.write_to_link(&HubMessage::Ping).await {
            Ok(()) | Err(WriteError::Interrupted) => {}
            Err(WriteError::Failed(e) | WriteError::Stalled(e)) => self.link_lost(e).await,
        }
    }

    /// The live link dropped without the caller asking for it.
    async fn link_lost(&mut self, error: HubError) {
        warn!(session = %self.id, error = %error, "hub connection lost");
        self.teardown_link(SendError::TransportFailure(format!("connection lost: {error}")))
            .await;
        self.schedule_reconnect(0, &error);
    }

    /// Close the link if any and fail every send still awaiting completion.
    async fn teardown_link(&mut self, pending_error: SendError) {
        self.keepalive = None;
        self.status.transport = None;
        if let Some(mut link) = self.link.take() {
            let _ = tokio::time::timeout(CLOSE_GRACE, link.writer.close()).await;
        }
        for (_, reply) in self.pending_sends.drain() {
            let _ = reply.send(Err(pending_error.clone()));
        }
    }

    // -- mock ---------------------------------------------------------------

    fn start_mock(&mut self) {
        self.operation = None;
        self.timer = None;
        self.status.transport = None;
        self.status.reconnect_attempt = 0;

        self.mock_ticker = Some(delayed_ticker("mock", self.config.mock.interval));

        info!(session = %self.id, peer = %self.config.mock.peer_id, "mock mode started");
        self.transition(ConnectionState::MockActive, None);
    }

    fn emit_mock(&mut self) {
        let event = self.config.mock.sample();
        debug!(session = %self.id, peer = %event.peer_id, lat = event.lat, lon = event.lon, "mock location generated");
        self.subscribers.dispatch(&event);
    }

    // -- teardown ------------------------------------------------------------

    async fn shutdown(&mut self) {
        self.operation = None;
        self.timer = None;
        self.mock_ticker = None;
        self.subscribers.close();
        self.teardown_link(SendError::NotConnected).await;
        self.status.reconnect_attempt = 0;
        let last_error = self.status.last_error.take();
        self.transition(ConnectionState::Disconnected, last_error);
        info!(session = %self.id, "session closed");
    }
}

async fn run_operation(operation: &mut Option<Operation>) -> Outcome {
    match operation {
        Some(operation) => operation.await,
        None => pending().await,
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}

async fn tick_opt(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending().await,
    }
}

async fn next_message(link: &mut Option<HubLink>) -> Option<Result<HubMessage, HubError>> {
    match link {
        Some(link) => link.reader.next().await,
        None => pending().await,
    }
}
