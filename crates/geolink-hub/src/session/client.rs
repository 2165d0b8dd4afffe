//! Public handle for one hub session.

use std::sync::Arc;

use geolink_common::SessionId;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use super::actor::SessionActor;
use super::subscribers::Subscribers;
use super::types::{Command, ConnectionState, HubConfig, SessionStatus, SubscriptionId};
use crate::endpoint::Endpoint;
use crate::error::SendError;
use crate::protocol::LocationEvent;
use crate::transport::{HubTransport, SignalRTransport};

struct SessionInner {
    id: SessionId,
    endpoint: Endpoint,
    command_tx: mpsc::UnboundedSender<Command>,
    status_rx: watch::Receiver<SessionStatus>,
    subscribers: Arc<Subscribers>,
    task: JoinHandle<()>,
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        self.subscribers.close();
        self.task.abort();
        debug!(session = %self.id, "session handle dropped");
    }
}

/// Handle to a running session.
///
/// Cheap to clone. All methods forward to the background session task;
/// dropping the last handle tears the session down like [`close`](Self::close).
#[derive(Clone)]
pub struct HubSession {
    inner: Arc<SessionInner>,
}

impl std::fmt::Debug for HubSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubSession")
            .field("id", &self.inner.id)
            .field("endpoint", &self.inner.endpoint)
            .field("status", &*self.inner.status_rx.borrow())
            .finish()
    }
}

impl HubSession {
    /// Open a session against `endpoint` using the real hub transport.
    pub fn connect(endpoint: impl Into<Endpoint>, config: HubConfig) -> Self {
        let transport = Arc::new(SignalRTransport::new(&config));
        Self::open(endpoint, config, transport)
    }

    /// Open a session over an arbitrary transport.
    ///
    /// Returns immediately in `TestingEndpoint` (or `MockActive` when the
    /// config starts in mock mode); the connection sequence runs on a
    /// spawned task, so this must be called inside a tokio runtime.
    pub fn open(
        endpoint: impl Into<Endpoint>,
        config: HubConfig,
        transport: Arc<dyn HubTransport>,
    ) -> Self {
        let endpoint = endpoint.into();
        let id = SessionId::new();
        let mock_mode = config.start_in_mock_mode;
        let initial = if mock_mode {
            ConnectionState::MockActive
        } else {
            ConnectionState::TestingEndpoint
        };

        let (status_tx, status_rx) = watch::channel(SessionStatus::new(ConnectionState::Idle, mock_mode));
        status_tx.send_replace(SessionStatus::new(initial, mock_mode));
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let subscribers = Arc::new(Subscribers::default());

        let actor = SessionActor::new(
            id.clone(),
            endpoint.clone(),
            config,
            transport,
            Arc::clone(&subscribers),
            command_rx,
            status_tx,
        );
        let task = tokio::spawn(actor.run());

        Self {
            inner: Arc::new(SessionInner {
                id,
                endpoint,
                command_tx,
                status_rx,
                subscribers,
                task,
            }),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.inner.id
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.inner.endpoint
    }

    // -- inbound -------------------------------------------------------------

    /// Register the single primary callback, replacing any previous one.
    pub fn on_location_received<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&LocationEvent) + Send + Sync + 'static,
    {
        self.inner.subscribers.replace_primary(Arc::new(callback))
    }

    /// Add a callback alongside any others.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&LocationEvent) + Send + Sync + 'static,
    {
        self.inner.subscribers.subscribe(Arc::new(callback))
    }

    /// Returns whether `id` was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.subscribers.unsubscribe(id)
    }

    /// Run `hook` once when the session closes or its last handle drops.
    /// Runs immediately if the session is already closed.
    pub fn on_close<F>(&self, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.subscribers.on_close(Box::new(hook));
    }

    // -- outbound ------------------------------------------------------------

    /// Publish one location sample.
    ///
    /// Resolves once the hub acknowledges the invocation (or immediately in
    /// mock mode). Outside `Connected`/`MockActive` this is `NotConnected`
    /// with no I/O.
    pub async fn send(&self, lat: f64, lon: f64, peer_id: &str) -> Result<(), SendError> {
        let (reply, rx) = oneshot::channel();
        let command = Command::Send {
            event: LocationEvent::new(peer_id, lat, lon),
            reply,
        };
        if self.inner.command_tx.send(command).is_err() {
            return Err(SendError::NotConnected);
        }
        rx.await.unwrap_or(Err(SendError::NotConnected))
    }

    // -- mock mode -----------------------------------------------------------

    pub fn set_mock_mode(&self, enabled: bool) {
        let _ = self.inner.command_tx.send(Command::SetMockMode(enabled));
    }

    pub fn toggle_mock_mode(&self) {
        let _ = self.inner.command_tx.send(Command::ToggleMockMode);
    }

    // -- status --------------------------------------------------------------

    pub fn status(&self) -> SessionStatus {
        self.inner.status_rx.borrow().clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.status_rx.borrow().state
    }

    pub fn is_connected(&self) -> bool {
        self.inner.status_rx.borrow().is_connected()
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.status_rx.borrow().last_error.clone()
    }

    pub fn mock_mode(&self) -> bool {
        self.inner.status_rx.borrow().mock_mode
    }

    /// A receiver that observes every published status change.
    pub fn watch_status(&self) -> watch::Receiver<SessionStatus> {
        self.inner.status_rx.clone()
    }

    // -- teardown ------------------------------------------------------------

    /// Stop everything: timers, mock generator, live link. No callback runs
    /// after this returns. Idempotent.
    pub async fn close(&self) {
        self.inner.subscribers.close();
        let (reply, rx) = oneshot::channel();
        if self.inner.command_tx.send(Command::Close { reply }).is_ok() {
            let _ = rx.await;
        }
    }
}
