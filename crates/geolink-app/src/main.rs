//! geolink: headless sender / receiver over the location relay core.
//!
//! `geolink receive` opens a hub session, feeds it into a presence tracker
//! and logs the live peer set whenever it changes. `geolink send --user <id>`
//! opens a session and publishes a simulated position every interval.
//! Either way Ctrl-C closes the session before exit.

mod cli;
mod settings;

use std::process::ExitCode;

use geolink_common::{GeolinkError, Result};
use geolink_hub::{HubSession, LocationSharer, PresenceTracker, SessionStatus, SimulatedSource};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::Command;
use crate::settings::Settings;

fn init_logging(directive: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"))
            }),
        )
        .init();
}

fn log_status(status: &SessionStatus) {
    match &status.last_error {
        Some(error) => warn!(
            state = %status.state,
            connected = status.is_connected(),
            mock = status.mock_mode,
            %error,
            "session status"
        ),
        None => info!(
            state = %status.state,
            connected = status.is_connected(),
            mock = status.mock_mode,
            transport = ?status.transport,
            "session status"
        ),
    }
}

/// Log status and peer-set changes until Ctrl-C.
async fn watch_until_interrupted(
    mut status: watch::Receiver<SessionStatus>,
    tracker: Option<&PresenceTracker>,
) -> Result<()> {
    let mut changes = tracker.map(PresenceTracker::changes);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    log_status(&status.borrow_and_update());
    loop {
        tokio::select! {
            signal = &mut shutdown => {
                signal?;
                info!("interrupted, shutting down");
                return Ok(());
            }
            changed = status.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                log_status(&status.borrow_and_update());
            }
            changed = async {
                match changes.as_mut() {
                    Some(changes) => changes.changed().await,
                    None => std::future::pending().await,
                }
            } => {
                if changed.is_err() {
                    return Ok(());
                }
                if let Some(tracker) = tracker {
                    let snapshot = tracker.snapshot();
                    let peers = serde_json::to_string(&snapshot)
                        .map_err(|e| GeolinkError::Other(format!("snapshot encoding: {e}")))?;
                    info!(count = snapshot.len(), %peers, "peer set changed");
                }
            }
        }
    }
}

async fn receive(settings: Settings) -> Result<()> {
    let session = HubSession::connect(settings.endpoint.as_str(), settings.hub.clone());
    let tracker = PresenceTracker::new(settings.presence.clone());
    tracker.attach(&session);
    info!(session = %session.id(), endpoint = %session.endpoint(), "receiving locations");

    let outcome = watch_until_interrupted(session.watch_status(), Some(&tracker)).await;

    session.close().await;
    outcome
}

async fn send(settings: Settings, user: &str) -> Result<()> {
    let session = HubSession::connect(settings.endpoint.as_str(), settings.hub.clone());
    let source = Box::new(SimulatedSource::around(&settings.hub.mock));
    let sharer = LocationSharer::start(session.clone(), user, source, settings.sharing.clone())
        .map_err(|e| GeolinkError::Hub(e.to_string()))?;
    info!(session = %session.id(), endpoint = %session.endpoint(), %user, "sharing location");

    let outcome = watch_until_interrupted(session.watch_status(), None).await;

    let stats = sharer.stop().await;
    info!(
        sent = stats.sent,
        failed = stats.failed,
        skipped = stats.skipped,
        "sharing summary"
    );
    session.close().await;
    outcome
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();

    let config = match geolink_config::load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("geolink: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_logging(&Settings::log_directive(&config, &args));

    let settings = Settings::resolve(&config, &args);
    let outcome = match &args.command {
        Command::Receive => receive(settings).await,
        Command::Send { user } => send(settings, user).await,
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "geolink failed");
            ExitCode::FAILURE
        }
    }
}
