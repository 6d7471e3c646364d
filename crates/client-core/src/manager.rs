//! Session state machine
//!
//! [`SessionManager`] owns at most one active [`Session`] at a time and is
//! its only mutator. It drives the session through
//! `Idle → Negotiating → Live → (Closed | Failed)`, surfaces every
//! transition to observers, and guarantees that teardown releases the
//! underlying transport exactly once regardless of the state it happens in.
//!
//! # Ordering guarantees
//!
//! - A `stop` issued while negotiating closes the transport immediately;
//!   the in-flight signaling response is detected as stale via a generation
//!   counter when it arrives and is discarded, never applied to a closed
//!   session.
//! - Connectivity callbacks are only observed once the remote description
//!   has been applied; a loss while `Live` moves the session to `Failed`
//!   exactly once and is never retried automatically. Recovery is a fresh
//!   user-initiated start.
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sitewatch_client_core::{ClientConfig, SessionManager, SourceKind};
//! use sitewatch_client_core::transport::PolledFeedTransport;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::new("http://localhost:8080")?;
//! let manager = SessionManager::new(&config)?;
//!
//! let transport = Arc::new(PolledFeedTransport::new());
//! let session_id = manager.start(SourceKind::Webcam, transport).await?;
//! println!("watching session {}", session_id);
//!
//! manager.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::events::{SessionEventHandler, SessionStatusInfo};
use crate::session::{Session, SessionId, SessionState, SourceKind};
use crate::signaling::{SessionDescription, SignalingClient};
use crate::transport::{ConnectivityEvent, MediaTransport};

/// Read-only view of the manager's current session status
///
/// `state` is [`SessionState::Idle`] when no session exists.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    /// Identifier of the current session, if any
    pub session_id: Option<SessionId>,
    /// Source of the current session, if any
    pub kind: Option<SourceKind>,
    /// Current state
    pub state: SessionState,
    /// Reason for the most recent failure, if any
    pub last_error: Option<String>,
    /// Cache-busted media URL for the current session, if any
    pub feed_url: Option<String>,
}

impl SessionSnapshot {
    /// Snapshot for a manager with no session
    pub fn idle() -> Self {
        Self {
            session_id: None,
            kind: None,
            state: SessionState::Idle,
            last_error: None,
            feed_url: None,
        }
    }
}

struct ActiveSession {
    session: Session,
    transport: Arc<dyn MediaTransport>,
    generation: u64,
    watcher: Option<JoinHandle<()>>,
}

/// Owns and drives the one active detector session
#[derive(Clone)]
pub struct SessionManager {
    signaling: Arc<SignalingClient>,
    active: Arc<RwLock<Option<ActiveSession>>>,
    generation: Arc<AtomicU64>,
    snapshot_tx: Arc<watch::Sender<SessionSnapshot>>,
    handler: Arc<RwLock<Option<Arc<dyn SessionEventHandler>>>>,
}

impl SessionManager {
    /// Create a manager bound to the configured server address
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let (snapshot_tx, _snapshot_rx) = watch::channel(SessionSnapshot::idle());
        Ok(Self {
            signaling: Arc::new(SignalingClient::new(config)?),
            active: Arc::new(RwLock::new(None)),
            generation: Arc::new(AtomicU64::new(0)),
            snapshot_tx: Arc::new(snapshot_tx),
            handler: Arc::new(RwLock::new(None)),
        })
    }

    /// Register a handler for push-style lifecycle notifications
    pub async fn set_event_handler(&self, handler: Arc<dyn SessionEventHandler>) {
        *self.handler.write().await = Some(handler);
    }

    /// Subscribe to session status snapshots
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Current session data, if a session exists
    pub async fn current_session(&self) -> Option<Session> {
        self.active
            .read()
            .await
            .as_ref()
            .map(|active| active.session.clone())
    }

    /// Current session state; `Idle` when no session exists
    pub async fn state(&self) -> SessionState {
        self.active
            .read()
            .await
            .as_ref()
            .map(|active| active.session.state)
            .unwrap_or(SessionState::Idle)
    }

    /// Start a fresh session for the given source
    ///
    /// Any active session is fully torn down first; at most one session is
    /// ever in a non-terminal state. On success the session is `Live` and
    /// connectivity callbacks are being observed. On failure the session is
    /// left in `Failed` with `last_error` set and the error is returned.
    pub async fn start(
        &self,
        kind: SourceKind,
        transport: Arc<dyn MediaTransport>,
    ) -> ClientResult<SessionId> {
        if let Err(error) = self.stop().await {
            warn!("teardown of previous session reported: {}", error);
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let mut session = Session::new(kind.clone());
        session.state = SessionState::Negotiating;
        session.feed_url = Some(self.signaling.feed_url(&kind));
        let session_id = session.id;
        info!("starting {} session {}", kind.label(), session_id);

        let snapshot = Self::snapshot_of(&session);
        {
            let mut active = self.active.write().await;
            *active = Some(ActiveSession {
                session,
                transport: Arc::clone(&transport),
                generation,
                watcher: None,
            });
        }
        self.announce(
            snapshot,
            SessionStatusInfo {
                session_id,
                kind: kind.clone(),
                previous_state: SessionState::Idle,
                new_state: SessionState::Negotiating,
                reason: None,
                timestamp: Utc::now(),
            },
        )
        .await;

        if transport.requires_signaling() {
            let offer = match transport.create_offer().await {
                Ok(offer) => offer,
                Err(error) => {
                    transport.close().await;
                    self.fail(generation, error.to_string()).await;
                    return Err(error);
                }
            };
            self.record_local_description(generation, offer.clone())
                .await;

            // The only suspension point where a stop can race us: the
            // response is validated against the generation counter before
            // it is ever applied.
            let answer = match self.signaling.negotiate(&offer).await {
                Ok(answer) => answer,
                Err(error) => {
                    transport.close().await;
                    self.fail(generation, error.to_string()).await;
                    return Err(error);
                }
            };

            if !self.is_current(generation).await {
                debug!(
                    "discarding late signaling answer for superseded session {}",
                    session_id
                );
                transport.close().await;
                return Err(ClientError::invalid_state(
                    "session was stopped during negotiation",
                ));
            }
            if let Err(error) = transport.apply_answer(answer.clone()).await {
                transport.close().await;
                self.fail(generation, error.to_string()).await;
                return Err(error);
            }
            self.record_remote_description(generation, answer).await;
        }

        if !self.mark_live(generation).await {
            transport.close().await;
            return Err(ClientError::invalid_state(
                "session was stopped during negotiation",
            ));
        }
        self.spawn_watcher(generation, session_id, transport).await;
        Ok(session_id)
    }

    /// Tear down the active session, if any
    ///
    /// Safe and idempotent from every state, including mid-negotiation:
    /// the transport is closed before this returns, the session moves to
    /// `Closed`, and a second call is a no-op. For polled feeds the server
    /// is asked to stop producing; that error is surfaced but local
    /// teardown has already completed by then.
    pub async fn stop(&self) -> ClientResult<()> {
        let removed = self.active.write().await.take();
        let Some(mut active) = removed else {
            return Ok(());
        };

        if let Some(watcher) = active.watcher.take() {
            watcher.abort();
        }
        active.transport.close().await;

        let previous = active.session.state;
        active.session.state = SessionState::Closed;
        info!(
            "closed session {} (was {})",
            active.session.id, previous
        );

        let snapshot = Self::snapshot_of(&active.session);
        self.announce(
            snapshot,
            SessionStatusInfo {
                session_id: active.session.id,
                kind: active.session.kind.clone(),
                previous_state: previous,
                new_state: SessionState::Closed,
                reason: active.session.last_error.clone(),
                timestamp: Utc::now(),
            },
        )
        .await;

        if !active.transport.requires_signaling() {
            self.signaling.stop_feed().await?;
        }
        Ok(())
    }

    fn snapshot_of(session: &Session) -> SessionSnapshot {
        SessionSnapshot {
            session_id: Some(session.id),
            kind: Some(session.kind.clone()),
            state: session.state,
            last_error: session.last_error.clone(),
            feed_url: session.feed_url.clone(),
        }
    }

    async fn announce(&self, snapshot: SessionSnapshot, info: SessionStatusInfo) {
        self.snapshot_tx.send_replace(snapshot);
        let handler = self.handler.read().await.clone();
        if let Some(handler) = handler {
            handler.on_session_state_changed(info).await;
        }
    }

    async fn is_current(&self, generation: u64) -> bool {
        self.active
            .read()
            .await
            .as_ref()
            .map(|active| active.generation == generation && !active.session.state.is_terminal())
            .unwrap_or(false)
    }

    async fn record_local_description(&self, generation: u64, description: SessionDescription) {
        let mut active = self.active.write().await;
        if let Some(current) = active.as_mut() {
            if current.generation == generation {
                current.session.local_description = Some(description);
            }
        }
    }

    async fn record_remote_description(&self, generation: u64, description: SessionDescription) {
        let mut active = self.active.write().await;
        if let Some(current) = active.as_mut() {
            if current.generation == generation {
                current.session.remote_description = Some(description);
            }
        }
    }

    async fn mark_live(&self, generation: u64) -> bool {
        let payload = {
            let mut active = self.active.write().await;
            match active.as_mut() {
                Some(current)
                    if current.generation == generation
                        && current.session.state == SessionState::Negotiating =>
                {
                    current.session.state = SessionState::Live;
                    Some((
                        Self::snapshot_of(&current.session),
                        SessionStatusInfo {
                            session_id: current.session.id,
                            kind: current.session.kind.clone(),
                            previous_state: SessionState::Negotiating,
                            new_state: SessionState::Live,
                            reason: None,
                            timestamp: Utc::now(),
                        },
                    ))
                }
                _ => None,
            }
        };
        match payload {
            Some((snapshot, info)) => {
                info!("session {} is live", info.session_id);
                self.announce(snapshot, info).await;
                true
            }
            None => false,
        }
    }

    async fn fail(&self, generation: u64, reason: String) -> bool {
        let payload = {
            let mut active = self.active.write().await;
            match active.as_mut() {
                Some(current)
                    if current.generation == generation
                        && !current.session.state.is_terminal() =>
                {
                    let previous = current.session.state;
                    current.session.state = SessionState::Failed;
                    current.session.last_error = Some(reason.clone());
                    Some((
                        Self::snapshot_of(&current.session),
                        SessionStatusInfo {
                            session_id: current.session.id,
                            kind: current.session.kind.clone(),
                            previous_state: previous,
                            new_state: SessionState::Failed,
                            reason: Some(reason),
                            timestamp: Utc::now(),
                        },
                    ))
                }
                _ => None,
            }
        };
        match payload {
            Some((snapshot, info)) => {
                warn!(
                    "session {} failed: {}",
                    info.session_id,
                    info.reason.as_deref().unwrap_or("unknown")
                );
                self.announce(snapshot, info).await;
                true
            }
            None => false,
        }
    }

    async fn reaffirm_live(&self, generation: u64) {
        let payload = {
            let mut active = self.active.write().await;
            match active.as_mut() {
                Some(current)
                    if current.generation == generation
                        && current.session.state == SessionState::Live
                        && current.session.last_error.is_some() =>
                {
                    current.session.last_error = None;
                    Some((
                        Self::snapshot_of(&current.session),
                        SessionStatusInfo {
                            session_id: current.session.id,
                            kind: current.session.kind.clone(),
                            previous_state: SessionState::Live,
                            new_state: SessionState::Live,
                            reason: None,
                            timestamp: Utc::now(),
                        },
                    ))
                }
                _ => None,
            }
        };
        if let Some((snapshot, info)) = payload {
            self.announce(snapshot, info).await;
        }
    }

    async fn spawn_watcher(
        &self,
        generation: u64,
        session_id: SessionId,
        transport: Arc<dyn MediaTransport>,
    ) {
        let mut events = transport.subscribe_connectivity().await;
        let manager = self.clone();
        let handle = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                debug!("session {} connectivity: {}", session_id, event);
                let handler = manager.handler.read().await.clone();
                if let Some(handler) = handler {
                    handler.on_connectivity_event(session_id, event).await;
                }
                match event {
                    ConnectivityEvent::Connected => {
                        manager.reaffirm_live(generation).await;
                    }
                    ConnectivityEvent::Disconnected | ConnectivityEvent::Failed => {
                        let reason =
                            ClientError::connectivity_lost(format!("transport reported {}", event))
                                .to_string();
                        if manager.fail(generation, reason).await {
                            transport.close().await;
                            break;
                        }
                    }
                }
            }
        });

        let mut active = self.active.write().await;
        match active.as_mut() {
            Some(current) if current.generation == generation => {
                current.watcher = Some(handle);
            }
            // The session vanished while we were spawning; nothing to watch.
            _ => handle.abort(),
        }
    }
}
