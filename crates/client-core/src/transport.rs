//! Media transport seam
//!
//! The actual media path lives in the embedding (a browser peer connection,
//! a native WebRTC stack, or the trivial polled-image case where the feed
//! URL itself is the media path). [`MediaTransport`] is the seam the session
//! manager drives it through: produce a finalized local description, apply
//! the remote answer, report connectivity transitions, and release
//! resources on close.
//!
//! Connectivity transitions are delivered as asynchronous notifications over
//! a channel; the manager only treats them as meaningful once the remote
//! description has been applied.

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use crate::error::{ClientError, ClientResult};
use crate::signaling::SessionDescription;

/// Connectivity transition reported by a media transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    /// The media path is established (or re-established)
    Connected,
    /// The media path was lost; it may or may not come back on its own
    Disconnected,
    /// The media path failed outright
    Failed,
}

impl std::fmt::Display for ConnectivityEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectivityEvent::Connected => write!(f, "connected"),
            ConnectivityEvent::Disconnected => write!(f, "disconnected"),
            ConnectivityEvent::Failed => write!(f, "failed"),
        }
    }
}

/// The session manager's view of an underlying media connection
///
/// One transport instance backs exactly one session attempt; the embedding
/// constructs a fresh one per start, mirroring how a peer connection is
/// created per attempt and closed on teardown.
#[async_trait]
pub trait MediaTransport: Send + Sync {
    /// Whether this transport negotiates through the signaling exchange
    ///
    /// Polled-feed transports return `false`: their media path is the feed
    /// URL itself and the server-side feed is stopped through the signaling
    /// client's stop endpoint instead of a transport close.
    fn requires_signaling(&self) -> bool {
        true
    }

    /// Produce the finalized local description
    ///
    /// Candidate gathering must run to completion before this returns;
    /// handing a partial description to the signaling exchange is a
    /// correctness bug, not a style choice.
    async fn create_offer(&self) -> ClientResult<SessionDescription>;

    /// Apply the server's answering description
    async fn apply_answer(&self, answer: SessionDescription) -> ClientResult<()>;

    /// Release all transport resources
    ///
    /// Must be idempotent: closing an already-closed transport is a no-op.
    async fn close(&self);

    /// Subscribe to connectivity transitions
    ///
    /// Events emitted before the remote answer is applied carry no meaning
    /// for the session state machine.
    async fn subscribe_connectivity(&self) -> mpsc::Receiver<ConnectivityEvent>;
}

/// Transport for the polled-image feed design
///
/// There is nothing to negotiate: the cache-busted feed URL is the media
/// path. The embedding reports stream errors (for example, the image stream
/// breaking) through [`report`](PolledFeedTransport::report) so the session
/// manager can apply the same loss handling it applies to negotiated
/// transports.
///
/// # Examples
///
/// ```rust
/// use sitewatch_client_core::transport::{MediaTransport, PolledFeedTransport};
///
/// let transport = PolledFeedTransport::new();
/// assert!(!transport.requires_signaling());
/// ```
pub struct PolledFeedTransport {
    events: Mutex<Option<mpsc::Sender<ConnectivityEvent>>>,
}

impl PolledFeedTransport {
    /// Create a transport for one polled-feed session
    pub fn new() -> Self {
        Self {
            events: Mutex::new(None),
        }
    }

    /// Report a connectivity transition observed on the feed
    ///
    /// Dropped silently if nobody has subscribed yet or the transport is
    /// closed.
    pub async fn report(&self, event: ConnectivityEvent) {
        let sender = self.events.lock().await.clone();
        if let Some(sender) = sender {
            let _ = sender.send(event).await;
        }
    }
}

#[async_trait]
impl MediaTransport for PolledFeedTransport {
    fn requires_signaling(&self) -> bool {
        false
    }

    async fn create_offer(&self) -> ClientResult<SessionDescription> {
        Err(ClientError::invalid_state(
            "polled feed transports do not negotiate",
        ))
    }

    async fn apply_answer(&self, _answer: SessionDescription) -> ClientResult<()> {
        Err(ClientError::invalid_state(
            "polled feed transports do not negotiate",
        ))
    }

    async fn close(&self) {
        self.events.lock().await.take();
    }

    async fn subscribe_connectivity(&self) -> mpsc::Receiver<ConnectivityEvent> {
        let (tx, rx) = mpsc::channel(16);
        *self.events.lock().await = Some(tx);
        rx
    }
}
