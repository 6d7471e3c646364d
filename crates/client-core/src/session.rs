//! Session types for the detector client
//!
//! A [`Session`] represents one attempt to obtain a live annotated feed from
//! the remote detection server. The manager owns at most one of these at a
//! time and is the only mutator; everything else observes snapshots.
//!
//! # State Transitions
//!
//! Typical session flow:
//! `Idle` → `Negotiating` → `Live` → `Closed`/`Failed`
//!
//! `Closed` and `Failed` are terminal for that session instance; a new start
//! always begins a fresh session.
//!
//! # Examples
//!
//! ```rust
//! use sitewatch_client_core::session::{SessionState, SourceKind};
//!
//! let state = SessionState::Live;
//! assert!(!state.is_terminal());
//! assert_eq!(state.to_string(), "Live");
//!
//! let kind = SourceKind::RemoteUrl("https://youtu.be/x".to_string());
//! assert_eq!(kind.label(), "remote-url");
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::signaling::SessionDescription;

/// Unique identifier for one session attempt
pub type SessionId = Uuid;

/// The feed source a session is acquired from
///
/// The two designs observed in the product (direct webcam capture on the
/// server, and a remote video URL the server ingests) are variants of one
/// session abstraction, so the state machine and cleanup guarantees are
/// written once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    /// The server's own camera feed
    Webcam,
    /// A remote video URL (e.g. a YouTube link) the server ingests
    RemoteUrl(String),
}

impl SourceKind {
    /// Short stable label for logs and UI badges
    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::Webcam => "webcam",
            SourceKind::RemoteUrl(_) => "remote-url",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Webcam => write!(f, "webcam"),
            SourceKind::RemoteUrl(link) => write!(f, "remote-url({})", link),
        }
    }
}

/// Current state of a detector session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// No session activity; the manager is ready for a start command
    Idle,
    /// A local description is being finalized and exchanged with the server
    Negotiating,
    /// The remote description was applied and media is expected to flow
    Live,
    /// The session ended on explicit stop or teardown
    Closed,
    /// Negotiation failed or a live connection was lost
    Failed,
}

impl SessionState {
    /// Whether this state ends the session instance
    ///
    /// Terminal sessions are never revived; recovery is a fresh start.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::Negotiating => write!(f, "Negotiating"),
            SessionState::Live => write!(f, "Live"),
            SessionState::Closed => write!(f, "Closed"),
            SessionState::Failed => write!(f, "Failed"),
        }
    }
}

/// One attempt to establish and hold a live feed
///
/// Mutated only by the session manager in response to negotiation results
/// and connectivity callbacks.
#[derive(Debug, Clone)]
pub struct Session {
    /// Opaque identifier created at session start
    pub id: SessionId,
    /// Which source this session pulls from
    pub kind: SourceKind,
    /// Current lifecycle state
    pub state: SessionState,
    /// The finalized local description sent to the server (peer-negotiated
    /// sessions only)
    pub local_description: Option<SessionDescription>,
    /// The server's answering description (peer-negotiated sessions only)
    pub remote_description: Option<SessionDescription>,
    /// Cache-busted media URL for this session's source
    pub feed_url: Option<String>,
    /// Human-readable reason for the most recent failure, if any
    pub last_error: Option<String>,
    /// When this session attempt was created
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Create a fresh session in `Idle` for the given source
    pub fn new(kind: SourceKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            state: SessionState::Idle,
            local_description: None,
            remote_description: None,
            feed_url: None,
            last_error: None,
            created_at: Utc::now(),
        }
    }
}
