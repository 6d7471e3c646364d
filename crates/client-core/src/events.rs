//! Event handling for session lifecycle changes
//!
//! The presentation shell can observe the session manager two ways: by
//! watching [`SessionSnapshot`](crate::manager::SessionSnapshot) updates, or
//! by registering a [`SessionEventHandler`] for push-style notifications of
//! every state transition and connectivity callback.
//!
//! # Usage Examples
//!
//! ```rust
//! use async_trait::async_trait;
//! use sitewatch_client_core::events::{SessionEventHandler, SessionStatusInfo};
//!
//! struct BannerUpdater;
//!
//! #[async_trait]
//! impl SessionEventHandler for BannerUpdater {
//!     async fn on_session_state_changed(&self, info: SessionStatusInfo) {
//!         println!(
//!             "session {} moved {} -> {}",
//!             info.session_id, info.previous_state, info.new_state
//!         );
//!     }
//! }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::session::{SessionId, SessionState, SourceKind};
use crate::transport::ConnectivityEvent;

/// Information about one session state transition
#[derive(Debug, Clone)]
pub struct SessionStatusInfo {
    /// Which session transitioned
    pub session_id: SessionId,
    /// The session's feed source
    pub kind: SourceKind,
    /// State before the transition
    pub previous_state: SessionState,
    /// State after the transition
    pub new_state: SessionState,
    /// Human-readable reason, populated for failures and teardowns
    pub reason: Option<String>,
    /// When the transition occurred
    pub timestamp: DateTime<Utc>,
}

/// Handler for session lifecycle notifications
///
/// Implementations must be cheap or hand off internally; the manager awaits
/// each callback before continuing.
#[async_trait]
pub trait SessionEventHandler: Send + Sync {
    /// Called on every session state transition, including the idempotent
    /// `Live` re-affirmation that clears a stale error banner
    async fn on_session_state_changed(&self, info: SessionStatusInfo);

    /// Called for every raw connectivity callback the transport reports
    async fn on_connectivity_event(&self, _session_id: SessionId, _event: ConnectivityEvent) {}
}
