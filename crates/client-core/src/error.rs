//! Error types for the detector client library
//!
//! The taxonomy distinguishes the three failure classes the presentation
//! shell reacts to differently: the server could not be reached at all
//! (`Transport`), the server answered but rejected the negotiation
//! (`Signaling`), and a previously live session lost its media path
//! (`ConnectivityLost`). `MalformedResponse` exists for payloads that do not
//! match the expected shape; the status poller swallows it locally as
//! "no update" rather than surfacing it.

use thiserror::Error;

/// Result type for detector client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur while driving a detector session
///
/// # Examples
///
/// ```rust
/// use sitewatch_client_core::error::ClientError;
///
/// let error = ClientError::signaling(500, "inference pipeline unavailable");
/// assert!(matches!(error, ClientError::Signaling { status_code: 500, .. }));
/// assert!(error.to_string().contains("500"));
/// ```
#[derive(Debug, Error)]
pub enum ClientError {
    /// The detection server could not be reached at all
    #[error("could not reach detection server: {message}")]
    Transport { message: String },

    /// The server was reachable but rejected or errored the negotiation
    #[error("signaling failed with status {status_code}: {body}")]
    Signaling { status_code: u16, body: String },

    /// A live session's underlying media path reported failed/disconnected
    #[error("live connection lost: {reason}")]
    ConnectivityLost { reason: String },

    /// A response body did not match any recognized shape
    #[error("malformed response: {message}")]
    MalformedResponse { message: String },

    /// The server answered a plain request with a non-success status
    #[error("server rejected request with status {status_code}: {body}")]
    Rejected { status_code: u16, body: String },

    /// An operation was attempted in a state that does not permit it
    #[error("invalid state: {message}")]
    InvalidState { message: String },

    /// The media transport could not produce or apply a description
    #[error("media transport error: {message}")]
    Media { message: String },

    /// Configuration error
    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl ClientError {
    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a signaling error from a non-success negotiation response
    pub fn signaling(status_code: u16, body: impl Into<String>) -> Self {
        Self::Signaling {
            status_code,
            body: body.into(),
        }
    }

    /// Create a connectivity-loss error
    pub fn connectivity_lost(reason: impl Into<String>) -> Self {
        Self::ConnectivityLost {
            reason: reason.into(),
        }
    }

    /// Create a malformed-response error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }

    /// Create a rejection error from a non-success plain response
    pub fn rejected(status_code: u16, body: impl Into<String>) -> Self {
        Self::Rejected {
            status_code,
            body: body.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create a media transport error
    pub fn media(message: impl Into<String>) -> Self {
        Self::Media {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(error: reqwest::Error) -> Self {
        Self::Transport {
            message: error.to_string(),
        }
    }
}
