//! Signaling exchange with the remote detection server
//!
//! The [`SignalingClient`] performs exactly one request/response exchange per
//! negotiation attempt: it submits a finalized local session description to
//! the server's `/offer` endpoint and returns the answering description. It
//! carries no retry policy of its own (that is the session manager's call)
//! and mutates no shared state.
//!
//! It also owns the rest of the server's plain HTTP surface that relates to
//! feeds: the cache-busted media URLs for the polled-image design and the
//! `/stop_camera` teardown request.
//!
//! # Wire format
//!
//! The negotiation payload is fixed on both sides:
//!
//! ```json
//! {"sdp": "v=0...", "type": "offer"}
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::form_urlencoded;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// An opaque session-description blob exchanged during negotiation
///
/// # Examples
///
/// ```rust
/// use sitewatch_client_core::signaling::SessionDescription;
///
/// let offer = SessionDescription::offer("v=0\r\n");
/// assert_eq!(offer.kind, "offer");
///
/// // Serialized with the wire name `type`
/// let json = serde_json::to_value(&offer).unwrap();
/// assert_eq!(json["type"], "offer");
/// assert_eq!(json["sdp"], "v=0\r\n");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    /// The session description payload
    pub sdp: String,
    /// Description type, `offer` or `answer` on this surface
    #[serde(rename = "type")]
    pub kind: String,
}

impl SessionDescription {
    /// Build an offer description
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp: sdp.into(),
            kind: "offer".to_string(),
        }
    }

    /// Build an answer description
    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp: sdp.into(),
            kind: "answer".to_string(),
        }
    }
}

/// One-shot negotiation client for the detection server
pub struct SignalingClient {
    http: reqwest::Client,
    base: String,
}

impl SignalingClient {
    /// Build a signaling client bound to the configured server address
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|error| {
                ClientError::configuration(format!("could not build HTTP client: {}", error))
            })?;
        Ok(Self {
            http,
            base: config.endpoint_base(),
        })
    }

    /// Exchange a finalized local description for the server's answer
    ///
    /// Performs a single `POST /offer`. A non-success status yields
    /// [`ClientError::Signaling`] carrying the status and response body; a
    /// network-level failure yields [`ClientError::Transport`]. No retry is
    /// performed here.
    pub async fn negotiate(
        &self,
        local: &SessionDescription,
    ) -> ClientResult<SessionDescription> {
        debug!("posting {} description to {}/offer", local.kind, self.base);
        let response = self
            .http
            .post(format!("{}/offer", self.base))
            .json(local)
            .send()
            .await
            .map_err(|error| ClientError::transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::signaling(status.as_u16(), body));
        }

        response
            .json::<SessionDescription>()
            .await
            .map_err(|error| {
                ClientError::malformed(format!("answer was not a session description: {}", error))
            })
    }

    /// Ask the server to stop producing the current feed
    ///
    /// Errors are surfaced to the caller and never retried; local teardown
    /// does not depend on this call succeeding.
    pub async fn stop_feed(&self) -> ClientResult<()> {
        let response = self
            .http
            .post(format!("{}/stop_camera", self.base))
            .send()
            .await
            .map_err(|error| ClientError::transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::rejected(status.as_u16(), body));
        }
        Ok(())
    }

    /// Media URL for the server's own camera feed
    ///
    /// The `t` token is unique per request so intermediaries cannot serve a
    /// cached copy of a "live" resource.
    pub fn webcam_feed_url(&self) -> String {
        format!("{}/video_feed?t={}", self.base, cache_bust_token())
    }

    /// Media URL for a server-ingested remote video link
    pub fn remote_feed_url(&self, link: &str) -> String {
        let encoded: String = form_urlencoded::byte_serialize(link.as_bytes()).collect();
        format!(
            "{}/stream_youtube?link={}&t={}",
            self.base,
            encoded,
            cache_bust_token()
        )
    }

    /// Media URL for the given source kind
    pub fn feed_url(&self, kind: &crate::session::SourceKind) -> String {
        match kind {
            crate::session::SourceKind::Webcam => self.webcam_feed_url(),
            crate::session::SourceKind::RemoteUrl(link) => self.remote_feed_url(link),
        }
    }
}

fn cache_bust_token() -> i64 {
    Utc::now().timestamp_millis()
}
