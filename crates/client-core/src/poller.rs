//! Violation log polling and connectivity health
//!
//! [`StatusPoller`] queries the server's `GET /logs` endpoint on a fixed
//! cadence from a single background task, so polls never overlap by
//! construction. Each poll doubles as the liveness probe: a successful
//! exchange marks the server online, a network failure or an error status
//! marks it offline. A 2xx body that does not parse is treated as
//! "no update" for the record list but still counts as a successful
//! liveness probe.
//!
//! Record deletion is confirmed server-side first: the record leaves the
//! local list only once the `DELETE` succeeds, so a failed delete never
//! perturbs what the dashboard shows.
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sitewatch_client_core::{ClientConfig, StatusPoller};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::new("http://localhost:8080")?;
//! let poller = Arc::new(StatusPoller::new(&config)?);
//! Arc::clone(&poller).spawn();
//!
//! let mut health = poller.subscribe_health();
//! health.changed().await?;
//! println!("server online: {}", health.borrow().online);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::{watch, RwLock};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// One helmet-violation record reported by the server
///
/// Only the identifier is required; the server has shipped both snake_case
/// and camelCase field names for the rest, so both are accepted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ViolationRecord {
    /// Server-assigned record identifier, used for deletion
    pub id: i64,
    /// Label of the detected subject
    #[serde(default)]
    pub name: Option<String>,
    /// When the violation was detected, as the server formatted it
    #[serde(default, alias = "timestamp")]
    pub time: Option<String>,
    /// Snapshot image URL captured at detection time
    #[serde(default, alias = "imageUrl", alias = "image_url")]
    pub url: Option<String>,
}

/// Server liveness as observed by the log poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionHealth {
    /// Whether the most recent poll succeeded
    pub online: bool,
}

// The server has returned both a bare array and a wrapped object from
// /logs; accept either.
#[derive(Deserialize)]
#[serde(untagged)]
enum LogsBody {
    Bare(Vec<ViolationRecord>),
    Wrapped { logs: Vec<ViolationRecord> },
}

/// Periodic poller for violation records and server health
pub struct StatusPoller {
    http: reqwest::Client,
    base: String,
    poll_interval: std::time::Duration,
    records: RwLock<Vec<ViolationRecord>>,
    health_tx: watch::Sender<ConnectionHealth>,
    shutdown_tx: watch::Sender<bool>,
}

impl StatusPoller {
    /// Build a poller bound to the configured server address
    ///
    /// The poller is inert until [`spawn`](StatusPoller::spawn) is called;
    /// [`poll_once`](StatusPoller::poll_once) can also be driven manually.
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|error| {
                ClientError::configuration(format!("could not build HTTP client: {}", error))
            })?;
        let (health_tx, _health_rx) = watch::channel(ConnectionHealth { online: false });
        let (shutdown_tx, _shutdown_rx) = watch::channel(false);
        Ok(Self {
            http,
            base: config.endpoint_base(),
            poll_interval: config.log_poll_interval,
            records: RwLock::new(Vec::new()),
            health_tx,
            shutdown_tx,
        })
    }

    /// Start the background polling task
    ///
    /// One immediate poll, then one poll per interval. Missed ticks are
    /// skipped rather than bursted, so a slow server never causes
    /// back-to-back polls. The task holds its own handle on the poller and
    /// runs until [`shutdown`](StatusPoller::shutdown).
    pub fn spawn(self: Arc<Self>) {
        let poller = self;
        let mut shutdown_rx = poller.shutdown_tx.subscribe();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poller.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        poller.poll_once().await;
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            debug!("status poller shutting down");
                            break;
                        }
                    }
                }
            }
        });
    }

    /// Stop the background polling task
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Perform one poll cycle: fetch records and update health
    pub async fn poll_once(&self) {
        match self.fetch_logs().await {
            Ok(Some(records)) => {
                debug!("poll returned {} violation records", records.len());
                *self.records.write().await = records;
                self.set_online(true);
            }
            Ok(None) => {
                // Reached the server but the body was unusable; the record
                // list keeps its previous contents.
                self.set_online(true);
            }
            Err(error) => {
                warn!("log poll failed: {}", error);
                self.set_online(false);
            }
        }
    }

    /// Latest violation records, most recent poll wins
    pub async fn records(&self) -> Vec<ViolationRecord> {
        self.records.read().await.clone()
    }

    /// Subscribe to server health transitions
    pub fn subscribe_health(&self) -> watch::Receiver<ConnectionHealth> {
        self.health_tx.subscribe()
    }

    /// Whether the most recent poll succeeded
    pub fn is_online(&self) -> bool {
        self.health_tx.borrow().online
    }

    /// Delete one violation record by id
    ///
    /// The server is asked first; the record leaves
    /// [`records`](StatusPoller::records) only once the server confirms.
    /// A failed delete leaves the local list untouched and in server order.
    pub async fn delete_record(&self, id: i64) -> ClientResult<()> {
        self.delete_on_server(id).await?;
        self.records
            .write()
            .await
            .retain(|record| record.id != id);
        Ok(())
    }

    async fn delete_on_server(&self, id: i64) -> ClientResult<()> {
        let response = self
            .http
            .delete(format!("{}/logs/{}", self.base, id))
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

    /// Fetch `/logs`; `Ok(None)` means a 2xx answer with an unusable body
    ///
    /// An error status counts as a liveness failure, same as not reaching
    /// the server at all.
    async fn fetch_logs(&self) -> ClientResult<Option<Vec<ViolationRecord>>> {
        let response = self
            .http
            .get(format!("{}/logs", self.base))
            .send()
            .await
            .map_err(|error| ClientError::transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::rejected(status.as_u16(), body));
        }

        let body = response
            .text()
            .await
            .map_err(|error| ClientError::transport(error.to_string()))?;
        Ok(parse_log_body(&body))
    }

    fn set_online(&self, online: bool) {
        self.health_tx.send_if_modified(|health| {
            if health.online == online {
                false
            } else {
                *health = ConnectionHealth { online };
                true
            }
        });
    }
}

fn parse_log_body(body: &str) -> Option<Vec<ViolationRecord>> {
    match serde_json::from_str::<LogsBody>(body) {
        Ok(LogsBody::Bare(records)) | Ok(LogsBody::Wrapped { logs: records }) => Some(records),
        Err(error) => {
            debug!("ignoring unparseable log body: {}", error);
            None
        }
    }
}
