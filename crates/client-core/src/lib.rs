//! # sitewatch-client-core
//!
//! Session coordination layer for a helmet-violation monitoring dashboard.
//! It negotiates a live annotated video feed from a remote detection server,
//! supervises the session through its full lifecycle, and keeps the
//! dashboard's violation log and connectivity indicators current.
//!
//! Three cooperating pieces:
//!
//! - [`SessionManager`]: the single-session state machine. Drives
//!   `Idle → Negotiating → Live → (Closed | Failed)`, exchanges session
//!   descriptions with the server, and reacts to transport connectivity.
//! - [`StatusPoller`]: polls the server's violation log on a fixed cadence;
//!   the same poll doubles as the liveness probe behind the online/offline
//!   indicator.
//! - [`LatencyMonitor`]: the cosmetic stream-latency readout.
//!
//! The media path itself is behind the [`MediaTransport`] seam so the same
//! state machine serves both a negotiated (WebRTC-style) feed and the
//! trivial polled-image feed.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sitewatch_client_core::{
//!     ClientConfig, SessionManager, SourceKind, StatusPoller,
//! };
//! use sitewatch_client_core::transport::PolledFeedTransport;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::new("http://192.168.1.50:8080")?;
//!
//!     let manager = SessionManager::new(&config)?;
//!     let poller = Arc::new(StatusPoller::new(&config)?);
//!     Arc::clone(&poller).spawn();
//!
//!     let session_id = manager
//!         .start(SourceKind::Webcam, Arc::new(PolledFeedTransport::new()))
//!         .await?;
//!     println!("session {} live", session_id);
//!
//!     for record in poller.records().await {
//!         println!("violation #{}: {:?}", record.id, record.name);
//!     }
//!
//!     manager.stop().await?;
//!     poller.shutdown();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod latency;
pub mod manager;
pub mod poller;
pub mod session;
pub mod signaling;
pub mod transport;

pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use events::{SessionEventHandler, SessionStatusInfo};
pub use latency::LatencyMonitor;
pub use manager::{SessionManager, SessionSnapshot};
pub use poller::{ConnectionHealth, StatusPoller, ViolationRecord};
pub use session::{Session, SessionId, SessionState, SourceKind};
pub use signaling::{SessionDescription, SignalingClient};
pub use transport::{ConnectivityEvent, MediaTransport, PolledFeedTransport};
