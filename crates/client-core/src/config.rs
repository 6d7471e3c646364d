//! Client configuration
//!
//! All components share one [`ClientConfig`]: the base address of the remote
//! detection server plus the polling cadences. The base address is set once
//! and treated as immutable for the lifetime of the components built from
//! it; nothing mutates it after polling or negotiation has begun.
//!
//! # Usage Examples
//!
//! ```rust
//! use std::time::Duration;
//! use sitewatch_client_core::config::ClientConfig;
//!
//! let config = ClientConfig::new("http://localhost:8080")
//!     .unwrap()
//!     .with_log_poll_interval(Duration::from_secs(10))
//!     .with_user_agent("safety-dashboard/2.0".to_string());
//!
//! assert_eq!(config.log_poll_interval, Duration::from_secs(10));
//! assert_eq!(config.latency_interval.as_millis(), 1500);
//! assert_eq!(config.user_agent, "safety-dashboard/2.0");
//! ```

use std::time::Duration;

use url::Url;

use crate::error::{ClientError, ClientResult};

/// Default cadence for the violation-log/health poll
pub const DEFAULT_LOG_POLL_INTERVAL: Duration = Duration::from_millis(5000);

/// Default cadence for the simulated latency readout
pub const DEFAULT_LATENCY_INTERVAL: Duration = Duration::from_millis(1500);

/// Configuration for the detector client components
///
/// # Examples
///
/// ```rust
/// use sitewatch_client_core::config::ClientConfig;
///
/// let config = ClientConfig::new("http://192.168.1.50:8080").unwrap();
/// assert_eq!(config.base_url.as_str(), "http://192.168.1.50:8080/");
/// assert_eq!(config.log_poll_interval.as_millis(), 5000);
///
/// // Non-HTTP schemes are rejected up front
/// assert!(ClientConfig::new("ftp://example.com").is_err());
/// assert!(ClientConfig::new("not a url").is_err());
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base address of the remote detection server
    pub base_url: Url,
    /// User-Agent header sent on every request
    pub user_agent: String,
    /// How often the status poller queries `/logs`
    pub log_poll_interval: Duration,
    /// How often the simulated latency readout refreshes
    pub latency_interval: Duration,
}

impl ClientConfig {
    /// Create a configuration for the given server address with defaults
    ///
    /// Fails if the address is not a valid `http`/`https` URL.
    pub fn new(base_url: impl AsRef<str>) -> ClientResult<Self> {
        let base_url = Url::parse(base_url.as_ref())
            .map_err(|error| ClientError::configuration(format!("invalid base URL: {}", error)))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ClientError::configuration(format!(
                "unsupported base URL scheme: {}",
                base_url.scheme()
            )));
        }
        Ok(Self {
            base_url,
            user_agent: format!("sitewatch-client-core/{}", env!("CARGO_PKG_VERSION")),
            log_poll_interval: DEFAULT_LOG_POLL_INTERVAL,
            latency_interval: DEFAULT_LATENCY_INTERVAL,
        })
    }

    /// Set the User-Agent string sent to the server
    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }

    /// Set the violation-log/health polling interval
    pub fn with_log_poll_interval(mut self, interval: Duration) -> Self {
        self.log_poll_interval = interval;
        self
    }

    /// Set the simulated latency readout interval
    pub fn with_latency_interval(mut self, interval: Duration) -> Self {
        self.latency_interval = interval;
        self
    }

    /// Base address as a string with no trailing slash, ready for joining
    /// endpoint paths
    pub(crate) fn endpoint_base(&self) -> String {
        self.base_url.as_str().trim_end_matches('/').to_string()
    }
}
