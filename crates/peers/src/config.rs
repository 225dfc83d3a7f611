//! Peer connection settings.

use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum PeerConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{name} is not a valid number of seconds: {value}")]
    InvalidTimeout { name: &'static str, value: String },
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Where the booking and routing peers live and how to talk to them.
#[derive(Clone, Debug)]
pub struct PeerConfig {
    booking_base_url: String,
    routing_base_url: String,
    timeout: Duration,
    auth_token: Option<String>,
}

impl PeerConfig {
    pub fn new(booking_base_url: impl Into<String>, routing_base_url: impl Into<String>) -> Self {
        Self {
            booking_base_url: booking_base_url.into(),
            routing_base_url: routing_base_url.into(),
            timeout: DEFAULT_TIMEOUT,
            auth_token: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sent as a bearer token on every peer request.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Reads `BOOKING_PEER_URL`, `ROUTING_PEER_URL`, `PEER_TIMEOUT_SECS` and `PEER_AUTH_TOKEN`.
    ///
    /// Call once at startup.
    pub fn from_env() -> Result<Self, PeerConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, PeerConfigError> {
        let read = |name: &'static str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let booking = read("BOOKING_PEER_URL").ok_or(PeerConfigError::Missing("BOOKING_PEER_URL"))?;
        let routing = read("ROUTING_PEER_URL").ok_or(PeerConfigError::Missing("ROUTING_PEER_URL"))?;
        let mut config = Self::new(booking, routing);

        if let Some(raw) = read("PEER_TIMEOUT_SECS") {
            let secs = raw
                .parse::<u64>()
                .map_err(|_| PeerConfigError::InvalidTimeout {
                    name: "PEER_TIMEOUT_SECS",
                    value: raw.clone(),
                })?;
            config = config.with_timeout(Duration::from_secs(secs));
        }
        if let Some(token) = read("PEER_AUTH_TOKEN") {
            config = config.with_auth_token(token);
        }
        Ok(config)
    }

    pub fn booking_base_url(&self) -> &str {
        &self.booking_base_url
    }

    pub fn routing_base_url(&self) -> &str {
        &self.routing_base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    pub(crate) fn build_client(&self) -> Result<reqwest::Client, PeerConfigError> {
        Ok(reqwest::Client::builder().timeout(self.timeout).build()?)
    }
}
