use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::errors::ApnsError;
use crate::reconnect::ExponentialBackoff;

/// Host and port of one gateway service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Push and feedback endpoints of one gateway environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub push: Endpoint,
    pub feedback: Endpoint,
}

impl Endpoints {
    pub fn sandbox() -> Self {
        Self {
            push: Endpoint::new("gateway.sandbox.push.apple.com", 2195),
            feedback: Endpoint::new("feedback.sandbox.push.apple.com", 2196),
        }
    }

    pub fn production() -> Self {
        Self {
            push: Endpoint::new("gateway.push.apple.com", 2195),
            feedback: Endpoint::new("feedback.push.apple.com", 2196),
        }
    }
}

/// APNs binary gateway configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApnsConfig {
    /// PEM file with the client certificate chain (and the key, unless
    /// `private_key_path` is set)
    pub certificate_path: PathBuf,
    #[serde(default)]
    pub private_key_path: Option<PathBuf>,
    /// CA bundle used instead of the platform roots
    #[serde(default)]
    pub ca_certificate_path: Option<PathBuf>,
    #[serde(default)]
    pub is_production: bool,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_initial_backoff_ms")]
    pub reconnect_initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub reconnect_max_backoff_ms: u64,
    #[serde(default = "default_true")]
    pub reconnect_jitter: bool,
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_initial_backoff_ms() -> u64 {
    100
}

fn default_max_backoff_ms() -> u64 {
    10_000
}

fn default_true() -> bool {
    true
}

impl ApnsConfig {
    /// Create new APNs configuration
    pub fn new(certificate_path: impl Into<PathBuf>, is_production: bool) -> Self {
        Self {
            certificate_path: certificate_path.into(),
            private_key_path: None,
            ca_certificate_path: None,
            is_production,
            connect_timeout_secs: default_connect_timeout_secs(),
            reconnect_initial_backoff_ms: default_initial_backoff_ms(),
            reconnect_max_backoff_ms: default_max_backoff_ms(),
            reconnect_jitter: true,
        }
    }

    /// Load from `APNS_*` environment variables
    /// (`APNS_CERTIFICATE_PATH`, `APNS_IS_PRODUCTION`, ...).
    pub fn from_env() -> Result<Self, ApnsError> {
        Ok(envy::prefixed("APNS_").from_env::<Self>()?)
    }

    /// Read the private key from a separate PEM file
    pub fn with_private_key(mut self, path: impl Into<PathBuf>) -> Self {
        self.private_key_path = Some(path.into());
        self
    }

    /// Trust this CA bundle instead of the platform roots
    pub fn with_ca_certificate(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_certificate_path = Some(path.into());
        self
    }

    pub fn endpoints(&self) -> Endpoints {
        if self.is_production {
            Endpoints::production()
        } else {
            Endpoints::sandbox()
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn reconnect_policy(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_backoff: Duration::from_millis(self.reconnect_initial_backoff_ms),
            max_backoff: Duration::from_millis(self.reconnect_max_backoff_ms),
            jitter: self.reconnect_jitter,
            ..Default::default()
        }
    }
}
