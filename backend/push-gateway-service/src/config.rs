use std::time::Duration;

use serde::Deserialize;

/// HTTP front-end settings. APNs settings live in `nova_apns_binary::ApnsConfig`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// How long startup waits for the push connection before giving up
    #[serde(default = "default_ready_timeout_secs")]
    pub apns_ready_timeout_secs: u64,
    /// Idle time after which the feedback drain is considered complete
    #[serde(default = "default_feedback_poll_timeout_secs")]
    pub feedback_poll_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_ready_timeout_secs() -> u64 {
    30
}

fn default_feedback_poll_timeout_secs() -> u64 {
    5
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.apns_ready_timeout_secs)
    }

    pub fn feedback_poll_timeout(&self) -> Duration {
        Duration::from_secs(self.feedback_poll_timeout_secs)
    }
}
