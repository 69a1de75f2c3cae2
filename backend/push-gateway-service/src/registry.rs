/// Registered device tokens
use async_trait::async_trait;
use dashmap::DashSet;
use nova_apns_binary::codec;
use nova_apns_binary::ValidationError;

/// Storage for device tokens known to the front-end.
///
/// Injected into handlers as `Arc<dyn DeviceRegistry>` so a persistent store
/// can replace the in-memory one.
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    /// Store a token; returns its canonical lowercase hex form.
    async fn register(&self, token: &str) -> Result<String, ValidationError>;

    /// Returns whether the token was registered.
    async fn remove(&self, token: &str) -> bool;

    /// All tokens, sorted.
    async fn list(&self) -> Vec<String>;
}

#[derive(Debug, Default)]
pub struct InMemoryDeviceRegistry {
    devices: DashSet<String>,
}

impl InMemoryDeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeviceRegistry for InMemoryDeviceRegistry {
    async fn register(&self, token: &str) -> Result<String, ValidationError> {
        codec::decode_token(token)?;
        let token = token.trim().to_ascii_lowercase();
        self.devices.insert(token.clone());
        Ok(token)
    }

    async fn remove(&self, token: &str) -> bool {
        self.devices.remove(&token.trim().to_ascii_lowercase()).is_some()
    }

    async fn list(&self) -> Vec<String> {
        let mut devices: Vec<String> = self.devices.iter().map(|d| d.key().clone()).collect();
        devices.sort();
        devices
    }
}
