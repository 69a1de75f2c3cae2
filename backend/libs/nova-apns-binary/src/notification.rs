use bytes::Bytes;
use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::codec::{self, DeviceToken};
use crate::errors::ValidationError;

/// Default lifetime on the gateway when no expiry is given.
pub const DEFAULT_EXPIRY_SECS: i64 = 86_400;

/// Sound used by the convenience send helpers.
pub const DEFAULT_SOUND: &str = "default";

/// The `alert` entry of the `aps` dictionary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Alert {
    Text(String),
    Dictionary(AlertDictionary),
}

/// Localised alert form.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct AlertDictionary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_loc_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loc_key: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub loc_args: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub launch_image: Option<String>,
}

impl Alert {
    fn is_empty(&self) -> bool {
        match self {
            Alert::Text(text) => text.is_empty(),
            Alert::Dictionary(dict) => {
                dict.body.as_deref().map_or(true, str::is_empty)
                    && dict.loc_key.as_deref().map_or(true, str::is_empty)
            }
        }
    }
}

impl From<&str> for Alert {
    fn from(text: &str) -> Self {
        Alert::Text(text.to_string())
    }
}

impl From<String> for Alert {
    fn from(text: String) -> Self {
        Alert::Text(text)
    }
}

impl From<AlertDictionary> for Alert {
    fn from(dict: AlertDictionary) -> Self {
        Alert::Dictionary(dict)
    }
}

/// One push message, validated and encoded at construction.
///
/// Immutable once built, so it can be framed any number of times from any
/// thread.
#[derive(Debug, Clone)]
pub struct Notification {
    token: DeviceToken,
    alert: Alert,
    badge: Option<u32>,
    sound: Option<String>,
    extras: Option<Map<String, Value>>,
    identifier: u32,
    expiry: u32,
    payload: Bytes,
}

impl Notification {
    /// Plain alert with no badge, sound or extras.
    pub fn new(device_token: &str, alert: impl Into<Alert>) -> Result<Self, ValidationError> {
        Self::builder(device_token, alert).build()
    }

    pub fn builder(device_token: &str, alert: impl Into<Alert>) -> NotificationBuilder {
        NotificationBuilder {
            device_token: device_token.to_string(),
            alert: alert.into(),
            badge: None,
            sound: None,
            extras: None,
            identifier: 0,
            expiry: None,
        }
    }

    pub fn token(&self) -> &DeviceToken {
        &self.token
    }

    pub fn token_hex(&self) -> String {
        hex::encode(self.token)
    }

    pub fn alert(&self) -> &Alert {
        &self.alert
    }

    pub fn badge(&self) -> Option<u32> {
        self.badge
    }

    pub fn sound(&self) -> Option<&str> {
        self.sound.as_deref()
    }

    pub fn extras(&self) -> Option<&Map<String, Value>> {
        self.extras.as_ref()
    }

    pub fn identifier(&self) -> u32 {
        self.identifier
    }

    pub fn expiry(&self) -> u32 {
        self.expiry
    }

    /// JSON payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Full enhanced-format wire frame.
    pub fn frame(&self) -> Bytes {
        codec::pack_notification(self.identifier, self.expiry, &self.token, &self.payload)
    }
}

#[derive(Debug, Clone)]
pub struct NotificationBuilder {
    device_token: String,
    alert: Alert,
    badge: Option<u32>,
    sound: Option<String>,
    extras: Option<Map<String, Value>>,
    identifier: u32,
    expiry: Option<u32>,
}

impl NotificationBuilder {
    pub fn badge(mut self, badge: u32) -> Self {
        self.badge = Some(badge);
        self
    }

    pub fn sound(mut self, sound: impl Into<String>) -> Self {
        self.sound = Some(sound.into());
        self
    }

    /// Custom keys merged into the top level of the payload next to `aps`.
    pub fn extras(mut self, extras: Map<String, Value>) -> Self {
        self.extras = Some(extras);
        self
    }

    /// Correlation id echoed back in an error response.
    pub fn identifier(mut self, identifier: u32) -> Self {
        self.identifier = identifier;
        self
    }

    /// Unix timestamp after which the gateway may drop the notification.
    pub fn expiry(mut self, expiry: u32) -> Self {
        self.expiry = Some(expiry);
        self
    }

    pub fn build(self) -> Result<Notification, ValidationError> {
        let token = codec::decode_token(&self.device_token)?;
        if self.alert.is_empty() {
            return Err(ValidationError::EmptyAlert);
        }

        let payload = codec::encode_payload(
            &self.alert,
            self.badge,
            self.sound.as_deref(),
            self.extras.as_ref(),
        )?;
        if payload.len() > usize::from(u16::MAX) {
            return Err(ValidationError::PayloadTooLarge {
                size: payload.len(),
            });
        }

        let expiry = self.expiry.unwrap_or_else(default_expiry);

        Ok(Notification {
            token,
            alert: self.alert,
            badge: self.badge,
            sound: self.sound,
            extras: self.extras,
            identifier: self.identifier,
            expiry,
            payload: Bytes::from(payload),
        })
    }
}

fn default_expiry() -> u32 {
    let expiry = Utc::now().timestamp() + DEFAULT_EXPIRY_SECS;
    u32::try_from(expiry).unwrap_or(u32::MAX)
}
