//! Binary framing for the enhanced notification format.
//!
//! All integers are big-endian.
//!
//! ```text
//! notification:   | 1 (u8) | identifier (u32) | expiry (u32) | 32 (u16) | token (32B) | len (u16) | payload |
//! error response: | 8 (u8) | status (u8) | identifier (u32) |
//! feedback item:  | timestamp (u32) | 32 (u16) | token (32B) |
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error_frame::{ErrorFrame, ErrorStatus};
use crate::errors::{CodecError, ValidationError};
use crate::feedback::FeedbackItem;
use crate::notification::Alert;

pub const COMMAND_NOTIFICATION: u8 = 1;
pub const COMMAND_ERROR_RESPONSE: u8 = 8;

pub const TOKEN_LEN: usize = 32;
pub const ERROR_RESPONSE_LEN: usize = 1 + 1 + 4;
pub const FEEDBACK_ITEM_LEN: usize = 4 + 2 + TOKEN_LEN;
/// Everything in a notification frame before the payload bytes.
pub const NOTIFICATION_HEADER_LEN: usize = 1 + 4 + 4 + 2 + TOKEN_LEN + 2;

/// Documented gateway limit for the JSON payload. Not enforced here; callers
/// that care must check `Notification::payload().len()` themselves.
pub const MAX_PAYLOAD_SIZE: usize = 256;

pub type DeviceToken = [u8; TOKEN_LEN];

#[derive(Serialize)]
struct Aps<'a> {
    alert: &'a Alert,
    #[serde(skip_serializing_if = "Option::is_none")]
    badge: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sound: Option<&'a str>,
}

/// Decode a hex device token into its 32 raw bytes.
pub fn decode_token(token_hex: &str) -> Result<DeviceToken, ValidationError> {
    let raw = hex::decode(token_hex.trim())
        .map_err(|e| ValidationError::InvalidTokenHex(e.to_string()))?;
    let actual = raw.len();
    raw.try_into()
        .map_err(|_| ValidationError::InvalidTokenLength { actual })
}

/// Encode `{"aps": {alert, badge?, sound?}, ...extras}`.
///
/// `badge` and `sound` are only written when truthy: a zero badge or an empty
/// sound name is dropped from the payload.
pub fn encode_payload(
    alert: &Alert,
    badge: Option<u32>,
    sound: Option<&str>,
    extras: Option<&Map<String, Value>>,
) -> Result<Vec<u8>, ValidationError> {
    let aps = Aps {
        alert,
        badge: badge.filter(|b| *b != 0),
        sound: sound.filter(|s| !s.is_empty()),
    };

    let mut payload = Map::new();
    payload.insert(
        "aps".to_string(),
        serde_json::to_value(&aps).map_err(|e| ValidationError::PayloadEncoding(e.to_string()))?,
    );
    if let Some(extras) = extras {
        for (key, value) in extras {
            if key == "aps" {
                return Err(ValidationError::ReservedExtrasKey);
            }
            payload.insert(key.clone(), value.clone());
        }
    }

    serde_json::to_vec(&Value::Object(payload))
        .map_err(|e| ValidationError::PayloadEncoding(e.to_string()))
}

/// Pack one enhanced-format notification frame.
///
/// The payload length must already be known to fit in a `u16`; `Notification`
/// checks this at construction.
pub fn pack_notification(
    identifier: u32,
    expiry: u32,
    token: &DeviceToken,
    payload: &[u8],
) -> Bytes {
    let mut buf = BytesMut::with_capacity(NOTIFICATION_HEADER_LEN + payload.len());
    buf.put_u8(COMMAND_NOTIFICATION);
    buf.put_u32(identifier);
    buf.put_u32(expiry);
    buf.put_u16(TOKEN_LEN as u16);
    buf.put_slice(token);
    buf.put_u16(payload.len() as u16);
    buf.put_slice(payload);
    buf.freeze()
}

/// Parse the gateway's 6-byte error response.
///
/// Anything other than exactly 6 bytes yields `ErrorStatus::Malformed` instead
/// of an error, since the connection is torn down either way.
pub fn unpack_error_frame(mut bytes: &[u8]) -> ErrorFrame {
    if bytes.len() != ERROR_RESPONSE_LEN {
        return ErrorFrame::malformed();
    }
    let command = bytes.get_u8();
    let status = ErrorStatus::from_code(bytes.get_u8());
    let identifier = bytes.get_u32();
    ErrorFrame {
        command,
        status,
        identifier,
    }
}

/// Parse one 38-byte feedback item.
pub fn unpack_feedback_item(mut bytes: &[u8]) -> Result<FeedbackItem, CodecError> {
    if bytes.len() != FEEDBACK_ITEM_LEN {
        return Err(CodecError::Length {
            expected: FEEDBACK_ITEM_LEN,
            actual: bytes.len(),
        });
    }
    let timestamp = bytes.get_u32();
    let token_len = bytes.get_u16();
    if usize::from(token_len) != TOKEN_LEN {
        return Err(CodecError::TokenLength(token_len));
    }
    let mut token = [0u8; TOKEN_LEN];
    bytes.copy_to_slice(&mut token);
    Ok(FeedbackItem { timestamp, token })
}
