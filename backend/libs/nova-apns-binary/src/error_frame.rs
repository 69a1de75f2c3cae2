use std::fmt;

use serde::Serialize;

use crate::codec;

/// Reason carried in the gateway's error response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorStatus {
    NoError,
    ProcessingError,
    MissingDeviceToken,
    MissingTopic,
    MissingPayload,
    InvalidTokenSize,
    InvalidTopicSize,
    InvalidPayloadSize,
    InvalidToken,
    Unknown,
    /// A status code outside the documented table.
    Other(u8),
    /// The response could not be read as a full 6-byte frame.
    Malformed,
}

impl ErrorStatus {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => ErrorStatus::NoError,
            1 => ErrorStatus::ProcessingError,
            2 => ErrorStatus::MissingDeviceToken,
            3 => ErrorStatus::MissingTopic,
            4 => ErrorStatus::MissingPayload,
            5 => ErrorStatus::InvalidTokenSize,
            6 => ErrorStatus::InvalidTopicSize,
            7 => ErrorStatus::InvalidPayloadSize,
            8 => ErrorStatus::InvalidToken,
            255 => ErrorStatus::Unknown,
            other => ErrorStatus::Other(other),
        }
    }

    /// Wire status code, `None` for a malformed response.
    pub fn code(&self) -> Option<u8> {
        match self {
            ErrorStatus::NoError => Some(0),
            ErrorStatus::ProcessingError => Some(1),
            ErrorStatus::MissingDeviceToken => Some(2),
            ErrorStatus::MissingTopic => Some(3),
            ErrorStatus::MissingPayload => Some(4),
            ErrorStatus::InvalidTokenSize => Some(5),
            ErrorStatus::InvalidTopicSize => Some(6),
            ErrorStatus::InvalidPayloadSize => Some(7),
            ErrorStatus::InvalidToken => Some(8),
            ErrorStatus::Unknown => Some(255),
            ErrorStatus::Other(code) => Some(*code),
            ErrorStatus::Malformed => None,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ErrorStatus::NoError => "No errors encountered",
            ErrorStatus::ProcessingError => "Processing error",
            ErrorStatus::MissingDeviceToken => "Missing device token",
            ErrorStatus::MissingTopic => "Missing topic",
            ErrorStatus::MissingPayload => "Missing payload",
            ErrorStatus::InvalidTokenSize => "Invalid token size",
            ErrorStatus::InvalidTopicSize => "Invalid topic size",
            ErrorStatus::InvalidPayloadSize => "Invalid payload size",
            ErrorStatus::InvalidToken => "Invalid token",
            ErrorStatus::Unknown | ErrorStatus::Other(_) => "None (unknown)",
            ErrorStatus::Malformed => "Malformed error-response packet",
        }
    }
}

impl fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Asynchronous error response from the gateway.
///
/// The gateway sends at most one of these per connection and closes the
/// socket right after, so a frame always ends the current connection.
/// `identifier` matches the `Notification::identifier` that was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ErrorFrame {
    pub command: u8,
    pub status: ErrorStatus,
    pub identifier: u32,
}

impl ErrorFrame {
    pub fn decode(bytes: &[u8]) -> Self {
        codec::unpack_error_frame(bytes)
    }

    pub(crate) fn malformed() -> Self {
        Self {
            command: 0,
            status: ErrorStatus::Malformed,
            identifier: 0,
        }
    }

    pub fn is_malformed(&self) -> bool {
        self.status == ErrorStatus::Malformed
    }
}

impl fmt::Display for ErrorFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (identifier {})", self.status, self.identifier)
    }
}
