use std::io;

use thiserror::Error;

/// Rejected notification input. Raised at construction, so an invalid
/// notification never reaches the outbound queue.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Device token is not valid hex: {0}")]
    InvalidTokenHex(String),

    #[error("Device token must decode to 32 bytes, got {actual}")]
    InvalidTokenLength { actual: usize },

    #[error("Alert must not be empty")]
    EmptyAlert,

    #[error("Extras must not contain the reserved `aps` key")]
    ReservedExtrasKey,

    #[error("Payload of {size} bytes does not fit the frame length field")]
    PayloadTooLarge { size: usize },

    #[error("Failed to encode payload: {0}")]
    PayloadEncoding(String),
}

/// Connection level failures. These are recovered inside the client loops
/// and only become visible through `PushClient::status`.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    #[error("{operation} to {endpoint} timed out")]
    Timeout { operation: &'static str, endpoint: String },

    #[error("Invalid server name: {0}")]
    InvalidServerName(String),

    #[error("TLS handshake failed: {0}")]
    Handshake(String),

    #[error("Connection I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Malformed inbound frame.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    #[error("Expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },

    #[error("Unexpected token length {0}")]
    TokenLength(u16),
}

/// Client setup errors (certificates, TLS configuration, environment).
#[derive(Error, Debug)]
pub enum ApnsError {
    #[error("Failed to load certificate: {0}")]
    Certificate(String),

    #[error("Failed to load private key: {0}")]
    PrivateKey(String),

    #[error("TLS configuration error: {0}")]
    Tls(String),

    #[error("APNs configuration error: {0}")]
    Config(String),
}

impl From<envy::Error> for ApnsError {
    fn from(err: envy::Error) -> Self {
        ApnsError::Config(err.to_string())
    }
}
