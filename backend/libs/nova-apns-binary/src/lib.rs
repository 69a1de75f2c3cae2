/// Nova APNs Binary Gateway Client
///
/// Persistent client for the APNs "enhanced notification" binary protocol
/// over TCP/TLS, used where the HTTP/2 provider API is not available.
///
/// It handles:
/// - Binary framing of notifications and parsing of error / feedback frames
/// - A long-lived TLS connection with client certificate authentication
/// - Queued, ordered delivery with automatic reconnect
/// - Asynchronous error responses surfaced through `PushClient::last_error`
/// - Draining the feedback service for stale device tokens
pub mod client;
pub mod codec;
pub mod config;
pub mod error_frame;
pub mod errors;
pub mod feedback;
pub mod notification;
pub mod reconnect;
pub mod transport;

pub use client::{ConnectionState, PushClient};
pub use config::{ApnsConfig, Endpoint, Endpoints};
pub use error_frame::{ErrorFrame, ErrorStatus};
pub use errors::{ApnsError, CodecError, TransportError, ValidationError};
pub use feedback::FeedbackItem;
pub use notification::{Alert, AlertDictionary, Notification, NotificationBuilder};
pub use reconnect::{ExponentialBackoff, NoBackoff, ReconnectPolicy};
pub use transport::{BoxedStream, Connector, GatewayStream, TlsGatewayConnector};
