use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::codec::{self, DeviceToken, FEEDBACK_ITEM_LEN};
use crate::config::Endpoint;
use crate::transport::{read_frame, Connector};

/// A device token the gateway reports as no longer accepting notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeedbackItem {
    /// Unix time at which the gateway determined the app was gone.
    pub timestamp: u32,
    #[serde(with = "hex_token")]
    pub token: DeviceToken,
}

impl FeedbackItem {
    pub fn token_hex(&self) -> String {
        hex::encode(self.token)
    }

    pub fn time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(i64::from(self.timestamp), 0)
    }
}

mod hex_token {
    use serde::Serializer;

    pub fn serialize<S: Serializer>(token: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(token))
    }
}

/// Drain the feedback service once.
///
/// Opens a single connection and forwards every well-formed item until the
/// gateway closes it. Malformed items are skipped; there is no reconnect.
pub(crate) async fn run_feedback_service(
    connector: Arc<dyn Connector>,
    endpoint: Endpoint,
    items: mpsc::UnboundedSender<FeedbackItem>,
) {
    info!(endpoint = %endpoint, "Feedback service starting");

    let mut stream = match connector.connect(&endpoint).await {
        Ok(stream) => stream,
        Err(e) => {
            error!(endpoint = %endpoint, error = %e, "Failed to connect to feedback service");
            return;
        }
    };

    let mut received = 0usize;
    let mut buf = [0u8; FEEDBACK_ITEM_LEN];
    loop {
        let n = match read_frame(&mut stream, &mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                warn!(endpoint = %endpoint, error = %e, "Feedback connection read failed");
                break;
            }
        };

        match codec::unpack_feedback_item(&buf[..n]) {
            Ok(item) => {
                debug!(token = %item.token_hex(), timestamp = item.timestamp, "Feedback item received");
                received += 1;
                if items.send(item).is_err() {
                    break;
                }
            }
            Err(e) => debug!(error = %e, "Skipping malformed feedback item"),
        }
    }

    let _ = stream.shutdown().await;
    info!(endpoint = %endpoint, received, "Feedback service finished");
}
