use std::time::Duration;

use nova_apns_binary::PushClient;
use tracing::{debug, info};

use crate::registry::DeviceRegistry;

/// Drain the feedback service and forget every device it reports.
///
/// Stops once no item arrives within `poll_timeout`. Returns how many
/// registered devices were removed.
pub async fn prune_stale_devices(
    client: &PushClient,
    registry: &dyn DeviceRegistry,
    poll_timeout: Duration,
) -> usize {
    let mut removed = 0;

    while let Some(item) = client.poll_feedback(poll_timeout).await {
        let token = item.token_hex();
        if registry.remove(&token).await {
            removed += 1;
            info!(token = %token, reported_at = ?item.time(), "Removed stale device");
        } else {
            debug!(token = %token, "Feedback for unregistered device");
        }
    }

    info!(removed, "Feedback drain finished");
    removed
}
