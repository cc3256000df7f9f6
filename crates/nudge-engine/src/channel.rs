//! Time-bounded calls into a [`DeliveryChannel`].
//!
//! A channel that hangs is treated like one that failed: readiness checks
//! report not-ready and sends report an error once `timeout` elapses.

use std::time::Duration;

use nudge_core::channel::{ChannelStatus, DeliveryChannel};
use tracing::warn;

/// Ask the channel for its status, mapping errors and timeouts to
/// [`ChannelStatus::Disconnected`].
pub async fn status<C>(channel: &C, timeout: Duration) -> ChannelStatus
where
  C: DeliveryChannel,
{
  match tokio::time::timeout(timeout, channel.status()).await {
    Ok(Ok(status)) => status,
    Ok(Err(e)) => {
      warn!(error = %e, "channel status check failed");
      ChannelStatus::Disconnected
    }
    Err(_) => {
      warn!(timeout_ms = timeout.as_millis() as u64, "channel status check timed out");
      ChannelStatus::Disconnected
    }
  }
}

/// Send one message. The error is the human-readable reason recorded
/// against the notification.
pub async fn send<C>(
  channel: &C,
  destination: &str,
  text: &str,
  timeout: Duration,
) -> Result<(), String>
where
  C: DeliveryChannel,
{
  match tokio::time::timeout(timeout, channel.send(destination, text)).await {
    Ok(Ok(())) => Ok(()),
    Ok(Err(e)) => Err(e.to_string()),
    Err(_) => Err(format!("send timed out after {}s", timeout.as_secs())),
  }
}
