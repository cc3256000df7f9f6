//! The `DeliveryChannel` trait: the boundary to the messaging system.
//!
//! The channel's own lifecycle (authentication, reconnects) is not managed
//! here. Callers only ask whether it is ready and hand it messages.

use std::future::Future;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Readiness as reported by the channel.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChannelStatus {
  Ready,
  AwaitingAuthentication,
  Disconnected,
}

impl ChannelStatus {
  pub fn is_ready(self) -> bool { matches!(self, Self::Ready) }
}

/// Abstraction over a messaging channel.
pub trait DeliveryChannel: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Current readiness. An error here is treated as [`ChannelStatus::Disconnected`]
  /// by callers.
  fn status(
    &self,
  ) -> impl Future<Output = Result<ChannelStatus, Self::Error>> + Send + '_;

  /// Deliver `text` to `destination`.
  fn send<'a>(
    &'a self,
    destination: &'a str,
    text: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}
