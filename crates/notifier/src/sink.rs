//! Notification sink: outbound delivery of rendered messages.

use std::future::Future;

use herald_common::types::DeliveryResult;

/// Markup the delivery channel should apply to a message.
///
/// Plain text is always an acceptable fallback for every channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FormatHint {
    #[default]
    Plain,
    Html,
}

/// A single destination for rendered messages (e.g. one Telegram chat).
pub trait NotificationSink {
    /// Destination name for logging (e.g. "telegram").
    fn name(&self) -> &str;

    /// Deliver one message.
    ///
    /// Channel failures are reported as `DeliveryResult::Failed`, never
    /// retried here and never raised as errors.
    fn send(&self, message: &str) -> impl Future<Output = DeliveryResult> + Send;
}
