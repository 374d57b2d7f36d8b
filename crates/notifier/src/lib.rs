//! Notification delivery for ReviewHerald.
//!
//! - `formatter` turns a review attempt into message text
//! - `sink` defines the delivery abstraction
//! - `telegram` delivers through the Telegram Bot API

pub mod formatter;
pub mod sink;
pub mod telegram;

pub use formatter::format_notification;
pub use sink::{FormatHint, NotificationSink};
pub use telegram::TelegramSink;
