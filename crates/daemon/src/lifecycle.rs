//! Operator-facing lifecycle announcements.
//!
//! Every event is logged. When an operator chat is configured the same event
//! is also delivered through its own sink, independent of the sink that
//! carries review notifications.

use chrono::{DateTime, Utc};

use herald_common::types::DeliveryResult;
use herald_notifier::NotificationSink;
use herald_notifier::telegram::escape_html;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Started { chat_id: String },
    Stopped,
    Fatal { reason: String },
}

impl LifecycleEvent {
    /// HTML-formatted operator message for this event.
    pub fn render(&self, at: DateTime<Utc>) -> String {
        let at = at.format("%Y-%m-%d %H:%M:%S UTC");
        match self {
            LifecycleEvent::Started { chat_id } => format!(
                "<b>ReviewHerald started</b>\n{}\nWatching reviews for chat {}",
                at,
                escape_html(chat_id)
            ),
            LifecycleEvent::Stopped => format!("<b>ReviewHerald stopped</b>\n{}", at),
            LifecycleEvent::Fatal { reason } => format!(
                "<b>ReviewHerald crashed</b>\n{}\n{}",
                at,
                escape_html(reason)
            ),
        }
    }
}

pub struct LifecycleReporter<S> {
    sink: Option<S>,
}

impl<S: NotificationSink> LifecycleReporter<S> {
    pub fn new(sink: Option<S>) -> Self {
        Self { sink }
    }

    /// Log the event and, if an operator sink exists, deliver it there too.
    ///
    /// Delivery failures are logged and otherwise ignored.
    pub async fn announce(&self, event: LifecycleEvent) -> Option<DeliveryResult> {
        match &event {
            LifecycleEvent::Started { chat_id } => {
                tracing::info!(chat_id = %chat_id, "ReviewHerald started, watching for reviews")
            }
            LifecycleEvent::Stopped => tracing::info!("ReviewHerald stopped"),
            LifecycleEvent::Fatal { reason } => {
                tracing::error!(reason = %reason, "ReviewHerald stopping on fatal error")
            }
        }

        let sink = self.sink.as_ref()?;
        let result = sink.send(&event.render(Utc::now())).await;
        if let DeliveryResult::Failed { detail } = &result {
            tracing::warn!(sink = sink.name(), error = %detail, "Lifecycle message not delivered");
        }
        Some(result)
    }

    /// Announce how the run ended and pass the result through unchanged.
    ///
    /// Startup failures go through here too, so they reach the operator
    /// chat the same way a fatal poll error does.
    pub async fn finish<E: std::fmt::Display>(&self, result: Result<(), E>) -> Result<(), E> {
        let event = match &result {
            Ok(()) => LifecycleEvent::Stopped,
            Err(e) => LifecycleEvent::Fatal {
                reason: e.to_string(),
            },
        };
        self.announce(event).await;
        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::TimeZone;

    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<String>>,
    }

    impl NotificationSink for RecordingSink {
        fn name(&self) -> &str {
            "operator"
        }

        async fn send(&self, message: &str) -> DeliveryResult {
            self.sent.lock().unwrap().push(message.to_string());
            DeliveryResult::Delivered
        }
    }

    #[test]
    fn test_render_escapes_reason() {
        let at = Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 0).unwrap();
        let text = LifecycleEvent::Fatal {
            reason: "status <401> & friends".to_string(),
        }
        .render(at);

        assert!(text.contains("2026-10-19 08:30:00 UTC"));
        assert!(text.contains("status &lt;401&gt; &amp; friends"));
        assert!(text.starts_with("<b>"));
    }

    #[tokio::test]
    async fn test_announce_without_sink_only_logs() {
        let reporter: LifecycleReporter<RecordingSink> = LifecycleReporter::new(None);
        assert_eq!(reporter.announce(LifecycleEvent::Stopped).await, None);
    }

    #[tokio::test]
    async fn test_announce_delivers_to_operator() {
        let reporter = LifecycleReporter::new(Some(RecordingSink::default()));

        let result = reporter
            .announce(LifecycleEvent::Started {
                chat_id: "42".to_string(),
            })
            .await;

        assert_eq!(result, Some(DeliveryResult::Delivered));
        let sent = reporter.sink.as_ref().unwrap().sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("started"));
        assert!(sent[0].contains("42"));
    }

    #[tokio::test]
    async fn test_finish_reports_startup_failure() {
        let reporter = LifecycleReporter::new(Some(RecordingSink::default()));

        let result = reporter
            .finish(Err("API token is not a valid header value"))
            .await;

        assert_eq!(result, Err("API token is not a valid header value"));
        let sent = reporter.sink.as_ref().unwrap().sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("crashed"));
        assert!(sent[0].contains("API token is not a valid header value"));
    }

    #[tokio::test]
    async fn test_finish_reports_clean_stop() {
        let reporter = LifecycleReporter::new(Some(RecordingSink::default()));

        assert_eq!(reporter.finish::<String>(Ok(())).await, Ok(()));
        let sent = reporter.sink.as_ref().unwrap().sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("stopped"));
    }
}
