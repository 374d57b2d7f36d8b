use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer, Serialize};

/// Watermark returned by the review API as `last_attempt_timestamp`.
///
/// The remote sends a JSON number (seconds with a fractional part), but the
/// value is only ever echoed back as a query parameter, so it is kept as the
/// exact text the server produced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for Cursor {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for Cursor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawCursor {
            Number(serde_json::Number),
            Text(String),
        }

        match RawCursor::deserialize(deserializer)? {
            RawCursor::Number(n) => Ok(Cursor(n.to_string())),
            RawCursor::Text(s) if s.trim().is_empty() => {
                Err(serde::de::Error::custom("cursor must not be empty"))
            }
            RawCursor::Text(s) => Ok(Cursor(s)),
        }
    }
}

/// A completed code review, as listed in `new_attempts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewAttempt {
    pub lesson_title: String,
    pub is_negative: bool,
    /// `None` when absent or not a string.
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub lesson_url: Option<String>,
    /// `None` when absent or not an RFC 3339 timestamp.
    #[serde(
        default,
        deserialize_with = "lenient_rfc3339",
        skip_serializing_if = "Option::is_none"
    )]
    pub submitted_at: Option<DateTime<FixedOffset>>,
    /// Any other keys the API sends, kept verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ReviewAttempt {
    pub fn new(lesson_title: impl Into<String>, is_negative: bool) -> Self {
        Self {
            lesson_title: lesson_title.into(),
            is_negative,
            lesson_url: None,
            submitted_at: None,
            extra: serde_json::Map::new(),
        }
    }
}

// Pass-through fields must never fail the whole response: the server would
// keep resending the same batch and the cursor would never move.
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(Some(s)),
        _ => Ok(None),
    }
}

fn lenient_rfc3339<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<FixedOffset>>, D::Error> {
    Ok(lenient_string(deserializer)?.and_then(|s| DateTime::parse_from_rfc3339(&s).ok()))
}

/// Classified result of a single long-poll request.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// New reviews arrived. `attempts` keeps the server's order.
    Found {
        attempts: Vec<ReviewAttempt>,
        next_cursor: Cursor,
    },
    /// Nothing happened within the long-poll window.
    Timeout,
    /// Network or remote hiccup; safe to retry with the same cursor.
    TransientError { detail: String },
    /// Misconfiguration or rejected credentials; must not be retried.
    FatalError { detail: String },
}

impl PollOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            PollOutcome::Found { .. } => "found",
            PollOutcome::Timeout => "timeout",
            PollOutcome::TransientError { .. } => "transient_error",
            PollOutcome::FatalError { .. } => "fatal_error",
        }
    }
}

/// Result of offering one message to a notification sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryResult {
    Delivered,
    Failed { detail: String },
}

impl std::fmt::Display for DeliveryResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryResult::Delivered => write!(f, "delivered"),
            DeliveryResult::Failed { detail } => write!(f, "failed: {}", detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_from_json_number() {
        let cursor: Cursor = serde_json::from_str("1555493856.1").unwrap();
        assert_eq!(cursor.as_str(), "1555493856.1");

        let cursor: Cursor = serde_json::from_str("100").unwrap();
        assert_eq!(cursor, Cursor::from(100));
    }

    #[test]
    fn test_cursor_from_json_string() {
        let cursor: Cursor = serde_json::from_str("\"1555493856.1\"").unwrap();
        assert_eq!(cursor.to_string(), "1555493856.1");
    }

    #[test]
    fn test_cursor_rejects_empty_and_null() {
        assert!(serde_json::from_str::<Cursor>("\"  \"").is_err());
        assert!(serde_json::from_str::<Cursor>("null").is_err());
    }

    #[test]
    fn test_review_attempt_keeps_pass_through_fields() {
        let attempt: ReviewAttempt = serde_json::from_value(serde_json::json!({
            "lesson_title": "OOP",
            "is_negative": true,
            "lesson_url": "https://dvmn.org/modules/oop/lesson/1/",
            "submitted_at": "2019-04-17T12:37:53.000000+03:00",
            "timestamp": 1555493873.0
        }))
        .unwrap();

        assert_eq!(attempt.lesson_title, "OOP");
        assert!(attempt.is_negative);
        assert_eq!(
            attempt.lesson_url.as_deref(),
            Some("https://dvmn.org/modules/oop/lesson/1/")
        );
        assert!(attempt.submitted_at.is_some());
        assert!(attempt.extra.contains_key("timestamp"));
    }

    #[test]
    fn test_review_attempt_tolerates_odd_pass_through_values() {
        let attempt: ReviewAttempt = serde_json::from_value(serde_json::json!({
            "lesson_title": "OOP",
            "is_negative": false,
            "lesson_url": 42,
            "submitted_at": "2019-04-17 12:37:53",
            "reviewer": {"name": "Anna"},
            "tags": null
        }))
        .unwrap();

        assert_eq!(attempt.lesson_title, "OOP");
        assert_eq!(attempt.lesson_url, None);
        assert_eq!(attempt.submitted_at, None);
        assert_eq!(attempt.extra["reviewer"]["name"], "Anna");
        assert!(attempt.extra.contains_key("tags"));
    }

    #[test]
    fn test_review_attempt_null_pass_through_values() {
        let attempt: ReviewAttempt = serde_json::from_value(serde_json::json!({
            "lesson_title": "OOP",
            "is_negative": true,
            "lesson_url": null,
            "submitted_at": null
        }))
        .unwrap();

        assert_eq!(attempt, ReviewAttempt::new("OOP", true));
    }

    #[test]
    fn test_poll_outcome_kind_labels() {
        let found = PollOutcome::Found {
            attempts: vec![],
            next_cursor: Cursor::from(1),
        };
        assert_eq!(found.kind(), "found");
        assert_eq!(PollOutcome::Timeout.kind(), "timeout");
        let detail = String::new();
        assert_eq!(PollOutcome::TransientError { detail: detail.clone() }.kind(), "transient_error");
        assert_eq!(PollOutcome::FatalError { detail }.kind(), "fatal_error");
    }

    #[test]
    fn test_review_attempt_requires_verdict() {
        let result: Result<ReviewAttempt, _> =
            serde_json::from_value(serde_json::json!({ "lesson_title": "OOP" }));
        assert!(result.is_err());
    }
}
