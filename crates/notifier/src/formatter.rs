//! Review attempt → notification text.

use herald_common::types::ReviewAttempt;

/// Verdict shown when the reviewer sent the work back.
pub const NEGATIVE_VERDICT: &str = "Errors found, needs rework.";

/// Verdict shown when the reviewer accepted the work.
pub const POSITIVE_VERDICT: &str = "Approved, proceed to next lesson!";

/// Render the message sent to the student for one review attempt.
pub fn format_notification(attempt: &ReviewAttempt) -> String {
    let verdict = if attempt.is_negative {
        NEGATIVE_VERDICT
    } else {
        POSITIVE_VERDICT
    };

    format!(
        "Your work has been reviewed!\n\nLesson: {}\nVerdict: {}",
        attempt.lesson_title, verdict
    )
}
