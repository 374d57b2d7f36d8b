use thiserror::Error;

/// Common error types used across the application.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("Fatal error: {0}")]
    Fatal(String),
}

impl AppError {
    /// Whether the condition can never clear up by itself and retrying is pointless.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AppError::Config(_) | AppError::Auth(_) | AppError::Fatal(_)
        )
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Decode(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(AppError::Auth("401".into()).is_fatal());
        assert!(AppError::Config("missing token".into()).is_fatal());
        assert!(!AppError::Http("502".into()).is_fatal());
        assert!(!AppError::Decode("eof".into()).is_fatal());
    }

    #[test]
    fn test_json_error_becomes_decode() {
        let err: AppError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, AppError::Decode(_)));
    }
}
