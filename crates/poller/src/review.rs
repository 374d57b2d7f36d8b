use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;

use herald_common::config::AppConfig;
use herald_common::error::AppError;
use herald_common::types::{Cursor, PollOutcome, ReviewAttempt};

/// Query parameter the review API expects the cursor in.
const CURSOR_PARAM: &str = "timestamp";

/// Longest slice of an error body kept for diagnostics.
const MAX_BODY_SNIPPET: usize = 512;

/// A source of review events that can be long-polled.
pub trait ReviewPoller {
    /// Issue one long-poll request and classify what came back.
    ///
    /// `cursor` is `None` only before the first `Found` response.
    fn poll(&self, cursor: Option<&Cursor>) -> impl Future<Output = PollOutcome> + Send;
}

/// Body of a 2xx response from the long-polling endpoint.
#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum LongPollResponse {
    Found {
        new_attempts: Vec<ReviewAttempt>,
        last_attempt_timestamp: Cursor,
    },
    Timeout,
}

/// What came back over the wire, before JSON parsing.
#[derive(Debug)]
enum RawResponse {
    Success(String),
    Status(StatusCode, String),
}

/// Long-polling client for the dvmn.org review API.
pub struct DevmanPoller {
    client: reqwest::Client,
    url: String,
    poll_timeout: Duration,
}

impl DevmanPoller {
    /// Build a poller with the API token baked into every request.
    ///
    /// A token that cannot be expressed as a header value is a configuration
    /// error and is reported here rather than on the first poll.
    pub fn new(
        url: impl Into<String>,
        api_token: &str,
        poll_timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, AppError> {
        let mut auth = HeaderValue::from_str(&format!("Token {}", api_token))
            .map_err(|_| AppError::Config("API token is not a valid header value".into()))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(poll_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| AppError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
            poll_timeout,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        Self::new(
            config.reviews_api_url.clone(),
            &config.devman_api_token,
            config.poll_timeout(),
            config.connect_timeout(),
        )
    }

    async fn fetch(&self, cursor: Option<&Cursor>) -> Result<RawResponse, reqwest::Error> {
        let mut request = self.client.get(&self.url);
        if let Some(cursor) = cursor {
            request = request.query(&[(CURSOR_PARAM, cursor.as_str())]);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            Ok(RawResponse::Success(body))
        } else {
            Ok(RawResponse::Status(status, body))
        }
    }
}

impl ReviewPoller for DevmanPoller {
    async fn poll(&self, cursor: Option<&Cursor>) -> PollOutcome {
        tracing::debug!(
            cursor = cursor.map(Cursor::as_str),
            timeout_secs = self.poll_timeout.as_secs(),
            "Long-polling review API"
        );

        match self.fetch(cursor).await {
            Ok(RawResponse::Success(body)) => classify_body(&body),
            Ok(RawResponse::Status(status, body)) => classify_status(status, &body),
            Err(e) => classify_transport_error(&e),
        }
    }
}

/// Map a transport-level failure onto a poll outcome.
fn classify_transport_error(error: &reqwest::Error) -> PollOutcome {
    // Connect timeouts report both `is_connect` and `is_timeout`; they are
    // connection failures, not an idle long-poll window.
    if error.is_builder() {
        PollOutcome::FatalError {
            detail: format!("could not build request: {}", redact(error)),
        }
    } else if error.is_connect() {
        PollOutcome::TransientError {
            detail: format!("connection failed: {}", redact(error)),
        }
    } else if error.is_timeout() {
        PollOutcome::Timeout
    } else {
        PollOutcome::TransientError {
            detail: format!("request failed: {}", redact(error)),
        }
    }
}

/// Classify the body of a 2xx response.
fn classify_body(body: &str) -> PollOutcome {
    match parse_response(body) {
        Ok(LongPollResponse::Found {
            new_attempts,
            last_attempt_timestamp,
        }) => PollOutcome::Found {
            attempts: new_attempts,
            next_cursor: last_attempt_timestamp,
        },
        Ok(LongPollResponse::Timeout) => PollOutcome::Timeout,
        Err(e) => PollOutcome::TransientError {
            detail: e.to_string(),
        },
    }
}

fn classify_status(status: StatusCode, body: &str) -> PollOutcome {
    let snippet = snippet(body);
    let error = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::Auth(format!(
            "review API rejected the token ({}): {}",
            status.as_u16(),
            snippet
        )),
        _ => AppError::Http(format!("review API returned {}: {}", status.as_u16(), snippet)),
    };

    if error.is_fatal() {
        PollOutcome::FatalError {
            detail: error.to_string(),
        }
    } else {
        PollOutcome::TransientError {
            detail: error.to_string(),
        }
    }
}

fn parse_response(body: &str) -> Result<LongPollResponse, AppError> {
    Ok(serde_json::from_str(body)?)
}

fn snippet(body: &str) -> &str {
    let body = body.trim();
    match body.char_indices().nth(MAX_BODY_SNIPPET) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

fn redact(error: &reqwest::Error) -> String {
    // Keep the cursor query out of error text.
    let mut text = error.to_string();
    if let Some(url) = error.url()
        && let Some(query) = url.query()
    {
        text = text.replace(query, "...");
    }
    text
}
