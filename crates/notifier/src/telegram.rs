//! Telegram Bot API delivery.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use herald_common::config::AppConfig;
use herald_common::error::AppError;
use herald_common::types::DeliveryResult;

use crate::sink::{FormatHint, NotificationSink};

/// Upper bound for one `sendMessage` call.
const SEND_TIMEOUT: Duration = Duration::from_secs(15);

/// Telegram's answer when the requested markup is broken.
const PARSE_REJECTION: &str = "can't parse entities";

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct ApiReply {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Sends messages to one Telegram chat through a bot.
pub struct TelegramSink {
    client: reqwest::Client,
    /// `{base}/bot{token}/sendMessage`; never logged.
    endpoint: String,
    chat_id: String,
    format: FormatHint,
    name: String,
}

impl TelegramSink {
    pub fn new(
        api_base: &str,
        bot_token: &str,
        chat_id: impl Into<String>,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .map_err(|e| AppError::Config(format!("failed to build HTTP client: {}", e)))?;

        let chat_id = chat_id.into();
        Ok(Self {
            client,
            endpoint: format!(
                "{}/bot{}/sendMessage",
                api_base.trim_end_matches('/'),
                bot_token
            ),
            name: format!("telegram:{}", chat_id),
            chat_id,
            format: FormatHint::Plain,
        })
    }

    /// Sink for the chat that receives review notifications.
    pub fn from_config(config: &AppConfig, chat_id: impl Into<String>) -> Result<Self, AppError> {
        Self::new(&config.telegram_api_url, &config.telegram_bot_token, chat_id)
    }

    /// Ask Telegram to render markup in every message sent through this sink.
    pub fn with_format(mut self, format: FormatHint) -> Self {
        self.format = format;
        self
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    async fn post(&self, text: &str, format: FormatHint) -> Result<(), AppError> {
        let body = SendMessage {
            chat_id: &self.chat_id,
            text,
            parse_mode: match format {
                FormatHint::Plain => None,
                FormatHint::Html => Some("HTML"),
            },
        };

        // `without_url` keeps the bot token out of error text.
        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Http(e.without_url().to_string()))?;

        let status = response.status();
        let reply: ApiReply = response.json().await.map_err(|e| {
            AppError::Decode(format!(
                "unreadable Telegram reply ({}): {}",
                status.as_u16(),
                e.without_url()
            ))
        })?;

        if reply.ok && status.is_success() {
            Ok(())
        } else {
            Err(AppError::Delivery(format!(
                "Telegram rejected message ({}): {}",
                status.as_u16(),
                reply.description.unwrap_or_else(|| "no description".to_string())
            )))
        }
    }
}

impl NotificationSink for TelegramSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, message: &str) -> DeliveryResult {
        let mut result = self.post(message, self.format).await;

        if self.format != FormatHint::Plain
            && matches!(&result, Err(AppError::Delivery(d)) if d.contains(PARSE_REJECTION))
        {
            tracing::warn!(sink = %self.name, "Markup rejected, resending as plain text");
            result = self.post(message, FormatHint::Plain).await;
        }

        match result {
            Ok(()) => DeliveryResult::Delivered,
            Err(e) => DeliveryResult::Failed {
                detail: e.to_string(),
            },
        }
    }
}

/// Escape text for inclusion in an HTML-formatted Telegram message.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
