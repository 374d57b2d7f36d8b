use std::time::Duration;

use serde::Deserialize;

const DEFAULT_REVIEWS_API_URL: &str = "https://dvmn.org/api/long_polling/";
const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// dvmn.org API token, sent as `Authorization: Token <...>`
    pub devman_api_token: String,

    /// Telegram bot token used for all deliveries
    pub telegram_bot_token: String,

    /// Chat that receives review notifications (may also come from the CLI)
    pub telegram_chat_id: Option<String>,

    /// Chat that receives start/stop/fatal lifecycle messages
    pub operator_chat_id: Option<String>,

    /// Long-polling endpoint
    pub reviews_api_url: String,

    /// Telegram Bot API base URL
    pub telegram_api_url: String,

    /// Upper bound for a single long-poll request in seconds (default: 90)
    pub poll_timeout_secs: u64,

    /// TCP/TLS connect timeout in seconds (default: 10)
    pub connect_timeout_secs: u64,

    /// Delay after a transient poll failure in seconds (default: 5)
    pub backoff_secs: u64,

    /// Emit JSON log lines instead of plain text
    pub log_json: bool,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            devman_api_token: non_empty("DEVMAN_API_TOKEN").ok_or_else(|| {
                anyhow::anyhow!("DEVMAN_API_TOKEN environment variable is required")
            })?,
            telegram_bot_token: non_empty("TELEGRAM_BOT_TOKEN").ok_or_else(|| {
                anyhow::anyhow!("TELEGRAM_BOT_TOKEN environment variable is required")
            })?,
            telegram_chat_id: non_empty("TELEGRAM_CHAT_ID"),
            operator_chat_id: non_empty("OPERATOR_CHAT_ID"),
            reviews_api_url: non_empty("REVIEWS_API_URL")
                .unwrap_or_else(|| DEFAULT_REVIEWS_API_URL.to_string()),
            telegram_api_url: non_empty("TELEGRAM_API_URL")
                .unwrap_or_else(|| DEFAULT_TELEGRAM_API_URL.to_string()),
            poll_timeout_secs: non_empty("POLL_TIMEOUT_SECS")
                .unwrap_or_else(|| "90".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("POLL_TIMEOUT_SECS must be a valid u64"))?,
            connect_timeout_secs: non_empty("CONNECT_TIMEOUT_SECS")
                .unwrap_or_else(|| "10".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("CONNECT_TIMEOUT_SECS must be a valid u64"))?,
            backoff_secs: non_empty("BACKOFF_SECS")
                .unwrap_or_else(|| "5".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("BACKOFF_SECS must be a valid u64"))?,
            log_json: Self::log_json_requested(&lookup),
        })
    }

    /// Whether `LOG_FORMAT=json` is set in the environment (or `.env`).
    ///
    /// Read on its own so logging can be set up before the rest of the
    /// configuration is validated.
    pub fn log_json_from_env() -> bool {
        dotenvy::dotenv().ok();

        Self::log_json_requested(|key| std::env::var(key).ok())
    }

    pub fn log_json_requested(lookup: impl Fn(&str) -> Option<String>) -> bool {
        lookup("LOG_FORMAT")
            .map(|v| v.trim().eq_ignore_ascii_case("json"))
            .unwrap_or(false)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }
}
