//! Environment-driven configuration.
//!
//! All settings come from the process environment; run `dotenvy::dotenv()`
//! first to honor a local `.env` file. Only the two API credentials are
//! mandatory; the store URL and both daily limits have defaults.

use crate::error::{Result, SavvyError};
use crate::quota::QuotaLimits;

/// Default counter store endpoint.
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

#[derive(Clone)]
pub struct Config {
    /// Telegram bot API token (`TELEGRAM_BOT_TOKEN`).
    pub telegram_bot_token: String,
    /// OpenAI API key, used for both completion and transcription
    /// (`OPENAI_API_KEY`).
    pub openai_api_key: String,
    /// Counter store endpoint (`REDIS_URL`).
    pub redis_url: String,
    /// Daily quota limits (`DAILY_COMPLETION_TOKEN_LIMIT`,
    /// `DAILY_TRANSCRIPTION_SECOND_LIMIT`).
    pub limits: QuotaLimits,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("telegram_bot_token", &"[REDACTED]")
            .field("openai_api_key", &"[REDACTED]")
            .field("redis_url", &self.redis_url)
            .field("limits", &self.limits)
            .finish()
    }
}

impl Config {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self> {
        let limits = QuotaLimits::default();
        Ok(Self {
            telegram_bot_token: require("TELEGRAM_BOT_TOKEN")?,
            openai_api_key: require("OPENAI_API_KEY")?,
            redis_url: std::env::var("REDIS_URL").unwrap_or_else(|_| DEFAULT_REDIS_URL.to_string()),
            limits: QuotaLimits {
                completion_tokens: optional_u64("DAILY_COMPLETION_TOKEN_LIMIT")?
                    .unwrap_or(limits.completion_tokens),
                transcription_seconds: optional_u64("DAILY_TRANSCRIPTION_SECOND_LIMIT")?
                    .unwrap_or(limits.transcription_seconds),
            },
        })
    }
}

fn require(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(SavvyError::Config(format!("{} is not set", name))),
    }
}

fn optional_u64(name: &str) -> Result<Option<u64>> {
    match std::env::var(name) {
        Err(_) => Ok(None),
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw.trim().parse::<u64>().map(Some).map_err(|_| {
            SavvyError::Config(format!("{} must be a non-negative integer, got '{}'", name, raw))
        }),
    }
}
