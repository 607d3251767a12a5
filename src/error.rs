//! Error types for SavvyBot.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, SavvyError>;

#[derive(Error, Debug)]
pub enum SavvyError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Transcription error: {0}")]
    Transcription(String),

    /// The counter store could not be reached or rejected the operation.
    ///
    /// Kept distinct from [`SavvyError::QuotaExceeded`]: an outage must
    /// never read as a spent budget. Callers fail closed on this variant.
    #[error("Counter store unavailable: {0}")]
    Store(String),

    /// A reservation was denied because the daily limit would be exceeded.
    #[error("Daily quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<redis::RedisError> for SavvyError {
    fn from(e: redis::RedisError) -> Self {
        SavvyError::Store(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_and_quota_errors_are_distinct() {
        let store = SavvyError::Store("connection refused".to_string());
        let quota = SavvyError::QuotaExceeded("completion".to_string());
        assert!(matches!(store, SavvyError::Store(_)));
        assert!(matches!(quota, SavvyError::QuotaExceeded(_)));
    }

    #[test]
    fn test_error_display_includes_detail() {
        let e = SavvyError::Config("TELEGRAM_BOT_TOKEN is not set".to_string());
        assert!(e.to_string().contains("TELEGRAM_BOT_TOKEN"));
    }
}
