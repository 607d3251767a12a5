//! `run` command handler: assemble the bot and serve until interrupted.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use savvybot::bot::Orchestrator;
use savvybot::channels::{Channel, TelegramChannel};
use savvybot::config::Config;
use savvybot::providers::openai::DEFAULT_OPENAI_MODEL;
use savvybot::providers::OpenAIProvider;
use savvybot::quota::store::RedisCounterStore;
use savvybot::quota::QuotaTracker;
use savvybot::transcribe::{WhisperTranscriber, DEFAULT_WHISPER_MODEL};

pub(crate) async fn cmd_run() -> Result<()> {
    let config = Config::from_env()?;
    info!("Starting SavvyBot");

    let store = Arc::new(RedisCounterStore::connect(&config.redis_url).await?);
    let tracker = QuotaTracker::new(store, config.limits);

    let provider = Arc::new(OpenAIProvider::new(
        &config.openai_api_key,
        DEFAULT_OPENAI_MODEL,
    ));
    let transcriber = Arc::new(WhisperTranscriber::new(
        &config.openai_api_key,
        DEFAULT_WHISPER_MODEL,
    ));

    let orchestrator = Arc::new(Orchestrator::new(provider, transcriber, tracker));
    let mut channel = TelegramChannel::new(&config.telegram_bot_token, orchestrator);
    info!(channel = channel.name(), "serving messages");
    channel.run().await?;
    Ok(())
}
