//! Telegram channel.
//!
//! Wires teloxide's long-polling dispatcher to the [`Orchestrator`]: text
//! prompts and voice notes become quota-gated API calls, everything else
//! gets a canned reply. The conversation itself is stateless: every update
//! carries the user id the quota is keyed by.

use std::sync::Arc;

use async_trait::async_trait;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use teloxide::utils::command::BotCommands;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::bot::texts;
use crate::bot::{Orchestrator, Reply, VoiceReply};
use crate::channels::Channel;
use crate::error::Result;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
enum Command {
    /// Greet the user and explain what the bot can do.
    Start,
    /// End the conversation.
    Cancel,
}

/// Telegram front end for the bot.
pub struct TelegramChannel {
    bot: Bot,
    orchestrator: Arc<Orchestrator>,
}

impl TelegramChannel {
    pub fn new(token: &str, orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            bot: Bot::new(token),
            orchestrator,
        }
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn run(&mut self) -> Result<()> {
        info!("Telegram channel starting");

        let handler = Update::filter_message()
            .branch(
                dptree::entry()
                    .filter_command::<Command>()
                    .endpoint(handle_command),
            )
            .branch(dptree::filter(|msg: Message| msg.voice().is_some()).endpoint(handle_voice))
            .branch(dptree::endpoint(handle_message));

        Dispatcher::builder(self.bot.clone(), handler)
            .dependencies(dptree::deps![self.orchestrator.clone()])
            .build()
            .dispatch()
            .await;

        info!("Telegram channel stopped");
        Ok(())
    }
}

async fn handle_command(bot: Bot, msg: Message, cmd: Command) -> ResponseResult<()> {
    match cmd {
        Command::Start => {
            info!("/start command received");
            bot.send_message(msg.chat.id, texts::INTRO_MESSAGE)
                .parse_mode(ParseMode::Markdown)
                .await?;
            bot.send_message(msg.chat.id, texts::VOICE_HINT).await?;
        }
        Command::Cancel => {
            info!("/cancel command received");
            bot.send_message(msg.chat.id, texts::GOODBYE).await?;
        }
    }
    Ok(())
}

/// Text prompts plus the fallback for anything that is neither a known
/// command nor a voice note.
async fn handle_message(bot: Bot, msg: Message, orch: Arc<Orchestrator>) -> ResponseResult<()> {
    let Some(user_id) = sender_id(&msg) else {
        return Ok(());
    };
    let Some(text) = msg.text() else {
        bot.send_message(msg.chat.id, texts::UNSUPPORTED_COMMAND)
            .await?;
        return Ok(());
    };
    // Unknown commands fall through the command filter and land here.
    if text.starts_with('/') {
        bot.send_message(msg.chat.id, texts::UNSUPPORTED_COMMAND)
            .await?;
        return Ok(());
    }
    if text.trim().is_empty() {
        bot.send_message(msg.chat.id, texts::DIDNT_GET_THAT).await?;
        return Ok(());
    }

    debug!(user_id, "text prompt received");
    bot.send_message(msg.chat.id, texts::loading_message())
        .await?;

    let result = orch.answer_prompt(user_id, text).await;
    deliver_reply(&bot, &msg, result).await
}

async fn handle_voice(bot: Bot, msg: Message, orch: Arc<Orchestrator>) -> ResponseResult<()> {
    let Some(user_id) = sender_id(&msg) else {
        return Ok(());
    };
    let Some(voice) = msg.voice() else {
        return Ok(());
    };
    let duration = f64::from(voice.duration.seconds());
    debug!(user_id, duration, "voice message received");

    let file = bot.get_file(voice.file.id.clone()).await?;
    let mut buf = std::io::Cursor::new(Vec::new());
    bot.download_file(&file.path, &mut buf).await?;
    let audio = buf.into_inner();

    bot.send_message(msg.chat.id, texts::TRANSCRIBING).await?;

    match orch
        .transcribe_voice(user_id, audio, &voice_filename(), duration)
        .await
    {
        Ok(VoiceReply::Transcript(transcript)) => {
            bot.send_message(msg.chat.id, format!("You said: {}", transcript))
                .await?;
            bot.send_message(msg.chat.id, texts::loading_message())
                .await?;
            let result = orch.answer_prompt(user_id, &transcript).await;
            deliver_reply(&bot, &msg, result).await?;
        }
        Ok(VoiceReply::LimitReached) => {
            bot.send_message(msg.chat.id, texts::DAILY_LIMIT_REACHED)
                .await?;
        }
        Ok(VoiceReply::Unavailable) => {
            bot.send_message(msg.chat.id, texts::TRACKER_UNAVAILABLE)
                .await?;
        }
        Ok(VoiceReply::Empty) => {
            bot.send_message(msg.chat.id, texts::DIDNT_GET_THAT).await?;
        }
        Err(e) => {
            error!(user_id, error = %e, "voice handling failed");
            bot.send_message(msg.chat.id, texts::SOMETHING_WENT_WRONG)
                .await?;
        }
    }
    Ok(())
}

async fn deliver_reply(bot: &Bot, msg: &Message, result: Result<Reply>) -> ResponseResult<()> {
    match result {
        Ok(Reply::Answer(answer)) => {
            bot.send_message(msg.chat.id, answer)
                .parse_mode(ParseMode::Markdown)
                .await?;
        }
        Ok(Reply::LimitReached) => {
            bot.send_message(msg.chat.id, texts::DAILY_LIMIT_REACHED)
                .await?;
        }
        Ok(Reply::Unavailable) => {
            bot.send_message(msg.chat.id, texts::TRACKER_UNAVAILABLE)
                .await?;
        }
        Ok(Reply::Empty) => {
            bot.send_message(msg.chat.id, texts::DIDNT_GET_THAT).await?;
        }
        Err(e) => {
            error!(error = %e, "prompt handling failed");
            bot.send_message(msg.chat.id, texts::SOMETHING_WENT_WRONG)
                .await?;
        }
    }
    Ok(())
}

fn sender_id(msg: &Message) -> Option<i64> {
    msg.from.as_ref().map(|u| u.id.0 as i64)
}

/// Upload name for a downloaded voice clip. Telegram voice notes are ogg;
/// the extension is what tells the transcription API the container format.
fn voice_filename() -> String {
    format!("{}.ogg", Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_filename_is_unique_ogg() {
        let a = voice_filename();
        let b = voice_filename();
        assert!(a.ends_with(".ogg"));
        assert_ne!(a, b);
    }
}
