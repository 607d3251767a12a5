//! Conversation orchestration: quota-gated completion and transcription.
//!
//! The [`Orchestrator`] drives one inbound message end to end: estimate the
//! cost, hold it against the user's daily budget, call the billed API, then
//! reconcile the hold with the amount actually billed. Quota denials and
//! store outages never reach the external APIs.
//!
//! Each user's conversation is a degenerate state machine (always awaiting
//! the next prompt until a `/cancel` ends it), so no per-user state is kept
//! here; everything the orchestrator needs arrives with the message.

pub mod texts;

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{Result, SavvyError};
use crate::providers::CompletionProvider;
use crate::quota::{estimate, Meter, QuotaTracker};
use crate::transcribe::Transcriber;

/// Outcome of handling a text prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Markdown answer from the completion API.
    Answer(String),
    /// Daily budget exhausted; no API call was made.
    LimitReached,
    /// The usage tracker could not be reached; failing closed.
    Unavailable,
    /// Degenerate input; nothing to answer.
    Empty,
}

/// Outcome of handling a voice clip.
#[derive(Debug, Clone, PartialEq)]
pub enum VoiceReply {
    /// Recognized speech, ready to be answered as a text prompt.
    Transcript(String),
    /// Daily transcription budget exhausted; no API call was made.
    LimitReached,
    /// The usage tracker could not be reached; failing closed.
    Unavailable,
    /// The API returned no recognizable speech.
    Empty,
}

pub struct Orchestrator {
    provider: Arc<dyn CompletionProvider>,
    transcriber: Arc<dyn Transcriber>,
    tracker: QuotaTracker,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        transcriber: Arc<dyn Transcriber>,
        tracker: QuotaTracker,
    ) -> Self {
        Self {
            provider,
            transcriber,
            tracker,
        }
    }

    /// Answer a text prompt, charging the user's completion meter.
    ///
    /// The estimate is held before the call and reconciled with the
    /// provider's reported `total_tokens` afterwards. A provider failure
    /// releases the hold and propagates the error.
    pub async fn answer_prompt(&self, user_id: i64, prompt: &str) -> Result<Reply> {
        if prompt.trim().is_empty() {
            return Ok(Reply::Empty);
        }

        let estimated = estimate::completion_cost(prompt);
        let reservation = match self
            .tracker
            .check_and_reserve(Meter::Completion, user_id, estimated)
            .await
        {
            Ok(r) => r,
            Err(SavvyError::QuotaExceeded(reason)) => {
                info!(user_id, reason = %reason, "completion quota exhausted");
                return Ok(Reply::LimitReached);
            }
            Err(SavvyError::Store(e)) => {
                warn!(user_id, error = %e, "counter store unreachable, failing closed");
                return Ok(Reply::Unavailable);
            }
            Err(e) => return Err(e),
        };

        info!(
            user_id,
            estimated,
            provider = self.provider.name(),
            "calling completion API"
        );
        let completion = match self.provider.complete(prompt).await {
            Ok(c) => c,
            Err(e) => {
                // The hold was never spent; return it before surfacing the error.
                if let Err(cancel_err) = self.tracker.cancel(reservation).await {
                    warn!(user_id, error = %cancel_err, "failed to release reservation");
                }
                return Err(e);
            }
        };

        let actual = completion.total_tokens();
        debug!(user_id, estimated, actual, "completion call finished");
        if let Err(e) = self.tracker.commit(reservation, actual).await {
            // The reply is already paid for; log and deliver it anyway.
            warn!(user_id, error = %e, "failed to commit actual token usage");
        }

        Ok(Reply::Answer(completion.content))
    }

    /// Transcribe a voice clip, charging the user's transcription meter by
    /// the clip's whole-second duration.
    ///
    /// Duration comes from the chat platform's metadata, so for this meter
    /// the estimate *is* the actual cost and the hold needs no adjustment.
    pub async fn transcribe_voice(
        &self,
        user_id: i64,
        audio: Vec<u8>,
        filename: &str,
        duration_secs: f64,
    ) -> Result<VoiceReply> {
        let seconds = estimate::transcription_cost(duration_secs);
        let reservation = match self
            .tracker
            .check_and_reserve(Meter::Transcription, user_id, seconds)
            .await
        {
            Ok(r) => r,
            Err(SavvyError::QuotaExceeded(reason)) => {
                info!(user_id, seconds, reason = %reason, "transcription quota exhausted");
                return Ok(VoiceReply::LimitReached);
            }
            Err(SavvyError::Store(e)) => {
                warn!(user_id, error = %e, "counter store unreachable, failing closed");
                return Ok(VoiceReply::Unavailable);
            }
            Err(e) => return Err(e),
        };

        info!(
            user_id,
            seconds,
            transcriber = self.transcriber.name(),
            "calling transcription API"
        );
        let transcript = match self.transcriber.transcribe(audio, filename).await {
            Ok(t) => t,
            Err(e) => {
                if let Err(cancel_err) = self.tracker.cancel(reservation).await {
                    warn!(user_id, error = %cancel_err, "failed to release reservation");
                }
                return Err(e);
            }
        };

        // Billed seconds equal the reserved estimate; commit is a no-op
        // adjustment but consumes the reservation.
        self.tracker.commit(reservation, seconds).await?;

        if transcript.trim().is_empty() {
            return Ok(VoiceReply::Empty);
        }
        Ok(VoiceReply::Transcript(transcript))
    }

    pub fn tracker(&self) -> &QuotaTracker {
        &self.tracker
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{Completion, Usage};
    use crate::quota::store::{CondIncr, CounterStore, MemoryCounterStore};
    use crate::quota::{Meter, QuotaLimits};
    use async_trait::async_trait;

    /// Provider that always succeeds with fixed content and token usage.
    struct AlwaysOkProvider {
        prompt_tokens: u32,
        completion_tokens: u32,
    }

    #[async_trait]
    impl CompletionProvider for AlwaysOkProvider {
        fn name(&self) -> &str {
            "mock"
        }

        async fn complete(&self, _prompt: &str) -> Result<Completion> {
            Ok(Completion::text("ok")
                .with_usage(Usage::new(self.prompt_tokens, self.completion_tokens)))
        }
    }

    /// Provider that always fails.
    struct AlwaysErrProvider;

    #[async_trait]
    impl CompletionProvider for AlwaysErrProvider {
        fn name(&self) -> &str {
            "mock-err"
        }

        async fn complete(&self, _prompt: &str) -> Result<Completion> {
            Err(SavvyError::Provider("inner failure".to_string()))
        }
    }

    /// Transcriber that returns a fixed transcript.
    struct FixedTranscriber(&'static str);

    #[async_trait]
    impl Transcriber for FixedTranscriber {
        fn name(&self) -> &str {
            "mock"
        }

        async fn transcribe(&self, _audio: Vec<u8>, _filename: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct FailingTranscriber;

    #[async_trait]
    impl Transcriber for FailingTranscriber {
        fn name(&self) -> &str {
            "mock-err"
        }

        async fn transcribe(&self, _audio: Vec<u8>, _filename: &str) -> Result<String> {
            Err(SavvyError::Transcription("upstream 500".to_string()))
        }
    }

    /// Store whose every operation fails, to exercise the fail-closed path.
    struct DownStore;

    #[async_trait]
    impl CounterStore for DownStore {
        async fn get(&self, _key: &str) -> Result<Option<u64>> {
            Err(SavvyError::Store("connection refused".to_string()))
        }

        async fn incr_by(&self, _key: &str, _amount: i64, _expire_at_unix: i64) -> Result<u64> {
            Err(SavvyError::Store("connection refused".to_string()))
        }

        async fn conditional_incr(
            &self,
            _key: &str,
            _amount: u64,
            _limit: u64,
            _expire_at_unix: i64,
        ) -> Result<CondIncr> {
            Err(SavvyError::Store("connection refused".to_string()))
        }
    }

    fn orchestrator(
        provider: impl CompletionProvider + 'static,
        transcriber: impl Transcriber + 'static,
    ) -> (Orchestrator, Arc<MemoryCounterStore>) {
        let store = Arc::new(MemoryCounterStore::new());
        let tracker = QuotaTracker::new(store.clone(), QuotaLimits::default());
        (
            Orchestrator::new(Arc::new(provider), Arc::new(transcriber), tracker),
            store,
        )
    }

    #[tokio::test]
    async fn test_answer_records_actual_not_estimated_usage() {
        let (orch, _) = orchestrator(
            AlwaysOkProvider {
                prompt_tokens: 30,
                completion_tokens: 12,
            },
            FixedTranscriber(""),
        );

        let reply = orch.answer_prompt(1, "hello there").await.unwrap();
        assert_eq!(reply, Reply::Answer("ok".to_string()));

        // Estimate for "hello there" is 1 token; the provider billed 42.
        assert_eq!(orch.tracker().usage(Meter::Completion, 1).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_nearly_spent_user_gets_limit_notice_without_api_call() {
        let (orch, _) = orchestrator(
            AlwaysOkProvider {
                prompt_tokens: 10,
                completion_tokens: 10,
            },
            FixedTranscriber(""),
        );
        orch.tracker()
            .record_usage(Meter::Completion, 2, 9_999)
            .await
            .unwrap();

        // 7-word prompt estimates to 5 tokens; 9999 + 5 > 10000.
        let reply = orch
            .answer_prompt(2, "please give me seven words of wisdom")
            .await
            .unwrap();
        assert_eq!(reply, Reply::LimitReached);
        assert_eq!(
            orch.tracker().usage(Meter::Completion, 2).await.unwrap(),
            9_999,
            "a denied request must not consume budget"
        );
    }

    #[tokio::test]
    async fn test_empty_prompt_is_free() {
        let (orch, _store) = orchestrator(
            AlwaysOkProvider {
                prompt_tokens: 1,
                completion_tokens: 1,
            },
            FixedTranscriber(""),
        );
        assert_eq!(orch.answer_prompt(3, "   ").await.unwrap(), Reply::Empty);
        assert_eq!(
            orch.tracker().usage(Meter::Completion, 3).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_store_outage_fails_closed() {
        let tracker = QuotaTracker::new(Arc::new(DownStore), QuotaLimits::default());
        let orch = Orchestrator::new(
            Arc::new(AlwaysOkProvider {
                prompt_tokens: 1,
                completion_tokens: 1,
            }),
            Arc::new(FixedTranscriber("hi")),
            tracker,
        );

        assert_eq!(
            orch.answer_prompt(4, "hello").await.unwrap(),
            Reply::Unavailable
        );
        assert_eq!(
            orch.transcribe_voice(4, vec![0u8; 4], "a.ogg", 3.0)
                .await
                .unwrap(),
            VoiceReply::Unavailable
        );
    }

    #[tokio::test]
    async fn test_provider_failure_releases_the_hold() {
        let (orch, _) = orchestrator(AlwaysErrProvider, FixedTranscriber(""));
        orch.tracker()
            .record_usage(Meter::Completion, 5, 100)
            .await
            .unwrap();

        let result = orch
            .answer_prompt(5, "one two three four five six seven eight")
            .await;
        assert!(matches!(result, Err(SavvyError::Provider(_))));
        assert_eq!(
            orch.tracker().usage(Meter::Completion, 5).await.unwrap(),
            100,
            "failed call must not leave the estimate charged"
        );
    }

    #[tokio::test]
    async fn test_voice_clip_over_remaining_budget_denied() {
        let (orch, _) = orchestrator(
            AlwaysOkProvider {
                prompt_tokens: 1,
                completion_tokens: 1,
            },
            FixedTranscriber("never called"),
        );
        orch.tracker()
            .record_usage(Meter::Transcription, 6, 170)
            .await
            .unwrap();

        let reply = orch
            .transcribe_voice(6, vec![0u8; 4], "clip.ogg", 15.0)
            .await
            .unwrap();
        assert_eq!(reply, VoiceReply::LimitReached);
        assert_eq!(
            orch.tracker().usage(Meter::Transcription, 6).await.unwrap(),
            170
        );
    }

    #[tokio::test]
    async fn test_voice_clip_charges_whole_seconds() {
        let (orch, _) = orchestrator(
            AlwaysOkProvider {
                prompt_tokens: 1,
                completion_tokens: 1,
            },
            FixedTranscriber("what's the weather"),
        );
        orch.tracker()
            .record_usage(Meter::Transcription, 7, 170)
            .await
            .unwrap();

        let reply = orch
            .transcribe_voice(7, vec![0u8; 4], "clip.ogg", 11.4)
            .await
            .unwrap();
        assert_eq!(reply, VoiceReply::Transcript("what's the weather".to_string()));
        // 11.4s rounds up to 12; 170 + 12 = 182.
        assert_eq!(
            orch.tracker().usage(Meter::Transcription, 7).await.unwrap(),
            182
        );
    }

    #[tokio::test]
    async fn test_empty_transcript_still_bills_the_clip() {
        let (orch, _) = orchestrator(
            AlwaysOkProvider {
                prompt_tokens: 1,
                completion_tokens: 1,
            },
            FixedTranscriber("   "),
        );

        let reply = orch
            .transcribe_voice(8, vec![0u8; 4], "clip.ogg", 5.0)
            .await
            .unwrap();
        assert_eq!(reply, VoiceReply::Empty);
        // The API call happened, so the seconds stay charged.
        assert_eq!(
            orch.tracker().usage(Meter::Transcription, 8).await.unwrap(),
            5
        );
    }

    #[tokio::test]
    async fn test_failed_transcription_releases_the_hold() {
        let (orch, _) = orchestrator(
            AlwaysOkProvider {
                prompt_tokens: 1,
                completion_tokens: 1,
            },
            FailingTranscriber,
        );

        let result = orch.transcribe_voice(9, vec![0u8; 4], "clip.ogg", 9.0).await;
        assert!(matches!(result, Err(SavvyError::Transcription(_))));
        assert_eq!(
            orch.tracker().usage(Meter::Transcription, 9).await.unwrap(),
            0
        );
    }
}
