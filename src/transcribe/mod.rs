//! Voice transcription via the OpenAI Whisper API.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Result, SavvyError};

/// Default Whisper model.
pub const DEFAULT_WHISPER_MODEL: &str = "whisper-1";

const TRANSCRIPTIONS_URL: &str = "https://api.openai.com/v1/audio/transcriptions";

/// A speech-to-text backend.
#[async_trait]
pub trait Transcriber: Send + Sync {
    fn name(&self) -> &str;

    /// Transcribe an audio clip to text. The filename's extension tells the
    /// API the container format (`.ogg` for Telegram voice notes). Returns
    /// the recognized text, which may be empty when no speech was detected.
    async fn transcribe(&self, audio: Vec<u8>, filename: &str) -> Result<String>;
}

/// Transcriber speaking the OpenAI Whisper REST API.
pub struct WhisperTranscriber {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for WhisperTranscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperTranscriber")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .finish()
    }
}

impl WhisperTranscriber {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .build()
                .expect("failed to build HTTP client"),
        }
    }

    /// Pull the transcript out of a Whisper response body.
    fn response_text(json: &Value) -> String {
        json["text"].as_str().unwrap_or("").to_string()
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    fn name(&self) -> &str {
        "whisper"
    }

    async fn transcribe(&self, audio: Vec<u8>, filename: &str) -> Result<String> {
        let part = reqwest::multipart::Part::bytes(audio)
            .file_name(filename.to_string())
            .mime_str("audio/ogg")
            .map_err(|e| SavvyError::Transcription(e.to_string()))?;

        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone());

        let resp = self
            .client
            .post(TRANSCRIPTIONS_URL)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| SavvyError::Transcription(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(SavvyError::Transcription(format!(
                "Whisper transcription failed ({}): {}",
                status, body
            )));
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|e| SavvyError::Transcription(e.to_string()))?;

        Ok(Self::response_text(&json))
    }
}
