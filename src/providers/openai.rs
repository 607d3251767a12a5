//! OpenAI chat-completion provider.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::error::{Result, SavvyError};

use super::{Completion, CompletionProvider, Usage};

/// OpenAI REST API base.
const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Default model when none is configured.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";

/// System prompt for every conversation turn.
const SYSTEM_PROMPT: &str =
    "You are a very helpful assistant that makes jokes from one in a while.";

const TEMPERATURE: f64 = 0.25;
const MAX_COMPLETION_TOKENS: u32 = 256;

/// Chat-completion provider speaking the OpenAI REST API directly.
pub struct OpenAIProvider {
    api_key: String,
    model: String,
    client: Client,
}

impl std::fmt::Debug for OpenAIProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIProvider")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .finish()
    }
}

impl OpenAIProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            client: Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .expect("failed to build HTTP client"),
        }
    }

    /// Build the `chat/completions` request body for a single user prompt.
    fn build_request_body(&self, prompt: &str) -> Value {
        json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt },
            ],
            "temperature": TEMPERATURE,
            "max_tokens": MAX_COMPLETION_TOKENS,
        })
    }

    /// Extract the assistant reply text from a chat-completion response.
    fn extract_text(response: &Value) -> Option<String> {
        response["choices"][0]["message"]["content"]
            .as_str()
            .map(String::from)
    }

    /// Parse token usage from a response if available.
    ///
    /// `total_tokens` is what the quota is charged with, so the provider's
    /// own total is preferred over recomputing prompt + completion.
    fn extract_usage(response: &Value) -> Option<Usage> {
        let meta = response.get("usage")?;
        let prompt = meta["prompt_tokens"].as_u64().unwrap_or(0) as u32;
        let completion = meta["completion_tokens"].as_u64().unwrap_or(0) as u32;
        let mut usage = Usage::new(prompt, completion);
        if let Some(total) = meta["total_tokens"].as_u64() {
            usage.total_tokens = total as u32;
        }
        Some(usage)
    }
}

#[async_trait]
impl CompletionProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, prompt: &str) -> Result<Completion> {
        let body = self.build_request_body(prompt);

        debug!("OpenAI completion request to model {}", self.model);

        let response = self
            .client
            .post(format!("{}/chat/completions", OPENAI_API_BASE))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SavvyError::Provider(format!("OpenAI request failed: {}", e)))?;

        if response.status().is_success() {
            let json: Value = response.json().await.map_err(|e| {
                SavvyError::Provider(format!("Failed to parse OpenAI response: {}", e))
            })?;

            let content = Self::extract_text(&json).unwrap_or_default();
            let usage = Self::extract_usage(&json);

            let mut completion = Completion::text(content);
            if let Some(u) = usage {
                completion = completion.with_usage(u);
            }
            return Ok(completion);
        }

        let status = response.status().as_u16();
        let error_text = response.text().await.unwrap_or_default();

        // Try to extract a useful message from the OpenAI error body.
        let message = serde_json::from_str::<Value>(&error_text)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(String::from))
            .unwrap_or(error_text);

        Err(SavvyError::Provider(format!(
            "OpenAI API error ({}): {}",
            status, message
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_carries_system_and_user_turns() {
        let provider = OpenAIProvider::new("key", DEFAULT_OPENAI_MODEL);
        let body = provider.build_request_body("tell me a joke");

        assert_eq!(body["model"], DEFAULT_OPENAI_MODEL);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[1]["content"], "tell me a joke");
        assert_eq!(body["max_tokens"], 256);
    }

    #[test]
    fn test_extract_text_from_choices() {
        let response = json!({
            "choices": [{ "message": { "role": "assistant", "content": "Hi there!" } }]
        });
        assert_eq!(
            OpenAIProvider::extract_text(&response),
            Some("Hi there!".to_string())
        );
    }

    #[test]
    fn test_extract_text_missing_choices_is_none() {
        assert_eq!(OpenAIProvider::extract_text(&json!({})), None);
    }

    #[test]
    fn test_extract_usage_prefers_reported_total() {
        let response = json!({
            "usage": { "prompt_tokens": 20, "completion_tokens": 10, "total_tokens": 31 }
        });
        let usage = OpenAIProvider::extract_usage(&response).unwrap();
        assert_eq!(usage.prompt_tokens, 20);
        assert_eq!(usage.completion_tokens, 10);
        assert_eq!(usage.total_tokens, 31);
    }

    #[test]
    fn test_extract_usage_absent_is_none() {
        assert!(OpenAIProvider::extract_usage(&json!({"choices": []})).is_none());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let provider = OpenAIProvider::new("sk-secret", DEFAULT_OPENAI_MODEL);
        let debug_str = format!("{provider:?}");
        assert!(!debug_str.contains("sk-secret"), "{debug_str}");
        assert!(debug_str.contains("[REDACTED]"), "{debug_str}");
    }
}
