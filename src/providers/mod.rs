//! LLM completion providers.

pub mod openai;

pub use openai::OpenAIProvider;

use async_trait::async_trait;

use crate::error::Result;

/// Token accounting reported by a completion API call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    /// Tokens billed in total. Usually `prompt + completion`, but the
    /// provider's own figure wins when it reports one.
    pub total_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// A completed chat turn: the reply text plus whatever usage the provider
/// reported alongside it.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub content: String,
    pub usage: Option<Usage>,
}

impl Completion {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Total tokens billed for this completion; zero when the provider
    /// reported no usage.
    pub fn total_tokens(&self) -> u64 {
        self.usage.map(|u| u64::from(u.total_tokens)).unwrap_or(0)
    }
}

/// A chat-completion backend.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Produce an assistant reply for a single user prompt.
    async fn complete(&self, prompt: &str) -> Result<Completion>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_totals_prompt_and_completion() {
        let usage = Usage::new(120, 80);
        assert_eq!(usage.total_tokens, 200);
    }

    #[test]
    fn test_completion_without_usage_bills_zero() {
        let completion = Completion::text("hi");
        assert_eq!(completion.total_tokens(), 0);
    }

    #[test]
    fn test_completion_with_usage_bills_total() {
        let completion = Completion::text("hi").with_usage(Usage::new(10, 5));
        assert_eq!(completion.total_tokens(), 15);
    }
}
