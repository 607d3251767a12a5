//! SavvyBot: a Telegram AI assistant bot with per-user daily usage quotas.
//!
//! Inbound text and voice messages are proxied to the OpenAI completion and
//! Whisper transcription APIs. Before any billed call, the cost is estimated
//! and held against the user's daily budget in a shared Redis counter store;
//! after the call, the hold is reconciled with the actually billed amount.
//!
//! Module map:
//! - [`quota`]: the usage-quota core with meters, day-keyed counters, the
//!   check/reserve/commit protocol, and the counter-store backends
//! - [`providers`] / [`transcribe`]: the billed external APIs
//! - [`bot`]: the per-message conversation orchestrator
//! - [`channels`]: the Telegram transport
//! - [`config`] / [`error`]: ambient plumbing

pub mod bot;
pub mod channels;
pub mod config;
pub mod error;
pub mod providers;
pub mod quota;
pub mod transcribe;

pub use error::{Result, SavvyError};
