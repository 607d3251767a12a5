//! Chat-platform channels.

pub mod telegram;

pub use telegram::TelegramChannel;

use async_trait::async_trait;

use crate::error::Result;

/// A long-running connection to a chat platform.
///
/// A channel owns the transport only: receiving updates, downloading media,
/// sending replies. Everything with a cost attached goes through the
/// [`crate::bot::Orchestrator`] it was built with.
#[async_trait]
pub trait Channel: Send {
    fn name(&self) -> &str;

    /// Connect and serve messages until the surrounding process stops.
    async fn run(&mut self) -> Result<()>;
}
