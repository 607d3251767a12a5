//! Command-line surface.

mod quota;
mod run;

pub(crate) use quota::cmd_quota;
pub(crate) use run::cmd_run;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "savvybot",
    version,
    about = "Telegram AI assistant bot with per-user daily usage quotas"
)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run the Telegram bot until interrupted.
    Run,
    /// Show today's quota usage for a user.
    Quota {
        /// Telegram user id to inspect.
        #[arg(long)]
        user: i64,
        /// Print as JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
}
