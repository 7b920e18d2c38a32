//! CLI definitions for chatdb.
//!
//! Uses clap for argument parsing with derive macros.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// chatdb - read and follow a local chat-history store
#[derive(Parser, Debug)]
#[command(name = "chatdb")]
#[command(version)]
#[command(about = "Read chat history and follow new messages from a local chat.db store")]
#[command(long_about = r#"
chatdb reads the SQLite message store kept by the desktop messaging app.
It never writes to the store.

Quick start:
  1. List chats:        chatdb chats
  2. Read a chat:       chatdb history 42 --since "last 7 days"
  3. Follow new rows:   chatdb watch --chat 42
"#)]
pub struct Cli {
    /// Path to the message store
    #[arg(long, env = "CHATDB_DB", global = true)]
    pub db: Option<PathBuf>,

    /// Read configuration from this file instead of the user config
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format (defaults to the configured format)
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// More diagnostics on stderr (-v debug, -vv trace)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only errors on stderr
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List chats, most recently active first
    Chats(ChatsArgs),

    /// Show message history for a chat
    History(HistoryArgs),

    /// Print new messages as they arrive
    Watch(WatchArgs),

    /// Show or manage configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct ChatsArgs {
    /// Maximum number of chats
    #[arg(long, short = 'n', default_value = "20")]
    pub limit: usize,
}

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Chat row id (see `chatdb chats`)
    pub chat_id: i64,

    /// Maximum number of messages (newest are kept)
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,

    /// Only messages at or after this date
    #[arg(long)]
    pub since: Option<String>,

    /// Only messages before this date
    #[arg(long)]
    pub until: Option<String>,

    /// Only messages from these handles
    #[arg(long, short = 'p', value_delimiter = ',')]
    pub participants: Vec<String>,

    /// Include attachment metadata
    #[arg(long)]
    pub attachments: bool,

    /// Include active reactions
    #[arg(long)]
    pub reactions: bool,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Only messages in this chat
    #[arg(long, short = 'c')]
    pub chat: Option<i64>,

    /// Deliver rows after this row id instead of starting at the newest row
    #[arg(long, conflicts_with = "from_beginning")]
    pub since_rowid: Option<i64>,

    /// Replay the whole store before following
    #[arg(long)]
    pub from_beginning: bool,

    /// Debounce delay in milliseconds
    #[arg(long)]
    pub debounce_ms: Option<u64>,

    /// Rows read per poll
    #[arg(long)]
    pub batch_limit: Option<usize>,

    /// Poll again immediately after a full batch
    #[arg(long)]
    pub repoll: bool,

    /// Exit after this many messages
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Show the effective configuration
    #[arg(long)]
    pub show: bool,

    /// Print the user config file location
    #[arg(long)]
    pub path: bool,

    /// Write a default config file to the user location
    #[arg(long)]
    pub init: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    /// One JSON document
    Json,
    /// One JSON object per line
    Jsonl,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as ValueEnum>::from_str(s, true)
    }
}
