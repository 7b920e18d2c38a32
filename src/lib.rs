//! chatdb - read-only access to a local chat-history store
//!
//! This library reads the `SQLite` message store kept by the desktop
//! messaging app: chat listings, filtered history, attachments, reactions,
//! and a live feed of new messages. It never writes to the store.
//!
//! # Modules
//!
//! - [`store`] - Read-only queries over the store
//! - [`watcher`] - Debounced live feed of new messages
//! - [`body`] - Plain-text recovery from binary message bodies
//! - [`reactions`] - Reaction row classification and reconciliation
//! - [`model`] - Data models returned to callers
//! - [`error`] - Custom error types with rich context
//! - [`cli`] - Command-line interface definitions

pub mod body;
pub mod cli;
pub mod config;
pub mod date_parser;
pub mod error;
pub mod logging;
pub mod model;
pub mod reactions;
pub mod store;
pub mod timestamp;
pub mod watcher;

pub use cli::*;
pub use config::Config;
pub use error::{ChatDbError, Result, ResultExt, format_chatdb_error, format_error};
pub use model::*;
pub use store::MessageStore;
pub use watcher::{ChangeWatcher, CloseReason, FeedEvent, WatchHandle, WatchOptions};

use chrono::{DateTime, Datelike, Utc};

/// Store location relative to the home directory.
pub const DEFAULT_DB_RELATIVE: &str = "Library/Messages/chat.db";

const BYTES_PER_KB: u64 = 1024;
const BYTES_PER_MB: u64 = 1024 * 1024;
const BYTES_PER_GB: u64 = 1024 * 1024 * 1024;

/// Default store path, `~/Library/Messages/chat.db`.
#[must_use]
pub fn default_db_path() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(DEFAULT_DB_RELATIVE)
}

/// Format a datetime as a human-friendly relative string.
///
/// - < 1 minute: "just now"
/// - < 1 hour: "Nm ago"
/// - < 24 hours: "Nh ago"
/// - < 7 days: "Nd ago"
/// - Same calendar year: "Mon D"
/// - Different year: "Mon D, YYYY"
#[must_use]
pub fn format_relative_date(dt: DateTime<Utc>) -> String {
    format_relative_date_with_base(dt, Utc::now())
}

/// Format a datetime relative to a fixed base time.
#[must_use]
pub fn format_relative_date_with_base(dt: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let duration = now.signed_duration_since(dt);
    if duration.num_seconds() < 0 {
        return dt.format("%b %d, %Y").to_string();
    }

    let minutes = duration.num_minutes();
    let hours = duration.num_hours();
    let days = duration.num_days();

    if duration.num_seconds() < 60 {
        "just now".to_string()
    } else if minutes < 60 {
        format!("{minutes}m ago")
    } else if hours < 24 {
        format!("{hours}h ago")
    } else if days < 7 {
        format!("{days}d ago")
    } else if dt.year() == now.year() {
        dt.format("%b %d").to_string()
    } else {
        dt.format("%b %d, %Y").to_string()
    }
}

/// Format an optional datetime, `"never"` when absent.
#[must_use]
pub fn format_optional_date(value: Option<DateTime<Utc>>) -> String {
    value.map_or_else(|| "never".to_string(), format_relative_date)
}

/// Sender label for text output.
#[must_use]
pub fn format_sender(message: &Message) -> &str {
    if message.is_from_me {
        "me"
    } else if message.sender.is_empty() {
        "unknown"
    } else {
        &message.sender
    }
}

/// Collapse line breaks so one message prints on one line.
#[must_use]
pub fn single_line(text: &str) -> String {
    text.replace("\r\n", " ").replace(['\n', '\r'], " ")
}

/// Format bytes into a human-friendly string.
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    if bytes < BYTES_PER_KB {
        format!("{bytes} B")
    } else if bytes < BYTES_PER_MB {
        format_bytes_with_unit(bytes, BYTES_PER_KB, "KB")
    } else if bytes < BYTES_PER_GB {
        format_bytes_with_unit(bytes, BYTES_PER_MB, "MB")
    } else {
        format_bytes_with_unit(bytes, BYTES_PER_GB, "GB")
    }
}

/// Format bytes for signed input, clamping negatives to zero.
#[must_use]
pub fn format_bytes_i64(bytes: i64) -> String {
    format_bytes(u64::try_from(bytes.max(0)).unwrap_or(0))
}

fn format_bytes_with_unit(bytes: u64, unit: u64, suffix: &str) -> String {
    let whole = bytes / unit;
    let tenths = (bytes % unit) * 10 / unit;
    format!("{whole}.{tenths} {suffix}")
}
