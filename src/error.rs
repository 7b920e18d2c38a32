//! Custom error types for chatdb.
//!
//! Provides structured error handling with detailed context for better
//! diagnostics and user experience.

use std::path::PathBuf;
use thiserror::Error;

/// Primary error type for chatdb operations.
///
/// Each variant provides specific context about what went wrong,
/// enabling better error messages and programmatic error handling.
#[derive(Error, Debug)]
pub enum ChatDbError {
    // =========================================================================
    // Store Errors
    // =========================================================================
    /// Store file could not be read (missing, unreadable, not a regular file).
    #[error("Cannot read message store at '{path}': {source}")]
    StoreUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The OS refused access to the store file.
    #[error("Permission denied reading message store at '{path}'")]
    PermissionDenied { path: PathBuf },

    /// The file exists but `SQLite` refused to open it.
    #[error("Failed to open message store at '{path}': {source}")]
    StoreOpen {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    // =========================================================================
    // IO Errors
    // =========================================================================
    /// File read/write error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Configuration file parsing error.
    #[error("Invalid configuration in '{path}': {reason}")]
    ConfigError { path: PathBuf, reason: String },

    // =========================================================================
    // Input Validation Errors
    // =========================================================================
    /// Date literal in a filter could not be parsed.
    #[error("Invalid date '{value}' for {context}")]
    InvalidDate { value: String, context: String },

    /// Invalid argument passed to a query.
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// Data not found.
    #[error("{item_type} with ID '{id}' not found")]
    NotFound { item_type: &'static str, id: String },

    // =========================================================================
    // Generic Errors
    // =========================================================================
    /// Catch-all for other errors with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Result type alias for chatdb operations.
pub type Result<T> = std::result::Result<T, ChatDbError>;

impl ChatDbError {
    /// Map an IO failure on the store file to the matching variant.
    pub fn store_unreadable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::PermissionDenied {
            Self::PermissionDenied { path }
        } else {
            Self::StoreUnreadable { path, source }
        }
    }

    /// Create a store open error.
    pub fn store_open(path: impl Into<PathBuf>, source: rusqlite::Error) -> Self {
        Self::StoreOpen {
            path: path.into(),
            source,
        }
    }

    /// Create an invalid date error echoing the offending literal.
    pub fn invalid_date(value: impl Into<String>, context: impl Into<String>) -> Self {
        Self::InvalidDate {
            value: value.into(),
            context: context.into(),
        }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(item_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            item_type,
            id: id.into(),
        }
    }

    /// Wrap an error with additional context.
    pub fn with_context<E>(context: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::WithContext {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Path of the store involved in this error, if any.
    #[must_use]
    pub const fn store_path(&self) -> Option<&PathBuf> {
        match self {
            Self::StoreUnreadable { path, .. }
            | Self::PermissionDenied { path }
            | Self::StoreOpen { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Check if this error is recoverable (user can fix it).
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::StoreUnreadable { .. }
                | Self::PermissionDenied { .. }
                | Self::InvalidDate { .. }
                | Self::InvalidArgument { .. }
                | Self::NotFound { .. }
        )
    }

    /// Get a suggestion for how to fix this error, if applicable.
    #[must_use]
    pub const fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::PermissionDenied { .. } => Some(
                "Grant the terminal read access to the messages directory (Full Disk Access on macOS).",
            ),
            Self::StoreUnreadable { .. } => {
                Some("Check the path, or pass --db to point at the chat database.")
            }
            Self::StoreOpen { .. } => {
                Some("Make sure the file is a SQLite chat database and is not corrupt.")
            }
            Self::InvalidDate { .. } => Some(
                "Use YYYY-MM-DD, an RFC 3339 timestamp, or a phrase like 'yesterday' or '3 days ago'.",
            ),
            _ => None,
        }
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error.
    ///
    /// # Errors
    ///
    /// Returns the original error wrapped with additional context.
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily (only evaluated on error).
    ///
    /// # Errors
    ///
    /// Returns the original error wrapped with additional context.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| ChatDbError::with_context(context, e))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| ChatDbError::with_context(f(), e))
    }
}

// =============================================================================
// CLI Error Formatting Utilities
// =============================================================================

use colored::Colorize;

/// Format a structured CLI error with explanation and suggestions.
///
/// # Arguments
/// * `title` - Brief error title (e.g., "Cannot open store")
/// * `explanation` - What went wrong and why
/// * `suggestions` - List of actionable suggestions
#[must_use]
pub fn format_error(title: &str, explanation: &str, suggestions: &[&str]) -> String {
    use std::fmt::Write;

    let mut output = format!("{} {}", "✗".red().bold(), title.bold());

    if !explanation.is_empty() {
        let _ = write!(output, "\n\n   {explanation}");
    }

    if !suggestions.is_empty() {
        output.push_str("\n\n   ");
        if suggestions.len() == 1 {
            let _ = write!(output, "{} {}", "Hint:".cyan(), suggestions[0]);
        } else {
            let _ = write!(output, "{}:", "Try".cyan());
            for suggestion in suggestions {
                let _ = write!(output, "\n     {} {}", "•".dimmed(), suggestion);
            }
        }
    }

    output
}

/// Render a [`ChatDbError`] for the terminal, including its suggestion.
#[must_use]
pub fn format_chatdb_error(err: &ChatDbError) -> String {
    let title = match err {
        ChatDbError::StoreUnreadable { .. }
        | ChatDbError::PermissionDenied { .. }
        | ChatDbError::StoreOpen { .. } => "Cannot open message store",
        ChatDbError::InvalidDate { .. } | ChatDbError::InvalidArgument { .. } => "Invalid input",
        ChatDbError::NotFound { .. } => "Not found",
        _ => "Error",
    };
    let suggestions: Vec<&str> = err.suggestion().into_iter().collect();
    format_error(title, &err.to_string(), &suggestions)
}
