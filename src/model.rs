//! Data models for rows read from the chat-history store.
//!
//! Every value here is produced at read time. Nothing is written back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message row as delivered to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub row_id: i64,
    pub chat_id: i64,
    pub guid: String,
    /// GUID (not row id) of the message this one replies to.
    pub reply_to_guid: Option<String>,
    /// Sender handle, empty when the store does not know it.
    pub sender: String,
    pub text: String,
    pub date: DateTime<Utc>,
    pub is_from_me: bool,
    pub service: String,
    pub attachments_count: i64,
}

/// Closed vocabulary of reactions plus a free-form emoji.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "emoji")]
pub enum ReactionKind {
    Love,
    Like,
    Dislike,
    Laugh,
    Emphasis,
    Question,
    /// A single emoji grapheme cluster.
    Custom(String),
}

impl ReactionKind {
    /// The six fixed kinds in type-code order.
    pub const FIXED: [Self; 6] = [
        Self::Love,
        Self::Like,
        Self::Dislike,
        Self::Laugh,
        Self::Emphasis,
        Self::Question,
    ];

    /// Emoji rendering used in text output.
    #[must_use]
    pub fn emoji(&self) -> &str {
        match self {
            Self::Love => "❤️",
            Self::Like => "👍",
            Self::Dislike => "👎",
            Self::Laugh => "😂",
            Self::Emphasis => "‼️",
            Self::Question => "❓",
            Self::Custom(emoji) => emoji,
        }
    }
}

impl std::fmt::Display for ReactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Love => write!(f, "love"),
            Self::Like => write!(f, "like"),
            Self::Dislike => write!(f, "dislike"),
            Self::Laugh => write!(f, "laugh"),
            Self::Emphasis => write!(f, "emphasis"),
            Self::Question => write!(f, "question"),
            Self::Custom(emoji) => write!(f, "custom:{emoji}"),
        }
    }
}

/// An active reaction on a message. Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub target_row_id: i64,
    pub kind: ReactionKind,
    pub sender: String,
    pub is_from_me: bool,
    pub date: DateTime<Utc>,
    /// Row id of the synthetic row that produced this reaction.
    pub source_row_id: i64,
}

/// Attachment metadata joined from the attachment tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentMeta {
    pub filename: String,
    /// Display override for the file name.
    pub transfer_name: String,
    pub uti: String,
    pub mime_type: String,
    pub total_bytes: i64,
    pub is_sticker: bool,
    /// Resolved absolute path.
    pub original_path: String,
    /// True when `original_path` does not exist on disk.
    pub missing: bool,
}

/// Chat summary used by listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    pub identifier: String,
    pub guid: String,
    pub name: String,
    pub service: String,
    pub last_message_at: Option<DateTime<Utc>>,
}

/// A chat with its participant handles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatInfo {
    pub id: i64,
    pub identifier: String,
    pub guid: String,
    pub name: String,
    pub service: String,
    /// Deduplicated; order is not significant.
    pub participants: Vec<String>,
}

/// History filter applied inside the SQL query, before the limit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageFilter {
    /// Sender handles to keep. Empty keeps everyone.
    pub participants: Vec<String>,
    /// Inclusive lower bound.
    pub start: Option<DateTime<Utc>>,
    /// Exclusive upper bound.
    pub end: Option<DateTime<Utc>>,
}

impl MessageFilter {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty() && self.start.is_none() && self.end.is_none()
    }
}

/// One `messages_after` result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageBatch {
    /// Content rows in ascending row id order. Reaction rows are not included.
    pub messages: Vec<Message>,
    /// Highest row id scanned, reaction rows included.
    pub last_row_id: Option<i64>,
    /// Raw rows consumed by the batch.
    pub scanned: usize,
}

/// Where a watch session starts reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartFrom {
    /// Seed the cursor to the current maximum row id; history is not replayed.
    #[default]
    Latest,
    /// Deliver rows strictly after this row id.
    RowId(i64),
    /// Replay everything.
    Beginning,
}
