//! Read-only query layer over the chat-history `SQLite` store.
//!
//! The schema belongs to the application that writes the store, so every
//! optional column is detected once at open time and missing ones degrade to
//! empty values instead of failing the query.

use crate::body::decode_attributed_body;
use crate::error::{ChatDbError, Result};
use crate::model::{
    AttachmentMeta, Chat, ChatInfo, Message, MessageBatch, MessageFilter, Reaction,
};
use crate::reactions::{
    ReactionRow, content_predicate, is_reaction_code, reply_target, resolve_reactions,
};
use crate::timestamp::{from_store_time, sql_nanos, to_store_time};
use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags, OptionalExtension, Row, params, params_from_iter};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// How long a query waits on a lock held by the writing application.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Optional columns present in this store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct SchemaCaps {
    /// `message.attributedBody`
    pub attributed_body: bool,
    /// `message.associated_message_type` and `message.associated_message_guid`
    pub reactions: bool,
    /// `message.thread_originator_guid`
    pub thread_originator: bool,
    /// `attachment.is_sticker`
    pub sticker: bool,
    /// `chat.service_name`
    pub chat_service: bool,
}

impl SchemaCaps {
    fn detect(conn: &Connection) -> rusqlite::Result<Self> {
        let message = table_columns(conn, "message")?;
        let attachment = table_columns(conn, "attachment")?;
        let chat = table_columns(conn, "chat")?;

        Ok(Self {
            attributed_body: message.contains("attributedBody"),
            reactions: message.contains("associated_message_type")
                && message.contains("associated_message_guid"),
            thread_originator: message.contains("thread_originator_guid"),
            sticker: attachment.contains("is_sticker"),
            chat_service: chat.contains("service_name"),
        })
    }
}

fn table_columns(conn: &Connection, table: &str) -> rusqlite::Result<HashSet<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<HashSet<_>>>()?;
    Ok(columns)
}

fn limit_to_i64(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// Message row exactly as read, before decoding and classification.
struct RawMessage {
    row_id: i64,
    chat_id: i64,
    guid: String,
    sender: String,
    text: Option<String>,
    body: Option<Vec<u8>>,
    date: i64,
    is_from_me: bool,
    service: String,
    associated_type: i64,
    associated_guid: Option<String>,
    thread_guid: Option<String>,
    attachments_count: i64,
}

impl RawMessage {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            row_id: row.get("row_id")?,
            chat_id: row.get("chat_id")?,
            guid: row.get("guid")?,
            sender: row.get("sender")?,
            text: row.get("text")?,
            body: row.get("body")?,
            date: row.get("date")?,
            is_from_me: row.get::<_, i64>("is_from_me")? != 0,
            service: row.get("service")?,
            associated_type: row.get("assoc_type")?,
            associated_guid: row.get("assoc_guid")?,
            thread_guid: row.get("thread_guid")?,
            attachments_count: row.get("attachments")?,
        })
    }

    fn is_reaction(&self) -> bool {
        is_reaction_code(self.associated_type)
    }

    fn into_message(self) -> Message {
        let text = match self.text {
            Some(text) if !text.trim().is_empty() => text,
            _ => self
                .body
                .as_deref()
                .map(decode_attributed_body)
                .unwrap_or_default(),
        };
        let reply_to_guid = reply_target(
            self.associated_type,
            self.associated_guid.as_deref(),
            self.thread_guid.as_deref(),
        );

        Message {
            row_id: self.row_id,
            chat_id: self.chat_id,
            guid: self.guid,
            reply_to_guid,
            sender: self.sender,
            text,
            date: from_store_time(self.date),
            is_from_me: self.is_from_me,
            service: self.service,
            attachments_count: self.attachments_count,
        }
    }
}

/// Read-only handle on the chat-history store.
pub struct MessageStore {
    conn: Connection,
    path: PathBuf,
    caps: SchemaCaps,
}

impl MessageStore {
    /// Open the store at `path` read-only.
    ///
    /// The connection uses a private cache and never takes an exclusive
    /// lock, so rows committed by the writing application become visible to
    /// later queries on the same connection.
    ///
    /// # Errors
    ///
    /// Returns [`ChatDbError::StoreUnreadable`] or
    /// [`ChatDbError::PermissionDenied`] when the file cannot be read, and
    /// [`ChatDbError::StoreOpen`] when it is not a usable database. All three
    /// carry the path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        std::fs::File::open(path).map_err(|e| ChatDbError::store_unreadable(path, e))?;

        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_NO_MUTEX
            | OpenFlags::SQLITE_OPEN_PRIVATE_CACHE
            | OpenFlags::SQLITE_OPEN_URI;
        let conn = Connection::open_with_flags(path, flags)
            .map_err(|e| ChatDbError::store_open(path, e))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| ChatDbError::store_open(path, e))?;

        let caps = SchemaCaps::detect(&conn).map_err(|e| ChatDbError::store_open(path, e))?;
        if !caps.reactions {
            warn!(path = %path.display(), "Store has no reaction columns; reactions will be empty");
        }
        if !caps.attributed_body {
            debug!(path = %path.display(), "Store has no attributedBody column");
        }
        info!(path = %path.display(), ?caps, "Opened message store");

        Ok(Self {
            conn,
            path: path.to_path_buf(),
            caps,
        })
    }

    /// Path the store was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Optional columns detected at open time.
    #[must_use]
    pub const fn caps(&self) -> SchemaCaps {
        self.caps
    }

    /// Column list shared by every message query. `chat_expr` supplies the
    /// owning chat id.
    fn message_columns(&self, chat_expr: &str) -> String {
        let body = if self.caps.attributed_body {
            "m.attributedBody"
        } else {
            "NULL"
        };
        let (assoc_type, assoc_guid) = if self.caps.reactions {
            (
                "IFNULL(m.associated_message_type, 0)",
                "m.associated_message_guid",
            )
        } else {
            ("0", "NULL")
        };
        let thread = if self.caps.thread_originator {
            "m.thread_originator_guid"
        } else {
            "NULL"
        };

        format!(
            "m.ROWID AS row_id,
             {chat_expr} AS chat_id,
             IFNULL(m.guid, '') AS guid,
             IFNULL(h.id, '') AS sender,
             m.text AS text,
             {body} AS body,
             IFNULL(m.date, 0) AS date,
             IFNULL(m.is_from_me, 0) AS is_from_me,
             IFNULL(m.service, '') AS service,
             {assoc_type} AS assoc_type,
             {assoc_guid} AS assoc_guid,
             {thread} AS thread_guid,
             (SELECT COUNT(*) FROM message_attachment_join maj
               WHERE maj.message_id = m.ROWID) AS attachments"
        )
    }

    fn reaction_exclusion(&self) -> Option<String> {
        self.caps
            .reactions
            .then(|| content_predicate("m.associated_message_type"))
    }

    /// Chats ordered by most recent message, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn list_chats(&self, limit: usize) -> Result<Vec<Chat>> {
        let service = if self.caps.chat_service {
            "IFNULL(c.service_name, '')"
        } else {
            "''"
        };
        let sql = format!(
            r"
            SELECT c.ROWID, IFNULL(c.chat_identifier, ''), IFNULL(c.guid, ''),
                   IFNULL(c.display_name, ''), {service}, MAX(m.date) AS last_date
            FROM chat c
            LEFT JOIN chat_message_join cmj ON cmj.chat_id = c.ROWID
            LEFT JOIN message m ON m.ROWID = cmj.message_id
            GROUP BY c.ROWID
            ORDER BY last_date IS NULL, last_date DESC, c.ROWID DESC
            LIMIT ?
            "
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let chats = stmt
            .query_map(params![limit_to_i64(limit)], |row| {
                Ok(Chat {
                    id: row.get(0)?,
                    identifier: row.get(1)?,
                    guid: row.get(2)?,
                    name: row.get(3)?,
                    service: row.get(4)?,
                    last_message_at: row.get::<_, Option<i64>>(5)?.map(from_store_time),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        debug!(count = chats.len(), "Listed chats");
        Ok(chats)
    }

    /// A single chat with its participants, or `None` if no such chat exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn chat_info(&self, chat_id: i64) -> Result<Option<ChatInfo>> {
        let service = if self.caps.chat_service {
            "IFNULL(service_name, '')"
        } else {
            "''"
        };
        let sql = format!(
            "SELECT ROWID, IFNULL(chat_identifier, ''), IFNULL(guid, ''),
                    IFNULL(display_name, ''), {service}
             FROM chat WHERE ROWID = ?"
        );

        let chat = self
            .conn
            .query_row(&sql, params![chat_id], |row| {
                Ok(ChatInfo {
                    id: row.get(0)?,
                    identifier: row.get(1)?,
                    guid: row.get(2)?,
                    name: row.get(3)?,
                    service: row.get(4)?,
                    participants: Vec::new(),
                })
            })
            .optional()?;

        match chat {
            Some(mut chat) => {
                chat.participants = self.participants(chat_id)?;
                Ok(Some(chat))
            }
            None => Ok(None),
        }
    }

    /// Distinct participant handles of a chat.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn participants(&self, chat_id: i64) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT DISTINCT h.id
            FROM chat_handle_join chj
            JOIN handle h ON h.ROWID = chj.handle_id
            WHERE chj.chat_id = ? AND h.id IS NOT NULL AND h.id != ''
            ORDER BY h.id
            ",
        )?;
        let handles = stmt
            .query_map(params![chat_id], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(handles)
    }

    /// Message history for a chat.
    ///
    /// The filter and reaction exclusion are part of the SQL `WHERE` clause,
    /// and `LIMIT` keeps the newest matching rows, so a narrow date window is
    /// never starved by newer rows outside it. Results are oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`ChatDbError::InvalidArgument`] for a zero limit or an empty
    /// date window before touching the database, or an error if the query
    /// fails.
    pub fn messages(&self, chat_id: i64, limit: usize, filter: &MessageFilter) -> Result<Vec<Message>> {
        validate_limit(limit)?;
        validate_filter(filter)?;

        let mut clauses = vec![
            "EXISTS (SELECT 1 FROM chat_message_join cmj
                     WHERE cmj.message_id = m.ROWID AND cmj.chat_id = ?)"
                .to_string(),
        ];
        let mut values = vec![Value::Integer(chat_id)];

        if let Some(exclusion) = self.reaction_exclusion() {
            clauses.push(exclusion);
        }
        let date = sql_nanos("IFNULL(m.date, 0)");
        if let Some(start) = filter.start {
            clauses.push(format!("{date} >= ?"));
            values.push(Value::Integer(to_store_time(start)));
        }
        if let Some(end) = filter.end {
            clauses.push(format!("{date} < ?"));
            values.push(Value::Integer(to_store_time(end)));
        }
        if !filter.participants.is_empty() {
            let placeholders = vec!["?"; filter.participants.len()].join(", ");
            clauses.push(format!("h.id IN ({placeholders})"));
            values.extend(filter.participants.iter().cloned().map(Value::Text));
        }
        values.push(Value::Integer(limit_to_i64(limit)));

        let sql = format!(
            r"
            SELECT * FROM (
                SELECT {columns}, {date} AS sort_date
                FROM message m
                LEFT JOIN handle h ON h.ROWID = m.handle_id
                WHERE {predicate}
                ORDER BY sort_date DESC, m.ROWID DESC
                LIMIT ?
            )
            ORDER BY sort_date ASC, row_id ASC
            ",
            columns = self.message_columns(&chat_id.to_string()),
            predicate = clauses.join(" AND "),
        );

        debug!(chat_id, limit, filtered = !filter.is_empty(), "Querying message history");
        let mut stmt = self.conn.prepare(&sql)?;
        let messages = stmt
            .query_map(params_from_iter(values.iter()), RawMessage::from_row)?
            .map(|raw| raw.map(RawMessage::into_message))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(messages)
    }

    /// Rows with a row id strictly greater than `cursor`, oldest first.
    ///
    /// `limit` bounds the raw rows scanned, reaction rows included. Reaction
    /// rows are dropped from [`MessageBatch::messages`] but still counted in
    /// [`MessageBatch::last_row_id`], so a cursor advanced to it never
    /// revisits them.
    ///
    /// # Errors
    ///
    /// Returns [`ChatDbError::InvalidArgument`] for a zero limit, or an
    /// error if the query fails.
    pub fn messages_after(
        &self,
        cursor: i64,
        chat_id: Option<i64>,
        limit: usize,
    ) -> Result<MessageBatch> {
        validate_limit(limit)?;

        let mut values = vec![Value::Integer(cursor)];
        let (chat_expr, chat_clause) = if let Some(chat_id) = chat_id {
            values.push(Value::Integer(chat_id));
            (
                chat_id.to_string(),
                "AND EXISTS (SELECT 1 FROM chat_message_join cmj
                             WHERE cmj.message_id = m.ROWID AND cmj.chat_id = ?)",
            )
        } else {
            (
                "IFNULL((SELECT MIN(cmj.chat_id) FROM chat_message_join cmj
                         WHERE cmj.message_id = m.ROWID), 0)"
                    .to_string(),
                "",
            )
        };
        values.push(Value::Integer(limit_to_i64(limit)));

        let sql = format!(
            r"
            SELECT {columns}
            FROM message m
            LEFT JOIN handle h ON h.ROWID = m.handle_id
            WHERE m.ROWID > ? {chat_clause}
            ORDER BY m.ROWID ASC
            LIMIT ?
            ",
            columns = self.message_columns(&chat_expr),
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let raw = stmt
            .query_map(params_from_iter(values.iter()), RawMessage::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let scanned = raw.len();
        let last_row_id = raw.last().map(|r| r.row_id);
        let messages: Vec<Message> = raw
            .into_iter()
            .filter(|r| !r.is_reaction())
            .map(RawMessage::into_message)
            .collect();

        debug!(
            cursor,
            scanned,
            delivered = messages.len(),
            ?last_row_id,
            "Fetched rows after cursor"
        );
        Ok(MessageBatch {
            messages,
            last_row_id,
            scanned,
        })
    }

    /// A single content message by row id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn message(&self, row_id: i64) -> Result<Option<Message>> {
        let sql = format!(
            "SELECT {columns}
             FROM message m
             LEFT JOIN handle h ON h.ROWID = m.handle_id
             WHERE m.ROWID = ?",
            columns = self.message_columns(
                "IFNULL((SELECT MIN(cmj.chat_id) FROM chat_message_join cmj
                         WHERE cmj.message_id = m.ROWID), 0)"
            ),
        );
        let raw = self
            .conn
            .query_row(&sql, params![row_id], RawMessage::from_row)
            .optional()?;
        Ok(raw.map(RawMessage::into_message))
    }

    /// Highest row id in the store, or 0 when it is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn max_row_id(&self) -> Result<i64> {
        let max = self
            .conn
            .query_row("SELECT IFNULL(MAX(ROWID), 0) FROM message", [], |row| {
                row.get(0)
            })?;
        Ok(max)
    }

    /// Attachments of a message with resolved paths.
    ///
    /// A file that is gone from disk is reported with `missing = true`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn attachments(&self, message_row_id: i64) -> Result<Vec<AttachmentMeta>> {
        let sticker = if self.caps.sticker {
            "IFNULL(a.is_sticker, 0)"
        } else {
            "0"
        };
        let sql = format!(
            r"
            SELECT IFNULL(a.filename, ''), IFNULL(a.transfer_name, ''), IFNULL(a.uti, ''),
                   IFNULL(a.mime_type, ''), IFNULL(a.total_bytes, 0), {sticker}
            FROM message_attachment_join maj
            JOIN attachment a ON a.ROWID = maj.attachment_id
            WHERE maj.message_id = ?
            ORDER BY a.ROWID
            "
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let attachments = stmt
            .query_map(params![message_row_id], |row| {
                let filename: String = row.get(0)?;
                let (original_path, missing) = resolve_attachment_path(&filename);
                Ok(AttachmentMeta {
                    filename,
                    transfer_name: row.get(1)?,
                    uti: row.get(2)?,
                    mime_type: row.get(3)?,
                    total_bytes: row.get(4)?,
                    is_sticker: row.get::<_, i64>(5)? != 0,
                    original_path,
                    missing,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(attachments)
    }

    /// Active reactions on a message.
    ///
    /// Returns an empty list for stores without reaction columns and for
    /// unknown row ids.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn reactions(&self, message_row_id: i64) -> Result<Vec<Reaction>> {
        if !self.caps.reactions {
            return Ok(Vec::new());
        }

        let guid: Option<String> = self
            .conn
            .query_row(
                "SELECT guid FROM message WHERE ROWID = ?",
                params![message_row_id],
                |row| row.get(0),
            )
            .optional()?
            .flatten();
        let Some(guid) = guid.filter(|g| !g.is_empty()) else {
            debug!(message_row_id, "No GUID for message; no reactions");
            return Ok(Vec::new());
        };

        let body = if self.caps.attributed_body {
            "m.attributedBody"
        } else {
            "NULL"
        };
        let sql = format!(
            r"
            SELECT m.ROWID, m.associated_message_type, IFNULL(m.associated_message_guid, ''),
                   m.text, {body}, IFNULL(h.id, ''), IFNULL(m.is_from_me, 0), IFNULL(m.date, 0)
            FROM message m
            LEFT JOIN handle h ON h.ROWID = m.handle_id
            WHERE (m.associated_message_guid = ?1
                   OR m.associated_message_guid LIKE '%/' || ?1
                   OR m.associated_message_guid LIKE '%:' || ?1)
              AND NOT {content}
            ORDER BY m.ROWID ASC
            ",
            content = content_predicate("m.associated_message_type"),
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![guid], |row| {
                let text: Option<String> = row.get(3)?;
                let body: Option<Vec<u8>> = row.get(4)?;
                let text = match text {
                    Some(text) if !text.trim().is_empty() => text,
                    _ => body.as_deref().map(decode_attributed_body).unwrap_or_default(),
                };
                Ok(ReactionRow {
                    row_id: row.get(0)?,
                    associated_type: row.get(1)?,
                    associated_guid: row.get(2)?,
                    text,
                    sender: row.get(5)?,
                    is_from_me: row.get::<_, i64>(6)? != 0,
                    date: from_store_time(row.get(7)?),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        debug_assert!(rows.iter().all(|r| is_reaction_code(r.associated_type)));
        Ok(resolve_reactions(message_row_id, &guid, &rows))
    }
}

fn validate_limit(limit: usize) -> Result<()> {
    if limit == 0 {
        return Err(ChatDbError::invalid_argument("limit must be at least 1"));
    }
    Ok(())
}

fn validate_filter(filter: &MessageFilter) -> Result<()> {
    if let (Some(start), Some(end)) = (filter.start, filter.end) {
        if start >= end {
            return Err(ChatDbError::invalid_argument(format!(
                "start ({}) must be before end ({})",
                start.to_rfc3339(),
                end.to_rfc3339()
            )));
        }
    }
    if filter.participants.iter().any(|p| p.trim().is_empty()) {
        return Err(ChatDbError::invalid_argument(
            "participant handles must not be empty",
        ));
    }
    Ok(())
}

/// Resolve a stored attachment path and report whether the file is missing.
///
/// Stored paths are usually home-relative (`~/Library/...`).
#[must_use]
pub fn resolve_attachment_path(stored: &str) -> (String, bool) {
    if stored.is_empty() {
        return (String::new(), true);
    }
    let resolved = match stored.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map_or_else(|| PathBuf::from(stored), |home| home.join(rest)),
        None => PathBuf::from(stored),
    };
    let missing = !resolved.exists();
    (resolved.to_string_lossy().into_owned(), missing)
}
