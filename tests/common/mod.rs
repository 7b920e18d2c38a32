//! Fixture store shared by the integration and CLI tests.
//!
//! Builds a chat database with the same table and column names as the real
//! store, written through an ordinary read-write connection that stays open
//! while the code under test reads the file.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{Connection, params};
use std::path::PathBuf;
use tempfile::TempDir;

const APPLE_EPOCH_OFFSET_SECS: i64 = 978_307_200;

const MODERN_SCHEMA: &str = r"
CREATE TABLE handle (
    ROWID INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL,
    service TEXT
);
CREATE TABLE chat (
    ROWID INTEGER PRIMARY KEY AUTOINCREMENT,
    guid TEXT,
    chat_identifier TEXT,
    display_name TEXT,
    service_name TEXT
);
CREATE TABLE message (
    ROWID INTEGER PRIMARY KEY AUTOINCREMENT,
    guid TEXT,
    text TEXT,
    attributedBody BLOB,
    handle_id INTEGER DEFAULT 0,
    date INTEGER,
    is_from_me INTEGER DEFAULT 0,
    service TEXT,
    associated_message_type INTEGER DEFAULT 0,
    associated_message_guid TEXT,
    thread_originator_guid TEXT
);
CREATE TABLE chat_message_join (chat_id INTEGER, message_id INTEGER);
CREATE TABLE chat_handle_join (chat_id INTEGER, handle_id INTEGER);
CREATE TABLE attachment (
    ROWID INTEGER PRIMARY KEY AUTOINCREMENT,
    filename TEXT,
    transfer_name TEXT,
    uti TEXT,
    mime_type TEXT,
    total_bytes INTEGER,
    is_sticker INTEGER DEFAULT 0
);
CREATE TABLE message_attachment_join (message_id INTEGER, attachment_id INTEGER);
";

/// Old layout without bodies, reactions, threads, stickers or chat service.
const LEGACY_SCHEMA: &str = r"
CREATE TABLE handle (ROWID INTEGER PRIMARY KEY AUTOINCREMENT, id TEXT NOT NULL, service TEXT);
CREATE TABLE chat (
    ROWID INTEGER PRIMARY KEY AUTOINCREMENT,
    guid TEXT,
    chat_identifier TEXT,
    display_name TEXT
);
CREATE TABLE message (
    ROWID INTEGER PRIMARY KEY AUTOINCREMENT,
    guid TEXT,
    text TEXT,
    handle_id INTEGER DEFAULT 0,
    date INTEGER,
    is_from_me INTEGER DEFAULT 0,
    service TEXT
);
CREATE TABLE chat_message_join (chat_id INTEGER, message_id INTEGER);
CREATE TABLE chat_handle_join (chat_id INTEGER, handle_id INTEGER);
CREATE TABLE attachment (
    ROWID INTEGER PRIMARY KEY AUTOINCREMENT,
    filename TEXT,
    transfer_name TEXT,
    uti TEXT,
    mime_type TEXT,
    total_bytes INTEGER
);
CREATE TABLE message_attachment_join (message_id INTEGER, attachment_id INTEGER);
";

/// Store timestamp (nanoseconds since 2001-01-01) for a UTC instant.
pub fn store_time(dt: DateTime<Utc>) -> i64 {
    (dt.timestamp() - APPLE_EPOCH_OFFSET_SECS) * 1_000_000_000
        + i64::from(dt.timestamp_subsec_nanos())
}

pub fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

/// Archive bytes that frame `text` the way the messaging app does.
pub fn attributed_body(text: &str) -> Vec<u8> {
    let bytes = text.as_bytes();
    let mut out = vec![0x04, 0x0B];
    out.extend_from_slice(b"streamtyped");
    out.extend_from_slice(&[0x81, 0xE8, 0x03, 0x84, 0x01, 0x40, 0x84, 0x84, 0x84, 0x08]);
    out.extend_from_slice(b"NSString");
    out.extend_from_slice(&[0x01, 0x94, 0x84, 0x01, 0x2B]);
    if bytes.len() < 0x80 {
        out.push(u8::try_from(bytes.len()).unwrap());
    } else {
        out.push(0x81);
        out.extend_from_slice(&u16::try_from(bytes.len()).unwrap().to_le_bytes());
    }
    out.extend_from_slice(bytes);
    out.extend_from_slice(&[0x86, 0x84, 0x02, 0x69, 0x49, 0x01]);
    out
}

/// One message row to insert.
#[derive(Debug, Clone, Default)]
pub struct Row {
    pub guid: String,
    pub text: Option<String>,
    pub body: Option<Vec<u8>>,
    pub handle_id: i64,
    pub date: i64,
    pub is_from_me: bool,
    pub associated_type: i64,
    pub associated_guid: Option<String>,
    pub thread_guid: Option<String>,
}

impl Row {
    pub fn text(guid: &str, text: &str) -> Self {
        Self {
            guid: guid.to_string(),
            text: Some(text.to_string()),
            ..Self::default()
        }
    }

    pub fn body(guid: &str, text: &str) -> Self {
        Self {
            guid: guid.to_string(),
            body: Some(attributed_body(text)),
            ..Self::default()
        }
    }

    /// Reaction row of `code` aimed at `target`.
    pub fn reaction(guid: &str, code: i64, target: &str) -> Self {
        Self {
            guid: guid.to_string(),
            associated_type: code,
            associated_guid: Some(target.to_string()),
            ..Self::default()
        }
    }

    pub fn from(mut self, handle_id: i64) -> Self {
        self.handle_id = handle_id;
        self
    }

    pub fn from_me(mut self) -> Self {
        self.is_from_me = true;
        self
    }

    pub fn at(mut self, dt: DateTime<Utc>) -> Self {
        self.date = store_time(dt);
        self
    }

    /// Whole seconds since 2001-01-01, as very old stores recorded dates.
    pub fn at_legacy_seconds(mut self, dt: DateTime<Utc>) -> Self {
        self.date = dt.timestamp() - APPLE_EPOCH_OFFSET_SECS;
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn replying_to(mut self, associated_guid: &str) -> Self {
        self.associated_guid = Some(associated_guid.to_string());
        self
    }
}

pub struct Fixture {
    pub dir: TempDir,
    pub path: PathBuf,
    conn: Connection,
    legacy: bool,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_schema(MODERN_SCHEMA, false)
    }

    pub fn legacy() -> Self {
        Self::with_schema(LEGACY_SCHEMA, true)
    }

    fn with_schema(schema: &str, legacy: bool) -> Self {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chat.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(schema).unwrap();
        Self {
            dir,
            path,
            conn,
            legacy,
        }
    }

    pub fn handle(&self, id: &str) -> i64 {
        self.conn
            .execute(
                "INSERT INTO handle (id, service) VALUES (?1, 'iMessage')",
                params![id],
            )
            .unwrap();
        self.conn.last_insert_rowid()
    }

    pub fn chat(&self, identifier: &str, name: &str, handles: &[i64]) -> i64 {
        if self.legacy {
            self.conn
                .execute(
                    "INSERT INTO chat (guid, chat_identifier, display_name) VALUES (?1, ?2, ?3)",
                    params![format!("iMessage;-;{identifier}"), identifier, name],
                )
                .unwrap();
        } else {
            self.conn
                .execute(
                    "INSERT INTO chat (guid, chat_identifier, display_name, service_name)
                     VALUES (?1, ?2, ?3, 'iMessage')",
                    params![format!("iMessage;-;{identifier}"), identifier, name],
                )
                .unwrap();
        }
        let chat_id = self.conn.last_insert_rowid();
        for handle in handles {
            self.join_handle(chat_id, *handle);
        }
        chat_id
    }

    pub fn join_handle(&self, chat_id: i64, handle_id: i64) {
        self.conn
            .execute(
                "INSERT INTO chat_handle_join (chat_id, handle_id) VALUES (?1, ?2)",
                params![chat_id, handle_id],
            )
            .unwrap();
    }

    pub fn message(&self, chat_id: i64, row: Row) -> i64 {
        if self.legacy {
            self.conn
                .execute(
                    "INSERT INTO message (guid, text, handle_id, date, is_from_me, service)
                     VALUES (?1, ?2, ?3, ?4, ?5, 'iMessage')",
                    params![row.guid, row.text, row.handle_id, row.date, row.is_from_me],
                )
                .unwrap();
        } else {
            self.conn
                .execute(
                    "INSERT INTO message (guid, text, attributedBody, handle_id, date, is_from_me,
                         service, associated_message_type, associated_message_guid,
                         thread_originator_guid)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'iMessage', ?7, ?8, ?9)",
                    params![
                        row.guid,
                        row.text,
                        row.body,
                        row.handle_id,
                        row.date,
                        row.is_from_me,
                        row.associated_type,
                        row.associated_guid,
                        row.thread_guid,
                    ],
                )
                .unwrap();
        }
        let message_id = self.conn.last_insert_rowid();
        self.conn
            .execute(
                "INSERT INTO chat_message_join (chat_id, message_id) VALUES (?1, ?2)",
                params![chat_id, message_id],
            )
            .unwrap();
        message_id
    }

    pub fn attachment(&self, message_id: i64, filename: &str, transfer_name: &str, bytes: i64) {
        self.conn
            .execute(
                "INSERT INTO attachment (filename, transfer_name, uti, mime_type, total_bytes)
                 VALUES (?1, ?2, 'public.jpeg', 'image/jpeg', ?3)",
                params![filename, transfer_name, bytes],
            )
            .unwrap();
        let attachment_id = self.conn.last_insert_rowid();
        self.conn
            .execute(
                "INSERT INTO message_attachment_join (message_id, attachment_id) VALUES (?1, ?2)",
                params![message_id, attachment_id],
            )
            .unwrap();
    }

    /// Run arbitrary SQL against the fixture.
    pub fn execute(&self, sql: &str) {
        self.conn.execute_batch(sql).unwrap();
    }
}
