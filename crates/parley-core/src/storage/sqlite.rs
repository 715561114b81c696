//! SQLite-backed topic store.
//!
//! Schema mirrors the tables the dashboard reads: `topics` keyed by an
//! autoincrement id and `messages` referencing them. Timestamps are stored
//! as REAL unix seconds.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::error::{ParleyError, ParleyResult};
use crate::traits::TopicStore;
use crate::types::{ChatMessage, TopicId};

/// A topic row as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredTopic {
    pub id: TopicId,
    pub conversation_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub summary: Option<String>,
}

/// SQLite topic store.
pub struct SqliteTopicStore {
    conn: Mutex<Connection>,
}

impl SqliteTopicStore {
    /// Open (or create) a store at the given path.
    pub fn new(path: impl AsRef<Path>) -> ParleyResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> ParleyResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> ParleyResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ParleyError::database("topic store connection poisoned"))
    }

    fn init_schema(&self) -> ParleyResult<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS topics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                group_id TEXT NOT NULL,
                start_time REAL NOT NULL,
                end_time REAL,
                summary TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_topics_group ON topics(group_id);
            CREATE INDEX IF NOT EXISTS idx_topics_start ON topics(start_time);

            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                topic_id INTEGER NOT NULL,
                user_id TEXT NOT NULL,
                nickname TEXT,
                content TEXT NOT NULL,
                timestamp REAL NOT NULL,
                FOREIGN KEY (topic_id) REFERENCES topics(id)
            );

            CREATE INDEX IF NOT EXISTS idx_messages_topic ON messages(topic_id);
        "#,
        )?;
        Ok(())
    }

    /// Get a topic by id.
    pub fn topic(&self, id: TopicId) -> ParleyResult<Option<StoredTopic>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, group_id, start_time, end_time, summary FROM topics WHERE id = ?1",
        )?;
        stmt.query_row(params![id.0], row_to_topic)
            .optional()
            .map_err(ParleyError::from)
    }

    /// All topics of a conversation, oldest first.
    pub fn topics_for(&self, conversation_id: &str) -> ParleyResult<Vec<StoredTopic>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT id, group_id, start_time, end_time, summary
               FROM topics WHERE group_id = ?1 ORDER BY id ASC"#,
        )?;
        let rows = stmt.query_map(params![conversation_id], row_to_topic)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(ParleyError::from)
    }

    /// Messages of a topic in arrival order, at most `limit`.
    pub fn topic_messages(&self, id: TopicId, limit: usize) -> ParleyResult<Vec<ChatMessage>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT user_id, nickname, content, timestamp
               FROM messages WHERE topic_id = ?1
               ORDER BY timestamp ASC, id ASC LIMIT ?2"#,
        )?;
        let rows = stmt.query_map(params![id.0, limit as i64], |row| {
            let sender: String = row.get(0)?;
            let nickname: Option<String> = row.get(1)?;
            let text: String = row.get(2)?;
            let ts: f64 = row.get(3)?;
            Ok(ChatMessage::new(sender, text, from_unix(ts)).with_display_name(nickname))
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(ParleyError::from)
    }
}

impl TopicStore for SqliteTopicStore {
    fn create_topic(
        &self,
        conversation_id: &str,
        start_time: DateTime<Utc>,
    ) -> ParleyResult<TopicId> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO topics (group_id, start_time) VALUES (?1, ?2)",
            params![conversation_id, to_unix(start_time)],
        )?;
        Ok(TopicId(conn.last_insert_rowid()))
    }

    fn append_message(
        &self,
        topic_id: TopicId,
        sender_id: &str,
        text: &str,
        time: DateTime<Utc>,
        display_name: Option<&str>,
    ) -> ParleyResult<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"INSERT INTO messages (topic_id, user_id, nickname, content, timestamp)
               VALUES (?1, ?2, ?3, ?4, ?5)"#,
            params![topic_id.0, sender_id, display_name, text, to_unix(time)],
        )?;
        Ok(())
    }

    fn set_summary(&self, topic_id: TopicId, summary: &str) -> ParleyResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE topics SET summary = ?1 WHERE id = ?2",
            params![summary, topic_id.0],
        )?;
        Ok(())
    }

    fn close_topic(&self, topic_id: TopicId, end_time: DateTime<Utc>) -> ParleyResult<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE topics SET end_time = ?1 WHERE id = ?2",
            params![to_unix(end_time), topic_id.0],
        )?;
        if updated == 0 {
            return Err(ParleyError::topic_not_found(topic_id));
        }
        Ok(())
    }
}

fn row_to_topic(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredTopic> {
    let id: i64 = row.get(0)?;
    let conversation_id: String = row.get(1)?;
    let start: f64 = row.get(2)?;
    let end: Option<f64> = row.get(3)?;
    let summary: Option<String> = row.get(4)?;
    Ok(StoredTopic {
        id: TopicId(id),
        conversation_id,
        start_time: from_unix(start),
        end_time: end.map(from_unix),
        summary,
    })
}

pub(crate) fn to_unix(time: DateTime<Utc>) -> f64 {
    time.timestamp_millis() as f64 / 1000.0
}

pub(crate) fn from_unix(secs: f64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis((secs * 1000.0).round() as i64).unwrap_or_default()
}
