//! Decision audit log using SQLite.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use super::sqlite::{from_unix, to_unix};
use crate::error::{ParleyError, ParleyResult};
use crate::traits::DecisionAuditLog;
use crate::types::{DecisionRecord, TriggerLevel};

/// SQLite-backed `decision_logs` table.
pub struct SqliteAuditLog {
    conn: Mutex<Connection>,
}

impl SqliteAuditLog {
    /// Open (or create) an audit log at the given path.
    ///
    /// May share a database file with [`super::SqliteTopicStore`].
    pub fn new(path: impl AsRef<Path>) -> ParleyResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let log = Self {
            conn: Mutex::new(Connection::open(path)?),
        };
        log.init_schema()?;
        Ok(log)
    }

    /// Create an in-memory audit log (for testing)
    pub fn in_memory() -> ParleyResult<Self> {
        let log = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        log.init_schema()?;
        Ok(log)
    }

    fn conn(&self) -> ParleyResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ParleyError::database("audit log connection poisoned"))
    }

    fn init_schema(&self) -> ParleyResult<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS decision_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                group_id TEXT NOT NULL,
                timestamp REAL NOT NULL,
                model TEXT NOT NULL,
                should_intervene INTEGER NOT NULL,
                trigger_level TEXT NOT NULL,
                reason TEXT,
                has_significant_info INTEGER NOT NULL DEFAULT 0,
                context_summary TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_decision_logs_ts ON decision_logs(timestamp);
        "#,
        )?;
        Ok(())
    }

    /// Most recent records, newest first.
    pub fn recent(&self, limit: usize) -> ParleyResult<Vec<DecisionRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT group_id, timestamp, model, should_intervene, trigger_level,
                      reason, has_significant_info, context_summary
               FROM decision_logs ORDER BY timestamp DESC, id DESC LIMIT ?1"#,
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            let level: String = row.get(4)?;
            Ok(DecisionRecord {
                conversation_id: row.get(0)?,
                timestamp: from_unix(row.get(1)?),
                model: row.get(2)?,
                should_intervene: row.get(3)?,
                trigger_level: TriggerLevel::from_str(&level).unwrap_or_default(),
                reason: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
                has_significant_info: row.get(6)?,
                context_summary: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(ParleyError::from)
    }

    /// Share of decisions since `since` that chose to intervene.
    ///
    /// Returns `None` when no decisions were recorded in the window.
    pub fn intervention_rate_since(&self, since: DateTime<Utc>) -> ParleyResult<Option<f64>> {
        let conn = self.conn()?;
        let (total, intervened): (i64, Option<i64>) = conn.query_row(
            r#"SELECT COUNT(*), SUM(should_intervene)
               FROM decision_logs WHERE timestamp >= ?1"#,
            params![to_unix(since)],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        if total == 0 {
            return Ok(None);
        }
        Ok(Some(intervened.unwrap_or(0) as f64 / total as f64))
    }
}

impl DecisionAuditLog for SqliteAuditLog {
    fn record(&self, record: &DecisionRecord) -> ParleyResult<()> {
        let conn = self.conn()?;
        let level: &'static str = record.trigger_level.into();
        conn.execute(
            r#"INSERT INTO decision_logs
               (group_id, timestamp, model, should_intervene, trigger_level,
                reason, has_significant_info, context_summary)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
            params![
                record.conversation_id,
                to_unix(record.timestamp),
                record.model,
                record.should_intervene,
                level,
                record.reason,
                record.has_significant_info,
                record.context_summary,
            ],
        )?;
        Ok(())
    }
}
