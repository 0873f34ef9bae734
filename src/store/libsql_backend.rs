//! libSQL store backend.
//!
//! Single reused connection; `libsql::Connection` is `Send + Sync` and
//! safe for concurrent async use. Supports local file and in-memory
//! databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::StoreError;
use crate::ledger::ActivityRecord;
use crate::pipeline::types::{Classification, Message, ProcessingStatus};
use crate::store::Store;

const MESSAGE_COLUMNS: &str = "id, user_id, external_id, thread_id, subject, sender, sender_name, \
     body, classification, priority_score, summary, status, received_at, processed_at, \
     created_at, updated_at";

const ACTIVITY_COLUMNS: &str =
    "id, user_id, action_type, description, metadata, can_undo, undone, created_at";

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS messages (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        external_id TEXT NOT NULL,
        thread_id TEXT NOT NULL,
        subject TEXT NOT NULL,
        sender TEXT NOT NULL,
        sender_name TEXT,
        body TEXT NOT NULL,
        classification TEXT,
        priority_score INTEGER,
        summary TEXT,
        status TEXT NOT NULL DEFAULT 'unprocessed',
        received_at TEXT NOT NULL,
        processed_at TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE(user_id, external_id)
    );
    CREATE INDEX IF NOT EXISTS idx_messages_status ON messages(status);
    CREATE INDEX IF NOT EXISTS idx_messages_user ON messages(user_id);

    CREATE TABLE IF NOT EXISTS activity (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        action_type TEXT NOT NULL,
        description TEXT NOT NULL,
        metadata TEXT NOT NULL,
        can_undo INTEGER NOT NULL DEFAULT 0,
        undone INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_activity_user ON activity(user_id, created_at);
"#;

/// libSQL-backed [`Store`].
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and apply the schema.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Connection(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| StoreError::Connection(format!("Failed to create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        store.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                StoreError::Connection(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| StoreError::Connection(format!("Failed to create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        self.conn
            .execute_batch(SCHEMA)
            .await
            .map_err(|e| StoreError::Migration(format!("schema init: {e}")))?;
        Ok(())
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Convert `Option<&str>` to a libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

fn opt_i64(n: Option<i32>) -> libsql::Value {
    match n {
        Some(n) => libsql::Value::Integer(n as i64),
        None => libsql::Value::Null,
    }
}

/// Map a libsql row to a Message. Column order matches MESSAGE_COLUMNS.
fn row_to_message(row: &libsql::Row) -> Result<Message, libsql::Error> {
    let id_str: String = row.get(0)?;
    let classification_str: Option<String> = row.get(8).ok();
    let priority: Option<i64> = row.get(9).ok();
    let status_str: String = row.get(11)?;
    let received_str: String = row.get(12)?;
    let processed_str: Option<String> = row.get(13).ok();
    let created_str: String = row.get(14)?;
    let updated_str: String = row.get(15)?;

    Ok(Message {
        id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::nil()),
        user_id: row.get(1)?,
        external_id: row.get(2)?,
        thread_id: row.get(3)?,
        subject: row.get(4)?,
        sender: row.get(5)?,
        sender_name: row.get(6).ok(),
        body: row.get(7)?,
        classification: classification_str.and_then(|s| s.parse::<Classification>().ok()),
        priority_score: priority.map(|p| p as i32),
        summary: row.get(10).ok(),
        status: status_str
            .parse::<ProcessingStatus>()
            .unwrap_or(ProcessingStatus::Unprocessed),
        received_at: parse_datetime(&received_str),
        processed_at: processed_str.map(|s| parse_datetime(&s)),
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

/// Map a libsql row to an ActivityRecord. Column order matches ACTIVITY_COLUMNS.
fn row_to_activity(row: &libsql::Row) -> Result<ActivityRecord, libsql::Error> {
    let id_str: String = row.get(0)?;
    let metadata_str: String = row.get(4)?;
    let can_undo: i64 = row.get(5)?;
    let undone: i64 = row.get(6)?;
    let created_str: String = row.get(7)?;

    Ok(ActivityRecord {
        id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::nil()),
        user_id: row.get(1)?,
        action_type: row.get(2)?,
        description: row.get(3)?,
        metadata: serde_json::from_str(&metadata_str).unwrap_or(serde_json::Value::Null),
        can_undo: can_undo != 0,
        undone: undone != 0,
        created_at: parse_datetime(&created_str),
    })
}

fn is_unique_violation(e: &libsql::Error) -> bool {
    e.to_string().contains("UNIQUE")
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Store for LibSqlStore {
    async fn insert_message(&self, message: &Message) -> Result<(), StoreError> {
        let conn = self.conn();
        conn.execute(
            &format!(
                "INSERT INTO messages ({MESSAGE_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"
            ),
            params![
                message.id.to_string(),
                message.user_id.as_str(),
                message.external_id.as_str(),
                message.thread_id.as_str(),
                message.subject.as_str(),
                message.sender.as_str(),
                opt_text(message.sender_name.as_deref()),
                message.body.as_str(),
                opt_text(message.classification.map(|c| c.to_string()).as_deref()),
                opt_i64(message.priority_score),
                opt_text(message.summary.as_deref()),
                message.status.to_string(),
                message.received_at.to_rfc3339(),
                opt_text(message.processed_at.map(|t| t.to_rfc3339()).as_deref()),
                message.created_at.to_rfc3339(),
                message.updated_at.to_rfc3339(),
            ],
        )
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Constraint(format!(
                    "message {} already exists for user {}",
                    message.external_id, message.user_id
                ))
            } else {
                StoreError::Query(format!("insert_message: {e}"))
            }
        })?;

        debug!(id = %message.id, external_id = %message.external_id, "Message inserted");
        Ok(())
    }

    async fn get_message(&self, id: Uuid) -> Result<Option<Message>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("get_message: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let msg = row_to_message(&row)
                    .map_err(|e| StoreError::Query(format!("row parse: {e}")))?;
                Ok(Some(msg))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::Query(format!("get_message: {e}"))),
        }
    }

    async fn get_message_by_external_id(
        &self,
        user_id: &str,
        external_id: &str,
    ) -> Result<Option<Message>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages
                     WHERE user_id = ?1 AND external_id = ?2"
                ),
                params![user_id, external_id],
            )
            .await
            .map_err(|e| StoreError::Query(format!("get_message_by_external_id: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let msg = row_to_message(&row)
                    .map_err(|e| StoreError::Query(format!("row parse: {e}")))?;
                Ok(Some(msg))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::Query(format!("get_message_by_external_id: {e}"))),
        }
    }

    async fn update_message_status(
        &self,
        id: Uuid,
        status: ProcessingStatus,
    ) -> Result<(), StoreError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE messages SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![
                    status.to_string(),
                    Utc::now().to_rfc3339(),
                    id.to_string()
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("update_message_status: {e}")))?;

        if affected == 0 {
            return Err(StoreError::NotFound {
                entity: "message".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn set_classification(
        &self,
        id: Uuid,
        classification: Classification,
    ) -> Result<(), StoreError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE messages SET classification = ?1, updated_at = ?2 WHERE id = ?3",
                params![
                    classification.to_string(),
                    Utc::now().to_rfc3339(),
                    id.to_string()
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("set_classification: {e}")))?;

        if affected == 0 {
            return Err(StoreError::NotFound {
                entity: "message".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn set_priority_score(&self, id: Uuid, score: i32) -> Result<(), StoreError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE messages SET priority_score = ?1, updated_at = ?2 WHERE id = ?3",
                params![score as i64, Utc::now().to_rfc3339(), id.to_string()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("set_priority_score: {e}")))?;

        if affected == 0 {
            return Err(StoreError::NotFound {
                entity: "message".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn set_summary(&self, id: Uuid, summary: &str) -> Result<(), StoreError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE messages SET summary = ?1, updated_at = ?2 WHERE id = ?3",
                params![summary, Utc::now().to_rfc3339(), id.to_string()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("set_summary: {e}")))?;

        if affected == 0 {
            return Err(StoreError::NotFound {
                entity: "message".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn mark_processed(
        &self,
        id: Uuid,
        processed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE messages SET status = 'processed', processed_at = ?1, updated_at = ?2
                 WHERE id = ?3",
                params![
                    processed_at.to_rfc3339(),
                    Utc::now().to_rfc3339(),
                    id.to_string()
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("mark_processed: {e}")))?;

        if affected == 0 {
            return Err(StoreError::NotFound {
                entity: "message".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn stuck_in_processing(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Message>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages
                     WHERE status = 'processing' AND updated_at < ?1
                     ORDER BY updated_at ASC"
                ),
                params![cutoff.to_rfc3339()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("stuck_in_processing: {e}")))?;

        let mut messages = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            messages.push(
                row_to_message(&row).map_err(|e| StoreError::Query(format!("row parse: {e}")))?,
            );
        }
        Ok(messages)
    }

    async fn list_messages(
        &self,
        user_id: &str,
        status: Option<ProcessingStatus>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Message>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages
                     WHERE user_id = ?1 AND (?2 IS NULL OR status = ?2)
                     ORDER BY received_at DESC
                     LIMIT ?3 OFFSET ?4"
                ),
                params![
                    user_id,
                    opt_text(status.map(|s| s.to_string()).as_deref()),
                    limit as i64,
                    offset as i64
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("list_messages: {e}")))?;

        let mut messages = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            messages.push(
                row_to_message(&row).map_err(|e| StoreError::Query(format!("row parse: {e}")))?,
            );
        }
        Ok(messages)
    }

    async fn insert_activity(&self, record: &ActivityRecord) -> Result<(), StoreError> {
        let metadata = serde_json::to_string(&record.metadata)
            .map_err(|e| StoreError::Serialization(format!("activity metadata: {e}")))?;

        self.conn()
            .execute(
                &format!(
                    "INSERT INTO activity ({ACTIVITY_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
                ),
                params![
                    record.id.to_string(),
                    record.user_id.as_str(),
                    record.action_type.as_str(),
                    record.description.as_str(),
                    metadata,
                    record.can_undo as i64,
                    record.undone as i64,
                    record.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("insert_activity: {e}")))?;

        debug!(id = %record.id, action = %record.action_type, "Activity recorded");
        Ok(())
    }

    async fn get_activity(&self, id: Uuid) -> Result<Option<ActivityRecord>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {ACTIVITY_COLUMNS} FROM activity WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("get_activity: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let record = row_to_activity(&row)
                    .map_err(|e| StoreError::Query(format!("row parse: {e}")))?;
                Ok(Some(record))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::Query(format!("get_activity: {e}"))),
        }
    }

    async fn list_activity(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ActivityRecord>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {ACTIVITY_COLUMNS} FROM activity
                     WHERE user_id = ?1
                     ORDER BY created_at DESC
                     LIMIT ?2 OFFSET ?3"
                ),
                params![user_id, limit as i64, offset as i64],
            )
            .await
            .map_err(|e| StoreError::Query(format!("list_activity: {e}")))?;

        let mut records = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            records.push(
                row_to_activity(&row).map_err(|e| StoreError::Query(format!("row parse: {e}")))?,
            );
        }
        Ok(records)
    }

    async fn claim_undo(&self, id: Uuid) -> Result<bool, StoreError> {
        // Conditional update doubles as a compare-and-swap: only one
        // concurrent caller sees an affected row.
        let affected = self
            .conn()
            .execute(
                "UPDATE activity SET undone = 1 WHERE id = ?1 AND can_undo = 1 AND undone = 0",
                params![id.to_string()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("claim_undo: {e}")))?;

        Ok(affected == 1)
    }

    async fn revert_undo(&self, id: Uuid) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "UPDATE activity SET undone = 0 WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("revert_undo: {e}")))?;
        Ok(())
    }
}
