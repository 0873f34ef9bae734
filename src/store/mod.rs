//! Persistence layer.
//!
//! The `Store` trait is the only seam the pipeline and ledger see;
//! `LibSqlStore` is the shipped backend.

mod libsql_backend;

pub use libsql_backend::LibSqlStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreError;
use crate::ledger::ActivityRecord;
use crate::pipeline::types::{Classification, Message, ProcessingStatus};

/// Async storage operations.
///
/// Message annotation fields have dedicated setters so recovery can
/// persist each stage's output independently; a crash between stages
/// loses at most the stages that had not finished.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a new message. Fails with [`StoreError::Constraint`] when
    /// `(user_id, external_id)` already exists.
    async fn insert_message(&self, message: &Message) -> Result<(), StoreError>;

    async fn get_message(&self, id: Uuid) -> Result<Option<Message>, StoreError>;

    /// Dedup lookup by provider id, scoped to one user.
    async fn get_message_by_external_id(
        &self,
        user_id: &str,
        external_id: &str,
    ) -> Result<Option<Message>, StoreError>;

    async fn update_message_status(
        &self,
        id: Uuid,
        status: ProcessingStatus,
    ) -> Result<(), StoreError>;

    async fn set_classification(
        &self,
        id: Uuid,
        classification: Classification,
    ) -> Result<(), StoreError>;

    async fn set_priority_score(&self, id: Uuid, score: i32) -> Result<(), StoreError>;

    async fn set_summary(&self, id: Uuid, summary: &str) -> Result<(), StoreError>;

    /// Stamp the message `processed` with the given completion time.
    async fn mark_processed(
        &self,
        id: Uuid,
        processed_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Messages still `processing` whose last update predates `cutoff`.
    /// Used by the recovery sweep after a crash.
    async fn stuck_in_processing(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Message>, StoreError>;

    /// A user's messages, newest received first, optionally filtered
    /// by status.
    async fn list_messages(
        &self,
        user_id: &str,
        status: Option<ProcessingStatus>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Message>, StoreError>;

    async fn insert_activity(&self, record: &ActivityRecord) -> Result<(), StoreError>;

    async fn get_activity(&self, id: Uuid) -> Result<Option<ActivityRecord>, StoreError>;

    /// A user's activity, newest first.
    async fn list_activity(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ActivityRecord>, StoreError>;

    /// Atomically claim an activity record for undo.
    ///
    /// Returns true for exactly one caller: the update only applies
    /// while the record is undoable and not yet undone.
    async fn claim_undo(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Release a claimed undo after a failed dispatch so it can be
    /// retried.
    async fn revert_undo(&self, id: Uuid) -> Result<(), StoreError>;
}
