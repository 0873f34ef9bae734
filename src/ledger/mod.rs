//! Append-only activity ledger with reversible actions.
//!
//! Every consequential action the pipeline takes is recorded here.
//! Records are never deleted; undoing an action flips its `undone` flag
//! and dispatches a compensating provider call. The claim is taken
//! before dispatch so concurrent undo attempts resolve to exactly one
//! winner, and released again if the provider call fails.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::LedgerError;
use crate::providers::{CalendarProvider, MailProvider};
use crate::store::Store;

/// Upper bound on one page of activity history.
pub const MAX_PAGE_SIZE: usize = 100;

/// One ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub id: Uuid,
    pub user_id: String,
    /// Machine-readable kind, e.g. `email_archived`, `email_replied`,
    /// `meeting_scheduled`, `message_processed`.
    pub action_type: String,
    /// Human-readable description shown in the activity feed.
    pub description: String,
    /// Action-specific context; undo dispatch reads its keys.
    pub metadata: Value,
    pub can_undo: bool,
    pub undone: bool,
    pub created_at: DateTime<Utc>,
}

/// The compensating provider call for an undoable record.
///
/// Closed set on purpose: a record whose action type has no entry here
/// is reported as not undoable rather than guessed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoAction {
    /// Reverse an archive by putting the message back in the inbox.
    RestoreToInbox { external_id: String },
    /// Reverse a scheduled meeting by deleting the event.
    DeleteCalendarEvent { event_id: String },
}

impl UndoAction {
    /// Map a record to its compensating call, if one exists.
    ///
    /// Sent replies have no mapping: a sent message cannot be unsent.
    pub fn from_record(record: &ActivityRecord) -> Option<UndoAction> {
        match record.action_type.as_str() {
            "email_archived" => record
                .metadata
                .get("external_id")
                .and_then(Value::as_str)
                .map(|id| UndoAction::RestoreToInbox {
                    external_id: id.to_string(),
                }),
            "meeting_scheduled" => record
                .metadata
                .get("event_id")
                .and_then(Value::as_str)
                .map(|id| UndoAction::DeleteCalendarEvent {
                    event_id: id.to_string(),
                }),
            _ => None,
        }
    }
}

/// Result of an undo attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoOutcome {
    Undone,
    NotFound,
    /// Record exists but has no compensating action.
    NotUndoable,
    /// Another caller claimed the undo first, or it was already undone.
    AlreadyUndone,
    /// The claim was taken but the provider call failed; the claim has
    /// been released so the undo can be retried.
    ProviderFailed(String),
}

impl UndoOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, UndoOutcome::Undone)
    }
}

/// Append-only ledger over a [`Store`].
pub struct ActivityLedger {
    store: Arc<dyn Store>,
}

impl ActivityLedger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Append a record.
    pub async fn record(
        &self,
        user_id: &str,
        action_type: &str,
        description: &str,
        metadata: Value,
        can_undo: bool,
    ) -> Result<ActivityRecord, LedgerError> {
        let record = ActivityRecord {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            action_type: action_type.to_string(),
            description: description.to_string(),
            metadata,
            can_undo,
            undone: false,
            created_at: Utc::now(),
        };
        self.store.insert_activity(&record).await?;
        info!(id = %record.id, action = action_type, "Activity recorded");
        Ok(record)
    }

    /// A user's activity feed, newest first. `limit` is clamped to
    /// [`MAX_PAGE_SIZE`].
    pub async fn list_recent(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ActivityRecord>, LedgerError> {
        let limit = limit.min(MAX_PAGE_SIZE);
        Ok(self.store.list_activity(user_id, limit, offset).await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<ActivityRecord>, LedgerError> {
        Ok(self.store.get_activity(id).await?)
    }

    /// Attempt to undo a recorded action.
    ///
    /// The undone flag is claimed atomically before the provider is
    /// called, so two concurrent attempts on the same record produce one
    /// `Undone` and one `AlreadyUndone`. A failed provider call releases
    /// the claim.
    pub async fn undo(
        &self,
        record_id: Uuid,
        mail: &dyn MailProvider,
        calendar: &dyn CalendarProvider,
    ) -> Result<UndoOutcome, LedgerError> {
        let Some(record) = self.store.get_activity(record_id).await? else {
            return Ok(UndoOutcome::NotFound);
        };

        if !record.can_undo {
            return Ok(UndoOutcome::NotUndoable);
        }
        if record.undone {
            return Ok(UndoOutcome::AlreadyUndone);
        }
        let Some(action) = UndoAction::from_record(&record) else {
            warn!(id = %record_id, action = %record.action_type, "No undo mapping for record");
            return Ok(UndoOutcome::NotUndoable);
        };

        if !self.store.claim_undo(record_id).await? {
            return Ok(UndoOutcome::AlreadyUndone);
        }

        let dispatch = match &action {
            UndoAction::RestoreToInbox { external_id } => mail.restore_to_inbox(external_id).await,
            UndoAction::DeleteCalendarEvent { event_id } => calendar.delete_event(event_id).await,
        };

        match dispatch {
            Ok(()) => {
                info!(id = %record_id, ?action, "Action undone");
                Ok(UndoOutcome::Undone)
            }
            Err(e) => {
                // Release the claim so the undo stays retryable.
                self.store.revert_undo(record_id).await?;
                warn!(id = %record_id, error = %e, "Undo dispatch failed, claim released");
                Ok(UndoOutcome::ProviderFailed(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Provider doubles for ledger and pipeline tests.

    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use crate::error::ProviderError;
    use crate::pipeline::types::RawMessage;
    use crate::providers::{CalendarEvent, CalendarProvider, MailProvider};

    #[derive(Default)]
    pub struct MockMail {
        pub fail: bool,
        pub restored: Mutex<Vec<String>>,
    }

    impl MockMail {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl MailProvider for MockMail {
        async fn fetch_unread(&self, _limit: usize) -> Result<Vec<RawMessage>, ProviderError> {
            Ok(Vec::new())
        }

        async fn send_reply(
            &self,
            _to: &str,
            _subject: &str,
            _body: &str,
            _thread_id: Option<&str>,
        ) -> Result<(), ProviderError> {
            Ok(())
        }

        async fn archive(&self, _external_id: &str) -> Result<(), ProviderError> {
            Ok(())
        }

        async fn restore_to_inbox(&self, external_id: &str) -> Result<(), ProviderError> {
            if self.fail {
                return Err(ProviderError::Mail {
                    operation: "restore_to_inbox".into(),
                    reason: "scripted failure".into(),
                });
            }
            self.restored.lock().unwrap().push(external_id.to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct MockCalendar {
        pub fail: bool,
        pub deleted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CalendarProvider for MockCalendar {
        async fn list_upcoming(&self, _days: u32) -> Result<Vec<CalendarEvent>, ProviderError> {
            Ok(Vec::new())
        }

        async fn create_event(
            &self,
            title: &str,
            description: &str,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
            attendees: &[String],
        ) -> Result<CalendarEvent, ProviderError> {
            Ok(CalendarEvent {
                event_id: "evt-1".into(),
                title: title.into(),
                description: description.into(),
                start,
                end,
                attendees: attendees.to_vec(),
            })
        }

        async fn delete_event(&self, event_id: &str) -> Result<(), ProviderError> {
            if self.fail {
                return Err(ProviderError::Calendar {
                    operation: "delete_event".into(),
                    reason: "scripted failure".into(),
                });
            }
            self.deleted.lock().unwrap().push(event_id.to_string());
            Ok(())
        }
    }
}
