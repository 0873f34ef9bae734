//! Shared types for the ingestion and annotation pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PipelineError;

// ── Inbound message ─────────────────────────────────────────────────

/// A raw inbound message as delivered by a mail provider.
///
/// Providers convert their native format into this struct before handing
/// it to the ingestion gate. `external_id` is the provider-assigned id and
/// serves as the dedup key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMessage {
    /// Stable provider-assigned id (dedup key).
    pub external_id: String,
    /// Provider-assigned thread id.
    pub thread_id: String,
    /// Subject line.
    pub subject: String,
    /// Sender address.
    pub sender: String,
    /// Human-readable sender name, if the provider supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    /// Message body text.
    pub body: String,
    /// When the message arrived at the provider.
    pub received_at: DateTime<Utc>,
}

// ── Classification ──────────────────────────────────────────────────

/// AI-assigned classification of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Requires immediate attention (deadlines, time-sensitive matters).
    Urgent,
    /// Needs a response or action from the user.
    ActionRequired,
    /// Informational only.
    Fyi,
    /// Unwanted, promotional, or irrelevant content.
    Spam,
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Urgent => write!(f, "urgent"),
            Self::ActionRequired => write!(f, "action_required"),
            Self::Fyi => write!(f, "fyi"),
            Self::Spam => write!(f, "spam"),
        }
    }
}

impl std::str::FromStr for Classification {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "urgent" => Ok(Self::Urgent),
            "action_required" => Ok(Self::ActionRequired),
            "fyi" => Ok(Self::Fyi),
            "spam" => Ok(Self::Spam),
            _ => Err(format!("Unknown classification: {}", s)),
        }
    }
}

// ── Processing status ───────────────────────────────────────────────

/// Lifecycle state of a message.
///
/// `unprocessed → processing → processed → {archived | replied | pending_approval}`.
/// `archived` and `replied` are terminal; `pending_approval` is re-entered
/// only by an explicit approval/rejection outside the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Unprocessed,
    Processing,
    Processed,
    Archived,
    Replied,
    PendingApproval,
}

impl ProcessingStatus {
    /// Whether this state admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Archived | Self::Replied)
    }

    /// Whether the state machine permits moving to `next`.
    pub fn can_transition_to(&self, next: ProcessingStatus) -> bool {
        use ProcessingStatus::*;
        matches!(
            (self, next),
            (Unprocessed, Processing)
                | (Processing, Processed)
                | (Processed, Archived)
                | (Processed, Replied)
                | (Processed, PendingApproval)
                | (PendingApproval, Archived)
                | (PendingApproval, Replied)
                | (PendingApproval, Processed)
        )
    }

    /// Validate a transition, producing a pipeline error on violation.
    pub fn transition_to(&self, next: ProcessingStatus) -> Result<ProcessingStatus, PipelineError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(PipelineError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unprocessed => write!(f, "unprocessed"),
            Self::Processing => write!(f, "processing"),
            Self::Processed => write!(f, "processed"),
            Self::Archived => write!(f, "archived"),
            Self::Replied => write!(f, "replied"),
            Self::PendingApproval => write!(f, "pending_approval"),
        }
    }
}

impl std::str::FromStr for ProcessingStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unprocessed" => Ok(Self::Unprocessed),
            "processing" => Ok(Self::Processing),
            "processed" => Ok(Self::Processed),
            "archived" => Ok(Self::Archived),
            "replied" => Ok(Self::Replied),
            "pending_approval" => Ok(Self::PendingApproval),
            _ => Err(format!("Unknown processing status: {}", s)),
        }
    }
}

// ── Canonical message record ────────────────────────────────────────

/// A persisted inbound message with its AI annotation.
///
/// Immutable once ingested except for the annotation fields (each set at
/// most once by its pipeline stage) and the status. Absence of an
/// annotation field means "not yet annotated" — distinct from a low score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub user_id: String,
    pub external_id: String,
    pub thread_id: String,
    pub subject: String,
    pub sender: String,
    pub sender_name: Option<String>,
    pub body: String,
    /// Set by the classifier stage.
    pub classification: Option<Classification>,
    /// Set by the priority scorer stage; always in [1,100] once set.
    pub priority_score: Option<i32>,
    /// Set by the summarizer stage.
    pub summary: Option<String>,
    pub status: ProcessingStatus,
    pub received_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    /// Create a fresh `unprocessed` message from a raw provider message.
    pub fn from_raw(user_id: impl Into<String>, raw: RawMessage) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            external_id: raw.external_id,
            thread_id: raw.thread_id,
            subject: raw.subject,
            sender: raw.sender,
            sender_name: raw.sender_name,
            body: raw.body,
            classification: None,
            priority_score: None,
            summary: None,
            status: ProcessingStatus::Unprocessed,
            received_at: raw.received_at,
            processed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether all three annotation stages have populated their field.
    pub fn fully_annotated(&self) -> bool {
        self.classification.is_some() && self.priority_score.is_some() && self.summary.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_raw(external_id: &str) -> RawMessage {
        RawMessage {
            external_id: external_id.into(),
            thread_id: "thread-1".into(),
            subject: "Quick question".into(),
            sender: "alice@example.com".into(),
            sender_name: Some("Alice".into()),
            body: "Can we chat?".into(),
            received_at: Utc::now(),
        }
    }

    #[test]
    fn from_raw_starts_unprocessed_and_unannotated() {
        let msg = Message::from_raw("user-1", make_raw("ext-1"));
        assert_eq!(msg.status, ProcessingStatus::Unprocessed);
        assert!(msg.classification.is_none());
        assert!(msg.priority_score.is_none());
        assert!(msg.summary.is_none());
        assert!(msg.processed_at.is_none());
        assert!(!msg.fully_annotated());
    }

    #[test]
    fn classification_roundtrip() {
        for c in [
            Classification::Urgent,
            Classification::ActionRequired,
            Classification::Fyi,
            Classification::Spam,
        ] {
            let parsed: Classification = c.to_string().parse().unwrap();
            assert_eq!(parsed, c);
        }
    }

    #[test]
    fn classification_rejects_unknown() {
        assert!("escalate".parse::<Classification>().is_err());
    }

    #[test]
    fn status_happy_path_transitions() {
        use ProcessingStatus::*;
        assert!(Unprocessed.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Processed));
        assert!(Processed.can_transition_to(Archived));
        assert!(Processed.can_transition_to(Replied));
        assert!(Processed.can_transition_to(PendingApproval));
    }

    #[test]
    fn terminal_states_admit_nothing() {
        use ProcessingStatus::*;
        for terminal in [Archived, Replied] {
            assert!(terminal.is_terminal());
            for next in [Unprocessed, Processing, Processed, Archived, Replied, PendingApproval] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn pending_approval_is_re_enterable() {
        use ProcessingStatus::*;
        assert!(PendingApproval.can_transition_to(Replied));
        assert!(PendingApproval.can_transition_to(Archived));
        assert!(!PendingApproval.is_terminal());
    }

    #[test]
    fn invalid_transition_is_an_error() {
        use ProcessingStatus::*;
        let err = Unprocessed.transition_to(Processed).unwrap_err();
        assert!(err.to_string().contains("unprocessed"));
        assert!(err.to_string().contains("processed"));
    }

    #[test]
    fn status_string_roundtrip() {
        use ProcessingStatus::*;
        for s in [Unprocessed, Processing, Processed, Archived, Replied, PendingApproval] {
            let parsed: ProcessingStatus = s.to_string().parse().unwrap();
            assert_eq!(parsed, s);
        }
    }
}
