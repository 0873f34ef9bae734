//! Ingestion gate: dedup, annotation, decision, ledger.
//!
//! One message flows `unprocessed → processing → processed`; the three
//! annotation stages persist their output independently, so a crash
//! mid-flight loses only the stages that had not finished. The recovery
//! sweep re-runs exactly the missing stages.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use crate::annotate::AnnotationPipeline;
use crate::decision::{Decision, PolicySource, decide};
use crate::error::{Result, StoreError};
use crate::ledger::ActivityLedger;
use crate::pipeline::types::{Message, ProcessingStatus, RawMessage};
use crate::store::Store;

/// Outcome of offering one raw message to the gate.
#[derive(Debug)]
pub enum IngestOutcome {
    /// The message was new: ingested, annotated, and decided.
    Created(Box<ProcessedIngest>),
    /// The provider id was already known for this user; nothing was
    /// stored and no oracle call was made.
    Duplicate { external_id: String },
}

/// A fully processed message with its routing decision.
#[derive(Debug)]
pub struct ProcessedIngest {
    pub message: Message,
    pub decision: Decision,
    /// Set when the decision was reached but the ledger write failed.
    /// The decision itself is still valid.
    pub ledger_fault: Option<String>,
}

/// The pipeline front door.
pub struct IngestionGate {
    store: Arc<dyn Store>,
    annotator: AnnotationPipeline,
    policies: Arc<dyn PolicySource>,
    ledger: Arc<ActivityLedger>,
}

impl IngestionGate {
    pub fn new(
        store: Arc<dyn Store>,
        annotator: AnnotationPipeline,
        policies: Arc<dyn PolicySource>,
        ledger: Arc<ActivityLedger>,
    ) -> Self {
        Self {
            store,
            annotator,
            policies,
            ledger,
        }
    }

    /// Ingest one raw message for a user.
    ///
    /// Idempotent on `(user_id, external_id)`: a repeat offer returns
    /// [`IngestOutcome::Duplicate`] without consulting the oracle. The
    /// unique constraint backstops the pre-check, so two racing offers
    /// of the same message also collapse to one `Created`.
    pub async fn ingest(&self, user_id: &str, raw: RawMessage) -> Result<IngestOutcome> {
        if self
            .store
            .get_message_by_external_id(user_id, &raw.external_id)
            .await?
            .is_some()
        {
            return Ok(IngestOutcome::Duplicate {
                external_id: raw.external_id,
            });
        }

        let message = Message::from_raw(user_id, raw);
        match self.store.insert_message(&message).await {
            Ok(()) => {}
            Err(StoreError::Constraint(_)) => {
                // Lost the race to a concurrent offer of the same message.
                return Ok(IngestOutcome::Duplicate {
                    external_id: message.external_id,
                });
            }
            Err(e) => return Err(e.into()),
        }

        let mut message = message;
        message.status = message.status.transition_to(ProcessingStatus::Processing)?;
        self.store
            .update_message_status(message.id, message.status)
            .await?;

        let processed = self.complete(message).await?;
        Ok(IngestOutcome::Created(Box::new(processed)))
    }

    /// Ingest a batch, skipping failures so one bad message never blocks
    /// the rest.
    pub async fn ingest_batch(
        &self,
        user_id: &str,
        raws: Vec<RawMessage>,
    ) -> Vec<IngestOutcome> {
        let mut outcomes = Vec::with_capacity(raws.len());
        for raw in raws {
            let external_id = raw.external_id.clone();
            match self.ingest(user_id, raw).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    warn!(external_id = %external_id, error = %e, "Failed to ingest message");
                }
            }
        }
        outcomes
    }

    /// Re-drive messages stuck in `processing` longer than `grace`.
    ///
    /// Runs only the annotation stages whose fields are still empty.
    /// Returns how many messages were brought to completion.
    pub async fn recover_stuck(&self, grace: Duration) -> Result<usize> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(grace).unwrap_or_else(|_| chrono::Duration::zero());
        let stuck = self.store.stuck_in_processing(cutoff).await?;
        if stuck.is_empty() {
            return Ok(0);
        }

        info!(count = stuck.len(), "Recovering stuck messages");
        let mut recovered = 0;
        for message in stuck {
            let id = message.id;
            match self.complete(message).await {
                Ok(_) => recovered += 1,
                Err(e) => {
                    warn!(id = %id, error = %e, "Recovery failed for message");
                }
            }
        }
        Ok(recovered)
    }

    /// Run the missing annotation stages, persist, decide, and record.
    async fn complete(&self, mut message: Message) -> Result<ProcessedIngest> {
        let (sender, subject, body) = (
            message.sender.clone(),
            message.subject.clone(),
            message.body.clone(),
        );

        // Stages run concurrently; already-annotated fields are skipped.
        let (classification, priority, summary) = tokio::join!(
            async {
                if message.classification.is_none() {
                    Some(self.annotator.classify(&sender, &subject, &body).await)
                } else {
                    None
                }
            },
            async {
                if message.priority_score.is_none() {
                    Some(self.annotator.score(&sender, &subject, &body).await)
                } else {
                    None
                }
            },
            async {
                if message.summary.is_none() {
                    Some(self.annotator.summarize(&sender, &subject, &body).await)
                } else {
                    None
                }
            },
        );

        if let Some(result) = classification {
            self.store
                .set_classification(message.id, result.classification)
                .await?;
            message.classification = Some(result.classification);
        }
        if let Some(result) = priority {
            self.store.set_priority_score(message.id, result.score).await?;
            message.priority_score = Some(result.score);
        }
        if let Some(result) = summary {
            self.store.set_summary(message.id, &result.summary).await?;
            message.summary = Some(result.summary);
        }

        let now = Utc::now();
        self.store.mark_processed(message.id, now).await?;
        message.status = ProcessingStatus::Processed;
        message.processed_at = Some(now);

        let policy = self.policies.policy_for(&message.user_id);
        let decision = decide(&message, policy);
        info!(
            id = %message.id,
            classification = ?message.classification,
            priority = ?message.priority_score,
            action = %decision.action,
            "Message processed"
        );

        // The decision stands even if the ledger write fails; the fault
        // is surfaced to the caller instead of dropped.
        let ledger_fault = match self
            .ledger
            .record(
                &message.user_id,
                "message_processed",
                &format!("Processed message from {}: {}", message.sender, message.subject),
                json!({
                    "message_id": message.id,
                    "external_id": message.external_id,
                    "classification": message.classification,
                    "priority_score": message.priority_score,
                    "decision": {
                        "action": decision.action,
                        "reason": decision.reason.clone(),
                        "confidence": decision.confidence,
                    },
                }),
                false,
            )
            .await
        {
            Ok(_) => None,
            Err(e) => {
                warn!(id = %message.id, error = %e, "Ledger write failed after decision");
                Some(e.to_string())
            }
        };

        Ok(ProcessedIngest {
            message,
            decision,
            ledger_fault,
        })
    }
}
