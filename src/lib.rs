//! Inbox Pilot — an AI-annotated message triage pipeline.
//!
//! Raw messages from a mail provider flow through a dedup gate, three
//! AI annotation stages (classification, priority scoring, summary), a
//! deterministic decision engine, and into an append-only activity
//! ledger whose consequential actions can be undone.

pub mod annotate;
pub mod config;
pub mod decision;
pub mod error;
pub mod ledger;
pub mod oracle;
pub mod pipeline;
pub mod providers;
pub mod store;

pub use config::AppConfig;
pub use decision::{Action, AutomationPolicy, Decision, decide};
pub use error::{Error, Result};
pub use ledger::{ActivityLedger, ActivityRecord, UndoOutcome};
pub use pipeline::{IngestOutcome, IngestionGate, Message, RawMessage};
pub use store::{LibSqlStore, Store};
