//! Mail and calendar provider boundaries.
//!
//! The pipeline only ever talks to these traits; wire protocols and
//! provider auth live behind them. Undo dispatch in the activity ledger
//! requires `restore_to_inbox` and `delete_event`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::error::ProviderError;
use crate::pipeline::types::RawMessage;

/// A scheduled calendar event as the provider reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// Provider-assigned event id, used for later deletion.
    pub event_id: String,
    pub title: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub attendees: Vec<String>,
}

/// Mailbox operations the pipeline depends on.
#[async_trait]
pub trait MailProvider: Send + Sync {
    /// Fetch unread messages, newest first, up to `limit`.
    async fn fetch_unread(&self, limit: usize) -> Result<Vec<RawMessage>, ProviderError>;

    /// Send a reply on an existing thread.
    async fn send_reply(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        thread_id: Option<&str>,
    ) -> Result<(), ProviderError>;

    /// Move a message out of the inbox.
    async fn archive(&self, external_id: &str) -> Result<(), ProviderError>;

    /// Reverse an archive. Must be idempotent: restoring an already
    /// restored message succeeds.
    async fn restore_to_inbox(&self, external_id: &str) -> Result<(), ProviderError>;
}

/// Calendar operations the pipeline depends on.
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Upcoming events within the next `days` days.
    async fn list_upcoming(&self, days: u32) -> Result<Vec<CalendarEvent>, ProviderError>;

    /// Create an event, returning it with its provider-assigned id.
    async fn create_event(
        &self,
        title: &str,
        description: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        attendees: &[String],
    ) -> Result<CalendarEvent, ProviderError>;

    /// Delete an event. Must be idempotent: deleting a missing event
    /// succeeds.
    async fn delete_event(&self, event_id: &str) -> Result<(), ProviderError>;
}

static ADDR_RE: OnceLock<Regex> = OnceLock::new();
static NAME_RE: OnceLock<Regex> = OnceLock::new();

/// Split an RFC 5322 From header into (address, display name).
///
/// `"Alice Smith" <alice@example.com>` yields the address and
/// `Some("Alice Smith")`. A bare address yields `None` for the name.
/// When no address can be found, the whole field is returned as-is so
/// nothing is silently dropped.
pub fn parse_from_field(from: &str) -> (String, Option<String>) {
    let addr_re = ADDR_RE.get_or_init(|| Regex::new(r"[\w.\-+]+@[\w.\-]+").unwrap());
    let name_re = NAME_RE.get_or_init(|| Regex::new(r"^([^<]+)<").unwrap());

    let address = addr_re
        .find(from)
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| from.to_string());

    let name = name_re
        .captures(from)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().trim_matches('"').to_string())
        .filter(|name| !name.is_empty());

    (address, name)
}
