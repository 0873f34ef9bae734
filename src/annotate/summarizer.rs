//! Summarization stage: produces a short executive summary and next action.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::error::OracleError;
use crate::oracle::{Oracle, OracleRequest, extract_json_object};

use super::prompts::{SUMMARIZER_SYSTEM, build_summarizer_prompt};
use super::truncate_body;

/// Body characters submitted to the oracle. Summaries get more context
/// than the other stages.
pub const SUMMARIZER_BODY_LIMIT: usize = 3000;

const SUMMARIZER_TEMPERATURE: f32 = 0.4;
const SUMMARIZER_MAX_TOKENS: u32 = 250;

/// Outcome of the summarization stage. The summary is never empty: on
/// oracle failure it is templated from the sender and subject.
#[derive(Debug, Clone)]
pub struct SummaryResult {
    pub summary: String,
    /// Suggested next step, or `"none"` when nothing is needed.
    pub next_action: String,
}

pub struct Summarizer {
    oracle: Arc<dyn Oracle>,
    timeout: Duration,
}

impl Summarizer {
    pub fn new(oracle: Arc<dyn Oracle>, timeout: Duration) -> Self {
        Self { oracle, timeout }
    }

    /// Summarize a message. Never errors and never returns an empty
    /// summary.
    pub async fn summarize(&self, sender: &str, subject: &str, body: &str) -> SummaryResult {
        match self.try_summarize(sender, subject, body).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "Summarization failed, using fallback");
                SummaryResult {
                    summary: format!("Message from {} regarding: {}", sender, subject),
                    next_action: "Review message for details".to_string(),
                }
            }
        }
    }

    async fn try_summarize(
        &self,
        sender: &str,
        subject: &str,
        body: &str,
    ) -> Result<SummaryResult, OracleError> {
        let body = truncate_body(body, SUMMARIZER_BODY_LIMIT);
        let request = OracleRequest::new(
            SUMMARIZER_SYSTEM,
            build_summarizer_prompt(sender, subject, &body),
        )
        .with_temperature(SUMMARIZER_TEMPERATURE)
        .with_max_tokens(SUMMARIZER_MAX_TOKENS);

        let response = tokio::time::timeout(self.timeout, self.oracle.complete(request))
            .await
            .map_err(|_| OracleError::Timeout(self.timeout))??;
        super::log_stage_cost("summarize", self.oracle.as_ref(), &response);

        let raw: SummarizerResponse =
            serde_json::from_str(&extract_json_object(&response.content))?;

        let summary = if raw.summary.trim().is_empty() {
            "Message summary unavailable".to_string()
        } else {
            raw.summary
        };

        Ok(SummaryResult {
            summary,
            next_action: raw.next_action,
        })
    }
}

#[derive(Debug, Deserialize)]
struct SummarizerResponse {
    #[serde(default)]
    summary: String,
    #[serde(default = "default_next_action")]
    next_action: String,
}

fn default_next_action() -> String {
    "none".to_string()
}
