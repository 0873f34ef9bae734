//! Classification stage: tags a message as urgent / action_required / fyi / spam.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::error::OracleError;
use crate::oracle::{Oracle, OracleRequest, extract_json_object};
use crate::pipeline::types::Classification;

use super::prompts::{CLASSIFIER_SYSTEM, build_classifier_prompt};
use super::truncate_body;

/// Body characters submitted to the oracle; the rest is dropped.
pub const CLASSIFIER_BODY_LIMIT: usize = 2000;

const CLASSIFIER_TEMPERATURE: f32 = 0.3;
const CLASSIFIER_MAX_TOKENS: u32 = 150;

/// Outcome of the classification stage. Always produced, even when the
/// oracle fails — the fallback tags the message `fyi`.
#[derive(Debug, Clone)]
pub struct ClassificationResult {
    pub classification: Classification,
    pub reasoning: String,
}

pub struct Classifier {
    oracle: Arc<dyn Oracle>,
    timeout: Duration,
}

impl Classifier {
    pub fn new(oracle: Arc<dyn Oracle>, timeout: Duration) -> Self {
        Self { oracle, timeout }
    }

    /// Classify a message. Never errors: oracle failures degrade to the
    /// `fyi` fallback so the pipeline keeps moving.
    pub async fn classify(&self, sender: &str, subject: &str, body: &str) -> ClassificationResult {
        match self.try_classify(sender, subject, body).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "Classification failed, using fallback");
                ClassificationResult {
                    classification: Classification::Fyi,
                    reasoning: "Error during classification".to_string(),
                }
            }
        }
    }

    async fn try_classify(
        &self,
        sender: &str,
        subject: &str,
        body: &str,
    ) -> Result<ClassificationResult, OracleError> {
        let body = truncate_body(body, CLASSIFIER_BODY_LIMIT);
        let request = OracleRequest::new(
            CLASSIFIER_SYSTEM,
            build_classifier_prompt(sender, subject, &body),
        )
        .with_temperature(CLASSIFIER_TEMPERATURE)
        .with_max_tokens(CLASSIFIER_MAX_TOKENS);

        let response = tokio::time::timeout(self.timeout, self.oracle.complete(request))
            .await
            .map_err(|_| OracleError::Timeout(self.timeout))??;
        super::log_stage_cost("classify", self.oracle.as_ref(), &response);

        let raw: ClassifierResponse =
            serde_json::from_str(&extract_json_object(&response.content))?;

        // Unknown tags collapse to fyi rather than failing the stage.
        let classification = raw.classification.parse().unwrap_or(Classification::Fyi);

        Ok(ClassificationResult {
            classification,
            reasoning: raw.reasoning,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ClassifierResponse {
    #[serde(default = "default_tag")]
    classification: String,
    #[serde(default)]
    reasoning: String,
}

fn default_tag() -> String {
    "fyi".to_string()
}
