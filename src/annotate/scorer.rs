//! Priority scoring stage: assigns a 1-100 score with a factor breakdown.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::AnnotationConfig;
use crate::error::OracleError;
use crate::oracle::{Oracle, OracleRequest, extract_json_object};

use super::prompts::{SCORER_SYSTEM, build_scorer_prompt};
use super::truncate_body;

/// Body characters submitted to the oracle.
pub const SCORER_BODY_LIMIT: usize = 2000;

/// Score used when the oracle cannot be consulted.
pub const FALLBACK_SCORE: i32 = 50;

const SCORER_TEMPERATURE: f32 = 0.3;
const SCORER_MAX_TOKENS: u32 = 200;

/// Per-dimension contribution to the priority score.
///
/// Bounds match the rubric in the prompt: 30/30/20/20.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityFactors {
    #[serde(default)]
    pub sender_importance: i32,
    #[serde(default)]
    pub urgency: i32,
    #[serde(default)]
    pub action_required: i32,
    #[serde(default)]
    pub time_sensitivity: i32,
}

impl PriorityFactors {
    /// Clamp each factor into its rubric range.
    fn bounded(self) -> Self {
        Self {
            sender_importance: self.sender_importance.clamp(0, 30),
            urgency: self.urgency.clamp(0, 30),
            action_required: self.action_required.clamp(0, 20),
            time_sensitivity: self.time_sensitivity.clamp(0, 20),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Outcome of the scoring stage. The score is always in [1,100]; on
/// oracle failure it is the neutral [`FALLBACK_SCORE`] with empty factors.
#[derive(Debug, Clone)]
pub struct PriorityResult {
    pub score: i32,
    pub factors: PriorityFactors,
    pub reasoning: String,
}

pub struct PriorityScorer {
    oracle: Arc<dyn Oracle>,
    timeout: Duration,
    important_contacts: Vec<String>,
    working_hours: String,
}

impl PriorityScorer {
    pub fn new(oracle: Arc<dyn Oracle>, config: &AnnotationConfig) -> Self {
        Self {
            oracle,
            timeout: config.oracle_timeout,
            important_contacts: config.important_contacts.clone(),
            working_hours: config.working_hours.clone(),
        }
    }

    /// Score a message. Never errors: oracle failures degrade to the
    /// neutral fallback score.
    pub async fn score(&self, sender: &str, subject: &str, body: &str) -> PriorityResult {
        match self.try_score(sender, subject, body).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "Priority scoring failed, using fallback");
                PriorityResult {
                    score: FALLBACK_SCORE,
                    factors: PriorityFactors::default(),
                    reasoning: "Error during priority scoring".to_string(),
                }
            }
        }
    }

    async fn try_score(
        &self,
        sender: &str,
        subject: &str,
        body: &str,
    ) -> Result<PriorityResult, OracleError> {
        let body = truncate_body(body, SCORER_BODY_LIMIT);
        let request = OracleRequest::new(
            SCORER_SYSTEM,
            build_scorer_prompt(
                sender,
                subject,
                &body,
                &self.important_contacts,
                &self.working_hours,
            ),
        )
        .with_temperature(SCORER_TEMPERATURE)
        .with_max_tokens(SCORER_MAX_TOKENS);

        let response = tokio::time::timeout(self.timeout, self.oracle.complete(request))
            .await
            .map_err(|_| OracleError::Timeout(self.timeout))??;
        super::log_stage_cost("score", self.oracle.as_ref(), &response);

        let raw: ScorerResponse = serde_json::from_str(&extract_json_object(&response.content))?;

        Ok(PriorityResult {
            score: raw.priority_score.clamp(1, 100) as i32,
            factors: raw.factors.bounded(),
            reasoning: raw.reasoning,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ScorerResponse {
    #[serde(default = "default_score")]
    priority_score: i64,
    #[serde(default)]
    factors: PriorityFactors,
    #[serde(default)]
    reasoning: String,
}

fn default_score() -> i64 {
    FALLBACK_SCORE as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::testing::StaticOracle;

    fn scorer(oracle: StaticOracle) -> PriorityScorer {
        PriorityScorer::new(Arc::new(oracle), &AnnotationConfig::default())
    }

    #[tokio::test]
    async fn parses_score_and_factors() {
        let s = scorer(StaticOracle::replying(
            r#"{"priority_score": 75, "factors": {"sender_importance": 30, "urgency": 20,
                "action_required": 15, "time_sensitivity": 10}, "reasoning": "VIP sender"}"#,
        ));
        let result = s.score("vip@x.com", "s", "b").await;
        assert_eq!(result.score, 75);
        assert_eq!(result.factors.sender_importance, 30);
        assert_eq!(result.reasoning, "VIP sender");
    }

    #[tokio::test]
    async fn score_clamped_to_lower_bound() {
        let s = scorer(StaticOracle::replying(r#"{"priority_score": 0}"#));
        assert_eq!(s.score("a@x.com", "s", "b").await.score, 1);
    }

    #[tokio::test]
    async fn score_clamped_to_upper_bound() {
        let s = scorer(StaticOracle::replying(r#"{"priority_score": 500}"#));
        assert_eq!(s.score("a@x.com", "s", "b").await.score, 100);
    }

    #[tokio::test]
    async fn missing_score_defaults_to_midpoint() {
        let s = scorer(StaticOracle::replying(r#"{"reasoning": "no score given"}"#));
        let result = s.score("a@x.com", "s", "b").await;
        assert_eq!(result.score, FALLBACK_SCORE);
        assert!(result.factors.is_empty());
    }

    #[tokio::test]
    async fn factors_clamped_to_rubric_bounds() {
        let s = scorer(StaticOracle::replying(
            r#"{"priority_score": 90, "factors": {"sender_importance": 99, "urgency": -5,
                "action_required": 50, "time_sensitivity": 20}}"#,
        ));
        let result = s.score("a@x.com", "s", "b").await;
        assert_eq!(result.factors.sender_importance, 30);
        assert_eq!(result.factors.urgency, 0);
        assert_eq!(result.factors.action_required, 20);
        assert_eq!(result.factors.time_sensitivity, 20);
    }

    #[tokio::test]
    async fn oracle_failure_yields_neutral_fallback() {
        let s = scorer(StaticOracle::failing());
        let result = s.score("a@x.com", "s", "b").await;
        assert_eq!(result.score, FALLBACK_SCORE);
        assert!(result.factors.is_empty());
        assert_eq!(result.reasoning, "Error during priority scoring");
    }

    #[tokio::test]
    async fn slow_oracle_times_out_to_fallback() {
        let oracle = StaticOracle::replying(r#"{"priority_score": 90}"#)
            .with_delay(Duration::from_millis(200));
        let mut config = AnnotationConfig::default();
        config.oracle_timeout = Duration::from_millis(10);
        let s = PriorityScorer::new(Arc::new(oracle), &config);
        assert_eq!(s.score("a@x.com", "s", "b").await.score, FALLBACK_SCORE);
    }
}
