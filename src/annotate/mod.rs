//! AI annotation pipeline.
//!
//! Three independent stages consult the oracle: classification, priority
//! scoring, and summarization. Every stage degrades to a deterministic
//! fallback on oracle failure, so annotation never blocks ingestion.

mod classifier;
mod prompts;
mod scorer;
mod summarizer;

pub use classifier::{CLASSIFIER_BODY_LIMIT, ClassificationResult, Classifier};
pub use scorer::{FALLBACK_SCORE, PriorityFactors, PriorityResult, PriorityScorer, SCORER_BODY_LIMIT};
pub use summarizer::{SUMMARIZER_BODY_LIMIT, Summarizer, SummaryResult};

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::config::AnnotationConfig;
use crate::oracle::{Oracle, OracleResponse};

/// Truncate a body to at most `max` characters, marking the cut.
///
/// Counts characters, not bytes, so multi-byte text is never split
/// mid-codepoint.
pub(crate) fn truncate_body(body: &str, max: usize) -> String {
    if body.chars().count() <= max {
        body.to_string()
    } else {
        let mut truncated: String = body.chars().take(max).collect();
        truncated.push_str("...");
        truncated
    }
}

/// Log token usage and estimated cost for one stage call.
pub(crate) fn log_stage_cost(stage: &str, oracle: &dyn Oracle, response: &OracleResponse) {
    let (input_cost, output_cost) = oracle.cost_per_token();
    let cost = input_cost * Decimal::from(response.input_tokens)
        + output_cost * Decimal::from(response.output_tokens);
    tracing::debug!(
        stage,
        input_tokens = response.input_tokens,
        output_tokens = response.output_tokens,
        %cost,
        "Oracle call completed"
    );
}

/// Combined result of all three annotation stages.
#[derive(Debug, Clone)]
pub struct Annotation {
    pub classification: ClassificationResult,
    pub priority: PriorityResult,
    pub summary: SummaryResult,
}

/// The three annotation stages behind one facade.
///
/// Stages share the oracle handle but are otherwise independent; a
/// failure in one never affects the others.
pub struct AnnotationPipeline {
    classifier: Classifier,
    scorer: PriorityScorer,
    summarizer: Summarizer,
}

impl AnnotationPipeline {
    pub fn new(oracle: Arc<dyn Oracle>, config: &AnnotationConfig) -> Self {
        Self {
            classifier: Classifier::new(oracle.clone(), config.oracle_timeout),
            scorer: PriorityScorer::new(oracle.clone(), config),
            summarizer: Summarizer::new(oracle, config.oracle_timeout),
        }
    }

    pub async fn classify(&self, sender: &str, subject: &str, body: &str) -> ClassificationResult {
        self.classifier.classify(sender, subject, body).await
    }

    pub async fn score(&self, sender: &str, subject: &str, body: &str) -> PriorityResult {
        self.scorer.score(sender, subject, body).await
    }

    pub async fn summarize(&self, sender: &str, subject: &str, body: &str) -> SummaryResult {
        self.summarizer.summarize(sender, subject, body).await
    }

    /// Run all three stages concurrently.
    pub async fn annotate(&self, sender: &str, subject: &str, body: &str) -> Annotation {
        let (classification, priority, summary) = tokio::join!(
            self.classify(sender, subject, body),
            self.score(sender, subject, body),
            self.summarize(sender, subject, body),
        );
        Annotation {
            classification,
            priority,
            summary,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Shared oracle doubles for stage and pipeline tests.

    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use rust_decimal::Decimal;

    use crate::error::OracleError;
    use crate::oracle::{Oracle, OracleRequest, OracleResponse};

    /// Oracle double that always returns the same reply (or error),
    /// optionally after a delay, counting calls.
    pub struct StaticOracle {
        reply: Option<String>,
        delay: Option<Duration>,
        calls: Arc<AtomicUsize>,
    }

    impl StaticOracle {
        pub fn replying(content: &str) -> Self {
            Self {
                reply: Some(content.to_string()),
                delay: None,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub fn failing() -> Self {
            Self {
                reply: None,
                delay: None,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        /// Handle to the call counter, usable after the oracle is moved.
        pub fn call_counter(&self) -> Arc<AtomicUsize> {
            self.calls.clone()
        }
    }

    #[async_trait]
    impl Oracle for StaticOracle {
        fn model_name(&self) -> &str {
            "static-test-oracle"
        }

        fn cost_per_token(&self) -> (Decimal, Decimal) {
            (Decimal::ZERO, Decimal::ZERO)
        }

        async fn complete(&self, _request: OracleRequest) -> Result<OracleResponse, OracleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match &self.reply {
                Some(content) => Ok(OracleResponse {
                    content: content.clone(),
                    input_tokens: 10,
                    output_tokens: 10,
                }),
                None => Err(OracleError::RequestFailed {
                    provider: "static-test-oracle".to_string(),
                    reason: "scripted failure".to_string(),
                }),
            }
        }
    }

    /// Oracle double that picks its reply by which stage is asking,
    /// keyed on the system prompt.
    pub struct RoutingOracle {
        pub classify_reply: String,
        pub score_reply: String,
        pub summary_reply: String,
        calls: Arc<AtomicUsize>,
    }

    impl RoutingOracle {
        pub fn new(classify: &str, score: &str, summary: &str) -> Self {
            Self {
                classify_reply: classify.to_string(),
                score_reply: score.to_string(),
                summary_reply: summary.to_string(),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub fn call_counter(&self) -> Arc<AtomicUsize> {
            self.calls.clone()
        }
    }

    #[async_trait]
    impl Oracle for RoutingOracle {
        fn model_name(&self) -> &str {
            "routing-test-oracle"
        }

        fn cost_per_token(&self) -> (Decimal, Decimal) {
            (Decimal::ZERO, Decimal::ZERO)
        }

        async fn complete(&self, request: OracleRequest) -> Result<OracleResponse, OracleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let content = if request.system.contains("classification") {
                self.classify_reply.clone()
            } else if request.system.contains("priority") {
                self.score_reply.clone()
            } else {
                self.summary_reply.clone()
            };
            Ok(OracleResponse {
                content,
                input_tokens: 10,
                output_tokens: 10,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RoutingOracle;
    use super::*;
    use crate::pipeline::types::Classification;

    #[test]
    fn short_body_untouched() {
        assert_eq!(truncate_body("hello", 10), "hello");
    }

    #[test]
    fn long_body_truncated_with_marker() {
        let body = "a".repeat(2500);
        let truncated = truncate_body(&body, 2000);
        assert_eq!(truncated.chars().count(), 2003);
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let body = "é".repeat(100);
        let truncated = truncate_body(&body, 50);
        assert_eq!(truncated.chars().count(), 53);
    }

    #[tokio::test]
    async fn annotate_runs_all_three_stages() {
        let oracle = RoutingOracle::new(
            r#"{"classification": "action_required", "reasoning": "Asks a question"}"#,
            r#"{"priority_score": 62, "factors": {"urgency": 20}, "reasoning": "Deadline soon"}"#,
            r#"{"summary": "Needs a reply about the budget.", "next_action": "Reply"}"#,
        );
        let calls = oracle.call_counter();
        let pipeline = AnnotationPipeline::new(Arc::new(oracle), &AnnotationConfig::default());

        let annotation = pipeline.annotate("a@x.com", "Budget", "Can you confirm?").await;

        assert_eq!(
            annotation.classification.classification,
            Classification::ActionRequired
        );
        assert_eq!(annotation.priority.score, 62);
        assert_eq!(annotation.summary.summary, "Needs a reply about the budget.");
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 3);
    }
}
