//! Bridge from rig-core's `CompletionModel` trait to our `Oracle` trait.

use async_trait::async_trait;
use rig::completion::{AssistantContent, CompletionModel, Message};
use rust_decimal::Decimal;

use crate::error::OracleError;
use crate::oracle::costs::model_costs;
use crate::oracle::provider::{Oracle, OracleRequest, OracleResponse};

/// Adapter wrapping a rig completion model.
pub struct RigAdapter<M: CompletionModel> {
    model: M,
    model_name: String,
    costs: (Decimal, Decimal),
}

impl<M: CompletionModel> RigAdapter<M> {
    pub fn new(model: M, model_name: &str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
            costs: model_costs(model_name),
        }
    }
}

#[async_trait]
impl<M: CompletionModel> Oracle for RigAdapter<M> {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn cost_per_token(&self) -> (Decimal, Decimal) {
        self.costs
    }

    async fn complete(&self, request: OracleRequest) -> Result<OracleResponse, OracleError> {
        let response = self
            .model
            .completion_request(Message::user(request.user))
            .preamble(request.system)
            .temperature(request.temperature as f64)
            .max_tokens(request.max_tokens as u64)
            .send()
            .await
            .map_err(|e| OracleError::RequestFailed {
                provider: self.model_name.clone(),
                reason: e.to_string(),
            })?;

        // Concatenate text segments; tool calls are not used by annotation.
        let content: String = response
            .choice
            .iter()
            .filter_map(|part| match part {
                AssistantContent::Text(text) => Some(text.text.clone()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");

        if content.is_empty() {
            return Err(OracleError::MalformedResponse(
                "completion contained no text content".to_string(),
            ));
        }

        Ok(OracleResponse {
            content,
            input_tokens: response.usage.input_tokens as u32,
            output_tokens: response.usage.output_tokens as u32,
        })
    }
}
