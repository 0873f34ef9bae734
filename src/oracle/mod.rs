//! Oracle integration — the external AI consulted by each annotation stage.
//!
//! Supports:
//! - **Anthropic**: Direct API access via rig-core
//! - **OpenAI**: Direct API access via rig-core
//!
//! Uses the rig-core crate for HTTP transport and `RigAdapter` to bridge
//! rig's `CompletionModel` trait to our `Oracle` trait.

mod costs;
pub mod json;
pub mod provider;
mod rig_adapter;

pub use json::extract_json_object;
pub use provider::{Oracle, OracleRequest, OracleResponse};
pub use rig_adapter::RigAdapter;

use std::sync::Arc;

use rig::client::CompletionClient;
use secrecy::ExposeSecret;

use crate::config::OracleConfig;
use crate::error::OracleError;

/// Supported oracle backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleBackend {
    Anthropic,
    OpenAi,
}

/// Create an oracle from configuration.
pub fn create_oracle(config: &OracleConfig) -> Result<Arc<dyn Oracle>, OracleError> {
    match config.backend {
        OracleBackend::Anthropic => create_anthropic_oracle(config),
        OracleBackend::OpenAi => create_openai_oracle(config),
    }
}

fn create_anthropic_oracle(config: &OracleConfig) -> Result<Arc<dyn Oracle>, OracleError> {
    use rig::providers::anthropic;

    let client: rig::client::Client<anthropic::client::AnthropicExt> =
        anthropic::Client::new(config.api_key.expose_secret()).map_err(|e| {
            OracleError::RequestFailed {
                provider: "anthropic".to_string(),
                reason: format!("Failed to create Anthropic client: {}", e),
            }
        })?;

    let model = client.completion_model(&config.model);
    tracing::info!("Using Anthropic oracle (model: {})", config.model);
    Ok(Arc::new(RigAdapter::new(model, &config.model)))
}

fn create_openai_oracle(config: &OracleConfig) -> Result<Arc<dyn Oracle>, OracleError> {
    use rig::providers::openai;

    let client: rig::client::Client<openai::client::OpenAIResponsesExt> =
        openai::Client::new(config.api_key.expose_secret()).map_err(|e| {
            OracleError::RequestFailed {
                provider: "openai".to_string(),
                reason: format!("Failed to create OpenAI client: {}", e),
            }
        })?;

    let model = client.completion_model(&config.model);
    tracing::info!("Using OpenAI oracle (model: {})", config.model);
    Ok(Arc::new(RigAdapter::new(model, &config.model)))
}
