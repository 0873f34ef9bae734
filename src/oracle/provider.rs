//! Oracle provider trait — the boundary to the external annotation AI.
//!
//! Each annotation stage makes exactly one call: role instructions plus a
//! bounded chunk of user content, expecting structured JSON back. Decoding
//! and fallback handling live in the stages, not here.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::OracleError;

/// Default sampling temperature (kept low — annotation should be stable).
const DEFAULT_TEMPERATURE: f32 = 0.3;

/// Default output budget per stage call.
const DEFAULT_MAX_TOKENS: u32 = 256;

/// A single oracle completion request.
#[derive(Debug, Clone)]
pub struct OracleRequest {
    /// Role instructions for the stage (system prompt).
    pub system: String,
    /// Bounded user content — callers truncate before building the request.
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl OracleRequest {
    /// Create a request with default temperature and token budget.
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// An oracle completion response.
#[derive(Debug, Clone)]
pub struct OracleResponse {
    /// Raw text content returned by the model.
    pub content: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Trait for oracle backends.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Model identifier for logging.
    fn model_name(&self) -> &str;

    /// (input, output) cost per token in USD.
    fn cost_per_token(&self) -> (Decimal, Decimal);

    /// Run a single completion.
    async fn complete(&self, request: OracleRequest) -> Result<OracleResponse, OracleError>;
}
