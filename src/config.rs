//! Configuration types.
//!
//! One `AppConfig` is built at process start (usually from the environment)
//! and passed by reference into every component constructor. There is no
//! ambient global configuration.

use std::time::Duration;

use secrecy::SecretString;

use crate::decision::AutomationPolicy;
use crate::error::ConfigError;
use crate::oracle::OracleBackend;

/// Oracle (LLM) connection settings.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub backend: OracleBackend,
    pub api_key: SecretString,
    pub model: String,
}

/// Settings consumed by the annotation stages.
#[derive(Debug, Clone)]
pub struct AnnotationConfig {
    /// Upper bound on each oracle call; a timeout is a stage failure
    /// (fallback), never a fatal pipeline error.
    pub oracle_timeout: Duration,
    /// Contacts the priority scorer should treat as important.
    pub important_contacts: Vec<String>,
    /// Working-hours description fed to the scoring prompt.
    pub working_hours: String,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            oracle_timeout: Duration::from_secs(30),
            important_contacts: Vec::new(),
            working_hours: "9 AM - 5 PM".to_string(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub oracle: OracleConfig,
    pub annotation: AnnotationConfig,
    /// Path to the local database file.
    pub db_path: String,
    /// User id all ingested messages are attributed to.
    pub user_id: String,
    /// Automation level applied at decision time.
    pub automation_policy: AutomationPolicy,
    /// Messages stuck in `processing` longer than this are resumed by the
    /// recovery sweep.
    pub recovery_grace: Duration,
    /// Confidence bar for dispatching an irreversible auto-handled send.
    pub auto_send_threshold: f32,
}

impl AppConfig {
    /// Build configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let backend = match std::env::var("INBOX_PILOT_BACKEND").as_deref() {
            Ok("openai") => OracleBackend::OpenAi,
            Ok("anthropic") | Err(_) => OracleBackend::Anthropic,
            Ok(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "INBOX_PILOT_BACKEND".to_string(),
                    message: format!("unknown backend '{other}'"),
                });
            }
        };

        let key_var = match backend {
            OracleBackend::Anthropic => "ANTHROPIC_API_KEY",
            OracleBackend::OpenAi => "OPENAI_API_KEY",
        };
        let api_key = std::env::var(key_var)
            .map_err(|_| ConfigError::MissingEnvVar(key_var.to_string()))?;

        let model = std::env::var("INBOX_PILOT_MODEL").unwrap_or_else(|_| match backend {
            OracleBackend::Anthropic => "claude-sonnet-4-20250514".to_string(),
            OracleBackend::OpenAi => "gpt-4o-mini".to_string(),
        });

        let important_contacts = std::env::var("INBOX_PILOT_IMPORTANT_CONTACTS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let automation_policy = match std::env::var("INBOX_PILOT_AUTOMATION").as_deref() {
            Ok(raw) => raw.parse().map_err(|e: String| ConfigError::InvalidValue {
                key: "INBOX_PILOT_AUTOMATION".to_string(),
                message: e,
            })?,
            Err(_) => AutomationPolicy::AssistMode,
        };

        let oracle_timeout_secs = parse_env_u64("INBOX_PILOT_ORACLE_TIMEOUT_SECS", 30)?;
        let recovery_grace_secs = parse_env_u64("INBOX_PILOT_RECOVERY_GRACE_SECS", 300)?;

        Ok(Self {
            oracle: OracleConfig {
                backend,
                api_key: SecretString::from(api_key),
                model,
            },
            annotation: AnnotationConfig {
                oracle_timeout: Duration::from_secs(oracle_timeout_secs),
                important_contacts,
                working_hours: std::env::var("INBOX_PILOT_WORKING_HOURS")
                    .unwrap_or_else(|_| "9 AM - 5 PM".to_string()),
            },
            db_path: std::env::var("INBOX_PILOT_DB_PATH")
                .unwrap_or_else(|_| "./data/inbox-pilot.db".to_string()),
            user_id: std::env::var("INBOX_PILOT_USER").unwrap_or_else(|_| "local".to_string()),
            automation_policy,
            recovery_grace: Duration::from_secs(recovery_grace_secs),
            auto_send_threshold: crate::decision::DEFAULT_AUTO_SEND_THRESHOLD,
        })
    }
}

fn parse_env_u64(key: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected an integer, got '{raw}'"),
        }),
        Err(_) => Ok(default),
    }
}
