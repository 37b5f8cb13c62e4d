//! Configuration management for PyZone.
//!
//! Configuration can be set via environment variables:
//! - `OPENROUTER_API_KEY` - Required. API key for the oracle LLM calls.
//! - `ORACLE_MODEL` - Optional. Model used by the oracles. Defaults to `openai/gpt-4o-mini`.
//! - `SUPABASE_URL` - Required. Supabase project URL for progress storage.
//! - `SUPABASE_SERVICE_ROLE_KEY` - Required. Service role key for Supabase.
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `3000`.
//! - `ORACLE_TIMEOUT_SECS` - Optional. Per-request oracle timeout. Defaults to `60`.
//! - `WORKING_DIR` - Optional. Directory for the local settings cache. Defaults to cwd.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// OpenRouter API key
    pub api_key: String,

    /// Model used for all oracle calls (OpenRouter format)
    pub oracle_model: String,

    /// Supabase project URL
    pub supabase_url: String,

    /// Supabase service role key (for full access)
    pub supabase_service_role_key: String,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Timeout applied to each oracle request. Without it a hung oracle
    /// call would pin a session in Running/Evaluating indefinitely.
    pub oracle_timeout: Duration,

    /// Working directory for the local settings cache
    pub working_dir: PathBuf,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `OPENROUTER_API_KEY`,
    /// `SUPABASE_URL` or `SUPABASE_SERVICE_ROLE_KEY` is not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("OPENROUTER_API_KEY".to_string()))?;

        let oracle_model =
            std::env::var("ORACLE_MODEL").unwrap_or_else(|_| "openai/gpt-4o-mini".to_string());

        let supabase_url = std::env::var("SUPABASE_URL")
            .map_err(|_| ConfigError::MissingEnvVar("SUPABASE_URL".to_string()))?;

        let supabase_service_role_key = std::env::var("SUPABASE_SERVICE_ROLE_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("SUPABASE_SERVICE_ROLE_KEY".to_string()))?;

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("PORT".to_string(), format!("{}", e)))?;

        let oracle_timeout_secs: u64 = std::env::var("ORACLE_TIMEOUT_SECS")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .map_err(|e| {
                ConfigError::InvalidValue("ORACLE_TIMEOUT_SECS".to_string(), format!("{}", e))
            })?;

        let working_dir = std::env::var("WORKING_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

        Ok(Self {
            api_key,
            oracle_model,
            supabase_url,
            supabase_service_role_key,
            host,
            port,
            oracle_timeout: Duration::from_secs(oracle_timeout_secs),
            working_dir,
        })
    }
}
