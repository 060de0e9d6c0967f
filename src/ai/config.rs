use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ai::types::AiMode;
use crate::config::{env_parse_bool, env_parse_u64, env_var};

const DEFAULT_AI_TIMEOUT_MS: u64 = 20_000;
const DEFAULT_OLLAMA_ENDPOINT: &str = "http://127.0.0.1:11434";
const DEFAULT_OLLAMA_MODEL: &str = "qwen3:8b";
const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Runtime AI settings (env-driven).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiSettings {
    pub enabled: bool,
    pub mode: AiMode,
    pub timeout_ms: u64,
    pub ollama_endpoint: String,
    pub ollama_model: String,
    pub openai_endpoint: String,
    pub openai_model: String,
    #[serde(skip_serializing)]
    pub openai_api_key: Option<String>,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self::from_env()
    }
}

impl AiSettings {
    /// Env: `NETCERT_AI_ENABLED`, `NETCERT_AI_MODE`, `NETCERT_AI_TIMEOUT_MS`,
    /// `NETCERT_AI_ENDPOINT`, `NETCERT_AI_MODEL`, `NETCERT_AI_OPENAI_ENDPOINT`,
    /// `NETCERT_AI_OPENAI_MODEL`, `NETCERT_AI_OPENAI_API_KEY` (or `OPENAI_API_KEY`)
    pub fn from_env() -> Self {
        let enabled = env_parse_bool("NETCERT_AI_ENABLED", false);
        let mode = if enabled {
            env_var("NETCERT_AI_MODE")
                .and_then(|v| AiMode::parse(&v))
                .unwrap_or(AiMode::Local)
        } else {
            AiMode::Disabled
        };

        Self {
            enabled,
            mode,
            timeout_ms: env_parse_u64("NETCERT_AI_TIMEOUT_MS", DEFAULT_AI_TIMEOUT_MS, 500, 120_000),
            ollama_endpoint: env_var("NETCERT_AI_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_OLLAMA_ENDPOINT.to_string()),
            ollama_model: env_var("NETCERT_AI_MODEL")
                .unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string()),
            openai_endpoint: env_var("NETCERT_AI_OPENAI_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_OPENAI_ENDPOINT.to_string()),
            openai_model: env_var("NETCERT_AI_OPENAI_MODEL")
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            openai_api_key: env_var("NETCERT_AI_OPENAI_API_KEY")
                .or_else(|| env_var("OPENAI_API_KEY")),
        }
    }

    /// Settings with AI switched off, ignoring the environment.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            mode: AiMode::Disabled,
            timeout_ms: DEFAULT_AI_TIMEOUT_MS,
            ollama_endpoint: DEFAULT_OLLAMA_ENDPOINT.to_string(),
            ollama_model: DEFAULT_OLLAMA_MODEL.to_string(),
            openai_endpoint: DEFAULT_OPENAI_ENDPOINT.to_string(),
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            openai_api_key: None,
        }
    }

    pub(crate) fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
