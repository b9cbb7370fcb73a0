//! Provider identity and environment-variable configuration resolution.
//!
//! The supported provider set is closed per the external interface contract:
//! `{openai, ollama}`. Each provider has a conventional default base URL and
//! a family of environment variables (`<PROVIDER>_API_KEY`, `<PROVIDER>_TIMEOUT`,
//! `<PROVIDER>_MAX_RETRIES`, `<PROVIDER>_MAX_TOOL_ITERATIONS`,
//! `<PROVIDER>_MAX_CONCURRENT_REQUESTS`) that override the built-in defaults.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// The closed set of supported LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    OpenAI,
    Ollama,
}

impl Provider {
    /// Conventional default base URL for this provider's OpenAI-compatible
    /// chat-completions endpoint.
    pub fn default_url(&self) -> &'static str {
        match self {
            Provider::OpenAI => "https://api.openai.com/v1",
            Provider::Ollama => "http://localhost:11434/v1",
        }
    }

    /// Default concurrent-request cap (§4.4): OpenAI-class providers get a
    /// larger default than local Ollama-class runners.
    pub fn default_max_concurrent(&self) -> usize {
        match self {
            Provider::OpenAI => 100,
            Provider::Ollama => 30,
        }
    }

    /// Prefix used to build this provider's family of environment variables.
    fn env_prefix(&self) -> &'static str {
        match self {
            Provider::OpenAI => "OPENAI",
            Provider::Ollama => "OLLAMA",
        }
    }

    fn env_var(&self, suffix: &str) -> String {
        format!("{}_{}", self.env_prefix(), suffix)
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAI),
            "ollama" => Ok(Provider::Ollama),
            other => Err(format!("unknown provider: {other}")),
        }
    }
}

/// Per-provider resilience/limits configuration, resolved from explicit
/// parameters with environment-variable overrides.
///
/// Resolution priority for every field: explicit parameter (if `Some`) >
/// environment variable > built-in default.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub max_retries: u32,
    pub max_tool_iterations: u32,
    pub max_concurrent_requests: usize,
}

const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_MAX_TOOL_ITERATIONS: u32 = 100;

impl ProviderSettings {
    /// Resolve settings for `provider`, applying environment overrides on
    /// top of the built-in defaults. `api_key` is taken from
    /// `<PROVIDER>_API_KEY` if not empty.
    pub fn resolve(provider: Provider) -> Self {
        let timeout = env::var(provider.env_var("TIMEOUT"))
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));

        let max_retries = env::var(provider.env_var("MAX_RETRIES"))
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(DEFAULT_MAX_RETRIES);

        let max_tool_iterations = env::var(provider.env_var("MAX_TOOL_ITERATIONS"))
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(DEFAULT_MAX_TOOL_ITERATIONS);

        let max_concurrent_requests = env::var(provider.env_var("MAX_CONCURRENT_REQUESTS"))
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or_else(|| provider.default_max_concurrent());

        let api_key = env::var(provider.env_var("API_KEY"))
            .ok()
            .filter(|v| !v.is_empty());

        Self {
            api_key,
            timeout,
            max_retries,
            max_tool_iterations,
            max_concurrent_requests,
        }
    }
}

/// Whether the Retry Driver and Rate Limiter should be active passthroughs
/// (for deployments relying on external gateway-level resilience). Reads
/// `RESILIENCE_ENABLED`, defaulting to `true` when unset or unparseable.
pub fn resilience_enabled() -> bool {
    env::var("RESILIENCE_ENABLED")
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(true)
}

/// Directory for the file trace store, from `TRACE_STORE_PATH`, falling
/// back to `~/.agent-runtime/traces`.
pub fn trace_store_path() -> std::path::PathBuf {
    if let Ok(dir) = env::var("TRACE_STORE_PATH") {
        return std::path::PathBuf::from(dir);
    }
    env::var("HOME")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| std::path::PathBuf::from("."))
        .join(".agent-runtime")
        .join("traces")
}
