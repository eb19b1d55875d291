//! Provider factory
//!
//! The reasoning client is chosen once, at pipeline construction, from the
//! provider key in [`StagehandConfig`].

use crate::config::StagehandConfig;
use crate::llm::{GenAIClient, LLMClient};
use anyhow::{anyhow, Result};
use genai::adapter::AdapterKind;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Static description of one supported provider key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderSpec {
    pub key: &'static str,
    pub adapter: AdapterKind,
    pub default_model: &'static str,
    /// Fixed endpoint for OpenAI-compatible services
    pub endpoint: Option<&'static str>,
    /// API key variable, when it differs from the adapter's default
    pub api_key_env: Option<&'static str>,
}

pub const PROVIDERS: &[ProviderSpec] = &[
    ProviderSpec {
        key: "ollama",
        adapter: AdapterKind::Ollama,
        default_model: "qwen2.5:7b",
        endpoint: None,
        api_key_env: None,
    },
    ProviderSpec {
        key: "openai",
        adapter: AdapterKind::OpenAI,
        default_model: "gpt-4o-mini",
        endpoint: None,
        api_key_env: None,
    },
    ProviderSpec {
        key: "anthropic",
        adapter: AdapterKind::Anthropic,
        default_model: "claude-3-5-haiku-latest",
        endpoint: None,
        api_key_env: None,
    },
    ProviderSpec {
        key: "gemini",
        adapter: AdapterKind::Gemini,
        default_model: "gemini-2.0-flash",
        endpoint: None,
        api_key_env: None,
    },
    ProviderSpec {
        key: "groq",
        adapter: AdapterKind::Groq,
        default_model: "llama-3.1-8b-instant",
        endpoint: None,
        api_key_env: None,
    },
    ProviderSpec {
        key: "xai",
        adapter: AdapterKind::Xai,
        default_model: "grok-3-mini",
        endpoint: None,
        api_key_env: None,
    },
    ProviderSpec {
        key: "deepseek",
        adapter: AdapterKind::DeepSeek,
        default_model: "deepseek-chat",
        endpoint: None,
        api_key_env: None,
    },
    ProviderSpec {
        key: "kimi",
        adapter: AdapterKind::OpenAI,
        default_model: "kimi-k2-turbo-preview",
        endpoint: Some("https://api.moonshot.ai/v1/"),
        api_key_env: Some("KIMI_API_KEY"),
    },
];

/// Looks up a provider by key, accepting the common aliases.
pub fn provider_spec(key: &str) -> Option<&'static ProviderSpec> {
    let normalized = match key.trim().to_lowercase().as_str() {
        "claude" => "anthropic".to_string(),
        "grok" => "xai".to_string(),
        "moonshot" => "kimi".to_string(),
        other => other.to_string(),
    };
    PROVIDERS.iter().find(|spec| spec.key == normalized)
}

pub struct SelectedClient {
    pub client: Arc<dyn LLMClient>,
    pub provider: &'static str,
    pub model: String,
    pub description: String,
}

/// Builds the reasoning client described by `config`.
pub fn create_client(config: &StagehandConfig) -> Result<SelectedClient> {
    let spec = provider_spec(&config.provider).ok_or_else(|| {
        anyhow!(
            "Unknown provider '{}'. Supported: {}",
            config.provider,
            supported_keys().join(", ")
        )
    })?;

    if !provider_has_credentials(spec) {
        warn!(
            provider = spec.key,
            "No API key found in the environment; requests will likely be rejected"
        );
    }

    let model = config
        .model
        .clone()
        .unwrap_or_else(|| spec.default_model.to_string());
    let endpoint = config
        .api_base_url
        .clone()
        .or_else(|| spec.endpoint.map(str::to_string));

    let client = GenAIClient::new(
        spec.adapter,
        model.clone(),
        Duration::from_secs(config.request_timeout_secs),
        endpoint,
        spec.api_key_env,
    );

    info!(provider = spec.key, model = %model, "Using reasoning provider");

    Ok(SelectedClient {
        client: Arc::new(client),
        provider: spec.key,
        description: format!("{} ({})", spec.key, model),
        model,
    })
}

pub fn supported_keys() -> Vec<&'static str> {
    PROVIDERS.iter().map(|spec| spec.key).collect()
}

fn provider_has_credentials(spec: &ProviderSpec) -> bool {
    match spec.api_key_env.or_else(|| spec.adapter.default_key_env_name()) {
        None => true,
        Some(env_var) => std::env::var(env_var).is_ok(),
    }
}
