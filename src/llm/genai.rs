//! GenAI-based reasoning client
//!
//! Wraps the `genai` crate so every hosted or local provider it supports can
//! back the pipeline through the same [`LLMClient`] interface.

use super::client::LLMClient;
use super::error::BackendError;
use super::types::{ChatMessage, LLMRequest, LLMResponse, MessageRole};
use async_trait::async_trait;
use genai::adapter::AdapterKind;
use genai::chat::{ChatMessage as GenAIChatMessage, ChatOptions, ChatRequest as GenAIChatRequest};
use genai::resolver::{AuthData, Endpoint, ServiceTargetResolver};
use genai::{Client, ModelIden, ServiceTarget};
use std::time::{Duration, Instant};
use tracing::{debug, error};

pub struct GenAIClient {
    client: Client,
    model: String,
    provider: AdapterKind,
    timeout: Duration,
    endpoint: Option<String>,
}

impl GenAIClient {
    /// Creates a client for `provider`/`model`.
    ///
    /// When `endpoint` is set, every request is routed to that base URL with
    /// the provider's usual API-key variable as credentials. `api_key_env`
    /// overrides which variable is read, for OpenAI-compatible services that
    /// use their own key name.
    pub fn new(
        provider: AdapterKind,
        model: impl Into<String>,
        timeout: Duration,
        endpoint: Option<String>,
        api_key_env: Option<&'static str>,
    ) -> Self {
        let model = model.into();

        let client = match endpoint.clone() {
            Some(endpoint_url) => {
                debug!(
                    provider = provider.as_str(),
                    endpoint = %endpoint_url,
                    "Using custom endpoint"
                );

                let model_for_target = model.clone();
                let resolver = ServiceTargetResolver::from_resolver_fn(
                    move |_target: ServiceTarget| -> Result<ServiceTarget, genai::resolver::Error> {
                        let auth = match api_key_env.or_else(|| provider.default_key_env_name()) {
                            Some(var) => AuthData::from_env(var),
                            None => AuthData::from_single(""),
                        };

                        Ok(ServiceTarget {
                            endpoint: Endpoint::from_owned(endpoint_url.clone()),
                            auth,
                            model: ModelIden::new(provider, &model_for_target),
                        })
                    },
                );

                Client::builder()
                    .with_service_target_resolver(resolver)
                    .build()
            }
            None => Client::default(),
        };

        debug!(provider = provider.as_str(), model = %model, "Created GenAI client");

        Self {
            client,
            model,
            provider,
            timeout,
            endpoint,
        }
    }

    pub fn provider(&self) -> AdapterKind {
        self.provider
    }

    fn convert_message(msg: &ChatMessage) -> GenAIChatMessage {
        match msg.role {
            MessageRole::System => GenAIChatMessage::system(&msg.content),
            MessageRole::User => GenAIChatMessage::user(&msg.content),
            MessageRole::Assistant => GenAIChatMessage::assistant(&msg.content),
        }
    }

    fn chat_options(request: &LLMRequest) -> ChatOptions {
        let mut options = ChatOptions::default();
        if let Some(temp) = request.temperature {
            options = options.with_temperature(temp as f64);
        }
        if let Some(max_tokens) = request.max_tokens {
            options = options.with_max_tokens(max_tokens);
        }
        if let Some(ref sequences) = request.stop_sequences {
            options = options.with_stop_sequences(sequences.clone());
        }
        options
    }
}

#[async_trait]
impl LLMClient for GenAIClient {
    async fn chat(&self, request: LLMRequest) -> Result<LLMResponse, BackendError> {
        let start = Instant::now();

        let messages: Vec<GenAIChatMessage> =
            request.messages.iter().map(Self::convert_message).collect();
        let genai_request = GenAIChatRequest::new(messages);
        let options = Self::chat_options(&request);

        let response = match tokio::time::timeout(
            self.timeout,
            self.client
                .exec_chat(&self.model, genai_request, Some(&options)),
        )
        .await
        {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => {
                error!("{} API error: {}", self.provider.as_str(), e);
                return Err(BackendError::ApiError {
                    message: format!("{} request failed: {}", self.provider.as_str(), e),
                    status_code: None,
                });
            }
            Err(_) => {
                error!(
                    "{} request timed out after {}s",
                    self.provider.as_str(),
                    self.timeout.as_secs()
                );
                return Err(BackendError::TimeoutError {
                    seconds: self.timeout.as_secs(),
                });
            }
        };

        let content = response.first_text().unwrap_or_default().to_string();

        Ok(LLMResponse::text(content, start.elapsed()))
    }

    fn name(&self) -> &str {
        self.provider.as_str()
    }

    fn model_info(&self) -> Option<String> {
        Some(self.model.clone())
    }
}

impl std::fmt::Debug for GenAIClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenAIClient")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}
