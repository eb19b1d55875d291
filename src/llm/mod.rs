//! Reasoning-service abstraction layer
//!
//! Stages talk to the reasoning service only through the [`LLMClient`] trait,
//! so hosted providers (via `genai`) and the scripted mock are interchangeable.

mod client;
mod error;
mod genai;
mod mock;
mod selector;
mod types;

pub use client::LLMClient;
pub use error::BackendError;
pub use genai::GenAIClient;
pub use mock::{MockLLMClient, MockResponse};
pub use selector::{create_client, provider_spec, supported_keys, ProviderSpec, SelectedClient};
pub use types::{ChatMessage, LLMRequest, LLMResponse, MessageRole};
