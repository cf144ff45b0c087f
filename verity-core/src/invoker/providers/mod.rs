//! Provider adapters
//!
//! One [`ProviderClient`] per wire protocol. The router picks the client by
//! [`Provider`] tag; adapters only move text over HTTP and classify
//! failures, they know nothing about roles or aggregation.

pub mod anthropic;
pub mod gemini;
pub mod openai_compat;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ProviderSettings;
use crate::error::InvokeError;
use crate::types::Provider;

pub use anthropic::AnthropicClient;
pub use gemini::GeminiClient;
pub use openai_compat::OpenAiCompatClient;

/// Connect timeout for provider HTTP clients. Request timeouts are applied
/// by the router so they can be bounded by the request deadline.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// One chat completion to send to a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// A provider that turns a prompt into response text.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    fn provider(&self) -> Provider;

    async fn complete(&self, request: &CompletionRequest) -> Result<String, InvokeError>;
}

/// Create the client for `provider` with the given key.
pub fn create_client(
    provider: Provider,
    api_key: &str,
) -> Result<Arc<dyn ProviderClient>, InvokeError> {
    let client: Arc<dyn ProviderClient> = match provider {
        Provider::Anthropic => Arc::new(AnthropicClient::new(api_key)?),
        Provider::Google => Arc::new(GeminiClient::new(api_key)?),
        Provider::Openai | Provider::Perplexity | Provider::Xai | Provider::Deepseek => {
            Arc::new(OpenAiCompatClient::for_provider(provider, api_key)?)
        }
    };
    Ok(client)
}

/// Clients for every provider that has a key configured.
pub fn clients_from_settings(
    settings: &ProviderSettings,
) -> Result<Vec<Arc<dyn ProviderClient>>, InvokeError> {
    settings
        .configured()
        .into_iter()
        .filter_map(|p| settings.api_key(p).map(|key| (p, key)))
        .map(|(p, key)| create_client(p, key))
        .collect()
}

pub(crate) fn http_client() -> Result<reqwest::Client, InvokeError> {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(|e| InvokeError::Network(format!("Failed to build HTTP client: {}", e)))
}

pub(crate) fn require_key(provider: Provider, api_key: &str) -> Result<String, InvokeError> {
    if api_key.trim().is_empty() {
        return Err(InvokeError::NotConfigured {
            provider: provider.to_string(),
            reason: "API key is empty".to_string(),
        });
    }
    Ok(api_key.to_string())
}

/// Read the body and map non-2xx statuses onto [`InvokeError`].
pub(crate) async fn read_body(
    provider: Provider,
    response: reqwest::Response,
) -> Result<String, InvokeError> {
    let status = response.status();
    let body = response.text().await?;

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(InvokeError::Unauthorized {
            provider: provider.to_string(),
        });
    }
    if !status.is_success() {
        return Err(InvokeError::Provider {
            status: status.as_u16(),
            body: truncate(&body, 500).to_string(),
        });
    }

    tracing::debug!(%provider, "Raw response: {}", truncate(&body, 1000));
    Ok(body)
}

pub(crate) fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
