//! OpenAI-compatible chat completions
//!
//! Covers OpenAI, Perplexity, xAI and DeepSeek, which all speak the
//! `/chat/completions` request/response shape.

use async_trait::async_trait;
use serde::Deserialize;

use super::{http_client, read_body, require_key, CompletionRequest, ProviderClient};
use crate::error::InvokeError;
use crate::types::Provider;

/// Chat-completions client for one OpenAI-compatible provider.
#[derive(Clone)]
pub struct OpenAiCompatClient {
    provider: Provider,
    api_key: String,
    endpoint: String,
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    pub fn for_provider(provider: Provider, api_key: &str) -> Result<Self, InvokeError> {
        let endpoint = endpoint_for(provider).ok_or_else(|| InvokeError::NotConfigured {
            provider: provider.to_string(),
            reason: "provider does not speak the chat-completions protocol".to_string(),
        })?;
        Ok(Self {
            provider,
            api_key: require_key(provider, api_key)?,
            endpoint: endpoint.to_string(),
            client: http_client()?,
        })
    }

    /// Point the client at a different endpoint (proxies, gateways).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn build_body(&self, request: &CompletionRequest) -> serde_json::Value {
        serde_json::json!({
            "model": &request.model,
            "messages": [
                {"role": "system", "content": &request.system_prompt},
                {"role": "user", "content": &request.user_prompt}
            ],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens
        })
    }
}

fn endpoint_for(provider: Provider) -> Option<&'static str> {
    match provider {
        Provider::Openai => Some("https://api.openai.com/v1/chat/completions"),
        Provider::Perplexity => Some("https://api.perplexity.ai/chat/completions"),
        Provider::Xai => Some("https://api.x.ai/v1/chat/completions"),
        Provider::Deepseek => Some("https://api.deepseek.com/v1/chat/completions"),
        Provider::Anthropic | Provider::Google => None,
    }
}

#[derive(Deserialize)]
struct Message {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<Choice>,
}

fn extract_text(body: &str) -> Result<String, InvokeError> {
    let api_response: ApiResponse = serde_json::from_str(body)?;
    let message = api_response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message)
        .ok_or_else(|| InvokeError::MalformedResponse("no choices in response".to_string()))?;

    if let Some(refusal) = message.refusal.filter(|r| !r.is_empty()) {
        return Err(InvokeError::Refused(refusal));
    }
    message
        .content
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| InvokeError::MalformedResponse("empty message content".to_string()))
}

#[async_trait]
impl ProviderClient for OpenAiCompatClient {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, InvokeError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&self.build_body(request))
            .send()
            .await?;

        let body = read_body(self.provider, response).await?;
        extract_text(&body)
    }
}
