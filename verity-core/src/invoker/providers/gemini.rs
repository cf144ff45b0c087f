//! Google Gemini `generateContent` client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{http_client, read_body, require_key, CompletionRequest, ProviderClient};
use crate::error::InvokeError;
use crate::types::Provider;

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Clone)]
pub struct GeminiClient {
    api_key: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiResponseContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: String,
}

impl GeminiClient {
    pub fn new(api_key: &str) -> Result<Self, InvokeError> {
        Ok(Self {
            api_key: require_key(Provider::Google, api_key)?,
            client: http_client()?,
        })
    }

    fn build_request(&self, request: &CompletionRequest) -> GeminiRequest {
        // generateContent has no separate system slot on every model; fold it in.
        let full_prompt = format!("{}\n\n{}", request.system_prompt, request.user_prompt);
        GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: full_prompt }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
        }
    }

    fn url_for(&self, model: &str) -> String {
        format!("{}/{}:generateContent?key={}", BASE_URL, model, self.api_key)
    }
}

fn extract_text(body: &str) -> Result<String, InvokeError> {
    let response: GeminiResponse = serde_json::from_str(body)?;
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| InvokeError::MalformedResponse("No candidates in response".to_string()))?;

    if candidate.finish_reason.as_deref() == Some("SAFETY") {
        return Err(InvokeError::Refused(
            "response blocked by safety filter".to_string(),
        ));
    }

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().map(|p| p.text).collect())
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(InvokeError::MalformedResponse(
            "No parts in candidate".to_string(),
        ));
    }
    Ok(text)
}

#[async_trait]
impl ProviderClient for GeminiClient {
    fn provider(&self) -> Provider {
        Provider::Google
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, InvokeError> {
        let url = self.url_for(&request.model);
        tracing::debug!(
            "Sending request to Gemini API: {}",
            url.replace(&self.api_key, "***")
        );

        let response = self
            .client
            .post(&url)
            .json(&self.build_request(request))
            .send()
            .await?;

        let body = read_body(Provider::Google, response).await?;
        extract_text(&body)
    }
}
