//! Anthropic Messages API client.

use async_trait::async_trait;
use serde::Deserialize;

use super::{http_client, read_body, require_key, CompletionRequest, ProviderClient};
use crate::error::InvokeError;
use crate::types::Provider;

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

#[derive(Clone)]
pub struct AnthropicClient {
    api_key: String,
    client: reqwest::Client,
}

impl AnthropicClient {
    pub fn new(api_key: &str) -> Result<Self, InvokeError> {
        Ok(Self {
            api_key: require_key(Provider::Anthropic, api_key)?,
            client: http_client()?,
        })
    }

    fn build_body(&self, request: &CompletionRequest) -> serde_json::Value {
        serde_json::json!({
            "model": &request.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "system": &request.system_prompt,
            "messages": [
                {"role": "user", "content": &request.user_prompt}
            ]
        })
    }
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

fn extract_text(body: &str) -> Result<String, InvokeError> {
    let api_response: ApiResponse = serde_json::from_str(body)?;
    let text: String = api_response
        .content
        .iter()
        .filter(|b| b.kind == "text")
        .filter_map(|b| b.text.as_deref())
        .collect::<Vec<_>>()
        .join("\n");

    if api_response.stop_reason.as_deref() == Some("refusal") {
        return Err(InvokeError::Refused(if text.is_empty() {
            "stop_reason=refusal".to_string()
        } else {
            text
        }));
    }
    if text.trim().is_empty() {
        return Err(InvokeError::MalformedResponse(
            "no text content in response".to_string(),
        ));
    }
    Ok(text)
}

#[async_trait]
impl ProviderClient for AnthropicClient {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, InvokeError> {
        let response = self
            .client
            .post(MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("Content-Type", "application/json")
            .json(&self.build_body(request))
            .send()
            .await?;

        let body = read_body(Provider::Anthropic, response).await?;
        extract_text(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_body_puts_system_at_top_level() {
        let client = AnthropicClient::new("k").unwrap();
        let body = client.build_body(&CompletionRequest {
            model: "claude-sonnet-4-20250514".to_string(),
            system_prompt: "You are a source credibility analyst.".to_string(),
            user_prompt: "claim".to_string(),
            max_tokens: 2500,
            temperature: 0.3,
        });
        assert_eq!(body["system"], "You are a source credibility analyst.");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["max_tokens"], 2500);
    }

    #[test]
    fn test_extract_text_joins_blocks() {
        let body = r#"{"content":[{"type":"text","text":"a"},{"type":"tool_use","id":"x"},{"type":"text","text":"b"}],"stop_reason":"end_turn"}"#;
        assert_eq!(extract_text(body).unwrap(), "a\nb");
    }

    #[test]
    fn test_extract_text_refusal() {
        let body = r#"{"content":[],"stop_reason":"refusal"}"#;
        assert!(matches!(extract_text(body), Err(InvokeError::Refused(_))));
    }

    #[test]
    fn test_extract_text_empty() {
        let body = r#"{"content":[],"stop_reason":"end_turn"}"#;
        assert!(matches!(
            extract_text(body),
            Err(InvokeError::MalformedResponse(_))
        ));
    }
}
