use super::provider::API_KEY_VARS;
use super::LlmBackend;
use crate::error::EnrichError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_API_MODEL: &str = "gpt-4o-mini";
const DEFAULT_API_TIMEOUT_SECS: u64 = 60;
const SYSTEM_PROMPT: &str = "Return only valid JSON.";

/// OpenAI-compatible `/chat/completions` endpoint
pub struct ApiBackend {
    client: Client,
    base: String,
    model: String,
    api_key: String,
    timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    content: Value,
}

impl ApiBackend {
    /// Reads the first available API key plus `RISKMAP_API_BASE`,
    /// `RISKMAP_API_MODEL` and `RISKMAP_API_TIMEOUT`.
    pub fn from_env() -> Result<Self, EnrichError> {
        let api_key = API_KEY_VARS
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .find(|value| !value.trim().is_empty())
            .ok_or_else(|| EnrichError::Unavailable("API key is missing".to_string()))?;
        let base = std::env::var("RISKMAP_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        let model =
            std::env::var("RISKMAP_API_MODEL").unwrap_or_else(|_| DEFAULT_API_MODEL.to_string());
        let timeout_secs = std::env::var("RISKMAP_API_TIMEOUT")
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_API_TIMEOUT_SECS);
        Self::new(base, model, api_key, timeout_secs)
    }

    pub fn new(
        base: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, EnrichError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| EnrichError::Unavailable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base: base.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
            timeout_secs,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base)
    }

    fn request_body(&self, prompt: &str) -> Value {
        json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": prompt},
            ],
            "response_format": {"type": "json_object"},
            "temperature": 0,
        })
    }
}

/// Message text of the first choice; list content is joined part by part
fn response_text(response: ChatResponse) -> Result<String, EnrichError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| EnrichError::InvalidResponse("API response has no choices".to_string()))?;
    let content = choice.message.map(|m| m.content).unwrap_or(Value::Null);
    let text = match content {
        Value::String(text) => text,
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| part.as_object())
            .map(|part| part.get("text").and_then(Value::as_str).unwrap_or(""))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    };
    if text.trim().is_empty() {
        return Err(EnrichError::InvalidResponse(
            "API response has empty content".to_string(),
        ));
    }
    Ok(text)
}

#[async_trait]
impl LlmBackend for ApiBackend {
    async fn complete(&self, prompt: &str) -> Result<String, EnrichError> {
        log::debug!("Sending enrichment request to {} ({})", self.endpoint(), self.model);
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EnrichError::Timeout(self.timeout_secs)
                } else {
                    EnrichError::Request(format!("API request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(EnrichError::Request(format!("API returned {status}")));
        }
        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| EnrichError::InvalidResponse(e.to_string()))?;
        response_text(parsed)
    }

    fn name(&self) -> &str {
        "api"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(body: Value) -> Result<String, EnrichError> {
        response_text(serde_json::from_value(body).unwrap())
    }

    #[test]
    fn reads_string_content() {
        let text = parse(json!({"choices": [{"message": {"content": "{\"a\": 1}"}}]})).unwrap();
        assert_eq!(text, "{\"a\": 1}");
    }

    #[test]
    fn joins_content_parts() {
        let text = parse(json!({"choices": [{"message": {"content": [
            {"type": "text", "text": "{\"a\":"},
            {"type": "text", "text": "1}"},
            "ignored"
        ]}}]}))
        .unwrap();
        assert_eq!(text, "{\"a\":\n1}");
    }

    #[test]
    fn rejects_empty_responses() {
        assert!(matches!(
            parse(json!({"choices": []})),
            Err(EnrichError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse(json!({"choices": [{"message": {"content": "  "}}]})),
            Err(EnrichError::InvalidResponse(_))
        ));
    }

    #[test]
    fn body_asks_for_json_object() {
        let backend = ApiBackend::new("http://localhost:9/v1/", "m", "k", 1).unwrap();
        assert_eq!(backend.endpoint(), "http://localhost:9/v1/chat/completions");
        let body = backend.request_body("hello");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["content"], SYSTEM_PROMPT);
        assert_eq!(body["messages"][1]["content"], "hello");
        assert_eq!(body["temperature"], 0);
    }
}
