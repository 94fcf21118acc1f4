//! Together AI client.
//!
//! Speaks the OpenAI-compatible chat completions protocol and asks for a JSON
//! object response.

use super::{LlmHttpConfig, LlmProvider, build_http_client};
use crate::config::{DEFAULT_LLM_BASE_URL, DEFAULT_LLM_MODEL, LlmConfig};
use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, instrument};

/// Hosted chat-completions client.
pub struct TogetherClient {
    /// API key.
    api_key: Option<SecretString>,
    /// API endpoint.
    endpoint: String,
    /// Model to use.
    model: String,
    /// HTTP client.
    client: reqwest::blocking::Client,
}

impl TogetherClient {
    /// Creates a client with default endpoint and model, reading the key from
    /// `TOGETHER_API_KEY`.
    #[must_use]
    pub fn new() -> Self {
        let api_key = std::env::var(crate::config::API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .map(SecretString::from);
        Self {
            api_key,
            endpoint: DEFAULT_LLM_BASE_URL.to_string(),
            model: DEFAULT_LLM_MODEL.to_string(),
            client: build_http_client(LlmHttpConfig::from_env()),
        }
    }

    /// Creates a client from the `[llm]` configuration section.
    #[must_use]
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            endpoint: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            client: build_http_client(LlmHttpConfig::from_config(config).with_env_overrides()),
        }
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(key.into()));
        self
    }

    /// Sets the API endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Returns the configured model.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn api_key(&self) -> Result<&SecretString> {
        self.api_key
            .as_ref()
            .ok_or_else(|| Error::provider("together", "TOGETHER_API_KEY not set"))
    }

    #[instrument(
        name = "murmur.llm.request",
        skip(self, messages),
        fields(model = %self.model, messages = messages.len())
    )]
    fn request(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let api_key = self.api_key()?;
        let start = Instant::now();

        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            max_tokens: Some(1024),
            temperature: Some(0.7),
            response_format: Some(ResponseFormat {
                kind: "json_object".to_string(),
            }),
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .header(
                "Authorization",
                format!("Bearer {}", api_key.expose_secret()),
            )
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .map_err(|e| Error::provider("together", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            metrics::counter!("murmur_llm_requests_total", "status" => "error").increment(1);
            return Err(Error::provider(
                "together",
                format!("API returned status: {status} - {body}"),
            ));
        }

        let response: ChatCompletionResponse = response
            .json()
            .map_err(|e| Error::provider("together", format!("invalid response: {e}")))?;

        metrics::counter!("murmur_llm_requests_total", "status" => "success").increment(1);
        metrics::histogram!("murmur_llm_request_duration_ms")
            .record(start.elapsed().as_secs_f64() * 1000.0);

        let content = response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| Error::provider("together", "No choices in response"))?;

        debug!(chars = content.len(), "LLM response received");
        Ok(content)
    }
}

impl Default for TogetherClient {
    fn default() -> Self {
        Self::new()
    }
}

impl LlmProvider for TogetherClient {
    fn name(&self) -> &'static str {
        "together"
    }

    fn complete(&self, prompt: &str) -> Result<String> {
        self.request(vec![ChatMessage::user(prompt)])
    }

    fn complete_with_system(&self, system: &str, user: &str) -> Result<String> {
        self.request(vec![ChatMessage::system(system), ChatMessage::user(user)])
    }
}

/// Request to the Chat Completions API.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: String,
}

/// A message in the chat.
#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

impl ChatMessage {
    fn system(content: &str) -> Self {
        Self {
            role: "system".to_string(),
            content: content.to_string(),
        }
    }

    fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }
}

/// Response from the Chat Completions API.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

/// A choice in the response.
#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyless() -> TogetherClient {
        TogetherClient {
            api_key: None,
            endpoint: DEFAULT_LLM_BASE_URL.to_string(),
            model: DEFAULT_LLM_MODEL.to_string(),
            client: reqwest::blocking::Client::new(),
        }
    }

    #[test]
    fn test_client_configuration() {
        let client = keyless()
            .with_api_key("test-key")
            .with_endpoint("https://custom.endpoint")
            .with_model("small");

        assert_eq!(client.name(), "together");
        assert_eq!(
            client.api_key.as_ref().map(ExposeSecret::expose_secret),
            Some("test-key")
        );
        assert_eq!(client.endpoint, "https://custom.endpoint");
        assert_eq!(client.model(), "small");
    }

    #[test]
    fn test_missing_key_is_provider_error() {
        let err = keyless().complete("hello").unwrap_err();
        assert!(matches!(err, Error::Provider { .. }));
    }

    #[test]
    fn test_from_config_trims_trailing_slash() {
        let mut config = LlmConfig::default();
        config.base_url = "http://localhost:8080/v1/".to_string();
        let client = TogetherClient::from_config(&config);
        assert_eq!(client.endpoint, "http://localhost:8080/v1");
    }

    #[test]
    fn test_request_serializes_json_response_format() {
        let request = ChatCompletionRequest {
            model: "m".to_string(),
            messages: vec![ChatMessage::system("s"), ChatMessage::user("u")],
            max_tokens: None,
            temperature: None,
            response_format: Some(ResponseFormat {
                kind: "json_object".to_string(),
            }),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["response_format"]["type"], "json_object");
        assert_eq!(json["messages"][0]["role"], "system");
        assert!(json.get("max_tokens").is_none());
    }
}
