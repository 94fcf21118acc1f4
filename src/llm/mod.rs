//! LLM client abstraction.
//!
//! The assistant turns free-form utterances into structured actions by asking
//! a hosted chat model. Everything it needs from the model goes through
//! [`LlmProvider`], so tests and alternative backends can stand in for the
//! hosted client.

pub mod system_prompt;
mod together;

pub use system_prompt::{SYSTEM_PROMPT_TEMPLATE, build_system_prompt, build_user_prompt};
pub use together::TogetherClient;

use crate::Result;
use std::time::Duration;

/// Trait for LLM providers.
pub trait LlmProvider: Send + Sync {
    /// The provider name.
    fn name(&self) -> &'static str;

    /// Generates a completion for the given prompt.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Provider`] if the completion fails.
    fn complete(&self, prompt: &str) -> Result<String>;

    /// Generates a completion with a system prompt.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Provider`] if the completion fails.
    ///
    /// Default implementation concatenates system and user prompts.
    /// Providers should override this to use native system prompt support.
    fn complete_with_system(&self, system: &str, user: &str) -> Result<String> {
        let combined = format!("{system}\n\n---\n\nUser message:\n{user}");
        self.complete(&combined)
    }
}

/// HTTP client configuration for LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LlmHttpConfig {
    /// Request timeout in milliseconds (0 to disable).
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds (0 to disable).
    pub connect_timeout_ms: u64,
}

impl Default for LlmHttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            connect_timeout_ms: 3_000,
        }
    }
}

impl LlmHttpConfig {
    /// Loads HTTP configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Loads HTTP configuration from config file settings.
    #[must_use]
    pub fn from_config(config: &crate::config::LlmConfig) -> Self {
        let mut settings = Self::default();
        if let Some(timeout_ms) = config.timeout_ms {
            settings.timeout_ms = timeout_ms;
        }
        if let Some(connect_timeout_ms) = config.connect_timeout_ms {
            settings.connect_timeout_ms = connect_timeout_ms;
        }
        settings
    }

    /// Applies environment variable overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("MURMUR_LLM_TIMEOUT_MS") {
            if let Ok(timeout_ms) = v.parse::<u64>() {
                self.timeout_ms = timeout_ms;
            }
        }
        if let Ok(v) = std::env::var("MURMUR_LLM_CONNECT_TIMEOUT_MS") {
            if let Ok(connect_timeout_ms) = v.parse::<u64>() {
                self.connect_timeout_ms = connect_timeout_ms;
            }
        }
        self
    }
}

/// Builds a blocking HTTP client for LLM requests with configured timeouts.
#[must_use]
pub fn build_http_client(config: LlmHttpConfig) -> reqwest::blocking::Client {
    let mut builder = reqwest::blocking::Client::builder();
    if config.timeout_ms > 0 {
        builder = builder.timeout(Duration::from_millis(config.timeout_ms));
    }
    if config.connect_timeout_ms > 0 {
        builder = builder.connect_timeout(Duration::from_millis(config.connect_timeout_ms));
    }

    builder.build().unwrap_or_else(|err| {
        tracing::warn!("Failed to build LLM HTTP client: {err}");
        reqwest::blocking::Client::new()
    })
}

/// Extracts JSON from an LLM response, handling markdown code blocks and
/// surrounding prose.
#[must_use]
pub fn extract_json_from_response(response: &str) -> &str {
    let trimmed = response.trim();

    // ```json ... ``` blocks
    if let Some(start) = trimmed.find("```json") {
        let json_start = start + 7;
        if let Some(end) = trimmed[json_start..].find("```") {
            return trimmed[json_start..json_start + end].trim();
        }
    }

    // ``` ... ``` blocks without a language marker
    if let Some(start) = trimmed.find("```") {
        let content_start = start + 3;
        let after_marker = &trimmed[content_start..];
        let json_start = after_marker
            .find('{')
            .map_or(content_start, |pos| content_start + pos);
        if let Some(end) = trimmed[json_start..].find("```") {
            return trimmed[json_start..json_start + end].trim();
        }
    }

    // Raw object: first { to last }
    if let Some(start) = trimmed.find('{') {
        if let Some(end) = trimmed.rfind('}') {
            if end > start {
                return &trimmed[start..=end];
            }
        }
    }

    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_raw() {
        let response = r#"{"action": "general_query"}"#;
        assert_eq!(extract_json_from_response(response), response);
    }

    #[test]
    fn test_extract_json_markdown() {
        let response = "```json\n{\"action\": \"read_back_reminders\"}\n```";
        let json = extract_json_from_response(response);
        assert_eq!(json, "{\"action\": \"read_back_reminders\"}");
    }

    #[test]
    fn test_extract_json_unmarked_fence() {
        let response = "Sure!\n```\n{\"action\": \"clear_reminders\"}\n```";
        let json = extract_json_from_response(response);
        assert_eq!(json, "{\"action\": \"clear_reminders\"}");
    }

    #[test]
    fn test_extract_json_with_prefix() {
        let response = "Here is the result: {\"key\": \"value\"} hope this helps";
        assert_eq!(extract_json_from_response(response), r#"{"key": "value"}"#);
    }

    #[test]
    fn test_extract_json_without_object() {
        assert_eq!(extract_json_from_response("  no json here "), "no json here");
    }

    #[test]
    fn test_http_config_from_config() {
        let mut llm = crate::config::LlmConfig::default();
        llm.timeout_ms = Some(5_000);
        let http = LlmHttpConfig::from_config(&llm);
        assert_eq!(http.timeout_ms, 5_000);
        assert_eq!(http.connect_timeout_ms, 3_000);
    }

    struct EchoProvider;

    impl LlmProvider for EchoProvider {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn complete(&self, prompt: &str) -> Result<String> {
            Ok(prompt.to_string())
        }
    }

    #[test]
    fn test_default_complete_with_system_concatenates() {
        let out = EchoProvider.complete_with_system("SYS", "hello").unwrap();
        assert!(out.starts_with("SYS"));
        assert!(out.ends_with("User message:\nhello"));
    }
}
