//! Client for OpenAI-compatible `/chat/completions` endpoints (Groq by default).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{ChatMessage, ChatModel};
use crate::config::LlmConfig;
use crate::deadline::Deadline;
use crate::error::{RagError, Result};

const PROVIDER: &str = "llm";

pub struct OpenAiCompatibleClient {
    client: Client,
    endpoint: String,
    api_key: String,
    temperature: f32,
}

impl OpenAiCompatibleClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| RagError::Config(format!("Failed to build chat client: {}", e)))?;

        let endpoint = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));
        tracing::info!(endpoint = %endpoint, "Creating chat completion client");

        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key.clone(),
            temperature: config.temperature,
        })
    }

    async fn send(&self, model: &str, messages: &[ChatMessage]) -> Result<String> {
        if self.api_key.trim().is_empty() {
            return Err(RagError::provider(PROVIDER, "GROQ_API_KEY is not set"));
        }

        tracing::debug!(
            endpoint = %self.endpoint,
            model = %model,
            messages = messages.len(),
            "Sending chat completion request"
        );

        let request = ChatCompletionRequest {
            model,
            messages,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RagError::provider(PROVIDER, format!("request to {} timed out", self.endpoint))
                } else if e.is_connect() {
                    RagError::provider(
                        PROVIDER,
                        format!("failed to connect to {}: {}", self.endpoint, e),
                    )
                } else {
                    RagError::provider(PROVIDER, format!("request to {} failed: {}", self.endpoint, e))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RagError::provider(PROVIDER, format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            let preview: String = body.chars().take(300).collect();
            return Err(RagError::provider(
                PROVIDER,
                format!("API error ({}) from model {}: {}", status, model, preview),
            ));
        }

        parse_completion(&body, &self.endpoint)
    }
}

#[async_trait]
impl ChatModel for OpenAiCompatibleClient {
    async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
        deadline: &Deadline,
    ) -> Result<String> {
        deadline.run("chat completion", self.send(model, messages)).await
    }
}

/// Extract the first choice's content, with a clear error when a proxy
/// answered with an HTML page instead of JSON.
fn parse_completion(body: &str, endpoint: &str) -> Result<String> {
    let trimmed = body.trim_start();
    if trimmed.starts_with('<') {
        let preview: String = trimmed.chars().take(200).collect();
        return Err(RagError::provider(
            PROVIDER,
            format!("{} returned HTML instead of JSON: {}", endpoint, preview),
        ));
    }

    let parsed: ChatCompletionResponse = serde_json::from_str(body).map_err(|e| {
        let preview: String = body.chars().take(300).collect();
        RagError::provider(
            PROVIDER,
            format!("failed to parse JSON from {}: {}. Body: {}", endpoint, e, preview),
        )
    })?;

    parsed
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .ok_or_else(|| RagError::provider(PROVIDER, "no choices returned from API"))
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let messages = vec![ChatMessage::system("rules"), ChatMessage::user("question")];
        let body = serde_json::to_value(ChatCompletionRequest {
            model: "llama-3.1-8b-instant",
            messages: &messages,
            temperature: 0.0,
        })
        .unwrap();

        assert_eq!(body["model"], "llama-3.1-8b-instant");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "question");
        assert_eq!(body["temperature"], 0.0);
    }

    #[test]
    fn test_parse_completion() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"Close valve V-12."}}]}"#;
        assert_eq!(parse_completion(body, "e").unwrap(), "Close valve V-12.");
    }

    #[test]
    fn test_parse_completion_errors() {
        assert!(parse_completion(r#"{"choices":[]}"#, "e").is_err());
        let err = parse_completion("<html>502 Bad Gateway</html>", "e").unwrap_err();
        assert!(err.to_string().contains("HTML"));
        assert!(parse_completion("not json", "e").is_err());
    }

    #[test]
    fn test_endpoint_from_base_url() {
        let config = LlmConfig {
            base_url: "https://api.groq.com/openai/v1/".to_string(),
            ..LlmConfig::default()
        };
        let client = OpenAiCompatibleClient::new(&config).unwrap();
        assert_eq!(client.endpoint, "https://api.groq.com/openai/v1/chat/completions");
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_before_network() {
        let config = LlmConfig {
            api_key: String::new(),
            ..LlmConfig::default()
        };
        let client = OpenAiCompatibleClient::new(&config).unwrap();
        let deadline = Deadline::after(Duration::from_secs(5));
        let err = client
            .complete("m", &[ChatMessage::user("hi")], &deadline)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("GROQ_API_KEY"));
    }
}
