//! OpenAI-compatible chat-completions client
//!
//! Talks to `{api_base}/chat/completions` directly over reqwest, which keeps
//! it usable with any compatible endpoint (OpenRouter, vLLM, LM Studio, ...).

use crate::llm::client::{LLMClient, TEXT_GENERATION, classify_status, classify_transport};
use crate::types::{AppError, CapabilityError, CapabilityResult, Message, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub struct OpenAIClient {
    http: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl OpenAIClient {
    pub fn new(api_key: String, api_base: String, model: String, temperature: f32) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_key,
            api_base: api_base.trim_end_matches('/').to_string(),
            model,
            temperature,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }
}

#[async_trait]
impl LLMClient for OpenAIClient {
    async fn generate(&self, messages: &[Message]) -> CapabilityResult<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| ChatMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            temperature: self.temperature,
        };

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport(TEXT_GENERATION, &e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &text));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| classify_transport(TEXT_GENERATION, &e))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                CapabilityError::permanent(TEXT_GENERATION, "No content in completion response")
            })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CapabilityErrorKind;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> OpenAIClient {
        OpenAIClient::new(
            "test-key".to_string(),
            format!("{}/v1/", server.uri()),
            "gpt-test".to_string(),
            0.0,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_generate_returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "Hello there"}}]
            })))
            .mount(&server)
            .await;

        let reply = client(&server)
            .generate(&[Message::user("Hi")])
            .await
            .unwrap();
        assert_eq!(reply, "Hello there");
    }

    #[tokio::test]
    async fn test_rate_limit_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let err = client(&server)
            .generate(&[Message::user("Hi")])
            .await
            .unwrap_err();
        assert_eq!(err.kind, CapabilityErrorKind::Transient);
    }

    #[tokio::test]
    async fn test_unauthorized_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let err = client(&server)
            .generate(&[Message::user("Hi")])
            .await
            .unwrap_err();
        assert_eq!(err.kind, CapabilityErrorKind::Permanent);
        assert!(err.message.contains("401"));
    }
}
