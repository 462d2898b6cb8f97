use crate::llm::client::{LLMClient, TEXT_GENERATION};
use crate::types::{AppError, CapabilityError, CapabilityResult, Message, MessageRole, Result};
use async_trait::async_trait;
use ollama_rs::{
    Ollama,
    generation::chat::{ChatMessage, request::ChatMessageRequest},
    models::ModelOptions,
};

const DEFAULT_PORT: u16 = 11434;

pub struct OllamaClient {
    client: Ollama,
    model: String,
    temperature: f32,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: String, temperature: f32) -> Result<Self> {
        let (host, port) = split_base_url(base_url)?;
        let client = Ollama::new(host, port);

        Ok(Self {
            client,
            model,
            temperature,
        })
    }
}

/// `Ollama::new` takes the scheme+host and the port separately.
fn split_base_url(base_url: &str) -> Result<(String, u16)> {
    let parsed = reqwest::Url::parse(base_url)
        .map_err(|e| AppError::Configuration(format!("Invalid Ollama URL '{}': {}", base_url, e)))?;
    let host = parsed.host_str().unwrap_or("localhost");
    let port = parsed.port().unwrap_or(DEFAULT_PORT);

    Ok((format!("{}://{}", parsed.scheme(), host), port))
}

fn to_chat_message(message: &Message) -> ChatMessage {
    match message.role {
        MessageRole::System => ChatMessage::system(message.content.clone()),
        MessageRole::User => ChatMessage::user(message.content.clone()),
        MessageRole::Assistant => ChatMessage::assistant(message.content.clone()),
    }
}

/// ollama-rs folds transport and API failures into one error type,
/// so classification works off the message.
fn classify(err: impl std::fmt::Display) -> CapabilityError {
    let message = format!("Ollama error: {}", err);
    let lowered = message.to_lowercase();
    if lowered.contains("not found") || lowered.contains("invalid") {
        CapabilityError::permanent(TEXT_GENERATION, message)
    } else {
        CapabilityError::transient(TEXT_GENERATION, message)
    }
}

#[async_trait]
impl LLMClient for OllamaClient {
    async fn generate(&self, messages: &[Message]) -> CapabilityResult<String> {
        let chat_messages: Vec<ChatMessage> = messages.iter().map(to_chat_message).collect();

        let request = ChatMessageRequest::new(self.model.clone(), chat_messages)
            .options(ModelOptions::default().temperature(self.temperature));

        let response = self
            .client
            .send_chat_messages(request)
            .await
            .map_err(classify)?;

        Ok(response.message.content)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
