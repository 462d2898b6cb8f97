//! Text-generation capability and provider management
//!
//! Every provider implements [`LLMClient`]. The research workflow only ever
//! talks to this trait, so providers can be swapped (or mocked) freely:
//! - **Ollama**: local inference (default feature `ollama`)
//! - **OpenAI**: OpenAI and compatible chat-completions endpoints (feature `openai`)

use crate::types::{AppError, CapabilityError, CapabilityResult, Message, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Capability name used in error reports.
pub const TEXT_GENERATION: &str = "text_generation";

/// Generic LLM client trait for provider abstraction
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Generate a reply for a conversation
    async fn generate(&self, messages: &[Message]) -> CapabilityResult<String>;

    /// Generate a JSON value that conforms to `schema`.
    ///
    /// The default implementation appends the schema as an instruction and
    /// extracts the first JSON document from the reply.
    async fn generate_structured(
        &self,
        messages: &[Message],
        schema: &serde_json::Value,
    ) -> CapabilityResult<serde_json::Value> {
        let mut conversation = messages.to_vec();
        conversation.push(Message::system(format!(
            "Respond ONLY with a JSON document matching this JSON schema, with no commentary:\n{}",
            schema
        )));

        let reply = self.generate(&conversation).await?;
        parse_json_reply(&reply)
    }

    /// Get the model name/identifier
    fn model_name(&self) -> &str;
}

/// Pull a JSON document out of a model reply.
///
/// Models like to wrap JSON in markdown fences or add a sentence before it,
/// so this strips fences and falls back to the outermost `{..}` / `[..]` span.
pub fn parse_json_reply(reply: &str) -> CapabilityResult<serde_json::Value> {
    let trimmed = reply.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|rest| rest.trim_end().trim_end_matches("```").trim())
        .unwrap_or(trimmed);

    if let Ok(value) = serde_json::from_str(unfenced) {
        return Ok(value);
    }

    let start = unfenced.find(['{', '[']);
    let end = unfenced.rfind(['}', ']']);
    if let (Some(start), Some(end)) = (start, end)
        && start < end
        && let Ok(value) = serde_json::from_str(&unfenced[start..=end])
    {
        return Ok(value);
    }

    Err(CapabilityError::permanent(
        TEXT_GENERATION,
        format!(
            "reply is not valid JSON: {}",
            unfenced.chars().take(120).collect::<String>()
        ),
    ))
}

/// Map an HTTP status from a provider to a capability error.
pub fn classify_status(status: reqwest::StatusCode, body: &str) -> CapabilityError {
    let message = format!("HTTP {}: {}", status.as_u16(), body);
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status == reqwest::StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        CapabilityError::transient(TEXT_GENERATION, message)
    } else {
        CapabilityError::permanent(TEXT_GENERATION, message)
    }
}

/// Map a transport-level reqwest failure to a capability error.
pub fn classify_transport(capability: &str, err: &reqwest::Error) -> CapabilityError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        CapabilityError::transient(capability, err.to_string())
    } else if let Some(status) = err.status() {
        let mut classified = classify_status(status, &err.to_string());
        classified.capability = capability.to_string();
        classified
    } else {
        CapabilityError::permanent(capability, err.to_string())
    }
}

/// Provider enum for runtime selection
#[derive(Debug, Clone)]
pub enum Provider {
    /// OpenAI API provider (including compatible APIs)
    ///
    /// # Example
    /// ```rust,ignore
    /// let provider = Provider::OpenAI {
    ///     api_key: "sk-...".to_string(),
    ///     api_base: "https://api.openai.com/v1".to_string(),
    ///     model: "gpt-4o-mini".to_string(),
    ///     temperature: 0.0,
    /// };
    /// ```
    OpenAI {
        api_key: String,
        api_base: String,
        model: String,
        temperature: f32,
    },

    /// Ollama local LLM provider
    ///
    /// # Example
    /// ```rust,ignore
    /// let provider = Provider::Ollama {
    ///     base_url: "http://localhost:11434".to_string(),
    ///     model: "llama3.2".to_string(),
    ///     temperature: 0.0,
    /// };
    /// ```
    Ollama {
        base_url: String,
        model: String,
        temperature: f32,
    },
}

impl Provider {
    /// Create a client instance for this provider
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the provider's feature is not compiled in.
    pub fn create_client(&self) -> Result<Arc<dyn LLMClient>> {
        match self {
            #[cfg(feature = "openai")]
            Provider::OpenAI {
                api_key,
                api_base,
                model,
                temperature,
            } => Ok(Arc::new(super::openai::OpenAIClient::new(
                api_key.clone(),
                api_base.clone(),
                model.clone(),
                *temperature,
            )?)),

            #[cfg(not(feature = "openai"))]
            Provider::OpenAI { .. } => Err(AppError::Configuration(
                "OpenAI provider requires the 'openai' feature".to_string(),
            )),

            #[cfg(feature = "ollama")]
            Provider::Ollama {
                base_url,
                model,
                temperature,
            } => Ok(Arc::new(super::ollama::OllamaClient::new(
                base_url,
                model.clone(),
                *temperature,
            )?)),

            #[cfg(not(feature = "ollama"))]
            Provider::Ollama { .. } => Err(AppError::Configuration(
                "Ollama provider requires the 'ollama' feature".to_string(),
            )),
        }
    }

    /// Get a human-readable name for this provider
    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAI { .. } => "OpenAI",
            Provider::Ollama { .. } => "Ollama",
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Provider::OpenAI { model, .. } | Provider::Ollama { model, .. } => model,
        }
    }
}
