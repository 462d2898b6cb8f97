/// Text-generation trait, provider selection and reply parsing.
pub mod client;
/// Ollama local inference client.
#[cfg(feature = "ollama")]
pub mod ollama;
/// OpenAI-compatible chat-completions client.
#[cfg(feature = "openai")]
pub mod openai;
/// Run-wide concurrency limit for generation calls.
pub mod throttle;

pub use client::{LLMClient, Provider};
pub use throttle::{ThrottleConfig, ThrottledClient};
