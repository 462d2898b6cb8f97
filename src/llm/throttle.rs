//! Run-wide text-generation throttle
//!
//! Interviews, section writers and synthesis all share one [`ThrottledClient`],
//! so the number of in-flight generation calls stays bounded no matter how many
//! interviews are running. The limit is independent of the interview
//! parallelism limit.

use crate::llm::client::{LLMClient, TEXT_GENERATION};
use crate::types::{CapabilityError, CapabilityResult, Message};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Clone)]
pub struct ThrottleConfig {
    /// Maximum concurrent generation calls (default: 4)
    pub max_concurrent_calls: usize,
    /// Timeout for acquiring a call slot (default: 120 seconds)
    pub acquire_timeout: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_concurrent_calls: 4,
            acquire_timeout: Duration::from_secs(120),
        }
    }
}

pub struct ThrottledClient {
    inner: Arc<dyn LLMClient>,
    semaphore: Arc<Semaphore>,
    acquire_timeout: Duration,
}

impl ThrottledClient {
    pub fn new(inner: Arc<dyn LLMClient>, config: ThrottleConfig) -> Self {
        Self {
            inner,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_calls.max(1))),
            acquire_timeout: config.acquire_timeout,
        }
    }

    /// Slots currently free
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    async fn acquire(&self) -> CapabilityResult<OwnedSemaphorePermit> {
        tokio::time::timeout(self.acquire_timeout, self.semaphore.clone().acquire_owned())
            .await
            .map_err(|_| {
                CapabilityError::transient(
                    TEXT_GENERATION,
                    "Timeout waiting for a text-generation slot",
                )
            })?
            .map_err(|_| CapabilityError::permanent(TEXT_GENERATION, "Throttle semaphore closed"))
    }
}

#[async_trait]
impl LLMClient for ThrottledClient {
    async fn generate(&self, messages: &[Message]) -> CapabilityResult<String> {
        let _permit = self.acquire().await?;
        self.inner.generate(messages).await
    }

    async fn generate_structured(
        &self,
        messages: &[Message],
        schema: &serde_json::Value,
    ) -> CapabilityResult<serde_json::Value> {
        let _permit = self.acquire().await?;
        self.inner.generate_structured(messages, schema).await
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}
