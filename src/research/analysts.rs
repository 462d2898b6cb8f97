use crate::llm::LLMClient;
use crate::llm::client::TEXT_GENERATION;
use crate::research::prompts;
use crate::research::retry::RetryPolicy;
use crate::types::{AnalystSpec, AppError, Message, Result};
use schemars::JsonSchema;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Shape requested from the model.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct PanelDraft {
    /// Comprehensive list of analysts with their roles and affiliations
    pub analysts: Vec<AnalystSpec>,
}

/// Drafts the analyst panel for a topic.
pub struct AnalystPanelGenerator {
    llm: Arc<dyn LLMClient>,
    retry: RetryPolicy,
}

impl AnalystPanelGenerator {
    pub fn new(llm: Arc<dyn LLMClient>, retry: RetryPolicy) -> Self {
        Self { llm, retry }
    }

    /// Generate exactly `count` analysts with unique names.
    ///
    /// On regeneration `feedback` carries the reviewer's comments; the
    /// previous panel is not shown to the model.
    pub async fn generate(
        &self,
        topic: &str,
        count: usize,
        feedback: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<AnalystSpec>> {
        let messages = vec![
            Message::system(prompts::analyst_instructions(topic, count, feedback)),
            Message::user("Generate the set of analysts."),
        ];
        let schema = serde_json::to_value(schemars::schema_for!(PanelDraft))
            .map_err(|e| AppError::Internal(format!("Failed to build panel schema: {}", e)))?;

        let value = self
            .retry
            .run(TEXT_GENERATION, cancel, || {
                self.llm.generate_structured(&messages, &schema)
            })
            .await
            .map_err(|e| AppError::PanelGeneration {
                expected: count,
                actual: 0,
                message: e.to_string(),
            })?;

        let draft: PanelDraft =
            serde_json::from_value(value).map_err(|e| AppError::PanelGeneration {
                expected: count,
                actual: 0,
                message: format!("malformed panel: {}", e),
            })?;

        validate_panel(draft.analysts, count)
    }
}

/// Normalise whitespace and enforce count, completeness and name uniqueness.
pub fn validate_panel(analysts: Vec<AnalystSpec>, count: usize) -> Result<Vec<AnalystSpec>> {
    let analysts: Vec<AnalystSpec> = analysts
        .into_iter()
        .map(|a| AnalystSpec {
            name: a.name.trim().to_string(),
            role: a.role.trim().to_string(),
            affiliation: a.affiliation.trim().to_string(),
            description: a.description.trim().to_string(),
        })
        .collect();

    let mismatch = |message: String| AppError::PanelGeneration {
        expected: count,
        actual: analysts.len(),
        message,
    };

    if analysts.len() != count {
        return Err(mismatch("panel size does not match the request".to_string()));
    }

    let mut names = HashSet::new();
    for analyst in &analysts {
        if analyst.name.is_empty() || analyst.role.is_empty() {
            return Err(mismatch("every analyst needs a name and a role".to_string()));
        }
        if !names.insert(analyst.name.to_lowercase()) {
            return Err(mismatch(format!("duplicate analyst name '{}'", analyst.name)));
        }
    }

    Ok(analysts)
}
