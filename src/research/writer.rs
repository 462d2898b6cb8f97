//! Report writing: one section per completed interview, then the
//! introduction and conclusion, then assembly in panel order.

use crate::llm::LLMClient;
use crate::llm::client::TEXT_GENERATION;
use crate::research::prompts;
use crate::research::retry::RetryPolicy;
use crate::types::{
    AnalystSpec, CapabilityResult, FinalReport, InterviewTranscript, Message, ReportSection,
    dedup_sources,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct SectionWriter {
    llm: Arc<dyn LLMClient>,
    retry: RetryPolicy,
}

impl SectionWriter {
    pub fn new(llm: Arc<dyn LLMClient>, retry: RetryPolicy) -> Self {
        Self { llm, retry }
    }

    pub async fn write_section(
        &self,
        topic: &str,
        transcript: &InterviewTranscript,
        cancel: &CancellationToken,
    ) -> CapabilityResult<ReportSection> {
        let messages = vec![
            Message::system(prompts::section_instructions(topic, &transcript.analyst)),
            Message::user(format!(
                "Interview transcript:\n\n{}",
                prompts::format_transcript(&transcript.turns)
            )),
        ];

        let text = self
            .retry
            .run(TEXT_GENERATION, cancel, || self.llm.generate(&messages))
            .await?;
        let (title, body) = split_title(&text, &transcript.analyst);

        Ok(ReportSection {
            analyst: transcript.analyst.name.clone(),
            title,
            body,
            citations: transcript.citations(),
        })
    }

    pub async fn write_introduction(
        &self,
        topic: &str,
        sections: &[ReportSection],
        cancel: &CancellationToken,
    ) -> CapabilityResult<String> {
        self.synthesize(prompts::introduction_instructions(topic), sections, cancel)
            .await
    }

    pub async fn write_conclusion(
        &self,
        topic: &str,
        sections: &[ReportSection],
        cancel: &CancellationToken,
    ) -> CapabilityResult<String> {
        self.synthesize(prompts::conclusion_instructions(topic), sections, cancel)
            .await
    }

    async fn synthesize(
        &self,
        instructions: String,
        sections: &[ReportSection],
        cancel: &CancellationToken,
    ) -> CapabilityResult<String> {
        let messages = vec![
            Message::system(instructions),
            Message::user(format!(
                "Here are the sections:\n\n{}",
                prompts::format_sections(sections)
            )),
        ];

        self.retry
            .run(TEXT_GENERATION, cancel, || self.llm.generate(&messages))
            .await
            .map(|text| text.trim().to_string())
    }
}

/// Take a leading `## Title` line as the section title, falling back to the
/// analyst's role.
fn split_title(text: &str, analyst: &AnalystSpec) -> (String, String) {
    let trimmed = text.trim();
    let (first, rest) = trimmed.split_once('\n').unwrap_or((trimmed, ""));

    match first.trim().strip_prefix('#') {
        Some(heading) => {
            let title = heading.trim_start_matches('#').trim();
            let title = if title.is_empty() {
                analyst.role.clone()
            } else {
                title.to_string()
            };
            (title, rest.trim().to_string())
        }
        None => (analyst.role.clone(), trimmed.to_string()),
    }
}

/// Assemble the final report.
///
/// Sections are ordered by `panel`, never by completion order; analysts
/// without a section are listed in `omitted_analysts`.
pub fn assemble_report(
    topic: &str,
    panel: &[AnalystSpec],
    mut sections: HashMap<String, ReportSection>,
    introduction: String,
    conclusion: String,
) -> FinalReport {
    let mut ordered = Vec::with_capacity(sections.len());
    let mut omitted = Vec::new();

    for analyst in panel {
        match sections.remove(&analyst.name) {
            Some(section) => ordered.push(section),
            None => omitted.push(analyst.name.clone()),
        }
    }

    let citations = dedup_sources(
        ordered
            .iter()
            .flat_map(|s| s.citations.iter().map(String::as_str)),
    );

    FinalReport {
        topic: topic.to_string(),
        introduction,
        sections: ordered,
        conclusion,
        citations,
        omitted_analysts: omitted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyst(name: &str) -> AnalystSpec {
        AnalystSpec {
            name: name.to_string(),
            role: format!("{} role", name),
            affiliation: "Org".to_string(),
            description: "Focus".to_string(),
        }
    }

    fn section(name: &str, citations: &[&str]) -> ReportSection {
        ReportSection {
            analyst: name.to_string(),
            title: format!("{} title", name),
            body: "body".to_string(),
            citations: citations.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn test_split_title() {
        let a = analyst("Ada");
        assert_eq!(
            split_title("## Engines\n\nThe analytical engine...", &a),
            ("Engines".to_string(), "The analytical engine...".to_string())
        );
        assert_eq!(
            split_title("No heading here", &a),
            ("Ada role".to_string(), "No heading here".to_string())
        );
        assert_eq!(split_title("##\nbody", &a).0, "Ada role");
    }

    #[test]
    fn test_assembly_follows_panel_order() {
        let panel = vec![analyst("A"), analyst("B"), analyst("C")];
        let sections: HashMap<_, _> = [
            ("C".to_string(), section("C", &["s3", "s1"])),
            ("A".to_string(), section("A", &["s1", "s2"])),
        ]
        .into_iter()
        .collect();

        let report = assemble_report("X", &panel, sections, "intro".into(), "outro".into());

        let order: Vec<_> = report.sections.iter().map(|s| s.analyst.as_str()).collect();
        assert_eq!(order, vec!["A", "C"]);
        assert_eq!(report.omitted_analysts, vec!["B"]);
        assert_eq!(report.citations, vec!["s1", "s2", "s3"]);
    }
}
