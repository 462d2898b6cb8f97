use crate::types::{AnalystSpec, ReportSection, Snippet, Turn};

/// First line of every interview, spoken on behalf of the expert.
pub fn interview_opening(topic: &str) -> String {
    format!("So you said you were writing an article on {}?", topic)
}

/// The phrase the expert uses to sign off once the analyst is done.
pub const CLOSE_OUT_PHRASE: &str = "Thank you so much for your help";

pub fn analyst_instructions(topic: &str, count: usize, feedback: Option<&str>) -> String {
    let feedback = feedback
        .map(|f| format!("\nEditorial feedback to incorporate:\n{}\n", f))
        .unwrap_or_default();

    format!(
        "You are tasked with creating a set of AI analyst personas.\n\n\
         1. Review the research topic: {topic}\n\
         2. Examine any editorial feedback that has been optionally provided to guide \
         creation of the analysts.{feedback}\n\
         3. Determine the most interesting themes based upon the topic and feedback.\n\
         4. Pick the top {count} themes.\n\
         5. Assign exactly one analyst to each theme. Give every analyst a distinct name.\n\n\
         Return exactly {count} analysts."
    )
}

pub fn question_instructions(analyst: &AnalystSpec) -> String {
    format!(
        "You are an analyst tasked with interviewing an expert to learn about a specific topic.\n\n\
         Your goal is to boil down to interesting and specific insights related to your topic:\n\
         1. Interesting: insights that people will find surprising or non-obvious.\n\
         2. Specific: insights that avoid generalities and include specific examples from the expert.\n\n\
         Here is your topic of focus and set of goals:\n{}\n\n\
         Begin by introducing yourself using a name that fits your persona, and then ask your question.\n\
         Continue to ask questions to drill down and refine your understanding of the topic.\n\
         When you are satisfied with your understanding, say that you have what you need.\n\
         Stay in character throughout your response. Reply with the next question only.",
        analyst.persona()
    )
}

pub fn answer_instructions(analyst: &AnalystSpec, evidence: &[Snippet]) -> String {
    format!(
        "You are an expert being interviewed by an analyst.\n\n\
         Here is the analyst's area of focus: {}\n\n\
         Your goal is to answer the question posed by the interviewer.\n\
         To answer the question, use this context:\n\n{}\n\n\
         When answering questions, follow these guidelines:\n\
         1. Use only the information provided in the context.\n\
         2. Do not introduce external information or make assumptions beyond what is explicitly stated in the context.\n\
         3. Cite the source of each claim as [source] using the source attribute of the document.\n\
         4. If the analyst says they have what they need, reply with a brief farewell that includes \
         the exact phrase \"{}\".",
        analyst.description,
        format_evidence(evidence),
        CLOSE_OUT_PHRASE
    )
}

pub fn format_evidence(evidence: &[Snippet]) -> String {
    if evidence.is_empty() {
        return "(no documents were found)".to_string();
    }
    evidence
        .iter()
        .map(|s| {
            format!(
                "<Document source=\"{}\" lookup=\"{}\">\n{}\n</Document>",
                s.source_id, s.lookup, s.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

pub fn section_instructions(topic: &str, analyst: &AnalystSpec) -> String {
    format!(
        "You are an expert technical writer.\n\n\
         Your task is to write a short, easily digestible section of a report on \"{}\" \
         based on an interview transcript.\n\
         Focus on the analyst's perspective: {}\n\n\
         1. Start the section with a title line of the form \"## <title>\".\n\
         2. Follow with a summary of at most 400 words that emphasises the most interesting \
         and novel insights from the interview.\n\
         3. Reference sources as [source] exactly as they appear in the transcript.\n\
         4. Do not include a list of sources; it is added separately.",
        topic, analyst.description
    )
}

pub fn format_transcript(turns: &[Turn]) -> String {
    turns
        .iter()
        .enumerate()
        .map(|(i, turn)| {
            let sources = turn
                .evidence
                .iter()
                .map(|s| format!("- [{}] {}", s.source_id, s.text.replace('\n', " ")))
                .collect::<Vec<_>>()
                .join("\n");
            format!(
                "Turn {}\nAnalyst: {}\nEvidence:\n{}\nExpert: {}",
                i + 1,
                turn.question,
                if sources.is_empty() { "(none)".to_string() } else { sources },
                turn.answer
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn format_sections(sections: &[ReportSection]) -> String {
    sections
        .iter()
        .map(|s| format!("## {}\n\n{}", s.title, s.body))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn introduction_instructions(topic: &str) -> String {
    format!(
        "You are a technical writer finishing a report on \"{}\". \
         Write the report introduction.\n\n\
         Preview the sections below in at most 100 words. Do not include any preamble, \
         do not cite sources, and start with a \"# \" title line for the whole report.",
        topic
    )
}

pub fn conclusion_instructions(topic: &str) -> String {
    format!(
        "You are a technical writer finishing a report on \"{}\". \
         Write the report conclusion.\n\n\
         Recap the sections below in at most 100 words. Do not include any preamble \
         and do not cite sources.",
        topic
    )
}
