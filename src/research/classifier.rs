use crate::types::Turn;
use async_trait::async_trait;

/// What the router should do after a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteSignal {
    Continue,
    CloseOut,
}

/// Decides whether the latest turn ends the interview.
///
/// Kept behind a trait so a model-backed classifier can replace the phrase
/// matcher without touching the state machine.
#[async_trait]
pub trait CloseOutClassifier: Send + Sync {
    async fn classify(&self, turn: &Turn) -> RouteSignal;
}

/// Matches configured sign-off phrases in the answer, case-insensitively.
#[derive(Debug, Clone)]
pub struct SentinelPhraseClassifier {
    phrases: Vec<String>,
}

impl SentinelPhraseClassifier {
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            phrases: phrases
                .into_iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }
}

impl Default for SentinelPhraseClassifier {
    fn default() -> Self {
        Self::new(["thank you so much for your help"])
    }
}

#[async_trait]
impl CloseOutClassifier for SentinelPhraseClassifier {
    async fn classify(&self, turn: &Turn) -> RouteSignal {
        let answer = turn.answer.to_lowercase();
        if self.phrases.iter().any(|phrase| answer.contains(phrase)) {
            RouteSignal::CloseOut
        } else {
            RouteSignal::Continue
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(answer: &str) -> Turn {
        Turn {
            question: "What changed?".to_string(),
            evidence: vec![],
            answer: answer.to_string(),
        }
    }

    #[tokio::test]
    async fn test_default_phrase_matches_case_insensitively() {
        let classifier = SentinelPhraseClassifier::default();
        assert_eq!(
            classifier
                .classify(&turn("That covers it. Thank You So Much For Your Help!"))
                .await,
            RouteSignal::CloseOut
        );
        assert_eq!(
            classifier.classify(&turn("There is more to discuss.")).await,
            RouteSignal::Continue
        );
    }

    #[tokio::test]
    async fn test_blank_phrases_are_ignored() {
        let classifier = SentinelPhraseClassifier::new(["", "  ", "goodbye"]);
        assert_eq!(
            classifier.classify(&turn("anything")).await,
            RouteSignal::Continue
        );
        assert_eq!(
            classifier.classify(&turn("OK, goodbye.")).await,
            RouteSignal::CloseOut
        );
    }
}
