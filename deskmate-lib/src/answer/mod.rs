//! Grounded answer generation
//!
//! Retrieved chunks and the user's question are stuffed into one fixed prompt.
//! The primary backend is asked first; if it fails for any reason the same
//! prompt goes to the fallback backend exactly once.
//!
//! ```text
//! question + chunks -> prompt -> primary --ok--> Answer { Primary }
//!                                   |
//!                                  err -> fallback --ok--> Answer { Fallback, primary_error }
//!                                               |
//!                                              err -> Error::Generation
//! ```

use tracing::{info, warn};

use crate::chunk::Chunk;
use crate::generate::GenerationBackend;
use crate::provider::BackendError;
use crate::{Error, Result};

/// Exact reply the model is told to give when the context lacks the answer.
pub const NOT_IN_CONTEXT: &str = "answer is not available in the context";

const PROMPT_TEMPLATE: &str = "\
Answer the question as detailed as possible from the provided context, make sure to provide all the details. \
If the answer is not in the provided context, reply with exactly \"{sentinel}\" and nothing else. \
Don't provide a wrong answer.

Context:
{context}

Question:
{question}

Answer:
";

/// Which backend produced an [`Answer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendUsed {
    Primary,
    Fallback,
}

/// A generated answer and its provenance
#[derive(Debug)]
pub struct Answer {
    pub text: String,
    pub backend_used: BackendUsed,
    /// Why the primary backend was skipped, when the fallback answered.
    pub primary_error: Option<BackendError>,
}

impl Answer {
    /// True when the model replied with the [`NOT_IN_CONTEXT`] sentinel,
    /// ignoring ASCII case, surrounding whitespace and a trailing period.
    #[must_use]
    pub fn is_not_in_context(&self) -> bool {
        self.text
            .trim()
            .trim_end_matches('.')
            .eq_ignore_ascii_case(NOT_IN_CONTEXT)
    }
}

/// Render the prompt for `question` over `context`, chunks in given order.
#[must_use]
pub fn build_prompt(question: &str, context: &[Chunk]) -> String {
    let context = context
        .iter()
        .map(|c| c.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    PROMPT_TEMPLATE
        .replace("{sentinel}", NOT_IN_CONTEXT)
        .replace("{context}", &context)
        .replace("{question}", question.trim())
}

/// Answer `question` from `context`, falling back once if `primary` fails.
///
/// # Errors
/// - [`Error::InvalidInput`] for an empty question
/// - [`Error::Generation`] when both backends fail; no text is returned
pub fn answer<P, F>(question: &str, context: &[Chunk], primary: &mut P, fallback: &mut F) -> Result<Answer>
where
    P: GenerationBackend + ?Sized,
    F: GenerationBackend + ?Sized,
{
    if question.trim().is_empty() {
        return Err(Error::InvalidInput("question must not be empty".to_string()));
    }

    let prompt = build_prompt(question, context);

    let primary_error = match primary.generate(&prompt) {
        Ok(text) => {
            info!(model = primary.model_name(), "answered with primary model");
            return Ok(Answer {
                text,
                backend_used: BackendUsed::Primary,
                primary_error: None,
            });
        }
        Err(e) => e,
    };

    warn!(
        model = primary.model_name(),
        fallback = fallback.model_name(),
        error = %primary_error,
        "primary model failed, trying fallback"
    );

    match fallback.generate(&prompt) {
        Ok(text) => {
            info!(model = fallback.model_name(), "answered with fallback model");
            Ok(Answer {
                text,
                backend_used: BackendUsed::Fallback,
                primary_error: Some(primary_error),
            })
        }
        Err(fallback_error) => Err(Error::Generation {
            primary: primary_error,
            fallback: fallback_error,
        }),
    }
}

/// Owns a primary and a fallback backend and answers questions with them
pub struct Orchestrator<P: GenerationBackend, F: GenerationBackend> {
    primary: P,
    fallback: F,
}

impl<P: GenerationBackend, F: GenerationBackend> Orchestrator<P, F> {
    #[must_use]
    pub fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }

    /// See [`answer`].
    pub fn answer(&mut self, question: &str, context: &[Chunk]) -> Result<Answer> {
        answer(question, context, &mut self.primary, &mut self.fallback)
    }

    #[must_use]
    pub fn primary(&self) -> &P {
        &self.primary
    }

    #[must_use]
    pub fn fallback(&self) -> &F {
        &self.fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkMetadata;
    use crate::testing::ScriptedBackend;

    fn chunks(texts: &[&str]) -> Vec<Chunk> {
        texts
            .iter()
            .map(|t| Chunk::new(*t, ChunkMetadata::default()))
            .collect()
    }

    /// Follows the prompt contract: answers only when the context mentions
    /// the subject of the question.
    struct ContextBoundBackend;

    impl GenerationBackend for ContextBoundBackend {
        fn generate(&mut self, prompt: &str) -> std::result::Result<String, BackendError> {
            let context = prompt
                .split("Context:\n")
                .nth(1)
                .and_then(|rest| rest.split("\n\nQuestion:").next())
                .unwrap_or_default();
            if context.contains("invoice") {
                Ok("The invoice is due on Friday.".to_string())
            } else {
                Ok(NOT_IN_CONTEXT.to_string())
            }
        }

        fn model_name(&self) -> &str {
            "context-bound"
        }
    }

    #[test]
    fn test_prompt_contains_context_in_order_and_question() {
        let prompt = build_prompt("  Who wrote it?  ", &chunks(&["first part", "second part"]));

        let first = prompt.find("first part").unwrap();
        let second = prompt.find("second part").unwrap();
        assert!(first < second);
        assert!(prompt.contains("first part\n\nsecond part"));
        assert!(prompt.contains("Question:\nWho wrote it?\n"));
        assert!(prompt.contains(NOT_IN_CONTEXT));
    }

    #[test]
    fn test_primary_success_skips_fallback() {
        let mut primary = ScriptedBackend::replying("primary", "42");
        let mut fallback = ScriptedBackend::replying("fallback", "unused");

        let answer = answer("What?", &chunks(&["ctx"]), &mut primary, &mut fallback).unwrap();

        assert_eq!(answer.text, "42");
        assert_eq!(answer.backend_used, BackendUsed::Primary);
        assert!(answer.primary_error.is_none());
        assert!(fallback.prompts.is_empty());
    }

    #[test]
    fn test_primary_failure_uses_fallback_once() {
        let mut primary = ScriptedBackend::failing("primary");
        let mut fallback = ScriptedBackend::replying("fallback", "from fallback");

        let answer = answer("What?", &chunks(&["ctx"]), &mut primary, &mut fallback).unwrap();

        assert_eq!(answer.text, "from fallback");
        assert_eq!(answer.backend_used, BackendUsed::Fallback);
        assert!(matches!(answer.primary_error, Some(BackendError::Unavailable(_))));
        assert_eq!(primary.prompts.len(), 1);
        assert_eq!(fallback.prompts.len(), 1);
        assert_eq!(primary.prompts[0], fallback.prompts[0]);
    }

    #[test]
    fn test_both_failing_is_generation_error() {
        let mut primary = ScriptedBackend::failing("primary");
        let mut fallback = ScriptedBackend::failing("fallback");

        let result = answer("What?", &chunks(&["ctx"]), &mut primary, &mut fallback);

        match result {
            Err(Error::Generation { primary, fallback }) => {
                assert!(primary.to_string().contains("primary is down"));
                assert!(fallback.to_string().contains("fallback is down"));
            }
            other => panic!("expected generation error, got {other:?}"),
        }
        assert_eq!(fallback.prompts.len(), 1);
    }

    #[test]
    fn test_irrelevant_context_yields_sentinel() {
        let mut orchestrator = Orchestrator::new(ContextBoundBackend, ScriptedBackend::failing("fallback"));

        let answer = orchestrator
            .answer("When is the invoice due?", &chunks(&["The office closes at six."]))
            .unwrap();

        assert_eq!(answer.text, NOT_IN_CONTEXT);
        assert!(answer.is_not_in_context());
    }

    #[test]
    fn test_relevant_context_yields_answer() {
        let mut orchestrator = Orchestrator::new(ContextBoundBackend, ScriptedBackend::failing("fallback"));

        let answer = orchestrator
            .answer("When is it due?", &chunks(&["The invoice is due Friday."]))
            .unwrap();

        assert!(!answer.is_not_in_context());
        assert_eq!(answer.backend_used, BackendUsed::Primary);
    }

    #[test]
    fn test_sentinel_match_ignores_case_and_period() {
        let reply = |text: &str| Answer {
            text: text.to_string(),
            backend_used: BackendUsed::Primary,
            primary_error: None,
        };

        assert!(reply("Answer is not available in the context.").is_not_in_context());
        assert!(reply("  answer is not available in the context\n").is_not_in_context());
        assert!(!reply("The answer is not available in the context of 2023.").is_not_in_context());
    }

    #[test]
    fn test_empty_question_is_rejected() {
        let mut primary = ScriptedBackend::replying("primary", "x");
        let mut fallback = ScriptedBackend::replying("fallback", "y");

        let result = answer("   ", &[], &mut primary, &mut fallback);

        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert!(primary.prompts.is_empty());
    }
}
