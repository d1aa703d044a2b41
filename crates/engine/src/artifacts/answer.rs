//! Question answering.

use std::sync::Arc;

use lectern_core::{Anchor, Answer, Query, Result};
use lectern_index::Index;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::{GroundingPipeline, Task};
use crate::generation::{CITATION_SHAPE, GROUNDING_RULES, OutputSchema, TypedSchema, non_blank};

/// How long and how shaped the answer should be.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum AnswerMode {
    #[default]
    Concise,
    Detailed,
    /// A learner-supplied instruction, e.g. "explain like I'm new to biology"
    Custom(String),
}

impl AnswerMode {
    fn guardrails(&self) -> String {
        let lead = match self {
            Self::Concise => {
                "CONCISE MODE: answer in at most 2-3 sentences. No preamble, no elaboration beyond the question."
                    .to_string()
            }
            Self::Detailed => {
                "DETAILED MODE: explain thoroughly, with context, using short paragraphs or bullet points."
                    .to_string()
            }
            Self::Custom(instruction) if !instruction.trim().is_empty() => {
                format!("CRITICAL INSTRUCTION: {}", instruction.trim())
            }
            Self::Custom(_) => return Self::Concise.guardrails(),
        };
        format!("{lead}\n\n{GROUNDING_RULES}")
    }
}

/// Citations ride along in the raw value; the verifier collects them.
#[derive(Debug, Deserialize)]
pub(super) struct AnswerWire {
    pub(super) answer: String,
}

pub(super) fn schema() -> Arc<dyn OutputSchema> {
    Arc::new(
        TypedSchema::<AnswerWire>::new(
            "answer",
            format!(r#"{{"answer": "<the answer>", "citations": [{CITATION_SHAPE}]}}"#),
        )
        .with_check(|a| non_blank("answer", &a.answer)),
    )
}

/// Answer a learner's question from the lecture, optionally pinned to a moment or slide.
pub async fn answer_question(
    pipeline: &GroundingPipeline,
    index: &Index,
    question: &str,
    anchor: Option<Anchor>,
    mode: &AnswerMode,
    cancel: &CancellationToken,
) -> Result<Answer> {
    let mut query = Query::new(question, pipeline.token_budget());
    if let Some(anchor) = anchor {
        query = query.with_anchor(anchor);
    }

    let task = Task::new(
        "answer",
        mode.guardrails(),
        format!(
            "Answer the learner's question using only the lecture context.\n\nQuestion: {}",
            question.trim()
        ),
    );
    let grounded = pipeline
        .ground::<AnswerWire, _>(index, query, task, |_| schema(), cancel)
        .await?;

    Ok(Answer {
        question: question.to_string(),
        text: grounded.value.answer,
        citations: grounded.citations,
        confidence: grounded.confidence,
        attempts: grounded.attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::fixtures::{photosynthesis, pipeline};
    use crate::test_helpers::{ScriptedService, Step};
    use lectern_core::{Confidence, Error};

    #[tokio::test]
    async fn grounded_answer_cites_overview_slide() {
        let service = Arc::new(ScriptedService::new(vec![Step::text(
            r#"{"answer": "Light energy into chemical energy.",
                "citations": [{"start": "00:00", "end": "00:30", "slide": 1, "claim": "converts light"}]}"#,
        )]));
        let (pipeline, _) = pipeline(service.clone());
        let idx = photosynthesis();

        let answer = answer_question(
            &pipeline,
            &idx,
            "What does photosynthesis convert?",
            None,
            &AnswerMode::Concise,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(answer.confidence, Confidence::Grounded);
        assert_eq!(answer.attempts, 1);
        assert_eq!(answer.citations[0].slide, Some(1));
        let prompt = &service.prompts()[0];
        assert!(prompt.system.starts_with("CONCISE MODE"));
        assert!(prompt.user.contains("photosynthesis converts light"));
        assert!(prompt.user.contains("## Slide 1: Photosynthesis Overview"));
    }

    #[tokio::test]
    async fn unsupported_citation_downgrades_but_returns() {
        let service = Arc::new(ScriptedService::new(vec![Step::text(
            r#"{"answer": "Rubisco.", "citations": [{"start": "10:00", "end": "10:30"}]}"#,
        )]));
        let (pipeline, _) = pipeline(service);

        let answer = answer_question(
            &pipeline,
            &photosynthesis(),
            "Which enzyme fixes carbon?",
            Some(Anchor::Slide { index: 2 }),
            &AnswerMode::Detailed,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(answer.confidence, Confidence::Low { grounded: 0, total: 1 });
        assert_eq!(answer.text, "Rubisco.");
    }

    #[tokio::test]
    async fn answer_without_citations_is_low_confidence() {
        let service = Arc::new(ScriptedService::new(vec![Step::text(r#"{"answer": "Sugar."}"#)]));
        let (pipeline, _) = pipeline(service);
        let answer = answer_question(
            &pipeline,
            &photosynthesis(),
            "What does the calvin cycle make?",
            None,
            &AnswerMode::Custom("one word".into()),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(!answer.confidence.is_grounded());
    }

    #[tokio::test]
    async fn empty_answer_is_retried_then_exhausted() {
        let service = Arc::new(ScriptedService::repeating(Step::text(r#"{"answer": " "}"#)));
        let (pipeline, _) = pipeline(service.clone());
        let err = answer_question(
            &pipeline,
            &photosynthesis(),
            "anything",
            None,
            &AnswerMode::Concise,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::GenerationExhausted { attempts: 3, .. }));
        assert_eq!(service.call_count(), 3);
    }

    #[test]
    fn blank_custom_mode_falls_back_to_concise() {
        assert_eq!(
            AnswerMode::Custom("  ".into()).guardrails(),
            AnswerMode::Concise.guardrails()
        );
        assert!(AnswerMode::Custom("use analogies".into())
            .guardrails()
            .starts_with("CRITICAL INSTRUCTION: use analogies"));
    }
}
