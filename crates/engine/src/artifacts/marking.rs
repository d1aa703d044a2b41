//! Marking of learner answers.
//!
//! Fill-in-the-blank answers are marked in batch. Exact matches (ignoring
//! case and surrounding whitespace) are marked locally. The rest go to the
//! generation service in a single call with no lecture context, and the
//! response must carry exactly one verdict per item.
//!
//! Debate answers are judged on two counts: whether the learner backed the
//! right person, and whether their argument holds up on its own.

use std::collections::HashSet;
use std::sync::Arc;

use lectern_core::{DebateSide, Error, QuizBody, Result};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::generation::{GenerationRequest, Orchestrator, OutputSchema, TypedSchema, non_blank};

/// One learner answer and the answer it should match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkingItem {
    pub given: String,
    pub expected: String,
}

impl MarkingItem {
    pub fn new(given: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            given: given.into(),
            expected: expected.into(),
        }
    }

    fn exact_match(&self) -> bool {
        normalize(&self.given) == normalize(&self.expected)
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

#[derive(Debug, Deserialize)]
struct Verdict {
    /// 1-based position in the batch sent to the service
    index: usize,
    correct: bool,
}

const MARKING_RULES: &str = "\
You mark short answers. Judge meaning, not wording.
- Ignore minor spelling and capitalization differences.
- Accept different notation when it means the same thing.
- Accept synonyms and equivalent expressions.
- Ignore filler words.
Respond with a single JSON array and nothing else.";

fn schema(expected: usize) -> Arc<dyn OutputSchema> {
    Arc::new(
        TypedSchema::<Vec<Verdict>>::new(
            "marking",
            format!(
                r#"[{{"index": 1, "correct": true}}, ...] (exactly {expected} entries, one per index 1..{expected})"#
            ),
        )
        .with_check(move |verdicts| {
            if verdicts.len() != expected {
                return Err(format!(
                    "expected {expected} verdicts, got {}",
                    verdicts.len()
                ));
            }
            let mut seen = HashSet::new();
            for v in verdicts {
                if v.index == 0 || v.index > expected {
                    return Err(format!("verdict index {} is out of range 1..{expected}", v.index));
                }
                if !seen.insert(v.index) {
                    return Err(format!("verdict index {} appears twice", v.index));
                }
            }
            Ok(())
        }),
    )
}

/// Mark every item, returning one verdict per item in input order.
pub async fn mark_answers(
    orchestrator: &Orchestrator,
    items: &[MarkingItem],
    cancel: &CancellationToken,
) -> Result<Vec<bool>> {
    let mut verdicts: Vec<bool> = items.iter().map(MarkingItem::exact_match).collect();
    let pending: Vec<usize> = (0..items.len()).filter(|&i| !verdicts[i]).collect();

    debug!(
        total = items.len(),
        exact = items.len() - pending.len(),
        "Marking answers"
    );
    if pending.is_empty() {
        return Ok(verdicts);
    }

    let comparisons = pending
        .iter()
        .enumerate()
        .map(|(n, &i)| {
            format!(
                "{}. User: \"{}\" | Correct: \"{}\"",
                n + 1,
                items[i].given.trim(),
                items[i].expected.trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    let instructions = format!(
        "Evaluate these {} fill-in-the-blank answers. For each, decide whether the user's answer \
         means essentially the same as the correct answer.\n\n{comparisons}",
        pending.len()
    );

    let request = GenerationRequest::new("marking", MARKING_RULES, instructions, schema(pending.len()));
    let result = orchestrator.generate(&request, cancel).await?;
    let parsed: Vec<Verdict> = match result.parsed {
        Some(value) => serde_json::from_value(value)?,
        None => Vec::new(),
    };

    for verdict in parsed {
        if let Some(&i) = pending.get(verdict.index - 1) {
            verdicts[i] = verdict.correct;
        }
    }
    Ok(verdicts)
}

/// The two judgements made on a debate answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebateVerdict {
    /// The learner sided with the person the lecture supports
    pub person: bool,
    /// The learner's reasoning is specific and sound
    pub argument: bool,
}

impl DebateVerdict {
    pub fn is_correct(&self) -> bool {
        self.person && self.argument
    }
}

const DEBATE_RULES: &str = "\
You mark a learner's answer to a debate question. Give two independent verdicts.
PERSON: true only if the learner clearly backs the correct person (A or B).
ARGUMENT: true only if the learner explains WHY with specific, technical reasoning \
of roughly 20 words or more. Restating a position, circular reasoning, or vague \
statements fail. The argument need not match the model argument word for word.
When unsure, mark false.
Respond with a single JSON object and nothing else.";

fn debate_schema() -> Arc<dyn OutputSchema> {
    Arc::new(TypedSchema::<DebateVerdict>::new(
        "debate_marking",
        r#"{"person": true, "argument": false}"#,
    ))
}

fn side_label(side: DebateSide) -> &'static str {
    match side {
        DebateSide::A => "Person A",
        DebateSide::B => "Person B",
    }
}

/// Mark a learner's answer to a debate item.
///
/// A blank answer fails both counts without a service call. Any other item
/// kind is an [`Error::InvalidRequest`].
pub async fn mark_debate(
    orchestrator: &Orchestrator,
    item: &QuizBody,
    answer: &str,
    cancel: &CancellationToken,
) -> Result<DebateVerdict> {
    let QuizBody::Debate {
        topic,
        person_a,
        person_b,
        correct,
        model_argument,
    } = item
    else {
        return Err(Error::InvalidRequest(format!(
            "'{}' items cannot be marked as a debate",
            item.kind()
        )));
    };
    if non_blank("answer", answer).is_err() {
        debug!("Blank debate answer marked without the service");
        return Ok(DebateVerdict::default());
    }

    let instructions = format!(
        "Topic: {}\nPerson A: {}\nPerson B: {}\n\
         Correct person: {}\nModel argument: {}\n\n\
         Learner's answer:\n\"{}\"",
        topic.trim(),
        person_a.trim(),
        person_b.trim(),
        side_label(*correct),
        model_argument.trim(),
        answer.trim()
    );
    let request = GenerationRequest::new("debate_marking", DEBATE_RULES, instructions, debate_schema());
    let result = orchestrator.generate(&request, cancel).await?;
    match result.parsed {
        Some(value) => Ok(serde_json::from_value(value)?),
        None => Err(Error::Internal("schema-valid result without a parsed value".into())),
    }
}
