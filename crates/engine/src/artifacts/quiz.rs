//! Quiz generation — ten item formats behind one tagged body type.
//!
//! Each kind pairs a schema description with a validator. The generator asks
//! for exactly one item of one kind per window, `count` windows in all, and
//! rejects items of any other kind, so a malformed item never becomes a
//! [`QuizItem`]. A quiz can also be drawn from an existing flashcard deck,
//! one item per card.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use lectern_core::{
    Anchor, Confidence, Flashcard, Generated, Query, QuizBody, QuizItem, QuizKind, Result,
};
use lectern_index::Index;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{ConceptUnit, GroundingPipeline, Task, cited_span, gather, windows};
use crate::generation::{CITATION_SHAPE, GROUNDING_RULES, OutputSchema, TypedSchema, non_blank};

/// Marker a fill-in-the-blank text uses for each blank.
pub const BLANK: &str = "___";

#[derive(Debug, Deserialize)]
struct QuizWire {
    item: QuizBody,
    #[serde(default)]
    explanation: String,
}

/// The JSON shape of one item body, as shown to the generator.
pub fn body_shape(kind: QuizKind) -> &'static str {
    match kind {
        QuizKind::MultipleChoice => {
            r#"{"type": "multiple_choice", "question": "...", "options": ["...", "..."], "correct_index": 0}"#
        }
        QuizKind::MultipleSelect => {
            r#"{"type": "multiple_select", "question": "...", "options": ["...", "..."], "correct_indices": [0, 2]}"#
        }
        QuizKind::TrueFalse => r#"{"type": "true_false", "statement": "...", "answer": true}"#,
        QuizKind::FillInBlank => {
            r#"{"type": "fill_in_blank", "text": "The ___ fixes carbon.", "answers": ["..."]}"#
        }
        QuizKind::ShortAnswer => {
            r#"{"type": "short_answer", "question": "...", "model_answer": "..."}"#
        }
        QuizKind::Matching => {
            r#"{"type": "matching", "prompt": "...", "left": ["..."], "right": ["..."], "pairs": [[0, 1], [1, 0]]}"#
        }
        QuizKind::Ordering => {
            r#"{"type": "ordering", "prompt": "...", "items": ["first", "second", "third"]}"#
        }
        QuizKind::Categorization => {
            r#"{"type": "categorization", "prompt": "...", "categories": ["...", "..."], "items": [{"text": "...", "category": "..."}]}"#
        }
        QuizKind::Debate => {
            r#"{"type": "debate", "topic": "...", "person_a": "<position>", "person_b": "<position>", "correct": "A", "model_argument": "..."}"#
        }
        QuizKind::Numeric => {
            r#"{"type": "numeric", "question": "...", "answer": 3.5, "tolerance": 0.1, "unit": "mol"}"#
        }
    }
}

fn kind_guidance(kind: QuizKind) -> &'static str {
    match kind {
        QuizKind::MultipleChoice => "Give at least two options with exactly one correct answer.",
        QuizKind::MultipleSelect => "Give at least two options; one or more may be correct.",
        QuizKind::TrueFalse => "Write one statement that is clearly true or clearly false.",
        QuizKind::FillInBlank => "Mark each blank with ___ and give one answer per blank, in order.",
        QuizKind::ShortAnswer => "Ask a question answerable in one or two sentences.",
        QuizKind::Matching => "Give two equal-length lists; pairs map every left index to one right index.",
        QuizKind::Ordering => "List the steps or events in their correct order; they will be shuffled for the learner.",
        QuizKind::Categorization => "Declare the categories and assign every item to one of them.",
        QuizKind::Debate => "Present two people holding different positions; name whose position the lecture supports.",
        QuizKind::Numeric => "Ask for a number the lecture lets the learner compute or recall.",
    }
}

/// Check an item body against the rules of its kind.
pub fn validate_body(body: &QuizBody) -> std::result::Result<(), String> {
    match body {
        QuizBody::MultipleChoice {
            question,
            options,
            correct_index,
        } => {
            non_blank("question", question)?;
            check_options(options)?;
            if *correct_index >= options.len() {
                return Err(format!(
                    "correct_index {correct_index} is out of range for {} options",
                    options.len()
                ));
            }
            Ok(())
        }
        QuizBody::MultipleSelect {
            question,
            options,
            correct_indices,
        } => {
            non_blank("question", question)?;
            check_options(options)?;
            if correct_indices.is_empty() {
                return Err("correct_indices must name at least one option".into());
            }
            let mut seen = HashSet::new();
            for &i in correct_indices {
                if i >= options.len() {
                    return Err(format!("correct index {i} is out of range"));
                }
                if !seen.insert(i) {
                    return Err(format!("correct index {i} is repeated"));
                }
            }
            Ok(())
        }
        QuizBody::TrueFalse { statement, .. } => non_blank("statement", statement),
        QuizBody::FillInBlank { text, answers } => {
            let blanks = text.matches(BLANK).count();
            if blanks == 0 {
                return Err(format!("text must contain at least one blank ({BLANK})"));
            }
            if blanks != answers.len() {
                return Err(format!(
                    "text has {blanks} blank(s) but {} answer(s)",
                    answers.len()
                ));
            }
            answers.iter().try_for_each(|a| non_blank("answers", a))
        }
        QuizBody::ShortAnswer {
            question,
            model_answer,
        } => {
            non_blank("question", question)?;
            non_blank("model_answer", model_answer)
        }
        QuizBody::Matching {
            prompt,
            left,
            right,
            pairs,
        } => {
            non_blank("prompt", prompt)?;
            if left.len() != right.len() {
                return Err(format!(
                    "left has {} entries but right has {}",
                    left.len(),
                    right.len()
                ));
            }
            if left.len() < 2 {
                return Err("matching needs at least two pairs".into());
            }
            if pairs.len() != left.len() {
                return Err(format!(
                    "expected {} pairs, got {}",
                    left.len(),
                    pairs.len()
                ));
            }
            let (mut lefts, mut rights) = (HashSet::new(), HashSet::new());
            for &[l, r] in pairs {
                if l >= left.len() || r >= right.len() {
                    return Err(format!("pair [{l}, {r}] is out of range"));
                }
                if !lefts.insert(l) || !rights.insert(r) {
                    return Err(format!("pair [{l}, {r}] reuses an entry; pairs must be one-to-one"));
                }
            }
            Ok(())
        }
        QuizBody::Ordering { prompt, items } => {
            non_blank("prompt", prompt)?;
            if items.len() < 2 {
                return Err("ordering needs at least two items".into());
            }
            check_unique("items", items)
        }
        QuizBody::Categorization {
            prompt,
            categories,
            items,
        } => {
            non_blank("prompt", prompt)?;
            if categories.len() < 2 {
                return Err("categorization needs at least two categories".into());
            }
            check_unique("categories", categories)?;
            if items.is_empty() {
                return Err("categorization needs at least one item".into());
            }
            for item in items {
                non_blank("items.text", &item.text)?;
                if !categories.contains(&item.category) {
                    return Err(format!(
                        "item '{}' is assigned to undeclared category '{}'",
                        item.text, item.category
                    ));
                }
            }
            Ok(())
        }
        QuizBody::Debate {
            topic,
            person_a,
            person_b,
            model_argument,
            ..
        } => {
            non_blank("topic", topic)?;
            non_blank("person_a", person_a)?;
            non_blank("person_b", person_b)?;
            non_blank("model_argument", model_argument)
        }
        QuizBody::Numeric {
            question,
            answer,
            tolerance,
            ..
        } => {
            non_blank("question", question)?;
            if !answer.is_finite() {
                return Err("answer must be a finite number".into());
            }
            if !tolerance.is_finite() || *tolerance < 0.0 {
                return Err("tolerance must be a non-negative number".into());
            }
            Ok(())
        }
    }
}

fn check_options(options: &[String]) -> std::result::Result<(), String> {
    if options.len() < 2 {
        return Err("at least two options are required".into());
    }
    options.iter().try_for_each(|o| non_blank("options", o))?;
    check_unique("options", options)
}

fn check_unique(field: &str, values: &[String]) -> std::result::Result<(), String> {
    let mut seen = HashSet::new();
    for v in values {
        if !seen.insert(v.trim().to_lowercase()) {
            return Err(format!("'{field}' contains duplicate entry '{v}'"));
        }
    }
    Ok(())
}

/// The schema for one item of `kind`.
pub fn schema(kind: QuizKind) -> Arc<dyn OutputSchema> {
    Arc::new(
        TypedSchema::<QuizWire>::new(
            format!("quiz:{kind}"),
            format!(
                r#"{{"item": {}, "explanation": "<why the answer is right>", "citations": [{CITATION_SHAPE}]}}"#,
                body_shape(kind)
            ),
        )
        .with_check(move |wire| {
            if wire.item.kind() != kind {
                return Err(format!(
                    "expected an item of type '{kind}', got '{}'",
                    wire.item.kind()
                ));
            }
            validate_body(&wire.item)
        }),
    )
}

async fn grounded_item(
    pipeline: &GroundingPipeline,
    index: &Index,
    query: Query,
    kind: QuizKind,
    instructions: String,
    cancel: &CancellationToken,
) -> Result<Vec<QuizItem>> {
    let task = Task::new(format!("quiz:{kind}"), GROUNDING_RULES, instructions);
    let grounded = pipeline
        .ground::<QuizWire, _>(index, query, task, |_| schema(kind), cancel)
        .await?;
    Ok(vec![QuizItem {
        body: grounded.value.item,
        explanation: grounded.value.explanation,
        citations: grounded.citations,
        confidence: grounded.confidence,
    }])
}

async fn item_for_unit(
    pipeline: &GroundingPipeline,
    index: &Index,
    unit: &ConceptUnit,
    kind: QuizKind,
    cancel: &CancellationToken,
) -> Result<Vec<QuizItem>> {
    let mut instructions = format!(
        "Write one '{kind}' quiz item testing the lecture material below (topic: {}). {}\n\
         Explain the answer and cite the segments it comes from.",
        unit.topic,
        kind_guidance(kind)
    );
    if unit.pass > 0 {
        instructions.push_str(&format!(
            "\nThis is question {} on this part of the lecture. Test a different fact or idea \
             than a first question on it would.",
            unit.pass + 1
        ));
    }
    let query = unit.query(pipeline.token_budget());
    grounded_item(pipeline, index, query, kind, instructions, cancel).await
}

async fn item_for_card(
    pipeline: &GroundingPipeline,
    index: &Index,
    ordinal: usize,
    card: &Flashcard,
    kind: QuizKind,
    cancel: &CancellationToken,
) -> Result<Vec<QuizItem>> {
    let instructions = format!(
        "Turn this flashcard into one '{kind}' quiz item. {}\n\
         Keep the fact the card tests; check it against the lecture material below, \
         explain the answer and cite the segments it comes from.\n\n\
         Flashcard {}:\nQuestion: {}\nAnswer: {}",
        kind_guidance(kind),
        ordinal + 1,
        card.front.trim(),
        card.back.trim()
    );
    let mut query = Query::new(format!("{} {}", card.front, card.back), pipeline.token_budget());
    if let Some(span) = cited_span(&card.citations) {
        query = query.with_anchor(Anchor::Range {
            start: span.start,
            end: span.end,
        });
    }
    grounded_item(pipeline, index, query, kind, instructions, cancel).await
}

/// Generate one quiz item per flashcard, cycling through `kinds`.
///
/// Each item is anchored on the span its card cites, so the quiz tests the
/// same lecture moments the deck does.
pub async fn quiz_from_flashcards(
    pipeline: &GroundingPipeline,
    index: &Index,
    cards: &[Flashcard],
    kinds: &[QuizKind],
    cancel: &CancellationToken,
) -> Result<Generated<QuizItem>> {
    let kinds: &[QuizKind] = if kinds.is_empty() { &QuizKind::ALL } else { kinds };

    info!(lecture_id = %index.id(), cards = cards.len(), "Generating quiz from flashcards");
    let outcomes = join_all(cards.iter().enumerate().map(|(i, card)| {
        item_for_card(pipeline, index, i, card, kinds[i % kinds.len()], cancel)
    }))
    .await;
    Ok(gather("quiz", outcomes))
}

/// Generate `count` quiz items, cycling through `kinds`.
///
/// An empty `kinds` selection means every kind.
pub async fn generate_quiz(
    pipeline: &GroundingPipeline,
    index: &Index,
    kinds: &[QuizKind],
    count: usize,
    cancel: &CancellationToken,
) -> Result<Generated<QuizItem>> {
    let kinds: &[QuizKind] = if kinds.is_empty() { &QuizKind::ALL } else { kinds };
    let units = windows(index, count);

    info!(lecture_id = %index.id(), items = units.len(), "Generating quiz");
    let outcomes = join_all(units.iter().enumerate().map(|(i, unit)| {
        item_for_unit(pipeline, index, unit, kinds[i % kinds.len()], cancel)
    }))
    .await;

    let generated = gather("quiz", outcomes);
    let grounded = generated
        .items
        .iter()
        .filter(|i| i.confidence == Confidence::Grounded)
        .count();
    info!(
        lecture_id = %index.id(),
        items = generated.items.len(),
        grounded,
        failures = generated.failures.len(),
        "Quiz generated"
    );
    Ok(generated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::fixtures::{photosynthesis, pipeline};
    use crate::test_helpers::{ScriptedService, Step};
    use lectern_core::{
        CategorizedItem, Citation, DebateSide, Error, GroundingStatus, TimeSpan, VerifiedCitation,
    };
    use serde_json::json;

    fn matching(left: usize, right: usize, pairs: Vec<[usize; 2]>) -> QuizBody {
        QuizBody::Matching {
            prompt: "Match each term".into(),
            left: (0..left).map(|i| format!("l{i}")).collect(),
            right: (0..right).map(|i| format!("r{i}")).collect(),
            pairs,
        }
    }

    #[test]
    fn matching_rejects_mismatched_lengths() {
        let err = validate_body(&matching(3, 2, vec![[0, 0], [1, 1]])).unwrap_err();
        assert!(err.contains("left has 3 entries but right has 2"));
    }

    #[test]
    fn matching_requires_bijection() {
        assert!(validate_body(&matching(2, 2, vec![[0, 1], [1, 0]])).is_ok());
        assert!(validate_body(&matching(2, 2, vec![[0, 1], [1, 1]])).is_err());
        assert!(validate_body(&matching(2, 2, vec![[0, 1]])).is_err());
        assert!(validate_body(&matching(2, 2, vec![[0, 1], [1, 5]])).is_err());
    }

    #[test]
    fn multiple_choice_rules() {
        let mc = |options: Vec<&str>, correct_index| QuizBody::MultipleChoice {
            question: "Which pigment absorbs light?".into(),
            options: options.into_iter().map(String::from).collect(),
            correct_index,
        };
        assert!(validate_body(&mc(vec!["chlorophyll", "keratin"], 0)).is_ok());
        assert!(validate_body(&mc(vec!["chlorophyll"], 0)).is_err());
        assert!(validate_body(&mc(vec!["a", "b"], 2)).is_err());
        assert!(validate_body(&mc(vec!["a", "A"], 0)).is_err());
    }

    #[test]
    fn multiple_select_rules() {
        let ms = |correct_indices: Vec<usize>| QuizBody::MultipleSelect {
            question: "Which are products?".into(),
            options: vec!["oxygen".into(), "glucose".into(), "nitrogen".into()],
            correct_indices,
        };
        assert!(validate_body(&ms(vec![0, 1])).is_ok());
        assert!(validate_body(&ms(vec![])).is_err());
        assert!(validate_body(&ms(vec![1, 1])).is_err());
        assert!(validate_body(&ms(vec![3])).is_err());
    }

    #[test]
    fn fill_in_blank_counts_blanks() {
        let fib = |text: &str, answers: Vec<&str>| QuizBody::FillInBlank {
            text: text.into(),
            answers: answers.into_iter().map(String::from).collect(),
        };
        assert!(validate_body(&fib("The ___ fixes ___.", vec!["enzyme rubisco", "carbon"])).is_ok());
        assert!(validate_body(&fib("The ___ fixes carbon.", vec!["rubisco", "extra"])).is_err());
        assert!(validate_body(&fib("No blank here.", vec![])).is_err());
    }

    #[test]
    fn ordering_and_categorization_rules() {
        let ordering = QuizBody::Ordering {
            prompt: "Order the stages".into(),
            items: vec!["fixation".into(), "reduction".into(), "fixation".into()],
        };
        assert!(validate_body(&ordering).unwrap_err().contains("duplicate"));

        let categorization = QuizBody::Categorization {
            prompt: "Sort by stage".into(),
            categories: vec!["light reactions".into(), "calvin cycle".into()],
            items: vec![CategorizedItem {
                text: "rubisco".into(),
                category: "dark reactions".into(),
            }],
        };
        assert!(validate_body(&categorization).unwrap_err().contains("undeclared category"));
    }

    #[test]
    fn debate_and_numeric_rules() {
        let debate = QuizBody::Debate {
            topic: "Is light required for the calvin cycle?".into(),
            person_a: "Yes, directly".into(),
            person_b: "Only indirectly, via ATP and NADPH".into(),
            correct: DebateSide::B,
            model_argument: "".into(),
        };
        assert!(validate_body(&debate).is_err());

        let numeric = |answer: f64, tolerance: f64| QuizBody::Numeric {
            question: "How many carbons in glucose?".into(),
            answer,
            tolerance,
            unit: None,
        };
        assert!(validate_body(&numeric(6.0, 0.0)).is_ok());
        assert!(validate_body(&numeric(6.0, -1.0)).is_err());
        assert!(validate_body(&numeric(f64::NAN, 0.0)).is_err());
    }

    #[test]
    fn schema_rejects_wrong_kind() {
        let s = schema(QuizKind::TrueFalse);
        let wrong = json!({"item": {"type": "short_answer", "question": "q", "model_answer": "a"}});
        assert!(s.validate(&wrong).unwrap_err().contains("expected an item of type 'true_false'"));
        let right = json!({"item": {"type": "true_false", "statement": "Plants need light.", "answer": true}});
        assert!(s.validate(&right).is_ok());
    }

    #[test]
    fn every_kind_has_a_parseable_example_shape() {
        for kind in QuizKind::ALL {
            let value: serde_json::Value = serde_json::from_str(body_shape(kind)).unwrap();
            assert_eq!(value["type"], kind.as_str());
        }
    }

    #[tokio::test]
    async fn mismatched_matching_item_never_becomes_a_quiz_item() {
        let bad = r#"{"item": {"type": "matching", "prompt": "Match", "left": ["a", "b", "c"], "right": ["x", "y"], "pairs": [[0, 0], [1, 1]]}, "citations": []}"#;
        let service = Arc::new(ScriptedService::repeating(Step::text(bad)));
        let (pipeline, _) = pipeline(service.clone());
        let generated = generate_quiz(
            &pipeline,
            &photosynthesis(),
            &[QuizKind::Matching],
            1,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(generated.items.is_empty());
        assert_eq!(generated.failures.len(), 1);
        assert!(matches!(
            generated.failures[0].error,
            Error::GenerationExhausted { attempts: 3, .. }
        ));
        assert!(service.prompts()[1].user.contains("left has 3 entries but right has 2"));
    }

    #[tokio::test]
    async fn count_above_segment_count_still_yields_count_items() {
        let service = Arc::new(ScriptedService::responding(|prompt| {
            let reply = if prompt.user.contains("topic: Calvin Cycle") {
                json!({"item": {"type": "true_false", "statement": "Rubisco fixes carbon.", "answer": true},
                       "citations": [{"start": "01:30", "end": "02:00", "slide": 2}]})
            } else {
                json!({"item": {"type": "true_false", "statement": "Chlorophyll absorbs light.", "answer": true},
                       "citations": [{"start": "00:30", "end": "01:00", "slide": 1}]})
            };
            Ok(reply.to_string())
        }));
        let (pipeline, _) = pipeline(service.clone());
        let generated = generate_quiz(
            &pipeline,
            &photosynthesis(),
            &[QuizKind::TrueFalse],
            10,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(generated.is_complete());
        assert_eq!(generated.items.len(), 10);
        assert_eq!(service.call_count(), 10);
        let repeats = service
            .prompts()
            .iter()
            .filter(|p| p.user.contains("Test a different fact"))
            .count();
        assert_eq!(repeats, 6);
    }

    #[tokio::test]
    async fn kinds_rotate_across_windows() {
        let service = Arc::new(ScriptedService::responding(|prompt| {
            let reply = if prompt.user.contains("'true_false'") {
                json!({"item": {"type": "true_false", "statement": "Chlorophyll absorbs light.", "answer": true},
                       "citations": [{"start": "00:30", "end": "01:00", "slide": 1}]})
            } else {
                json!({"item": {"type": "short_answer", "question": "What fixes carbon?", "model_answer": "Rubisco"},
                       "citations": [{"start": "01:30", "end": "02:00", "slide": 2}]})
            };
            Ok(reply.to_string())
        }));
        let (pipeline, _) = pipeline(service);
        let generated = generate_quiz(
            &pipeline,
            &photosynthesis(),
            &[QuizKind::TrueFalse, QuizKind::ShortAnswer],
            2,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(generated.is_complete());
        let kinds: Vec<_> = generated.items.iter().map(|i| i.body.kind()).collect();
        assert_eq!(kinds, vec![QuizKind::TrueFalse, QuizKind::ShortAnswer]);
        assert!(generated.items.iter().all(|i| i.confidence.is_grounded()));
    }

    fn card(front: &str, back: &str, start: f64, end: f64) -> Flashcard {
        Flashcard {
            front: front.into(),
            back: back.into(),
            paraphrase_ok: true,
            citations: vec![VerifiedCitation {
                citation: Citation::segment("bio101-photosynthesis-00002", back),
                status: GroundingStatus::Grounded,
                segment_id: None,
                resolved: Some(TimeSpan::new(start, end)),
                slide: None,
            }],
            confidence: Confidence::Grounded,
        }
    }

    #[tokio::test]
    async fn flashcards_become_one_item_each() {
        let service = Arc::new(ScriptedService::responding(|prompt| {
            let reply = if prompt.user.contains("'true_false'") {
                json!({"item": {"type": "true_false", "statement": "Rubisco fixes carbon.", "answer": true},
                       "citations": [{"start": "01:30", "end": "02:00", "slide": 2}]})
            } else {
                json!({"item": {"type": "short_answer", "question": "What does chlorophyll absorb?", "model_answer": "Red and blue light"},
                       "citations": [{"start": "00:30", "end": "01:00", "slide": 1}]})
            };
            Ok(reply.to_string())
        }));
        let (pipeline, _) = pipeline(service.clone());
        let cards = vec![
            card("Which enzyme fixes carbon?", "Rubisco", 90.0, 120.0),
            card("What does chlorophyll absorb?", "Red and blue light", 30.0, 60.0),
        ];
        let generated = quiz_from_flashcards(
            &pipeline,
            &photosynthesis(),
            &cards,
            &[QuizKind::TrueFalse, QuizKind::ShortAnswer],
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(generated.is_complete());
        let kinds: Vec<_> = generated.items.iter().map(|i| i.body.kind()).collect();
        assert_eq!(kinds, vec![QuizKind::TrueFalse, QuizKind::ShortAnswer]);
        assert!(generated.items.iter().all(|i| i.confidence.is_grounded()));

        let prompts = service.prompts();
        assert_eq!(prompts.len(), 2);
        let first = prompts
            .iter()
            .find(|p| p.user.contains("Flashcard 1:\nQuestion: Which enzyme fixes carbon?\nAnswer: Rubisco"))
            .expect("prompt for the first card");
        assert!(first.user.contains("rubisco is the enzyme that fixes carbon"));
    }

    #[tokio::test]
    async fn empty_deck_makes_no_calls() {
        let service = Arc::new(ScriptedService::new(vec![]));
        let (pipeline, _) = pipeline(service.clone());
        let generated = quiz_from_flashcards(&pipeline, &photosynthesis(), &[], &[], &CancellationToken::new())
            .await
            .unwrap();
        assert!(generated.items.is_empty());
        assert!(generated.is_complete());
        assert_eq!(service.call_count(), 0);
    }
}
