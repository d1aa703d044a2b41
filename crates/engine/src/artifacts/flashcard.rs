//! Flashcards, spread across the lecture's concept units.
//!
//! The requested card count is split evenly over the units and each unit is
//! asked for exactly its share, so a complete batch holds exactly `count`
//! cards.

use std::sync::Arc;

use futures::future::join_all;
use lectern_core::{Confidence, Flashcard, Generated, Result};
use lectern_index::Index;
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{ConceptUnit, GroundingPipeline, Task, concept_units, gather, quotas};
use crate::generation::{CITATION_SHAPE, GROUNDING_RULES, OutputSchema, TypedSchema, non_blank};

#[derive(Debug, Deserialize)]
struct DeckWire {
    cards: Vec<CardWire>,
}

#[derive(Debug, Deserialize)]
struct CardWire {
    front: String,
    back: String,
    /// Whether a paraphrased answer should count when self-testing
    #[serde(default = "default_paraphrase_ok")]
    paraphrase_ok: bool,
    #[serde(default)]
    citations: Vec<Value>,
}

fn default_paraphrase_ok() -> bool {
    true
}

fn schema(expected: usize) -> Arc<dyn OutputSchema> {
    Arc::new(
        TypedSchema::<DeckWire>::new(
            "flashcards",
            format!(
                r#"{{"cards": [{{"front": "<term or question>", "back": "<definition or answer>", "paraphrase_ok": true, "citations": [{CITATION_SHAPE}]}}]}} (exactly {expected} cards)"#
            ),
        )
        .with_check(move |deck| {
            if deck.cards.len() != expected {
                return Err(format!("expected {expected} cards, got {}", deck.cards.len()));
            }
            deck.cards.iter().try_for_each(|card| {
                non_blank("front", &card.front)?;
                non_blank("back", &card.back)?;
                if card.front.trim().eq_ignore_ascii_case(card.back.trim()) {
                    return Err(format!("'front' and 'back' must differ (card '{}')", card.front.trim()));
                }
                Ok(())
            })
        }),
    )
}

async fn cards_for_unit(
    pipeline: &GroundingPipeline,
    index: &Index,
    unit: &ConceptUnit,
    quota: usize,
    cancel: &CancellationToken,
) -> Result<Vec<Flashcard>> {
    let task = Task::new(
        "flashcards",
        GROUNDING_RULES,
        format!(
            "Write exactly {quota} flashcards for the key ideas of this part of the lecture (topic: {}). \
             Each card covers a different idea.\n\
             Set paraphrase_ok to false only when the exact wording matters (a formula, a name, a number).",
            unit.topic
        ),
    );
    let grounded = pipeline
        .ground::<DeckWire, _>(index, unit.query(pipeline.token_budget()), task, |_| schema(quota), cancel)
        .await?;

    let cards = grounded
        .value
        .cards
        .into_iter()
        .map(|card| {
            let citations = pipeline.verify_values(&card.citations, index);
            let confidence = Confidence::from_citations(&citations);
            Flashcard {
                front: card.front,
                back: card.back,
                paraphrase_ok: card.paraphrase_ok,
                citations,
                confidence,
            }
        })
        .collect();
    Ok(cards)
}

/// Generate `count` cards over at most `max_units` concept units.
pub async fn generate_flashcards(
    pipeline: &GroundingPipeline,
    index: &Index,
    count: usize,
    unit_window_secs: f64,
    max_units: usize,
    cancel: &CancellationToken,
) -> Result<Generated<Flashcard>> {
    if count == 0 {
        return Ok(Generated::default());
    }
    let units = concept_units(index, unit_window_secs, max_units.min(count));
    let shares = quotas(count, units.len());
    info!(lecture_id = %index.id(), cards = count, units = units.len(), "Generating flashcards");
    let outcomes = join_all(
        units
            .iter()
            .zip(&shares)
            .map(|(unit, &quota)| cards_for_unit(pipeline, index, unit, quota, cancel)),
    )
    .await;
    Ok(gather("flashcard", outcomes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::fixtures::{photosynthesis, pipeline};
    use crate::test_helpers::ScriptedService;
    use lectern_core::{Prompt, ServiceError};
    use serde_json::json;

    /// Answers each unit with exactly the number of cards its prompt asks for.
    fn deck_for(prompt: &Prompt) -> std::result::Result<String, ServiceError> {
        let wanted: usize = prompt
            .user
            .split("Write exactly ")
            .nth(1)
            .and_then(|rest| rest.split_whitespace().next())
            .and_then(|n| n.parse().ok())
            .unwrap_or(0);
        let calvin = prompt.user.contains("topic: Calvin Cycle");
        let cards: Vec<Value> = (0..wanted)
            .map(|i| {
                if calvin {
                    json!({"front": format!("Calvin fact {i}"), "back": "Carbon is fixed into sugar",
                           "paraphrase_ok": false,
                           "citations": [{"start": "01:30", "end": "02:00", "slide": 2}]})
                } else {
                    json!({"front": format!("Light fact {i}"), "back": "Pigment absorbing red and blue light",
                           "citations": [{"start": "00:30", "end": "01:00"}]})
                }
            })
            .collect();
        Ok(json!({"cards": cards}).to_string())
    }

    #[tokio::test]
    async fn requested_count_is_spread_across_units() {
        let service = Arc::new(ScriptedService::responding(deck_for));
        let (pipeline, _) = pipeline(service.clone());
        let generated = generate_flashcards(&pipeline, &photosynthesis(), 10, 120.0, 24, &CancellationToken::new())
            .await
            .unwrap();
        assert!(generated.is_complete());
        assert_eq!(generated.items.len(), 10);
        assert_eq!(service.call_count(), 2);
        assert!(generated.items[..5].iter().all(|c| c.paraphrase_ok));
        assert!(generated.items[5..].iter().all(|c| !c.paraphrase_ok));
        assert!(generated.items.iter().all(|c| c.confidence.is_grounded()));
    }

    #[tokio::test]
    async fn fewer_cards_than_units_merges_units() {
        let service = Arc::new(ScriptedService::responding(deck_for));
        let (pipeline, _) = pipeline(service.clone());
        let generated = generate_flashcards(&pipeline, &photosynthesis(), 1, 120.0, 24, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(generated.items.len(), 1);
        assert_eq!(service.call_count(), 1);
    }

    #[tokio::test]
    async fn zero_cards_skips_generation() {
        let service = Arc::new(ScriptedService::new(vec![]));
        let (pipeline, _) = pipeline(service.clone());
        let generated = generate_flashcards(&pipeline, &photosynthesis(), 0, 120.0, 24, &CancellationToken::new())
            .await
            .unwrap();
        assert!(generated.items.is_empty());
        assert_eq!(service.call_count(), 0);
    }

    #[tokio::test]
    async fn short_deck_is_corrected_on_retry() {
        let service = Arc::new(ScriptedService::responding(|prompt| {
            if prompt.user.contains("expected 2 cards, got 1") {
                deck_for(prompt)
            } else {
                Ok(json!({"cards": [{"front": "ATP", "back": "Energy currency",
                                     "citations": [{"start": "00:00", "end": "00:30"}]}]})
                    .to_string())
            }
        }));
        let (pipeline, _) = pipeline(service.clone());
        let generated = generate_flashcards(&pipeline, &photosynthesis(), 4, 120.0, 24, &CancellationToken::new())
            .await
            .unwrap();
        assert!(generated.is_complete());
        assert_eq!(generated.items.len(), 4);
        assert_eq!(service.call_count(), 4);
    }

    #[tokio::test]
    async fn failing_unit_does_not_block_others() {
        let service = Arc::new(ScriptedService::responding(|prompt| {
            if prompt.user.contains("topic: Calvin Cycle") {
                Err(ServiceError::Unavailable("overloaded".into()))
            } else {
                deck_for(prompt)
            }
        }));
        let (pipeline, _) = pipeline(service);
        let generated = generate_flashcards(&pipeline, &photosynthesis(), 2, 120.0, 24, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(generated.items.len(), 1);
        assert_eq!(generated.items[0].front, "Light fact 0");
        assert_eq!(generated.failures.len(), 1);
        assert_eq!(generated.failures[0].unit, 1);
    }

    #[test]
    fn identical_sides_are_rejected() {
        let value = json!({"cards": [{"front": "ATP", "back": "atp"}]});
        assert!(schema(1).validate(&value).is_err());
    }

    #[test]
    fn card_count_must_match() {
        let value = json!({"cards": [{"front": "ATP", "back": "Energy currency"}]});
        assert!(schema(1).validate(&value).is_ok());
        assert!(schema(2).validate(&value).unwrap_err().contains("expected 2 cards, got 1"));
    }
}
