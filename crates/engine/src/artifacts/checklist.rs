//! Learning checklists: one to three items per concept unit.

use std::sync::Arc;

use futures::future::join_all;
use lectern_core::{ChecklistItem, Confidence, Generated, Result};
use lectern_index::Index;
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{ConceptUnit, GroundingPipeline, Task, concept_units, gather};
use crate::generation::{CITATION_SHAPE, GROUNDING_RULES, OutputSchema, TypedSchema, non_blank};

const MAX_ITEMS_PER_UNIT: usize = 3;

#[derive(Debug, Deserialize)]
struct ChecklistWire {
    items: Vec<ItemWire>,
}

#[derive(Debug, Deserialize)]
struct ItemWire {
    text: String,
    #[serde(default)]
    citations: Vec<Value>,
}

fn schema() -> Arc<dyn OutputSchema> {
    Arc::new(
        TypedSchema::<ChecklistWire>::new(
            "checklist",
            format!(
                r#"{{"items": [{{"text": "<something the learner should be able to do or explain>", "citations": [{CITATION_SHAPE}]}}]}}"#
            ),
        )
        .with_check(|wire| {
            if wire.items.is_empty() || wire.items.len() > MAX_ITEMS_PER_UNIT {
                return Err(format!(
                    "expected 1 to {MAX_ITEMS_PER_UNIT} items, got {}",
                    wire.items.len()
                ));
            }
            wire.items.iter().try_for_each(|i| non_blank("text", &i.text))
        }),
    )
}

async fn items_for_unit(
    pipeline: &GroundingPipeline,
    index: &Index,
    unit: &ConceptUnit,
    cancel: &CancellationToken,
) -> Result<Vec<ChecklistItem>> {
    let task = Task::new(
        "checklist",
        GROUNDING_RULES,
        format!(
            "List 1 to {MAX_ITEMS_PER_UNIT} concrete learning objectives covered in this part of the lecture \
             (topic: {}). Phrase each as something the learner should be able to do. Cite where each is taught.",
            unit.topic
        ),
    );
    let grounded = pipeline
        .ground::<ChecklistWire, _>(index, unit.query(pipeline.token_budget()), task, |_| schema(), cancel)
        .await?;

    let items = grounded
        .value
        .items
        .into_iter()
        .map(|wire| {
            let citations = pipeline.verify_values(&wire.citations, index);
            let confidence = Confidence::from_citations(&citations);
            ChecklistItem {
                text: wire.text,
                unit_start: unit.span.start,
                unit_slide: unit.slide,
                citations,
                confidence,
            }
        })
        .collect();
    Ok(items)
}

pub async fn generate_checklist(
    pipeline: &GroundingPipeline,
    index: &Index,
    unit_window_secs: f64,
    max_units: usize,
    cancel: &CancellationToken,
) -> Result<Generated<ChecklistItem>> {
    let units = concept_units(index, unit_window_secs, max_units);
    info!(lecture_id = %index.id(), units = units.len(), "Generating checklist");
    let outcomes = join_all(
        units
            .iter()
            .map(|unit| items_for_unit(pipeline, index, unit, cancel)),
    )
    .await;
    Ok(gather("checklist", outcomes))
}

/// Where in the lecture a checklist item is taught: `(seconds, slide)`.
///
/// The earliest grounded citation wins; without one, the unit start.
pub fn locate(item: &ChecklistItem) -> (f64, Option<usize>) {
    item.citations
        .iter()
        .filter(|c| c.is_grounded())
        .filter_map(|c| c.resolved.map(|span| (span.start, c.slide)))
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .unwrap_or((item.unit_start, item.unit_slide))
}
