//! Artifact generators: strategies over one grounding pipeline.
//!
//! Every generator follows the same path: build a query, select context,
//! generate against a task schema, verify the citations, and package the
//! result with its provenance. Batch generators fan their units out
//! concurrently and report per-unit failures instead of failing as a whole.

pub mod answer;
pub mod checklist;
pub mod coverage;
pub mod flashcard;
pub mod marking;
pub mod quiz;
pub mod summary;

use std::sync::Arc;

use lectern_core::{
    Confidence, ContextBundle, Error, Generated, Query, Result, TimeSpan, UnitFailure,
    VerifiedCitation,
};
use lectern_index::Index;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::context::ContextSelector;
use crate::generation::{GenerationRequest, OutputSchema, Orchestrator};
use crate::verify::CitationVerifier;

pub use answer::AnswerMode;
pub use checklist::locate;
pub use marking::{DebateVerdict, MarkingItem};
pub use summary::{SummaryDetail, SummaryStyle};

/// A task to run through the pipeline.
pub struct Task {
    pub name: String,
    pub guardrails: String,
    pub instructions: String,
}

impl Task {
    pub fn new(
        name: impl Into<String>,
        guardrails: impl Into<String>,
        instructions: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            guardrails: guardrails.into(),
            instructions: instructions.into(),
        }
    }
}

/// A typed, verified generation.
#[derive(Debug, Clone)]
pub struct Grounded<T> {
    pub value: T,
    /// Every citation in the response, verified, in document order
    pub citations: Vec<VerifiedCitation>,
    pub confidence: Confidence,
    pub attempts: u32,
    pub bundle: ContextBundle,
}

/// Select → generate → verify, shared by every generator.
pub struct GroundingPipeline {
    selector: ContextSelector,
    orchestrator: Arc<Orchestrator>,
    verifier: CitationVerifier,
    token_budget: usize,
}

impl GroundingPipeline {
    pub fn new(
        selector: ContextSelector,
        orchestrator: Arc<Orchestrator>,
        verifier: CitationVerifier,
        token_budget: usize,
    ) -> Self {
        Self {
            selector,
            orchestrator,
            verifier,
            token_budget,
        }
    }

    pub fn token_budget(&self) -> usize {
        self.token_budget
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Run one grounded task. The schema may depend on the selected bundle.
    pub async fn ground<T, F>(
        &self,
        index: &Index,
        query: Query,
        task: Task,
        schema_for: F,
        cancel: &CancellationToken,
    ) -> Result<Grounded<T>>
    where
        T: DeserializeOwned,
        F: FnOnce(&ContextBundle) -> Arc<dyn OutputSchema>,
    {
        let bundle = self.selector.select(index, &query)?;
        let schema = schema_for(&bundle);
        let request = GenerationRequest::new(task.name.clone(), task.guardrails, task.instructions, schema)
            .with_context(bundle.clone());

        let result = self.orchestrator.generate(&request, cancel).await?;
        let parsed = result
            .parsed
            .clone()
            .ok_or_else(|| Error::Internal("schema-valid result without a parsed value".into()))?;
        let value: T = serde_json::from_value(parsed)?;

        let citations = self.verifier.verify(&result, index.lecture());
        let confidence = Confidence::from_citations(&citations);

        Ok(Grounded {
            value,
            citations,
            confidence,
            attempts: result.attempts,
            bundle,
        })
    }

    /// Verify one item's wire citations, for responses that carry several items.
    pub fn verify_values(&self, values: &[Value], index: &Index) -> Vec<VerifiedCitation> {
        let citations: Vec<_> = values.iter().map(lectern_core::Citation::from_value).collect();
        self.verifier.verify_citations(&citations, index.lecture())
    }
}

/// A contiguous slice of the lecture that anchors one generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct ConceptUnit {
    pub ordinal: usize,
    pub span: TimeSpan,
    pub slide: Option<usize>,
    /// Query text: the slide title, or the opening words of the unit
    pub topic: String,
    /// How many earlier units in the batch cover the same span
    pub pass: usize,
}

impl ConceptUnit {
    pub fn query(&self, token_budget: usize) -> Query {
        Query::new(self.topic.clone(), token_budget).with_anchor(lectern_core::Anchor::Range {
            start: self.span.start,
            end: self.span.end,
        })
    }
}

const TOPIC_WORDS: usize = 12;

fn unit_from(index: &Index, ordinal: usize, positions: std::ops::Range<usize>) -> Option<ConceptUnit> {
    let first = index.get(positions.start)?;
    let last = index.get(positions.end.checked_sub(1)?)?;
    let slide = first.slide_reference;
    let topic = slide
        .and_then(|n| index.slide(n))
        .map(|s| s.title.clone())
        .unwrap_or_else(|| {
            first
                .text
                .split_whitespace()
                .take(TOPIC_WORDS)
                .collect::<Vec<_>>()
                .join(" ")
        });
    Some(ConceptUnit {
        ordinal,
        span: TimeSpan::new(first.start_time, last.end_time),
        slide,
        topic,
        pass: 0,
    })
}

/// Exactly `count` windows over the lecture.
///
/// Up to one window per segment, each a contiguous run of near-equal segment
/// count. Asking for more windows than there are segments cycles through them
/// again, with `pass` counting the repeats.
pub fn windows(index: &Index, count: usize) -> Vec<ConceptUnit> {
    let n = index.len();
    let spans = count.min(n);
    if spans == 0 {
        return Vec::new();
    }
    (0..count)
        .filter_map(|i| {
            let w = i % spans;
            unit_from(index, i, (w * n / spans)..((w + 1) * n / spans)).map(|unit| ConceptUnit {
                pass: i / spans,
                ..unit
            })
        })
        .collect()
}

/// Split `total` items across `units` as evenly as possible, earlier units first.
pub fn quotas(total: usize, units: usize) -> Vec<usize> {
    if units == 0 {
        return Vec::new();
    }
    (0..units)
        .map(|i| total / units + usize::from(i < total % units))
        .collect()
}

/// Split the lecture into concept units.
///
/// With slides, each run of segments on one slide is a unit; without, the
/// lecture is cut into fixed time windows. Units beyond `max_units` are merged
/// into their neighbours.
pub fn concept_units(index: &Index, window_secs: f64, max_units: usize) -> Vec<ConceptUnit> {
    let segments = index.segments();
    let mut runs: Vec<std::ops::Range<usize>> = Vec::new();
    let has_slides = segments.iter().any(|s| s.slide_reference.is_some());

    let mut start = 0;
    for pos in 1..=segments.len() {
        let boundary = pos == segments.len()
            || if has_slides {
                segments[pos].slide_reference != segments[start].slide_reference
            } else {
                segments[pos].start_time - segments[start].start_time >= window_secs
            };
        if boundary {
            runs.push(start..pos);
            start = pos;
        }
    }

    let max_units = max_units.max(1);
    if runs.len() > max_units {
        let total = runs.len();
        runs = (0..max_units)
            .map(|i| runs[i * total / max_units].start..runs[(i + 1) * total / max_units - 1].end)
            .collect();
    }

    runs.into_iter()
        .enumerate()
        .filter_map(|(i, run)| unit_from(index, i, run))
        .collect()
}

/// The smallest span covering every grounded citation, if any.
pub fn cited_span(citations: &[VerifiedCitation]) -> Option<TimeSpan> {
    citations
        .iter()
        .filter(|c| c.is_grounded())
        .filter_map(|c| c.resolved)
        .reduce(|a, b| TimeSpan::new(a.start.min(b.start), a.end.max(b.end)))
}

/// Collect per-unit outcomes, logging failures.
pub(crate) fn gather<T>(task: &str, outcomes: Vec<Result<Vec<T>>>) -> Generated<T> {
    let mut generated = Generated::default();
    for (unit, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            Ok(items) => generated.items.extend(items),
            Err(error) => {
                warn!(task, unit, error = %error, "Unit generation failed");
                generated.failures.push(UnitFailure { unit, error });
            }
        }
    }
    generated
}
