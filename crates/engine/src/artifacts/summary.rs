//! Sectioned lecture summaries.
//!
//! One section per concept unit. A section may reference images, but only
//! those present in its own context bundle; anything else is rejected as a
//! schema violation so the generator is asked again.
//!
//! A learner can also select a passage of a finished summary and ask about
//! it; the answer is grounded on the span the enclosing section cites.

use std::sync::Arc;

use futures::future::join_all;
use lectern_core::{Anchor, Answer, Error, Generated, Query, Result, SummarySection};
use lectern_index::Index;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::answer::{self, AnswerWire};
use super::{ConceptUnit, GroundingPipeline, Task, cited_span, concept_units, gather};
use crate::generation::{CITATION_SHAPE, GROUNDING_RULES, OutputSchema, TypedSchema, non_blank};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SummaryDetail {
    #[default]
    Concise,
    Detailed,
}

/// Options that shape every section of a summary.
#[derive(Debug, Clone, Default)]
pub struct SummaryStyle {
    pub detail: SummaryDetail,
    pub worked_examples: bool,
    pub reference_timestamps: bool,
    pub custom_instructions: Option<String>,
}

impl SummaryStyle {
    fn instructions(&self, unit: &ConceptUnit) -> String {
        let mut text = format!(
            "Summarize this part of the lecture (topic: {}) as one section with a heading and a body.\n",
            unit.topic
        );
        text.push_str(match self.detail {
            SummaryDetail::Concise => "Keep the body to a short paragraph of the essential points.\n",
            SummaryDetail::Detailed => {
                "Cover every concept in depth, with definitions and how the ideas connect.\n"
            }
        });
        if self.worked_examples {
            text.push_str("Include a worked example wherever the lecture gives one.\n");
        }
        if self.reference_timestamps {
            text.push_str("Mention the lecture timestamps (MM:SS) inline where each point is made.\n");
        }
        if let Some(custom) = self.custom_instructions.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            text.push_str(custom);
            text.push('\n');
        }
        text.push_str("Only use image references listed in the context, and only when they help.");
        text
    }
}

#[derive(Debug, Deserialize)]
struct SectionWire {
    heading: String,
    body: String,
    #[serde(default)]
    image_refs: Vec<String>,
}

fn schema(available: Vec<String>) -> Arc<dyn OutputSchema> {
    Arc::new(
        TypedSchema::<SectionWire>::new(
            "summary_section",
            format!(
                r#"{{"heading": "...", "body": "...", "image_refs": ["<image reference from the context>"], "citations": [{CITATION_SHAPE}]}}"#
            ),
        )
        .with_check(move |section| {
            non_blank("heading", &section.heading)?;
            non_blank("body", &section.body)?;
            match section.image_refs.iter().find(|r| !available.contains(r)) {
                Some(unknown) if available.is_empty() => Err(format!(
                    "image reference '{unknown}' is not available; this context has no images"
                )),
                Some(unknown) => Err(format!(
                    "image reference '{unknown}' is not in the context (available: {})",
                    available.join(", ")
                )),
                None => Ok(()),
            }
        }),
    )
}

async fn section_for_unit(
    pipeline: &GroundingPipeline,
    index: &Index,
    unit: &ConceptUnit,
    style: &SummaryStyle,
    cancel: &CancellationToken,
) -> Result<Vec<SummarySection>> {
    let task = Task::new("summary", GROUNDING_RULES, style.instructions(unit));
    let grounded = pipeline
        .ground::<SectionWire, _>(
            index,
            unit.query(pipeline.token_budget()),
            task,
            |bundle| schema(bundle.image_refs.clone()),
            cancel,
        )
        .await?;
    Ok(vec![SummarySection {
        heading: grounded.value.heading,
        body: grounded.value.body,
        image_refs: grounded.value.image_refs,
        citations: grounded.citations,
        confidence: grounded.confidence,
    }])
}

pub async fn generate_summary(
    pipeline: &GroundingPipeline,
    index: &Index,
    style: &SummaryStyle,
    unit_window_secs: f64,
    max_units: usize,
    cancel: &CancellationToken,
) -> Result<Generated<SummarySection>> {
    let units = concept_units(index, unit_window_secs, max_units);
    info!(
        lecture_id = %index.id(),
        sections = units.len(),
        detail = ?style.detail,
        "Generating summary"
    );
    let outcomes = join_all(
        units
            .iter()
            .map(|unit| section_for_unit(pipeline, index, unit, style, cancel)),
    )
    .await;
    Ok(gather("summary", outcomes))
}

const DEFAULT_EXPLAIN_QUESTION: &str = "Explain this passage in more detail.";

fn render_sections(sections: &[SummarySection]) -> String {
    sections
        .iter()
        .map(|s| format!("## {}\n{}", s.heading.trim(), s.body.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Answer a question about a passage selected from a summary.
///
/// The passage's own section, when found, pins the context to the span that
/// section cites. A blank question asks for a fuller explanation.
pub async fn explain_passage(
    pipeline: &GroundingPipeline,
    index: &Index,
    sections: &[SummarySection],
    selected: &str,
    question: &str,
    cancel: &CancellationToken,
) -> Result<Answer> {
    let selected = selected.trim();
    if selected.is_empty() {
        return Err(Error::InvalidRequest("no summary passage selected".into()));
    }
    let question = match question.trim() {
        "" => DEFAULT_EXPLAIN_QUESTION,
        q => q,
    };

    let mut query = Query::new(format!("{selected} {question}"), pipeline.token_budget());
    let section = sections
        .iter()
        .find(|s| s.body.contains(selected) || s.heading.contains(selected));
    if let Some(span) = section.and_then(|s| cited_span(&s.citations)) {
        query = query.with_anchor(Anchor::Range {
            start: span.start,
            end: span.end,
        });
    }

    let mut instructions = format!(
        "A learner selected this passage from their summary of the lecture:\n\"{selected}\"\n\n\
         Question: {question}\n\n\
         Answer the question about the passage using the lecture context."
    );
    if !sections.is_empty() {
        instructions.push_str("\n\nThe full summary, for reference:\n");
        instructions.push_str(&render_sections(sections));
    }
    let task = Task::new("explain", GROUNDING_RULES, instructions);
    let grounded = pipeline
        .ground::<AnswerWire, _>(index, query, task, |_| answer::schema(), cancel)
        .await?;

    Ok(Answer {
        question: question.to_string(),
        text: grounded.value.answer,
        citations: grounded.citations,
        confidence: grounded.confidence,
        attempts: grounded.attempts,
    })
}
