//! Prompt construction: guardrails, task instructions, schema and context.
//!
//! The context is rendered with the same functions the selector prices
//! segments with. Images travel as references only.

use lectern_core::{ContextBundle, Prompt};

use crate::context::token::{render_segment, render_slide};
use crate::generation::schema::OutputSchema;

/// Rules every grounded generation call runs under.
pub const GROUNDING_RULES: &str = "\
You are a study assistant grounded in one recorded lecture.
Rules:
1. Use ONLY the lecture context provided below. If the context does not support an answer, say so.
2. Every factual claim must carry a citation to a segment id or a time range (MM:SS) from the context.
3. When a slide is relevant, include its slide number in the citation.
4. Refer to images only by the placeholder names listed in the context (e.g. IMAGE_0003.png). Never invent new ones.
5. Respond with a single JSON value matching the requested schema. No commentary outside the JSON.";

/// Render a bundle as prompt context, grouping segments under their slides.
pub fn render_bundle(bundle: &ContextBundle) -> String {
    let mut out = String::from("[Lecture context]\n");
    let mut current_slide: Option<usize> = None;

    for segment in &bundle.segments {
        if segment.slide_reference != current_slide {
            current_slide = segment.slide_reference;
            if let Some(slide) = current_slide.and_then(|n| bundle.slides.iter().find(|s| s.index == n)) {
                out.push('\n');
                out.push_str(&render_slide(slide));
                out.push('\n');
            }
        }
        out.push_str(&render_segment(segment));
        out.push('\n');
    }

    if !bundle.image_refs.is_empty() {
        out.push_str("\nAvailable image references: ");
        out.push_str(&bundle.image_refs.join(", "));
        out.push('\n');
    }
    out
}

/// Assemble the full prompt for one generation request.
pub fn build_prompt(
    guardrails: &str,
    instructions: &str,
    schema: &dyn OutputSchema,
    context: Option<&ContextBundle>,
) -> Prompt {
    let mut user = String::new();
    user.push_str(instructions.trim());
    user.push_str("\n\nRespond with JSON of this shape:\n");
    user.push_str(&schema.describe());
    user.push('\n');

    if let Some(bundle) = context {
        user.push('\n');
        user.push_str(&render_bundle(bundle));
    }

    let prompt = Prompt::new(guardrails, user);
    match context {
        Some(bundle) => prompt.with_image_refs(bundle.image_refs.clone()),
        None => prompt,
    }
}
