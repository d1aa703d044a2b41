//! Token estimation and context rendering.
//!
//! Uses a character-based heuristic: ~4 characters per token. The selector
//! prices segments with the same renderers the prompt builder uses, so a
//! bundle's estimate matches what is actually sent.

use lectern_core::{Segment, Slide, format_span};

/// Per-item overhead for delimiters and line structure.
pub const ITEM_OVERHEAD: usize = 4;

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 characters. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    text.len().div_ceil(4)
}

/// Render one segment as it appears in a prompt.
pub fn render_segment(segment: &Segment) -> String {
    let mut line = format!(
        "[{}] {}: {}",
        segment.id,
        format_span(segment.start_time, segment.end_time),
        segment.text
    );
    if let Some(frame) = &segment.frame_reference {
        line.push_str(&format!(" (frame: {})", frame.image));
    }
    line
}

/// Render a slide header block as it appears in a prompt.
pub fn render_slide(slide: &Slide) -> String {
    let mut block = format!("## Slide {}: {}", slide.index, slide.title);
    let body = slide.text.trim();
    if !body.is_empty() && body != slide.title {
        block.push('\n');
        block.push_str(body);
    }
    if !slide.image_refs.is_empty() {
        block.push_str("\nImages: ");
        block.push_str(&slide.image_refs.join(", "));
    }
    block
}

/// Estimated cost of a segment inside a bundle.
pub fn segment_cost(segment: &Segment) -> usize {
    estimate_tokens(&render_segment(segment)) + ITEM_OVERHEAD
}

/// Estimated cost of a slide header inside a bundle.
pub fn slide_cost(slide: &Slide) -> usize {
    estimate_tokens(&render_slide(slide)) + ITEM_OVERHEAD
}
