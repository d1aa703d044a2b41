//! Context selection under a token budget.
//!
//! Trims a lecture down to the handful of segments a generation call needs.
//! Segments cost their rendered size plus a per-item overhead; the first
//! segment of each slide also pays for the slide header.

pub mod selector;
pub mod token;

pub use selector::ContextSelector;
pub use token::{estimate_tokens, render_segment, render_slide, segment_cost, slide_cost};
