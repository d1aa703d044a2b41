//! Queries and the context bundles selected for them.

use serde::{Deserialize, Serialize};

use crate::segment::{Segment, Slide};

/// Where in the lecture a query is pinned.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anchor {
    /// A playback position in seconds (the frame the learner is looking at)
    Time { at: f64 },
    /// An explicit window in seconds
    Range { start: f64, end: f64 },
    /// A slide number (1-based)
    Slide { index: usize },
}

/// A retrieval request against one lecture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    /// Free-text question or topic
    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<Anchor>,

    /// Maximum context size in estimated tokens
    pub token_budget: usize,

    /// Optional query embedding for vector scoring
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Query {
    pub fn new(text: impl Into<String>, token_budget: usize) -> Self {
        Self {
            text: text.into(),
            anchor: None,
            token_budget,
            embedding: None,
        }
    }

    pub fn with_anchor(mut self, anchor: Anchor) -> Self {
        self.anchor = Some(anchor);
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// The minimal context chosen for one generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextBundle {
    /// Selected segments, ordered by start time
    pub segments: Vec<Segment>,

    /// Slides referenced by the selected segments, ordered by index
    pub slides: Vec<Slide>,

    /// Image references carried by the selection (never image bytes)
    pub image_refs: Vec<String>,

    /// Estimated size in tokens (`<= budget`)
    pub token_estimate: usize,

    /// The budget the bundle was selected against
    pub budget: usize,
}

impl ContextBundle {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segment_ids(&self) -> Vec<&str> {
        self.segments.iter().map(|s| s.id.as_str()).collect()
    }

    /// Earliest start time in the bundle.
    pub fn start_time(&self) -> Option<f64> {
        self.segments.first().map(|s| s.start_time)
    }
}
