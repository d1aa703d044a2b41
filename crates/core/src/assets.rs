//! Raw lecture assets as handed over by the capture layer.
//!
//! These are already extracted: transcript text with timestamps, slide
//! text/image placeholders with change timestamps, and optional frame
//! references. The normalizer turns them into a [`crate::Lecture`].

use serde::{Deserialize, Serialize};

/// Everything captured for one lecture.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawAssets {
    /// Source identity (video id, recording URL, file name). Drives the lecture id.
    pub source: String,

    /// Transcript lines with timestamps in seconds
    #[serde(default)]
    pub transcript: Vec<RawTranscriptLine>,

    /// Slides with change timestamps
    #[serde(default)]
    pub slides: Vec<RawSlide>,

    /// Captured video frames
    #[serde(default)]
    pub frames: Vec<RawFrame>,
}

/// One timed transcript line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTranscriptLine {
    pub start: f64,
    pub end: f64,
    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl RawTranscriptLine {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
            embedding: None,
        }
    }
}

/// One extracted slide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSlide {
    /// Time the slide appeared, in seconds
    pub change_time: f64,

    /// Extracted text (native or OCR)
    #[serde(default)]
    pub text: String,

    /// Image placeholders in reading order
    #[serde(default)]
    pub image_refs: Vec<String>,
}

impl RawSlide {
    pub fn new(change_time: f64, text: impl Into<String>) -> Self {
        Self {
            change_time,
            text: text.into(),
            image_refs: vec![],
        }
    }

    /// Whether the slide carries any text or image data at all.
    pub fn has_content(&self) -> bool {
        !self.text.trim().is_empty() || !self.image_refs.is_empty()
    }
}

/// One captured video frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFrame {
    pub timestamp: f64,
    pub image: String,
}
