//! Lecture and Segment domain types.
//!
//! A [`Lecture`] is the normalized, time-aligned form of one recorded lecture:
//! an ordered run of non-overlapping [`Segment`]s plus the slides they point to.
//! Lectures are immutable once built; re-ingestion produces a new value.

use serde::{Deserialize, Serialize};

use crate::timecode::format_span;

/// Deterministic identifier for a lecture, derived from its source identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LectureId(pub String);

impl LectureId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LectureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A closed time span in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSpan {
    pub start: f64,
    pub end: f64,
}

impl TimeSpan {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn midpoint(&self) -> f64 {
        self.start + self.duration() / 2.0
    }

    /// Whether `other` lies entirely within this span.
    pub fn contains_span(&self, other: &TimeSpan) -> bool {
        other.start >= self.start && other.end <= self.end
    }

    /// Whether the two spans share any time on the half-open interval `[start, end)`.
    pub fn overlaps(&self, other: &TimeSpan) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl std::fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format_span(self.start, self.end))
    }
}

/// A reference to a captured video frame. Only the reference travels
/// through the engine; image bytes are resolved at the render boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRef {
    /// Capture time in seconds
    pub timestamp: f64,

    /// Frame image name or URI
    pub image: String,
}

/// A slide of the lecture deck.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slide {
    /// 1-based slide number
    pub index: usize,

    /// When the slide appeared on screen, in seconds
    pub change_time: f64,

    /// First non-empty line of the slide text
    pub title: String,

    /// Extracted slide text
    pub text: String,

    /// Image placeholders extracted from the slide (e.g. `IMAGE_0003.png`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_refs: Vec<String>,
}

/// A time-bounded unit of lecture content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Stable id: `{lecture_id}-{index:05}`
    pub id: String,

    /// Start time in seconds
    pub start_time: f64,

    /// End time in seconds (`>= start_time`)
    pub end_time: f64,

    /// Transcript text spoken during the segment
    pub text: String,

    /// Slide on screen during the segment (1-based slide number)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slide_reference: Option<usize>,

    /// Video frame nearest the segment midpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_reference: Option<FrameRef>,

    /// Image references carried over from the slide
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_refs: Vec<String>,

    /// Optional embedding vector
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Segment {
    pub fn span(&self) -> TimeSpan {
        TimeSpan::new(self.start_time, self.end_time)
    }
}

/// A normalized lecture: ordered segments plus metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lecture {
    pub id: LectureId,

    /// Caller-supplied source identity (video id, URL, file name)
    pub source: String,

    /// Total duration in seconds
    pub duration: f64,

    /// Segments ordered by start time, non-overlapping
    pub segments: Vec<Segment>,

    /// Slides ordered by index
    #[serde(default)]
    pub slides: Vec<Slide>,
}

impl Lecture {
    /// Look up a segment by id.
    pub fn segment(&self, id: &str) -> Option<&Segment> {
        self.segments.iter().find(|s| s.id == id)
    }

    /// Look up a slide by its 1-based number.
    pub fn slide(&self, index: usize) -> Option<&Slide> {
        self.slides.iter().find(|s| s.index == index)
    }

    /// The segment whose span contains `span`, if any.
    pub fn segment_containing(&self, span: &TimeSpan) -> Option<&Segment> {
        let i = self.segments.partition_point(|s| s.end_time < span.end);
        self.segments
            .get(i)
            .filter(|s| s.span().contains_span(span))
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(id: &str, start: f64, end: f64) -> Segment {
        Segment {
            id: id.into(),
            start_time: start,
            end_time: end,
            text: format!("text {id}"),
            slide_reference: None,
            frame_reference: None,
            image_refs: vec![],
            embedding: None,
        }
    }

    fn lecture() -> Lecture {
        Lecture {
            id: LectureId("lec_test".into()),
            source: "test".into(),
            duration: 90.0,
            segments: vec![seg("a", 0.0, 30.0), seg("b", 30.0, 60.0), seg("c", 60.0, 90.0)],
            slides: vec![],
        }
    }

    #[test]
    fn span_overlap_is_half_open() {
        let a = TimeSpan::new(0.0, 30.0);
        let b = TimeSpan::new(30.0, 60.0);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&TimeSpan::new(29.0, 31.0)));
    }

    #[test]
    fn segment_containing_finds_enclosing_segment() {
        let lec = lecture();
        let found = lec.segment_containing(&TimeSpan::new(35.0, 50.0)).unwrap();
        assert_eq!(found.id, "b");
        assert!(lec.segment_containing(&TimeSpan::new(20.0, 40.0)).is_none());
    }

    #[test]
    fn segment_containing_accepts_exact_bounds() {
        let lec = lecture();
        assert_eq!(lec.segment_containing(&TimeSpan::new(0.0, 30.0)).unwrap().id, "a");
        assert_eq!(lec.segment_containing(&TimeSpan::new(60.0, 90.0)).unwrap().id, "c");
    }

    #[test]
    fn span_display_uses_timecodes() {
        assert_eq!(TimeSpan::new(0.0, 75.0).to_string(), "00:00 --> 01:15");
    }

    #[test]
    fn lecture_serialization_skips_empty_optionals() {
        let json = serde_json::to_string(&lecture()).unwrap();
        assert!(!json.contains("slide_reference"));
        assert!(!json.contains("embedding"));
    }
}
