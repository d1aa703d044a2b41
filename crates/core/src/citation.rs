//! Citations and their verification outcome.
//!
//! Generators are asked to cite either a segment id or a time range (plus,
//! optionally, the slide). The wire form is lenient: times may be numbers of
//! seconds or `MM:SS` strings. Anything that cannot be interpreted becomes an
//! [`CitationTarget::Unspecified`] citation, which verification marks unsupported.

use serde::{Deserialize, Serialize};

use crate::segment::TimeSpan;
use crate::timecode::parse_timecode;

/// What a citation points at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CitationTarget {
    Segment { id: String },
    Range { start: f64, end: f64 },
    Unspecified,
}

/// A generated claim's pointer back into the lecture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub target: CitationTarget,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slide: Option<usize>,

    /// The claim text this citation supports
    #[serde(default)]
    pub claim: String,
}

/// A time value as generators write it.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireTime {
    Seconds(f64),
    Code(String),
}

impl WireTime {
    pub fn seconds(&self) -> Option<f64> {
        match self {
            Self::Seconds(s) if s.is_finite() => Some(*s),
            Self::Seconds(_) => None,
            Self::Code(c) => parse_timecode(c),
        }
    }
}

/// The JSON shape generators are asked to emit for a citation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CitationWire {
    #[serde(default)]
    pub segment_id: Option<String>,
    #[serde(default)]
    pub start: Option<WireTime>,
    #[serde(default)]
    pub end: Option<WireTime>,
    #[serde(default)]
    pub slide: Option<usize>,
    #[serde(default)]
    pub claim: Option<String>,
}

impl Citation {
    pub fn segment(id: impl Into<String>, claim: impl Into<String>) -> Self {
        Self {
            target: CitationTarget::Segment { id: id.into() },
            slide: None,
            claim: claim.into(),
        }
    }

    pub fn range(start: f64, end: f64, claim: impl Into<String>) -> Self {
        Self {
            target: CitationTarget::Range { start, end },
            slide: None,
            claim: claim.into(),
        }
    }

    pub fn with_slide(mut self, slide: usize) -> Self {
        self.slide = Some(slide);
        self
    }

    /// Interpret a wire citation. A segment id wins over a time range.
    pub fn from_wire(wire: CitationWire) -> Self {
        let target = match (&wire.segment_id, &wire.start, &wire.end) {
            (Some(id), _, _) if !id.trim().is_empty() => CitationTarget::Segment {
                id: id.trim().to_string(),
            },
            (_, Some(start), Some(end)) => match (start.seconds(), end.seconds()) {
                (Some(start), Some(end)) => CitationTarget::Range { start, end },
                _ => CitationTarget::Unspecified,
            },
            _ => CitationTarget::Unspecified,
        };
        Self {
            target,
            slide: wire.slide,
            claim: wire.claim.unwrap_or_default(),
        }
    }

    /// Interpret an arbitrary JSON value as a citation.
    pub fn from_value(value: &serde_json::Value) -> Self {
        serde_json::from_value::<CitationWire>(value.clone())
            .map(Self::from_wire)
            .unwrap_or(Self {
                target: CitationTarget::Unspecified,
                slide: None,
                claim: String::new(),
            })
    }
}

/// Verification verdict for one citation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GroundingStatus {
    Grounded,
    Unsupported { reason: String },
}

/// A citation after checking it against the lecture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiedCitation {
    pub citation: Citation,
    pub status: GroundingStatus,

    /// The segment the citation resolved to (grounded citations only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment_id: Option<String>,

    /// The cited span clamped to the resolved segment (grounded citations only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved: Option<TimeSpan>,

    /// Slide of the resolved segment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slide: Option<usize>,
}

impl VerifiedCitation {
    pub fn is_grounded(&self) -> bool {
        matches!(self.status, GroundingStatus::Grounded)
    }
}

/// How far an artifact can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "level", rename_all = "snake_case")]
pub enum Confidence {
    /// Every citation is grounded and there is at least one
    Grounded,
    /// Shown with a visible downgrade marker
    Low { grounded: usize, total: usize },
}

impl Confidence {
    pub fn from_citations(citations: &[VerifiedCitation]) -> Self {
        let total = citations.len();
        let grounded = citations.iter().filter(|c| c.is_grounded()).count();
        if total > 0 && grounded == total {
            Self::Grounded
        } else {
            Self::Low { grounded, total }
        }
    }

    pub fn is_grounded(&self) -> bool {
        matches!(self, Self::Grounded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verified(grounded: bool) -> VerifiedCitation {
        VerifiedCitation {
            citation: Citation::segment("x", "claim"),
            status: if grounded {
                GroundingStatus::Grounded
            } else {
                GroundingStatus::Unsupported { reason: "nope".into() }
            },
            segment_id: None,
            resolved: None,
            slide: None,
        }
    }

    #[test]
    fn wire_accepts_timecodes_and_numbers() {
        let c = Citation::from_value(&serde_json::json!({
            "start": "00:05", "end": 30, "slide": 1, "claim": "light to chemical energy"
        }));
        assert_eq!(c.target, CitationTarget::Range { start: 5.0, end: 30.0 });
        assert_eq!(c.slide, Some(1));
    }

    #[test]
    fn wire_prefers_segment_id() {
        let c = Citation::from_value(&serde_json::json!({
            "segment_id": "lec_1-00002", "start": 1, "end": 2
        }));
        assert_eq!(c.target, CitationTarget::Segment { id: "lec_1-00002".into() });
    }

    #[test]
    fn garbage_becomes_unspecified() {
        let c = Citation::from_value(&serde_json::json!("at the start"));
        assert_eq!(c.target, CitationTarget::Unspecified);
        let c = Citation::from_value(&serde_json::json!({"start": "soon", "end": "later"}));
        assert_eq!(c.target, CitationTarget::Unspecified);
    }

    #[test]
    fn confidence_requires_at_least_one_citation() {
        assert_eq!(
            Confidence::from_citations(&[]),
            Confidence::Low { grounded: 0, total: 0 }
        );
        assert!(Confidence::from_citations(&[verified(true), verified(true)]).is_grounded());
        assert_eq!(
            Confidence::from_citations(&[verified(true), verified(false)]),
            Confidence::Low { grounded: 1, total: 2 }
        );
    }
}
