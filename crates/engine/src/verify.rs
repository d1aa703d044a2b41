//! Citation verification against the indexed lecture.
//!
//! Verification never fails. A citation that cannot be traced to a segment is
//! marked unsupported, and the artifact carrying it is downgraded.

use lectern_config::VerifyConfig;
use lectern_core::{
    Citation, CitationTarget, GroundingStatus, Lecture, Segment, TimeSpan, VerifiedCitation,
};
use serde_json::Value;
use tracing::debug;

use crate::generation::GenerationResult;

/// Checks generated citations against one lecture.
#[derive(Debug, Clone)]
pub struct CitationVerifier {
    tolerance: f64,
}

impl CitationVerifier {
    pub fn new(config: &VerifyConfig) -> Self {
        Self {
            tolerance: config.tolerance_secs.max(0.0),
        }
    }

    /// Verify every citation in a generation result's parsed value.
    pub fn verify(&self, result: &GenerationResult, lecture: &Lecture) -> Vec<VerifiedCitation> {
        let citations = result
            .parsed
            .as_ref()
            .map(collect_citations)
            .unwrap_or_default();
        self.verify_citations(&citations, lecture)
    }

    pub fn verify_citations(
        &self,
        citations: &[Citation],
        lecture: &Lecture,
    ) -> Vec<VerifiedCitation> {
        let verified: Vec<VerifiedCitation> = citations
            .iter()
            .map(|c| self.verify_one(c, lecture))
            .collect();
        let grounded = verified.iter().filter(|v| v.is_grounded()).count();
        debug!(
            lecture_id = %lecture.id,
            total = verified.len(),
            grounded,
            "Verified citations"
        );
        verified
    }

    fn verify_one(&self, citation: &Citation, lecture: &Lecture) -> VerifiedCitation {
        let resolved = match &citation.target {
            CitationTarget::Segment { id } => match lecture.segment(id) {
                Some(seg) => Ok((seg, seg.span())),
                None => Err(format!("segment '{id}' does not exist")),
            },
            CitationTarget::Range { start, end } => self.resolve_range(*start, *end, lecture),
            CitationTarget::Unspecified => Err("citation names neither a segment nor a time range".into()),
        };

        let checked = resolved.and_then(|(seg, span)| {
            check_slide(citation.slide, seg, lecture)?;
            Ok((seg, span))
        });

        match checked {
            Ok((seg, span)) => VerifiedCitation {
                citation: snapped(citation, span),
                status: GroundingStatus::Grounded,
                segment_id: Some(seg.id.clone()),
                resolved: Some(span),
                slide: seg.slide_reference,
            },
            Err(reason) => VerifiedCitation {
                citation: citation.clone(),
                status: GroundingStatus::Unsupported { reason },
                segment_id: None,
                resolved: None,
                slide: None,
            },
        }
    }

    /// The segment a cited range lies within, allowing `tolerance` at each edge.
    fn resolve_range<'a>(
        &self,
        start: f64,
        end: f64,
        lecture: &'a Lecture,
    ) -> Result<(&'a Segment, TimeSpan), String> {
        if !(start.is_finite() && end.is_finite()) || start >= end {
            return Err(format!("invalid time range {start}..{end}"));
        }
        let tol = self.tolerance;
        let segments = &lecture.segments;

        // Segments are ordered; skip those ending before the range could start
        let first = segments.partition_point(|s| s.end_time + tol < end);
        let best = segments[first..]
            .iter()
            .take_while(|s| s.start_time - tol <= start)
            .filter(|s| start >= s.start_time - tol && end <= s.end_time + tol)
            .map(|s| {
                let clamped = TimeSpan::new(start.max(s.start_time), end.min(s.end_time));
                (s, clamped)
            })
            .filter(|(_, span)| span.duration() > 0.0)
            .max_by(|a, b| a.1.duration().total_cmp(&b.1.duration()));

        best.ok_or_else(|| {
            format!(
                "range {} does not lie within any segment",
                TimeSpan::new(start, end)
            )
        })
    }
}

/// A grounded range citation, rewritten to the part that lies in its segment.
fn snapped(citation: &Citation, span: TimeSpan) -> Citation {
    let mut citation = citation.clone();
    if let CitationTarget::Range { start, end } = &mut citation.target {
        *start = span.start;
        *end = span.end;
    }
    citation
}

fn check_slide(cited: Option<usize>, segment: &Segment, lecture: &Lecture) -> Result<(), String> {
    let Some(n) = cited else {
        return Ok(());
    };
    if lecture.slide(n).is_none() {
        return Err(format!("slide {n} does not exist"));
    }
    match segment.slide_reference {
        Some(actual) if actual == n => Ok(()),
        Some(actual) => Err(format!(
            "slide {n} cited, but segment '{}' is on slide {actual}",
            segment.id
        )),
        None => Err(format!("slide {n} cited, but segment '{}' has no slide", segment.id)),
    }
}

/// Every citation under a `"citations"` key, in document order.
pub fn collect_citations(value: &Value) -> Vec<Citation> {
    let mut out = Vec::new();
    walk(value, &mut out);
    out
}

fn walk(value: &Value, out: &mut Vec<Citation>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if key == "citations" {
                    match child {
                        Value::Array(items) => out.extend(items.iter().map(Citation::from_value)),
                        Value::Null => {}
                        single => out.push(Citation::from_value(single)),
                    }
                } else {
                    walk(child, out);
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|item| walk(item, out)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_config::IndexConfig;
    use lectern_core::{RawAssets, RawSlide, RawTranscriptLine};
    use lectern_index::normalize;
    use serde_json::json;

    fn lecture() -> Lecture {
        let raw = RawAssets {
            source: "bio101-photosynthesis".into(),
            transcript: vec![
                RawTranscriptLine::new(0.0, 30.0, "photosynthesis converts light to chemical energy"),
                RawTranscriptLine::new(30.0, 60.0, "chlorophyll absorbs red and blue light"),
                RawTranscriptLine::new(60.0, 90.0, "the calvin cycle fixes carbon"),
            ],
            slides: vec![
                RawSlide::new(5.0, "Photosynthesis Overview"),
                RawSlide::new(58.0, "Calvin Cycle"),
            ],
            frames: vec![],
        };
        normalize(&raw, &IndexConfig::default()).unwrap()
    }

    fn verifier() -> CitationVerifier {
        CitationVerifier::new(&VerifyConfig::default())
    }

    fn reason(v: &VerifiedCitation) -> &str {
        match &v.status {
            GroundingStatus::Unsupported { reason } => reason,
            GroundingStatus::Grounded => "",
        }
    }

    #[test]
    fn range_inside_segment_is_grounded() {
        let lec = lecture();
        let v = verifier().verify_citations(&[Citation::range(5.0, 20.0, "c").with_slide(1)], &lec);
        assert!(v[0].is_grounded());
        assert_eq!(v[0].segment_id.as_deref(), Some(lec.segments[0].id.as_str()));
        assert_eq!(v[0].slide, Some(1));
    }

    #[test]
    fn range_within_tolerance_is_snapped_to_its_segment() {
        let lec = lecture();
        let lenient = CitationVerifier::new(&VerifyConfig { tolerance_secs: 1.0 });
        let v = lenient.verify_citations(&[Citation::range(29.5, 60.5, "c")], &lec);
        assert!(v[0].is_grounded(), "{}", reason(&v[0]));
        let span = v[0].resolved.unwrap();
        assert_eq!((span.start, span.end), (30.0, 60.0));
        assert_eq!(v[0].citation.target, CitationTarget::Range { start: 30.0, end: 60.0 });
        assert_eq!(v[0].citation.claim, "c");
        assert_eq!(v[0].segment_id.as_deref(), Some(lec.segments[1].id.as_str()));
    }

    #[test]
    fn range_overhanging_a_segment_is_unsupported_by_default() {
        let lec = lecture();
        let v = verifier().verify_citations(
            &[Citation::range(1.0, 30.9, "c"), Citation::range(29.5, 60.0, "c")],
            &lec,
        );
        assert!(!v[0].is_grounded());
        assert!(!v[1].is_grounded());
        assert!(reason(&v[0]).contains("does not lie within"));
    }

    #[test]
    fn range_on_segment_edges_is_grounded_by_default() {
        let lec = lecture();
        let v = verifier().verify_citations(&[Citation::range(30.0, 60.0, "c")], &lec);
        assert!(v[0].is_grounded(), "{}", reason(&v[0]));
        assert_eq!(v[0].citation.target, CitationTarget::Range { start: 30.0, end: 60.0 });
    }

    #[test]
    fn range_spanning_segments_is_unsupported() {
        let v = verifier().verify_citations(&[Citation::range(10.0, 50.0, "c")], &lecture());
        assert!(!v[0].is_grounded());
        assert!(reason(&v[0]).contains("does not lie within"));
    }

    #[test]
    fn range_outside_lecture_is_unsupported() {
        let v = verifier().verify_citations(&[Citation::range(500.0, 520.0, "c")], &lecture());
        assert!(!v[0].is_grounded());
    }

    #[test]
    fn inverted_range_is_unsupported() {
        let v = verifier().verify_citations(&[Citation::range(20.0, 10.0, "c")], &lecture());
        assert!(reason(&v[0]).contains("invalid time range"));
    }

    #[test]
    fn segment_id_must_exist() {
        let lec = lecture();
        let good = Citation::segment(lec.segments[2].id.clone(), "c");
        let bad = Citation::segment("lec_nope-00009", "c");
        let v = verifier().verify_citations(&[good, bad], &lec);
        assert!(v[0].is_grounded());
        assert_eq!(v[0].slide, Some(2));
        assert!(!v[1].is_grounded());
    }

    #[test]
    fn wrong_or_missing_slide_is_unsupported() {
        let lec = lecture();
        let wrong = Citation::range(0.0, 30.0, "c").with_slide(2);
        let missing = Citation::range(0.0, 30.0, "c").with_slide(9);
        let v = verifier().verify_citations(&[wrong, missing], &lec);
        assert!(reason(&v[0]).contains("is on slide 1"));
        assert!(reason(&v[1]).contains("does not exist"));
    }

    #[test]
    fn collects_nested_citations_in_order() {
        let value = json!({
            "answer": "light to chemical energy",
            "citations": [{"start": "00:00", "end": "00:30", "slide": 1}],
            "sections": [
                {"heading": "a", "citations": [{"segment_id": "x"}]},
                {"heading": "b", "citations": null}
            ]
        });
        let found = collect_citations(&value);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].target, CitationTarget::Range { start: 0.0, end: 30.0 });
        assert_eq!(found[1].target, CitationTarget::Segment { id: "x".into() });
    }

    #[test]
    fn garbage_citation_is_unsupported_not_an_error() {
        let citations = collect_citations(&json!({"citations": ["whenever"]}));
        let v = verifier().verify_citations(&citations, &lecture());
        assert_eq!(v.len(), 1);
        assert!(!v[0].is_grounded());
    }

    #[test]
    fn verify_reads_parsed_value() {
        let result = GenerationResult {
            raw: String::new(),
            parsed: Some(json!({"citations": [{"start": 31, "end": 45}]})),
            attempts: 1,
            log: vec![],
        };
        let v = verifier().verify(&result, &lecture());
        assert!(v[0].is_grounded());
    }
}
