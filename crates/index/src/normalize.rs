//! Asset normalization — raw transcript, slides and frames into a [`Lecture`].
//!
//! Transcript time is authoritative. Slide change times and frame timestamps
//! are matched to transcript segments; they never split or move them.

use lectern_config::IndexConfig;
use lectern_core::{
    Error, FrameRef, Lecture, LectureId, RawAssets, RawFrame, RawSlide, RawTranscriptLine, Result,
    Segment, Slide, parse_timecode,
};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

/// Deterministic lecture id: `lec_` + 16 hex chars of SHA-256(source).
pub fn lecture_id(source: &str) -> LectureId {
    let digest = Sha256::digest(source.as_bytes());
    LectureId(format!("lec_{}", &hex::encode(digest)[..16]))
}

/// Segment id for the `index`-th segment of a lecture.
pub fn segment_id(lecture: &LectureId, index: usize) -> String {
    format!("{lecture}-{index:05}")
}

/// Parse the `MM:SS --> MM:SS: text` transcript export format.
///
/// Hour-qualified timecodes (`H:MM:SS`) are accepted. Blank lines are
/// skipped; a non-blank line that does not start with a timecode pair
/// continues the previous line's text.
pub fn parse_transcript(source: &str, text: &str) -> Result<Vec<RawTranscriptLine>> {
    let re = regex_lite::Regex::new(
        r"^\s*(\d+(?::\d{1,2}){0,2}(?:\.\d+)?)\s*-->\s*(\d+(?::\d{1,2}){0,2}(?:\.\d+)?)\s*:?\s?(.*)$",
    )
    .map_err(|e| Error::Internal(format!("transcript pattern: {e}")))?;

    let mut lines: Vec<RawTranscriptLine> = Vec::new();
    for (n, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match re.captures(line) {
            Some(caps) => {
                let start = parse_timecode(&caps[1]);
                let end = parse_timecode(&caps[2]);
                let (Some(start), Some(end)) = (start, end) else {
                    return Err(Error::malformed(
                        source,
                        format!("line {}: invalid timecode in '{}'", n + 1, line.trim()),
                    ));
                };
                lines.push(RawTranscriptLine::new(start, end, caps[3].trim()));
            }
            None => match lines.last_mut() {
                Some(prev) => {
                    if !prev.text.is_empty() {
                        prev.text.push(' ');
                    }
                    prev.text.push_str(line.trim());
                }
                None => {
                    return Err(Error::malformed(
                        source,
                        format!("line {}: expected 'MM:SS --> MM:SS: text'", n + 1),
                    ));
                }
            },
        }
    }
    Ok(lines)
}

/// Normalize raw assets into an immutable, time-aligned [`Lecture`].
///
/// Identical input always yields an identical lecture (ids included).
pub fn normalize(raw: &RawAssets, config: &IndexConfig) -> Result<Lecture> {
    let id = lecture_id(&raw.source);

    let spans = repair_transcript(raw)?;
    if spans.is_empty() {
        return Err(Error::malformed(&raw.source, "transcript has zero segments"));
    }

    if !raw.slides.is_empty() && !raw.slides.iter().any(RawSlide::has_content) {
        return Err(Error::malformed(
            &raw.source,
            "slides have no extractable text and no image data",
        ));
    }

    let slides = build_slides(&raw.slides);
    let frames = sorted_frames(&raw.source, &raw.frames)?;

    let segments: Vec<Segment> = spans
        .into_iter()
        .enumerate()
        .map(|(i, span)| {
            let midpoint = span.start + (span.end - span.start) / 2.0;
            let slide = slide_at(&slides, midpoint);
            Segment {
                id: segment_id(&id, i),
                start_time: span.start,
                end_time: span.end,
                text: span.text,
                slide_reference: slide.map(|s| s.index),
                frame_reference: nearest_frame(&frames, midpoint, config.frame_tolerance_secs),
                image_refs: slide.map(|s| s.image_refs.clone()).unwrap_or_default(),
                embedding: span.embedding,
            }
        })
        .collect();

    let last_end = segments.last().map(|s| s.end_time).unwrap_or(0.0);
    let last_frame = frames.last().map(|f| f.timestamp).unwrap_or(0.0);

    debug!(
        lecture_id = %id,
        segments = segments.len(),
        slides = slides.len(),
        frames = frames.len(),
        "Normalized lecture"
    );

    Ok(Lecture {
        id,
        source: raw.source.clone(),
        duration: last_end.max(last_frame),
        segments,
        slides,
    })
}

struct Span {
    start: f64,
    end: f64,
    text: String,
    embedding: Option<Vec<f32>>,
}

/// Drop blank lines, order by start and clamp overlaps.
///
/// A line that starts before the previous one ends is moved to start at the
/// previous end; if nothing of it remains, its text joins the previous span.
fn repair_transcript(raw: &RawAssets) -> Result<Vec<Span>> {
    let mut lines: Vec<&RawTranscriptLine> = Vec::with_capacity(raw.transcript.len());
    for line in &raw.transcript {
        if line.text.trim().is_empty() {
            continue;
        }
        if !line.start.is_finite() || !line.end.is_finite() || line.start < 0.0 {
            return Err(Error::malformed(
                &raw.source,
                format!("invalid timestamps {}..{} on '{}'", line.start, line.end, line.text.trim()),
            ));
        }
        if line.end < line.start {
            return Err(Error::malformed(
                &raw.source,
                format!("line ends before it starts ({} < {})", line.end, line.start),
            ));
        }
        lines.push(line);
    }
    lines.sort_by(|a, b| a.start.total_cmp(&b.start));

    let mut spans: Vec<Span> = Vec::with_capacity(lines.len());
    for line in lines {
        let text = line.text.trim().to_string();
        let mut start = line.start;

        if let Some(prev) = spans.last_mut() {
            if start < prev.end {
                if line.end <= prev.end {
                    debug!(at = line.start, "Merging fully overlapped transcript line");
                    prev.text.push(' ');
                    prev.text.push_str(&text);
                    continue;
                }
                warn!(
                    from = line.start,
                    to = prev.end,
                    "Clamping overlapping transcript line"
                );
                start = prev.end;
            }
        }

        spans.push(Span {
            start,
            end: line.end,
            text,
            embedding: line.embedding.clone(),
        });
    }
    Ok(spans)
}

fn build_slides(raw: &[RawSlide]) -> Vec<Slide> {
    let mut ordered: Vec<&RawSlide> = raw.iter().collect();
    ordered.sort_by(|a, b| a.change_time.total_cmp(&b.change_time));

    ordered
        .into_iter()
        .enumerate()
        .map(|(i, s)| {
            let index = i + 1;
            let title = s
                .text
                .lines()
                .map(str::trim)
                .find(|l| !l.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("Slide {index}"));
            Slide {
                index,
                change_time: s.change_time,
                title,
                text: s.text.trim().to_string(),
                image_refs: s.image_refs.clone(),
            }
        })
        .collect()
}

/// The slide on screen at `t`. Before the first change, the first slide.
fn slide_at(slides: &[Slide], t: f64) -> Option<&Slide> {
    let after = slides.partition_point(|s| s.change_time <= t);
    match after {
        0 => slides.first(),
        n => slides.get(n - 1),
    }
}

fn sorted_frames(source: &str, raw: &[RawFrame]) -> Result<Vec<RawFrame>> {
    if let Some(bad) = raw.iter().find(|f| !f.timestamp.is_finite()) {
        return Err(Error::malformed(
            source,
            format!("frame '{}' has no valid timestamp", bad.image),
        ));
    }
    let mut frames = raw.to_vec();
    frames.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
    Ok(frames)
}

fn nearest_frame(frames: &[RawFrame], t: f64, tolerance: f64) -> Option<FrameRef> {
    let i = frames.partition_point(|f| f.timestamp < t);
    let before = i.checked_sub(1).and_then(|j| frames.get(j));
    let after = frames.get(i);

    let best = match (before, after) {
        (Some(b), Some(a)) => {
            if (t - b.timestamp) <= (a.timestamp - t) {
                b
            } else {
                a
            }
        }
        (Some(b), None) => b,
        (None, Some(a)) => a,
        (None, None) => return None,
    };

    ((best.timestamp - t).abs() <= tolerance).then(|| FrameRef {
        timestamp: best.timestamp,
        image: best.image.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assets() -> RawAssets {
        RawAssets {
            source: "bio101-week3".into(),
            transcript: vec![
                RawTranscriptLine::new(0.0, 30.0, "photosynthesis converts light to chemical energy"),
                RawTranscriptLine::new(30.0, 60.0, "the light reactions happen in the thylakoid"),
                RawTranscriptLine::new(60.0, 95.0, "the calvin cycle fixes carbon dioxide"),
            ],
            slides: vec![
                RawSlide::new(5.0, "Photosynthesis Overview\nlight -> sugar"),
                RawSlide {
                    change_time: 58.0,
                    text: "Calvin Cycle".into(),
                    image_refs: vec!["IMAGE_0002.png".into()],
                },
            ],
            frames: vec![
                RawFrame { timestamp: 14.0, image: "frame_14.jpg".into() },
                RawFrame { timestamp: 100.0, image: "frame_100.jpg".into() },
            ],
        }
    }

    #[test]
    fn ids_are_deterministic() {
        let config = IndexConfig::default();
        let a = normalize(&assets(), &config).unwrap();
        let b = normalize(&assets(), &config).unwrap();
        assert_eq!(a, b);
        assert!(a.id.as_str().starts_with("lec_"));
        assert_eq!(a.id.as_str().len(), 4 + 16);
        assert_eq!(a.segments[1].id, format!("{}-00001", a.id));
    }

    #[test]
    fn segment_snaps_to_first_slide_before_first_change() {
        let lecture = normalize(&assets(), &IndexConfig::default()).unwrap();
        assert_eq!(lecture.segments[0].slide_reference, Some(1));
        assert_eq!(lecture.slides[0].title, "Photosynthesis Overview");
    }

    #[test]
    fn slide_linked_by_midpoint() {
        let lecture = normalize(&assets(), &IndexConfig::default()).unwrap();
        // midpoint 45 < 58: still slide 1
        assert_eq!(lecture.segments[1].slide_reference, Some(1));
        // midpoint 77.5 >= 58
        assert_eq!(lecture.segments[2].slide_reference, Some(2));
        assert_eq!(lecture.segments[2].image_refs, vec!["IMAGE_0002.png".to_string()]);
    }

    #[test]
    fn frames_within_tolerance_only() {
        let lecture = normalize(&assets(), &IndexConfig::default()).unwrap();
        assert_eq!(lecture.segments[0].frame_reference.as_ref().unwrap().image, "frame_14.jpg");
        assert!(lecture.segments[1].frame_reference.is_none());
        assert!(lecture.segments[2].frame_reference.is_none());
    }

    #[test]
    fn duration_covers_trailing_frames() {
        let lecture = normalize(&assets(), &IndexConfig::default()).unwrap();
        assert_eq!(lecture.duration, 100.0);
    }

    #[test]
    fn overlaps_are_clamped_and_swallowed_lines_merged() {
        let raw = RawAssets {
            source: "overlap".into(),
            transcript: vec![
                RawTranscriptLine::new(0.0, 10.0, "first"),
                RawTranscriptLine::new(8.0, 20.0, "second"),
                RawTranscriptLine::new(12.0, 18.0, "inside"),
                RawTranscriptLine::new(20.0, 25.0, "   "),
            ],
            ..Default::default()
        };
        let lecture = normalize(&raw, &IndexConfig::default()).unwrap();
        assert_eq!(lecture.segments.len(), 2);
        assert_eq!(lecture.segments[1].start_time, 10.0);
        assert_eq!(lecture.segments[1].text, "second inside");
    }

    #[test]
    fn unsorted_lines_are_ordered() {
        let raw = RawAssets {
            source: "unsorted".into(),
            transcript: vec![
                RawTranscriptLine::new(10.0, 20.0, "b"),
                RawTranscriptLine::new(0.0, 10.0, "a"),
            ],
            ..Default::default()
        };
        let lecture = normalize(&raw, &IndexConfig::default()).unwrap();
        assert_eq!(lecture.segments[0].text, "a");
    }

    #[test]
    fn empty_transcript_is_malformed() {
        let raw = RawAssets {
            source: "empty".into(),
            transcript: vec![RawTranscriptLine::new(0.0, 1.0, "  ")],
            ..Default::default()
        };
        assert!(matches!(
            normalize(&raw, &IndexConfig::default()),
            Err(Error::MalformedAsset { .. })
        ));
    }

    #[test]
    fn contentless_slides_are_malformed() {
        let mut raw = assets();
        raw.slides = vec![RawSlide::new(0.0, ""), RawSlide::new(10.0, "   ")];
        assert!(matches!(
            normalize(&raw, &IndexConfig::default()),
            Err(Error::MalformedAsset { .. })
        ));
    }

    #[test]
    fn one_blank_slide_is_tolerated() {
        let mut raw = assets();
        raw.slides.push(RawSlide::new(90.0, ""));
        let lecture = normalize(&raw, &IndexConfig::default()).unwrap();
        assert_eq!(lecture.slides[2].title, "Slide 3");
    }

    #[test]
    fn reversed_line_is_malformed() {
        let raw = RawAssets {
            source: "reversed".into(),
            transcript: vec![RawTranscriptLine::new(10.0, 5.0, "backwards")],
            ..Default::default()
        };
        assert!(normalize(&raw, &IndexConfig::default()).is_err());
    }

    #[test]
    fn parse_transcript_export_format() {
        let text = "00:00 --> 00:30: photosynthesis converts light\n\
                    to chemical energy\n\
                    \n\
                    1:02:03 --> 1:02:10: hour marks work";
        let lines = parse_transcript("t", text).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].end, 30.0);
        assert_eq!(lines[0].text, "photosynthesis converts light to chemical energy");
        assert_eq!(lines[1].start, 3723.0);
    }

    #[test]
    fn parse_transcript_rejects_leading_prose() {
        assert!(parse_transcript("t", "hello\n00:00 --> 00:05: hi").is_err());
    }
}
