//! `lectern ingest` — Normalize a lecture and print its shape.

use std::path::PathBuf;

use lectern_core::format_span;
use lectern_engine::LectureHandle;

use super::{config_cmd, lecture};

pub async fn run(
    config_path: Option<PathBuf>,
    args: lecture::LectureArgs,
    show_segments: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = config_cmd::load(config_path.as_deref())?;
    let index = lecture::load(&args, &config)?;
    let handle = LectureHandle::of(&index);

    tracing::info!(
        lecture_id = %handle.id,
        segments = handle.segments,
        slides = handle.slides,
        "Lecture indexed"
    );
    println!("{}", serde_json::to_string_pretty(&handle)?);

    if show_segments {
        println!();
        for segment in index.segments() {
            let slide = segment
                .slide_reference
                .map(|s| format!("slide {s}"))
                .unwrap_or_else(|| "-".into());
            println!(
                "{}  {}  [{slide}]  {}",
                segment.id,
                format_span(segment.start_time, segment.end_time),
                segment.text
            );
        }
    }
    Ok(())
}
