//! `lectern search` — Rank lecture segments against a query.

use std::path::PathBuf;

use lectern_core::format_span;

use super::{config_cmd, lecture};

const PREVIEW_CHARS: usize = 80;

pub async fn run(
    config_path: Option<PathBuf>,
    args: lecture::LectureArgs,
    query: &str,
    top: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = config_cmd::load(config_path.as_deref())?;
    let index = lecture::load(&args, &config)?;

    let hits = index.query_by_similarity(query, top);
    if hits.is_empty() {
        println!("No segments match \"{query}\"");
        return Ok(());
    }

    for (segment, score) in hits {
        println!(
            "{score:>7.3}  {}  {}  {}",
            format_span(segment.start_time, segment.end_time),
            segment.id,
            preview(&segment.text)
        );
    }
    Ok(())
}

fn preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(PREVIEW_CHARS).collect();
    format!("{}…", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_truncates_on_char_boundaries() {
        assert_eq!(preview("short"), "short");
        let long = "é".repeat(100);
        let cut = preview(&long);
        assert_eq!(cut.chars().count(), PREVIEW_CHARS + 1);
        assert!(cut.ends_with('…'));
    }
}
