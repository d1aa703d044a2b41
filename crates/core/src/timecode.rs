//! Timecode parsing and formatting.
//!
//! Lectures are addressed in seconds internally. Humans (and generators)
//! write `M:SS`, `MM:SS` or `H:MM:SS`; these helpers convert both ways.

/// Parse a timecode into seconds.
///
/// Accepts `SS`, `SS.sss`, `M:SS`, `MM:SS` and `H:MM:SS` (fractional seconds
/// allowed in the last field). Returns `None` for anything else, including
/// minute or second fields of 60 or more in the colon forms.
pub fn parse_timecode(input: &str) -> Option<f64> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    let fields: Vec<&str> = input.split(':').collect();
    let (hours, minutes, seconds) = match fields.as_slice() {
        [s] => return parse_field(s).filter(|v| v.is_finite()),
        [m, s] => (0.0, parse_whole(m)?, parse_field(s)?),
        [h, m, s] => (parse_whole(h)?, parse_whole(m)?, parse_field(s)?),
        _ => return None,
    };

    if seconds >= 60.0 || (fields.len() == 3 && minutes >= 60.0) {
        return None;
    }

    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

fn parse_whole(field: &str) -> Option<f64> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

fn parse_field(field: &str) -> Option<f64> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
        return None;
    }
    field.parse().ok()
}

/// Format seconds as `MM:SS`, or `HH:MM:SS` once past the first hour.
pub fn format_timecode(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes:02}:{secs:02}")
    }
}

/// Format a `[start, end]` span the way transcripts are exported: `MM:SS --> MM:SS`.
pub fn format_span(start: f64, end: f64) -> String {
    format!("{} --> {}", format_timecode(start), format_timecode(end))
}
