//! `lectern verify` — Check the citations in a generated response.

use std::path::{Path, PathBuf};

use lectern_core::{Confidence, VerifiedCitation};
use lectern_engine::generation::extract_json;
use lectern_engine::{CitationVerifier, collect_citations};
use serde::Serialize;

use super::{config_cmd, lecture};

#[derive(Debug, Serialize)]
struct Report {
    confidence: Confidence,
    citations: Vec<VerifiedCitation>,
}

pub async fn run(
    config_path: Option<PathBuf>,
    args: lecture::LectureArgs,
    response: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = config_cmd::load(config_path.as_deref())?;
    let index = lecture::load(&args, &config)?;

    let raw = std::fs::read_to_string(response)
        .map_err(|e| format!("Failed to read {}: {e}", response.display()))?;
    let value = extract_json(&raw).map_err(|e| format!("No JSON in {}: {e}", response.display()))?;

    let citations = CitationVerifier::new(&config.verify)
        .verify_citations(&collect_citations(&value), index.lecture());
    let report = Report {
        confidence: Confidence::from_citations(&citations),
        citations,
    };

    if !report.confidence.is_grounded() {
        tracing::warn!(confidence = ?report.confidence, "Response is not fully grounded");
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
