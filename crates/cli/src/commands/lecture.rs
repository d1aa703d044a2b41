//! Loading a lecture from files on disk.

use std::path::{Path, PathBuf};

use clap::Args;
use lectern_config::EngineConfig;
use lectern_core::{RawAssets, RawSlide};
use lectern_index::{Index, build_index, normalize, parse_transcript};
use tracing::debug;

/// Where to read a lecture from.
#[derive(Args, Debug, Clone)]
pub struct LectureArgs {
    /// Transcript file: `MM:SS --> MM:SS: text` lines, or a raw-assets `.json` file
    pub transcript: PathBuf,

    /// Slides JSON file: `[{"change_time": 5.0, "text": "...", "image_refs": []}]`
    #[arg(long)]
    pub slides: Option<PathBuf>,

    /// Source identity for the lecture id (defaults to the transcript file name)
    #[arg(long)]
    pub source: Option<String>,
}

impl LectureArgs {
    fn source_name(&self) -> String {
        self.source.clone().unwrap_or_else(|| {
            self.transcript
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.transcript.display().to_string())
        })
    }
}

/// Read the raw assets named by `args`.
pub fn read_assets(args: &LectureArgs) -> Result<RawAssets, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(&args.transcript)
        .map_err(|e| format!("Failed to read {}: {e}", args.transcript.display()))?;

    let mut raw = if is_json(&args.transcript) {
        let mut raw: RawAssets = serde_json::from_str(&text)
            .map_err(|e| format!("Invalid assets file {}: {e}", args.transcript.display()))?;
        if let Some(source) = &args.source {
            raw.source = source.clone();
        } else if raw.source.trim().is_empty() {
            raw.source = args.source_name();
        }
        raw
    } else {
        let source = args.source_name();
        RawAssets {
            transcript: parse_transcript(&source, &text)?,
            source,
            ..RawAssets::default()
        }
    };

    if let Some(path) = &args.slides {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
        raw.slides = serde_json::from_str::<Vec<RawSlide>>(&text)
            .map_err(|e| format!("Invalid slides file {}: {e}", path.display()))?;
    }

    debug!(
        source = %raw.source,
        lines = raw.transcript.len(),
        slides = raw.slides.len(),
        "Read lecture assets"
    );
    Ok(raw)
}

/// Read, normalize and index a lecture.
pub fn load(args: &LectureArgs, config: &EngineConfig) -> Result<Index, Box<dyn std::error::Error>> {
    let raw = read_assets(args)?;
    let lecture = normalize(&raw, &config.index)?;
    Ok(build_index(lecture, &config.index))
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}
