//! `lectern context` — Show the context bundle a query would receive.

use std::path::PathBuf;

use lectern_core::{Anchor, Query, parse_timecode};
use lectern_engine::ContextSelector;

use super::{config_cmd, lecture};

pub async fn run(
    config_path: Option<PathBuf>,
    args: lecture::LectureArgs,
    text: &str,
    at: Option<String>,
    slide: Option<usize>,
    budget: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = config_cmd::load(config_path.as_deref())?;
    let index = lecture::load(&args, &config)?;

    let mut query = Query::new(text, budget.unwrap_or(config.context.token_budget));
    if let Some(anchor) = anchor(at.as_deref(), slide)? {
        query = query.with_anchor(anchor);
    }

    let bundle = ContextSelector::new(&config.context).select(&index, &query)?;
    tracing::info!(
        segments = bundle.segments.len(),
        slides = bundle.slides.len(),
        tokens = bundle.token_estimate,
        budget = bundle.budget,
        "Context selected"
    );
    println!("{}", serde_json::to_string_pretty(&bundle)?);
    Ok(())
}

fn anchor(at: Option<&str>, slide: Option<usize>) -> Result<Option<Anchor>, String> {
    if let Some(at) = at {
        let seconds = parse_timecode(at).ok_or_else(|| format!("Invalid timecode '{at}'"))?;
        return Ok(Some(Anchor::Time { at: seconds }));
    }
    Ok(slide.map(|index| Anchor::Slide { index }))
}
