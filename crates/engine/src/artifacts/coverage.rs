//! Coverage analysis: does the lecture teach a given objective?

use std::sync::Arc;

use lectern_core::{CoverageReport, Error, Query, Result};
use lectern_index::Index;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::{GroundingPipeline, Task};
use crate::generation::{CITATION_SHAPE, GROUNDING_RULES, OutputSchema, TypedSchema, non_blank};

#[derive(Debug, Deserialize)]
struct CoverageWire {
    covered: bool,
    explanation: String,
}

fn schema() -> Arc<dyn OutputSchema> {
    Arc::new(
        TypedSchema::<CoverageWire>::new(
            "coverage",
            format!(
                r#"{{"covered": true, "explanation": "<where and how the lecture covers it, or what is missing>", "citations": [{CITATION_SHAPE}]}}"#
            ),
        )
        .with_check(|wire| non_blank("explanation", &wire.explanation)),
    )
}

pub async fn analyze_coverage(
    pipeline: &GroundingPipeline,
    index: &Index,
    item: &str,
    cancel: &CancellationToken,
) -> Result<CoverageReport> {
    if item.trim().is_empty() {
        return Err(Error::EmptyContext("coverage item is empty".into()));
    }
    let task = Task::new(
        "coverage",
        GROUNDING_RULES,
        format!(
            "Decide whether the lecture covers this learning objective: \"{}\".\n\
             Set covered to true only if the context teaches it. Cite the segments that do; \
             if it is not covered, explain what is missing and leave citations empty.",
            item.trim()
        ),
    );
    let grounded = pipeline
        .ground::<CoverageWire, _>(
            index,
            Query::new(item, pipeline.token_budget()),
            task,
            |_| schema(),
            cancel,
        )
        .await?;

    Ok(CoverageReport {
        item: item.to_string(),
        covered: grounded.value.covered,
        explanation: grounded.value.explanation,
        citations: grounded.citations,
        confidence: grounded.confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::fixtures::{photosynthesis, pipeline};
    use crate::test_helpers::{ScriptedService, Step};
    use lectern_core::Confidence;

    #[tokio::test]
    async fn covered_item_is_grounded() {
        let service = Arc::new(ScriptedService::new(vec![Step::text(
            r#"{"covered": true, "explanation": "Rubisco is introduced at 01:30.",
                "citations": [{"start": "01:30", "end": "02:00", "slide": 2}]}"#,
        )]));
        let (pipeline, _) = pipeline(service.clone());
        let report = analyze_coverage(
            &pipeline,
            &photosynthesis(),
            "Name the enzyme that fixes carbon",
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(report.covered);
        assert_eq!(report.confidence, Confidence::Grounded);
        assert!(service.prompts()[0].user.contains("rubisco is the enzyme"));
    }

    #[tokio::test]
    async fn uncovered_item_has_low_confidence() {
        let service = Arc::new(ScriptedService::new(vec![Step::text(
            r#"{"covered": false, "explanation": "The lecture never discusses the krebs cycle.", "citations": []}"#,
        )]));
        let (pipeline, _) = pipeline(service);
        let report = analyze_coverage(
            &pipeline,
            &photosynthesis(),
            "Explain the krebs cycle",
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(!report.covered);
        assert_eq!(report.confidence, Confidence::Low { grounded: 0, total: 0 });
    }

    #[tokio::test]
    async fn blank_item_is_rejected_before_generation() {
        let service = Arc::new(ScriptedService::new(vec![]));
        let (pipeline, _) = pipeline(service.clone());
        let err = analyze_coverage(&pipeline, &photosynthesis(), "  ", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EmptyContext(_)));
        assert_eq!(service.call_count(), 0);
    }
}
