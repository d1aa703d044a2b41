//! The engine facade — the only surface callers need.
//!
//! Owns the lecture snapshots, the artifact store, the shared grounding
//! pipeline and the event bus. Every operation takes a cancellation token and
//! touches only the lecture it names.

use std::sync::Arc;

use chrono::Utc;
use lectern_config::EngineConfig;
use lectern_core::{
    Anchor, Answer, Artifact, ChecklistItem, CoverageReport, DomainEvent, Error, EventBus,
    Flashcard, Generated, GenerationService, LectureId, QuizBody, QuizItem, QuizKind, RawAssets,
    Result, StoredArtifact, SummarySection,
};
use lectern_index::{Index, LectureStore, build_index, normalize};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::artifacts::{
    self, AnswerMode, DebateVerdict, GroundingPipeline, MarkingItem, SummaryStyle, answer,
    checklist, coverage,
    flashcard, marking, quiz, summary,
};
use crate::context::ContextSelector;
use crate::generation::{CorrectionStrategy, Orchestrator};
use crate::store::ArtifactStore;
use crate::verify::CitationVerifier;

/// A reference to an ingested lecture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LectureHandle {
    pub id: LectureId,
    pub segments: usize,
    pub slides: usize,
    pub duration: f64,
}

impl LectureHandle {
    pub fn of(index: &Index) -> Self {
        Self {
            id: index.id().clone(),
            segments: index.len(),
            slides: index.lecture().slides.len(),
            duration: index.lecture().duration,
        }
    }
}

pub struct Engine {
    config: EngineConfig,
    lectures: LectureStore,
    artifacts: ArtifactStore,
    orchestrator: Arc<Orchestrator>,
    pipeline: GroundingPipeline,
    events: Arc<EventBus>,
}

impl Engine {
    /// Build an engine. The config is validated the same way a loaded one is.
    pub fn new(service: Arc<dyn GenerationService>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let events = Arc::new(EventBus::new(config.event_capacity));
        let orchestrator = Orchestrator::new(service, config.generation.clone(), events.clone());
        Ok(Self::assemble(orchestrator, config, events))
    }

    /// An engine whose schema violations are corrected by `correction`.
    pub fn with_correction(
        service: Arc<dyn GenerationService>,
        config: EngineConfig,
        correction: Arc<dyn CorrectionStrategy>,
    ) -> Result<Self> {
        config.validate()?;
        let events = Arc::new(EventBus::new(config.event_capacity));
        let orchestrator = Orchestrator::new(service, config.generation.clone(), events.clone())
            .with_correction(correction);
        Ok(Self::assemble(orchestrator, config, events))
    }

    fn assemble(orchestrator: Orchestrator, config: EngineConfig, events: Arc<EventBus>) -> Self {
        let orchestrator = Arc::new(orchestrator);
        let pipeline = GroundingPipeline::new(
            ContextSelector::new(&config.context),
            orchestrator.clone(),
            CitationVerifier::new(&config.verify),
            config.context.token_budget,
        );
        info!(
            service = %orchestrator.service_name(),
            max_attempts = config.generation.max_attempts,
            max_concurrent = config.generation.max_concurrent,
            "Engine ready"
        );
        Self {
            config,
            lectures: LectureStore::new(),
            artifacts: ArtifactStore::new(),
            orchestrator,
            pipeline,
            events,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Normalize and index a lecture, replacing any previous version of it.
    pub async fn ingest(&self, raw: RawAssets) -> Result<LectureHandle> {
        let config = self.config.index.clone();
        let source = raw.source.clone();
        let built = tokio::task::spawn_blocking(move || -> Result<Index> {
            let lecture = normalize(&raw, &config)?;
            Ok(build_index(lecture, &config))
        })
        .await
        .map_err(|e| Error::Internal(format!("ingestion task failed: {e}")));

        let index = self.observe("ingest", built.and_then(|r| r))?;
        let handle = LectureHandle::of(&index);
        let (_, previous) = self.lectures.insert(index).await;

        info!(
            lecture_id = %handle.id,
            source = %source,
            segments = handle.segments,
            slides = handle.slides,
            replaced = previous.is_some(),
            "Lecture ingested"
        );
        self.events.publish(DomainEvent::LectureIngested {
            lecture_id: handle.id.to_string(),
            segments: handle.segments,
            slides: handle.slides,
            timestamp: Utc::now(),
        });
        Ok(handle)
    }

    /// The current index snapshot for a lecture.
    pub async fn index(&self, handle: &LectureHandle) -> Result<Arc<Index>> {
        self.lectures
            .get(&handle.id)
            .await
            .ok_or_else(|| Error::UnknownLecture(handle.id.to_string()))
    }

    pub async fn answer_question(
        &self,
        handle: &LectureHandle,
        question: &str,
        anchor: Option<Anchor>,
        mode: &AnswerMode,
        cancel: &CancellationToken,
    ) -> Result<Answer> {
        let index = self.index(handle).await?;
        let result =
            answer::answer_question(&self.pipeline, &index, question, anchor, mode, cancel).await;
        let answer = self.observe("answer", result)?;
        self.record(&index, Artifact::Answer(answer.clone())).await;
        Ok(answer)
    }

    pub async fn generate_quiz(
        &self,
        handle: &LectureHandle,
        kinds: &[QuizKind],
        count: usize,
        cancel: &CancellationToken,
    ) -> Result<Generated<QuizItem>> {
        let index = self.index(handle).await?;
        let result = quiz::generate_quiz(&self.pipeline, &index, kinds, count, cancel).await;
        let generated = self.observe("quiz", result)?;
        self.record_all(&index, &generated, |q| Artifact::Quiz(q.clone())).await;
        Ok(generated)
    }

    pub async fn generate_flashcards(
        &self,
        handle: &LectureHandle,
        count: usize,
        cancel: &CancellationToken,
    ) -> Result<Generated<Flashcard>> {
        let index = self.index(handle).await?;
        let result = flashcard::generate_flashcards(
            &self.pipeline,
            &index,
            count,
            self.config.artifacts.unit_window_secs,
            self.config.artifacts.max_units,
            cancel,
        )
        .await;
        let generated = self.observe("flashcards", result)?;
        self.record_all(&index, &generated, |f| Artifact::Flashcard(f.clone())).await;
        Ok(generated)
    }

    /// One quiz item per flashcard, anchored where each card is taught.
    pub async fn quiz_from_flashcards(
        &self,
        handle: &LectureHandle,
        cards: &[Flashcard],
        kinds: &[QuizKind],
        cancel: &CancellationToken,
    ) -> Result<Generated<QuizItem>> {
        let index = self.index(handle).await?;
        let result = quiz::quiz_from_flashcards(&self.pipeline, &index, cards, kinds, cancel).await;
        let generated = self.observe("quiz", result)?;
        self.record_all(&index, &generated, |q| Artifact::Quiz(q.clone())).await;
        Ok(generated)
    }

    pub async fn generate_checklist(
        &self,
        handle: &LectureHandle,
        cancel: &CancellationToken,
    ) -> Result<Generated<ChecklistItem>> {
        let index = self.index(handle).await?;
        let units = &self.config.artifacts;
        let result = checklist::generate_checklist(
            &self.pipeline,
            &index,
            units.unit_window_secs,
            units.max_units,
            cancel,
        )
        .await;
        let generated = self.observe("checklist", result)?;
        self.record_all(&index, &generated, |c| Artifact::Checklist(c.clone())).await;
        Ok(generated)
    }

    /// Where a checklist item is taught: `(seconds, slide)`.
    pub fn locate(&self, item: &ChecklistItem) -> (f64, Option<usize>) {
        artifacts::locate(item)
    }

    pub async fn generate_summary(
        &self,
        handle: &LectureHandle,
        style: &SummaryStyle,
        cancel: &CancellationToken,
    ) -> Result<Generated<SummarySection>> {
        let index = self.index(handle).await?;
        let units = &self.config.artifacts;
        let result = summary::generate_summary(
            &self.pipeline,
            &index,
            style,
            units.unit_window_secs,
            units.max_units,
            cancel,
        )
        .await;
        let generated = self.observe("summary", result)?;
        self.record_all(&index, &generated, |s| Artifact::Summary(s.clone())).await;
        Ok(generated)
    }

    /// Answer a question about a passage selected from `summary`.
    pub async fn explain_passage(
        &self,
        handle: &LectureHandle,
        summary: &[SummarySection],
        selected: &str,
        question: &str,
        cancel: &CancellationToken,
    ) -> Result<Answer> {
        let index = self.index(handle).await?;
        let result =
            summary::explain_passage(&self.pipeline, &index, summary, selected, question, cancel).await;
        let answer = self.observe("explain", result)?;
        self.record(&index, Artifact::Answer(answer.clone())).await;
        Ok(answer)
    }

    pub async fn analyze_coverage(
        &self,
        handle: &LectureHandle,
        item: &str,
        cancel: &CancellationToken,
    ) -> Result<CoverageReport> {
        let index = self.index(handle).await?;
        let result = coverage::analyze_coverage(&self.pipeline, &index, item, cancel).await;
        let report = self.observe("coverage", result)?;
        self.record(&index, Artifact::Coverage(report.clone())).await;
        Ok(report)
    }

    /// Mark fill-in-the-blank answers. Needs no lecture.
    pub async fn mark_answers(
        &self,
        items: &[MarkingItem],
        cancel: &CancellationToken,
    ) -> Result<Vec<bool>> {
        let result = marking::mark_answers(&self.orchestrator, items, cancel).await;
        self.observe("marking", result)
    }

    /// Mark a learner's answer to a debate item. Needs no lecture.
    pub async fn mark_debate(
        &self,
        item: &QuizBody,
        answer: &str,
        cancel: &CancellationToken,
    ) -> Result<DebateVerdict> {
        let result = marking::mark_debate(&self.orchestrator, item, answer, cancel).await;
        self.observe("marking", result)
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    pub fn events(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.events.subscribe()
    }

    async fn record(&self, index: &Index, artifact: Artifact) -> String {
        let kind = artifact.kind();
        let confidence = artifact.confidence();
        let stored = StoredArtifact::new(index.id().clone(), artifact);
        let id = self.artifacts.put(stored).await;

        if let lectern_core::Confidence::Low { grounded, total } = confidence {
            warn!(
                lecture_id = %index.id(),
                kind,
                grounded,
                total,
                "Artifact downgraded to low confidence"
            );
            self.events.publish(DomainEvent::GroundingDowngraded {
                lecture_id: index.id().to_string(),
                kind: kind.to_string(),
                grounded,
                total,
                timestamp: Utc::now(),
            });
        }
        self.events.publish(DomainEvent::ArtifactProduced {
            artifact_id: id.clone(),
            lecture_id: index.id().to_string(),
            kind: kind.to_string(),
            grounded: confidence.is_grounded(),
            timestamp: Utc::now(),
        });
        id
    }

    async fn record_all<T>(&self, index: &Index, generated: &Generated<T>, wrap: impl Fn(&T) -> Artifact) {
        for item in &generated.items {
            self.record(index, wrap(item)).await;
        }
        for failure in &generated.failures {
            self.publish_error(&format!("unit {}", failure.unit), &failure.error);
        }
    }

    fn observe<T>(&self, context: &str, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            warn!(context, error = %e, "Operation failed");
            self.publish_error(context, e);
        }
        result
    }

    fn publish_error(&self, context: &str, error: &Error) {
        self.events.publish(DomainEvent::ErrorOccurred {
            context: context.to_string(),
            error_message: error.to_string(),
            timestamp: Utc::now(),
        });
    }
}
