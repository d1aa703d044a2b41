//! # Lectern Engine
//!
//! Grounded study-artifact generation over indexed lectures.
//!
//! - [`context`]: pick the minimal slice of a lecture under a token budget
//! - [`generation`]: structured-output calls with schema validation and bounded retry
//! - [`verify`]: check generated citations against the lecture
//! - [`artifacts`]: answers, quizzes, flashcards, checklists, summaries, coverage, marking
//! - [`engine`]: the facade tying them together

pub mod artifacts;
pub mod context;
pub mod engine;
pub mod generation;
pub mod store;
pub mod verify;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use artifacts::{AnswerMode, DebateVerdict, MarkingItem, SummaryDetail, SummaryStyle};
pub use context::ContextSelector;
pub use engine::{Engine, LectureHandle};
pub use generation::{
    CorrectionStrategy, GenerationRequest, GenerationResult, NameTheViolation, Orchestrator,
    OutputSchema,
};
pub use store::ArtifactStore;
pub use verify::{CitationVerifier, collect_citations};
