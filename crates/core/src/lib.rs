//! # Lectern Core
//!
//! Domain types, traits, and error definitions for the Lectern lecture
//! grounding engine. Every other crate depends inward on this one.
//!
//! The generation backend is a trait here ([`GenerationService`]); the
//! engine crate drives it and the host application implements it.

pub mod error;
pub mod timecode;
pub mod segment;
pub mod assets;
pub mod query;
pub mod citation;
pub mod artifact;
pub mod service;
pub mod event;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result, ServiceError};
pub use timecode::{format_span, format_timecode, parse_timecode};
pub use segment::{FrameRef, Lecture, LectureId, Segment, Slide, TimeSpan};
pub use assets::{RawAssets, RawFrame, RawSlide, RawTranscriptLine};
pub use query::{Anchor, ContextBundle, Query};
pub use citation::{Citation, CitationTarget, Confidence, GroundingStatus, VerifiedCitation};
pub use artifact::{
    Answer, Artifact, CategorizedItem, ChecklistItem, CoverageReport, DebateSide, Flashcard, Generated, QuizBody,
    QuizItem, QuizKind, StoredArtifact, SummarySection, UnitFailure,
};
pub use service::{GenerationService, Prompt};
pub use event::{DomainEvent, EventBus};
