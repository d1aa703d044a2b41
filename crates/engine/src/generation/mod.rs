//! Structured-output generation: prompts, schemas and the retry loop.

pub mod orchestrator;
pub mod prompt;
pub mod schema;

pub use orchestrator::{
    AttemptOutcome, AttemptRecord, CorrectionStrategy, GenerationRequest, GenerationResult,
    NameTheViolation, Orchestrator,
};
pub use prompt::{GROUNDING_RULES, build_prompt, render_bundle};
pub use schema::{CITATION_SHAPE, OutputSchema, TypedSchema, extract_json, non_blank};
