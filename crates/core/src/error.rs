//! Error types for the Lectern domain.
//!
//! Uses `thiserror` for ergonomic error definitions. Citation mismatches are
//! deliberately absent: they downgrade confidence and are never raised.

use thiserror::Error;

/// The top-level error type for all Lectern operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Ingestion ---
    #[error("Malformed lecture assets for '{source_id}': {reason}")]
    MalformedAsset { source_id: String, reason: String },

    // --- Context selection ---
    #[error("Empty context: {0}")]
    EmptyContext(String),

    // --- Generation ---
    #[error("Generation exhausted after {attempts} attempt(s): {violation}")]
    GenerationExhausted {
        attempts: u32,
        /// The last raw output the service produced, kept for manual inspection.
        last_raw: Option<String>,
        violation: String,
    },

    #[error("Generation service failed after {attempts} attempt(s): {source}")]
    Service {
        #[source]
        source: ServiceError,
        attempts: u32,
    },

    #[error("Generation cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32 },

    // --- Lookup ---
    #[error("Unknown lecture: {0}")]
    UnknownLecture(String),

    /// The caller passed something the operation cannot work on.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for a [`Error::MalformedAsset`].
    pub fn malformed(source_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedAsset {
            source_id: source_id.into(),
            reason: reason.into(),
        }
    }

    /// Number of generation attempts consumed before this error, if any.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Self::GenerationExhausted { attempts, .. }
            | Self::Service { attempts, .. }
            | Self::Cancelled { attempts } => Some(*attempts),
            _ => None,
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures reported by the external generation service.
///
/// All variants are transient: the orchestrator retries them within its
/// attempt budget before surfacing them.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("Generation service unavailable: {0}")]
    Unavailable(String),

    #[error("Rate limited by generation service, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Generation call timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
}
