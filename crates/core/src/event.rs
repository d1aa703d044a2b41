//! Domain events published by the engine.
//!
//! Subscribers (CLI progress output, host UI, audit logs) receive every event
//! and filter for what they care about.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A lecture was normalized and indexed
    LectureIngested {
        lecture_id: String,
        segments: usize,
        slides: usize,
        timestamp: DateTime<Utc>,
    },

    /// One call to the generation service finished
    GenerationAttempted {
        task: String,
        attempt: u32,
        /// "ok", "schema_violation", "unavailable", "rate_limited", "timeout"
        outcome: String,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// An artifact was produced and stored
    ArtifactProduced {
        artifact_id: String,
        lecture_id: String,
        kind: String,
        grounded: bool,
        timestamp: DateTime<Utc>,
    },

    /// An artifact came back with unsupported citations
    GroundingDowngraded {
        lecture_id: String,
        kind: String,
        grounded: usize,
        total: usize,
        timestamp: DateTime<Utc>,
    },

    /// An operation failed
    ErrorOccurred {
        context: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
