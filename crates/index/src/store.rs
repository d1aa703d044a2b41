//! Snapshot store — the current index of every ingested lecture.
//!
//! Indexes are immutable `Arc` snapshots. Readers clone the `Arc` under a
//! momentary read lock and then work lock-free; re-ingestion swaps in a new
//! snapshot, so a reader sees the old index or the new one, never a mix.

use std::collections::HashMap;
use std::sync::Arc;

use lectern_core::LectureId;
use tokio::sync::RwLock;
use tracing::info;

use crate::index::Index;

#[derive(Clone, Default)]
pub struct LectureStore {
    snapshots: Arc<RwLock<HashMap<LectureId, Arc<Index>>>>,
}

impl LectureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a snapshot, returning the one it replaced.
    pub async fn insert(&self, index: Index) -> (Arc<Index>, Option<Arc<Index>>) {
        let id = index.id().clone();
        let snapshot = Arc::new(index);
        let previous = self
            .snapshots
            .write()
            .await
            .insert(id.clone(), snapshot.clone());
        if previous.is_some() {
            info!(lecture_id = %id, "Replaced lecture snapshot");
        }
        (snapshot, previous)
    }

    pub async fn get(&self, id: &LectureId) -> Option<Arc<Index>> {
        self.snapshots.read().await.get(id).cloned()
    }

    pub async fn remove(&self, id: &LectureId) -> bool {
        self.snapshots.write().await.remove(id).is_some()
    }

    /// Ids of all stored lectures, sorted.
    pub async fn ids(&self) -> Vec<LectureId> {
        let mut ids: Vec<LectureId> = self.snapshots.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn len(&self) -> usize {
        self.snapshots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
