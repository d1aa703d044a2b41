//! Artifact store — every produced artifact, kept until deleted.

use std::sync::Arc;

use lectern_core::{LectureId, StoredArtifact};
use tokio::sync::RwLock;

/// An in-memory artifact store. Cloning shares the same entries.
#[derive(Clone)]
pub struct ArtifactStore {
    entries: Arc<RwLock<Vec<StoredArtifact>>>,
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Store an artifact, returning its id.
    pub async fn put(&self, artifact: StoredArtifact) -> String {
        let id = artifact.id.clone();
        self.entries.write().await.push(artifact);
        id
    }

    pub async fn get(&self, id: &str) -> Option<StoredArtifact> {
        self.entries
            .read()
            .await
            .iter()
            .find(|a| a.id == id)
            .cloned()
    }

    /// All artifacts for one lecture, oldest first.
    pub async fn list_for(&self, lecture: &LectureId) -> Vec<StoredArtifact> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|a| &a.lecture_id == lecture)
            .cloned()
            .collect()
    }

    pub async fn delete(&self, id: &str) -> bool {
        let mut entries = self.entries.write().await;
        let len_before = entries.len();
        entries.retain(|a| a.id != id);
        entries.len() < len_before
    }

    pub async fn count(&self) -> usize {
        self.entries.read().await.len()
    }
}

impl Default for ArtifactStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_core::{Artifact, Confidence, CoverageReport};

    fn coverage(lecture: &str, item: &str) -> StoredArtifact {
        StoredArtifact::new(
            LectureId(lecture.into()),
            Artifact::Coverage(CoverageReport {
                item: item.into(),
                covered: true,
                explanation: "taught early on".into(),
                citations: vec![],
                confidence: Confidence::Low { grounded: 0, total: 0 },
            }),
        )
    }

    #[tokio::test]
    async fn put_get_delete() {
        let store = ArtifactStore::new();
        let id = store.put(coverage("lec_a", "heaps")).await;
        assert!(store.get(&id).await.is_some());
        assert!(store.delete(&id).await);
        assert!(!store.delete(&id).await);
        assert!(store.get(&id).await.is_none());
    }

    #[tokio::test]
    async fn list_is_per_lecture_in_insertion_order() {
        let store = ArtifactStore::new();
        store.put(coverage("lec_a", "first")).await;
        store.put(coverage("lec_b", "other")).await;
        store.put(coverage("lec_a", "second")).await;

        let listed = store.list_for(&LectureId("lec_a".into())).await;
        let items: Vec<_> = listed
            .iter()
            .map(|a| match &a.artifact {
                Artifact::Coverage(c) => c.item.as_str(),
                _ => "",
            })
            .collect();
        assert_eq!(items, vec!["first", "second"]);
        assert_eq!(store.count().await, 3);
    }

    #[tokio::test]
    async fn clones_share_entries() {
        let store = ArtifactStore::new();
        let other = store.clone();
        store.put(coverage("lec_a", "x")).await;
        assert_eq!(other.count().await, 1);
    }
}
