use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use keepsake_types::{EntityId, ImageScope};

/// Sweep index of the image store.
///
/// Lists the entities known to own an image set and when the staging set was
/// last written. Garbage collection reads it instead of walking every key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImageIndex {
    pub entities: BTreeSet<String>,
    pub staged_at: Option<u64>,
}

impl ImageIndex {
    pub fn insert(&mut self, entity: &EntityId) -> bool {
        self.entities.insert(entity.as_str().to_string())
    }

    pub fn remove(&mut self, entity: &EntityId) -> bool {
        self.entities.remove(entity.as_str())
    }

    pub fn contains(&self, entity: &EntityId) -> bool {
        self.entities.contains(entity.as_str())
    }

    /// Scopes of the indexed entities. Ids that no longer parse are skipped.
    pub fn scopes(&self) -> impl Iterator<Item = ImageScope> + '_ {
        self.entities
            .iter()
            .filter_map(|id| EntityId::new(id.as_str()).ok())
            .map(ImageScope::Entity)
    }

    /// Whether the staging set was written before `cutoff_ms`.
    pub fn staged_before(&self, cutoff_ms: u64) -> bool {
        self.staged_at.is_some_and(|at| at < cutoff_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staged_before_requires_a_timestamp() {
        let mut index = ImageIndex::default();
        assert!(!index.staged_before(u64::MAX));
        index.staged_at = Some(100);
        assert!(index.staged_before(101));
        assert!(!index.staged_before(100));
    }

    #[test]
    fn scopes_skip_unparseable_ids() {
        let mut index = ImageIndex::default();
        index.insert(&EntityId::new("job1").unwrap());
        index.entities.insert(String::new());
        let scopes: Vec<ImageScope> = index.scopes().collect();
        assert_eq!(scopes, vec![ImageScope::Entity(EntityId::new("job1").unwrap())]);
    }

    #[test]
    fn serializes_camel_case() {
        let mut index = ImageIndex::default();
        index.insert(&EntityId::new("job1").unwrap());
        index.staged_at = Some(7);
        let json = serde_json::to_string(&index).unwrap();
        assert_eq!(json, r#"{"entities":["job1"],"stagedAt":7}"#);
    }
}
