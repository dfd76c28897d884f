//! Per-entity sync handles
//!
//! Map objects (the map itself, a feature, a datalayer) know their own
//! subject and metadata. `BoundSync` fills those in so the object only
//! passes what changed.

use super::engine::SyncEngine;
use super::errors::SyncResult;
use crate::oplog::Operation;
use serde_json::Value;

/// Something that can be synced as a single entity
pub trait SyncTarget {
    /// Subject kind and identifying metadata of this entity
    fn sync_metadata(&self) -> (String, Value);
}

/// `SyncEngine` edits scoped to one entity
#[derive(Debug)]
pub struct BoundSync<'a> {
    engine: &'a mut SyncEngine,
    subject: String,
    metadata: Value,
}

impl<'a> BoundSync<'a> {
    pub(crate) fn new(engine: &'a mut SyncEngine, subject: String, metadata: Value) -> Self {
        Self { engine, subject, metadata }
    }

    pub fn upsert(&mut self, value: Value) -> SyncResult<Operation> {
        self.engine.upsert(self.subject.clone(), self.metadata.clone(), value)
    }

    pub fn update(&mut self, key: impl Into<String>, value: Value) -> SyncResult<Operation> {
        self.engine.update(self.subject.clone(), self.metadata.clone(), key, value)
    }

    pub fn delete(&mut self, key: impl Into<String>) -> SyncResult<Operation> {
        self.engine.delete(self.subject.clone(), self.metadata.clone(), key)
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn metadata(&self) -> &Value {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hlc::ManualClock;
    use crate::sync::{MemoryDocument, SyncError};
    use crate::test_utils::manual_engine;
    use serde_json::json;
    use std::sync::Arc;

    struct Feature {
        id: &'static str,
        layer: u32,
    }

    impl SyncTarget for Feature {
        fn sync_metadata(&self) -> (String, Value) {
            ("feature".to_string(), json!({"id": self.id, "layerId": self.layer}))
        }
    }

    #[test]
    fn test_bound_edits_carry_subject_and_metadata() {
        let wall = ManualClock::new(1_000);
        let doc = Arc::new(MemoryDocument::new());
        let mut engine = manual_engine("a", &wall, doc.clone());
        let feature = Feature { id: "f1", layer: 2 };

        let mut sync = engine.bind_target(&feature);
        assert_eq!(sync.subject(), "feature");
        sync.upsert(json!({"name": "bakery"})).unwrap();
        sync.update("color", json!("pink")).unwrap();
        let op = sync.delete("name").unwrap();

        let (_, metadata) = feature.sync_metadata();
        assert_eq!(op.metadata, metadata);
        assert_eq!(doc.get("feature", &metadata), Some(json!({"color": "pink"})));
        assert_eq!(engine.log().len(), 3);
    }

    #[test]
    fn test_bind_to_unknown_subject_fails_on_first_edit() {
        let wall = ManualClock::new(1_000);
        let mut engine = manual_engine("a", &wall, Arc::new(MemoryDocument::new()));

        let err = engine.bind("marker", json!(1)).update("x", json!(1)).unwrap_err();
        assert!(matches!(err, SyncError::UnknownSubject { .. }));
    }
}
