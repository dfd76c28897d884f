//! Applying operations to the document
//!
//! Each subject kind ("map", "feature", "datalayer", ...) has one updater
//! that knows how to apply a generic operation to objects of that kind.
//! Updaters must be idempotent: the engine may hand them the same
//! operation more than once.

use super::errors::{SyncError, SyncResult};
use crate::oplog::{Operation, Verb};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Subjects a map document is made of
pub const DEFAULT_SUBJECTS: [&str; 3] = ["map", "feature", "datalayer"];

/// Applies operations for one subject kind
pub trait Updater: Send + Sync {
    fn apply_message(&self, operation: &Operation);
}

/// Registry of updaters keyed by subject
#[derive(Clone, Default)]
pub struct Updaters {
    by_subject: HashMap<String, Arc<dyn Updater>>,
}

impl Updaters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the same updater for every default subject
    pub fn for_default_subjects(updater: Arc<dyn Updater>) -> Self {
        Self::for_subjects(DEFAULT_SUBJECTS, updater)
    }

    /// Register the same updater for each of `subjects`
    pub fn for_subjects<I, S>(subjects: I, updater: Arc<dyn Updater>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut updaters = Self::new();
        for subject in subjects {
            updaters.register(subject, updater.clone());
        }
        updaters
    }

    /// Register an updater, returning the one it replaces
    pub fn register(
        &mut self,
        subject: impl Into<String>,
        updater: Arc<dyn Updater>,
    ) -> Option<Arc<dyn Updater>> {
        self.by_subject.insert(subject.into(), updater)
    }

    /// Builder form of `register`
    pub fn with(mut self, subject: impl Into<String>, updater: Arc<dyn Updater>) -> Self {
        self.register(subject, updater);
        self
    }

    /// Look up the updater responsible for an operation
    pub fn get(&self, operation: &Operation) -> SyncResult<&Arc<dyn Updater>> {
        self.by_subject
            .get(&operation.subject)
            .ok_or_else(|| SyncError::UnknownSubject {
                subject: operation.subject.clone(),
                metadata: operation.metadata.to_string(),
            })
    }

    /// Hand an operation to its updater
    pub fn apply(&self, operation: &Operation) -> SyncResult<()> {
        self.get(operation)?.apply_message(operation);
        Ok(())
    }

    pub fn contains(&self, subject: &str) -> bool {
        self.by_subject.contains_key(subject)
    }

    pub fn subjects(&self) -> Vec<&str> {
        let mut subjects: Vec<&str> = self.by_subject.keys().map(String::as_str).collect();
        subjects.sort_unstable();
        subjects
    }
}

impl fmt::Debug for Updaters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Updaters").field("subjects", &self.subjects()).finish()
    }
}

/// Identifies one entity: its subject and its serialized metadata
pub type EntityKey = (String, String);

/// Idempotent in-memory document
///
/// Upsert replaces the whole entity, update sets one field, delete removes
/// one field. A field write to a missing entity creates it, so whether an
/// entity exists does not depend on the order field writes arrive in.
/// Entities that are not JSON objects are promoted to an empty object on
/// their first field update.
#[derive(Debug, Default)]
pub struct MemoryDocument {
    entities: Mutex<BTreeMap<EntityKey, Value>>,
    applied: AtomicUsize,
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    fn entities(&self) -> MutexGuard<'_, BTreeMap<EntityKey, Value>> {
        self.entities.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn key(subject: &str, metadata: &Value) -> EntityKey {
        (subject.to_string(), metadata.to_string())
    }

    /// Current value of an entity
    pub fn get(&self, subject: &str, metadata: &Value) -> Option<Value> {
        self.entities().get(&Self::key(subject, metadata)).cloned()
    }

    /// Current value of one field of an entity
    pub fn field(&self, subject: &str, metadata: &Value, key: &str) -> Option<Value> {
        self.get(subject, metadata)
            .and_then(|entity| entity.get(key).cloned())
    }

    /// Copy of the whole document
    pub fn snapshot(&self) -> BTreeMap<EntityKey, Value> {
        self.entities().clone()
    }

    /// How many times `apply_message` has been called
    pub fn applied_count(&self) -> usize {
        self.applied.load(Ordering::SeqCst)
    }
}

impl Updater for MemoryDocument {
    fn apply_message(&self, operation: &Operation) {
        self.applied.fetch_add(1, Ordering::SeqCst);
        let key = Self::key(&operation.subject, &operation.metadata);
        let mut entities = self.entities();

        match operation.verb {
            Verb::Upsert => {
                entities.insert(key, operation.value.clone().unwrap_or(Value::Null));
            }
            Verb::Update => {
                let Some(field) = operation.key.clone() else { return };
                let entity = entities.entry(key).or_insert_with(|| Value::Object(Map::new()));
                if !entity.is_object() {
                    *entity = Value::Object(Map::new());
                }
                if let Value::Object(fields) = entity {
                    fields.insert(field, operation.value.clone().unwrap_or(Value::Null));
                }
            }
            Verb::Delete => {
                let Some(field) = operation.key.as_deref() else { return };
                let entity = entities.entry(key).or_insert_with(|| Value::Object(Map::new()));
                if let Value::Object(fields) = entity {
                    fields.remove(field);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hlc::HlcTimestamp;
    use crate::oplog::NewOperation;
    use serde_json::json;

    fn stamp(op: NewOperation, counter: u32) -> Operation {
        op.stamp(HlcTimestamp::new(1, counter, "a").unwrap())
    }

    #[test]
    fn test_unknown_subject_is_an_error() {
        let updaters = Updaters::for_default_subjects(Arc::new(MemoryDocument::new()));
        let op = stamp(NewOperation::update("marker", json!("m1"), "x", json!(1)), 0);

        let err = updaters.apply(&op).unwrap_err();
        assert!(matches!(err, SyncError::UnknownSubject { ref subject, .. } if subject == "marker"));
    }

    #[test]
    fn test_default_subjects_registered() {
        let updaters = Updaters::for_default_subjects(Arc::new(MemoryDocument::new()));
        assert_eq!(updaters.subjects(), vec!["datalayer", "feature", "map"]);
        assert!(updaters.contains("feature"));
    }

    #[test]
    fn test_for_subjects_registers_only_those() {
        let updaters = Updaters::for_subjects(vec!["map".to_string(), "marker".to_string()], Arc::new(MemoryDocument::new()));
        assert_eq!(updaters.subjects(), vec!["map", "marker"]);
        assert!(!updaters.contains("feature"));
    }

    #[test]
    fn test_register_replaces_previous() {
        let first: Arc<dyn Updater> = Arc::new(MemoryDocument::new());
        let mut updaters = Updaters::new().with("map", first);
        let replaced = updaters.register("map", Arc::new(MemoryDocument::new()));
        assert!(replaced.is_some());
    }

    #[test]
    fn test_memory_document_verbs() {
        let doc = MemoryDocument::new();
        let f1 = json!({"id": "f1"});

        doc.apply_message(&stamp(NewOperation::upsert("feature", f1.clone(), json!({"color": "red", "width": 2})), 1));
        doc.apply_message(&stamp(NewOperation::update("feature", f1.clone(), "color", json!("blue")), 2));
        doc.apply_message(&stamp(NewOperation::delete("feature", f1.clone(), "width"), 3));

        assert_eq!(doc.get("feature", &f1), Some(json!({"color": "blue"})));
        assert_eq!(doc.field("feature", &f1, "color"), Some(json!("blue")));
        assert_eq!(doc.applied_count(), 3);
    }

    #[test]
    fn test_memory_document_is_idempotent() {
        let doc = MemoryDocument::new();
        let ops = vec![
            stamp(NewOperation::upsert("map", json!("m"), json!({"name": "Paris"})), 1),
            stamp(NewOperation::update("map", json!("m"), "zoom", json!(12)), 2),
            stamp(NewOperation::delete("map", json!("m"), "name"), 3),
        ];

        for op in &ops {
            doc.apply_message(op);
        }
        let once = doc.snapshot();

        for op in &ops {
            doc.apply_message(op);
        }
        assert_eq!(doc.snapshot(), once);
    }

    #[test]
    fn test_delete_on_missing_entity_creates_it_empty() {
        let doc = MemoryDocument::new();
        doc.apply_message(&stamp(NewOperation::delete("feature", json!("f9"), "color"), 1));
        assert_eq!(doc.get("feature", &json!("f9")), Some(json!({})));
    }

    #[test]
    fn test_update_on_missing_entity_creates_it() {
        let doc = MemoryDocument::new();
        doc.apply_message(&stamp(NewOperation::update("datalayer", json!(7), "name", json!("roads")), 1));
        assert_eq!(doc.get("datalayer", &json!(7)), Some(json!({"name": "roads"})));
    }
}
