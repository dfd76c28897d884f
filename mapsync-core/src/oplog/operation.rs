/*
    operation.rs - Document mutations

    An operation names a verb, the kind of entity it touches (subject),
    the entity instance (metadata), and optionally a field (key) and a
    payload (value). Once stamped with a clock reading it is immutable and
    uniquely identified by that reading.

    Wire shape: {subject, metadata, verb, key?, value?, hlc}
*/

use crate::hlc::HlcTimestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The three kinds of mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    /// Create or replace a whole entity
    Upsert,
    /// Set one field of an entity
    Update,
    /// Remove one field of an entity
    Delete,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Upsert => "upsert",
            Verb::Update => "update",
            Verb::Delete => "delete",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An operation that has not been stamped by the clock yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewOperation {
    pub verb: Verb,
    pub subject: String,
    pub metadata: Value,
    pub key: Option<String>,
    pub value: Option<Value>,
}

impl NewOperation {
    pub fn upsert(subject: impl Into<String>, metadata: Value, value: Value) -> Self {
        NewOperation {
            verb: Verb::Upsert,
            subject: subject.into(),
            metadata,
            key: None,
            value: Some(value),
        }
    }

    pub fn update(
        subject: impl Into<String>,
        metadata: Value,
        key: impl Into<String>,
        value: Value,
    ) -> Self {
        NewOperation {
            verb: Verb::Update,
            subject: subject.into(),
            metadata,
            key: Some(key.into()),
            value: Some(value),
        }
    }

    pub fn delete(subject: impl Into<String>, metadata: Value, key: impl Into<String>) -> Self {
        NewOperation {
            verb: Verb::Delete,
            subject: subject.into(),
            metadata,
            key: Some(key.into()),
            value: None,
        }
    }

    /// Attach a clock reading, producing an immutable operation
    pub fn stamp(self, hlc: HlcTimestamp) -> Operation {
        Operation {
            subject: self.subject,
            metadata: self.metadata,
            verb: self.verb,
            key: self.key,
            value: self.value,
            hlc,
        }
    }
}

/// A stamped operation, as stored in the log and sent over the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub subject: String,

    #[serde(default)]
    pub metadata: Value,

    pub verb: Verb,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,

    pub hlc: HlcTimestamp,
}

impl Operation {
    /// Whether this operation addresses the given entity instance
    pub fn targets(&self, subject: &str, metadata: &Value) -> bool {
        self.subject == subject && &self.metadata == metadata
    }

    /// Whether this operation addresses exactly the given field
    pub fn touches_field(&self, subject: &str, metadata: &Value, key: Option<&str>) -> bool {
        self.targets(subject, metadata) && self.key.as_deref() == key
    }

    /// For upserts: whether the written entity carries `key`
    pub fn upsert_contains_key(&self, key: &str) -> bool {
        self.verb == Verb::Upsert
            && self
                .value
                .as_ref()
                .and_then(Value::as_object)
                .map_or(false, |fields| fields.contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hlc(counter: u32) -> HlcTimestamp {
        HlcTimestamp::new(1_000, counter, "node-a").unwrap()
    }

    #[test]
    fn test_constructors_shape_fields() {
        let upsert = NewOperation::upsert("feature", json!({"id": "f1"}), json!({"color": "red"}));
        assert_eq!(upsert.verb, Verb::Upsert);
        assert!(upsert.key.is_none());
        assert!(upsert.value.is_some());

        let update = NewOperation::update("feature", json!({"id": "f1"}), "color", json!("blue"));
        assert_eq!(update.key.as_deref(), Some("color"));

        let delete = NewOperation::delete("feature", json!({"id": "f1"}), "color");
        assert!(delete.value.is_none());
    }

    #[test]
    fn test_wire_shape_omits_absent_fields() {
        let op = NewOperation::delete("map", json!("m1"), "name").stamp(hlc(1));
        let encoded = serde_json::to_value(&op).unwrap();
        assert_eq!(
            encoded,
            json!({
                "subject": "map",
                "metadata": "m1",
                "verb": "delete",
                "key": "name",
                "hlc": "000000000001000:0000000001:node-a"
            })
        );
    }

    #[test]
    fn test_decode_from_peer_json() {
        let raw = r#"{"verb":"update","subject":"feature","metadata":{"id":"f1"},
                      "key":"color","value":"red","hlc":"1000:2:node-a"}"#;
        let op: Operation = serde_json::from_str(raw).unwrap();
        assert_eq!(op.verb, Verb::Update);
        assert_eq!(op.hlc, hlc(2));
        assert_eq!(op.value, Some(json!("red")));
    }

    #[test]
    fn test_decode_rejects_unknown_verb() {
        let raw = r#"{"verb":"merge","subject":"map","metadata":null,"hlc":"1:0:a"}"#;
        assert!(serde_json::from_str::<Operation>(raw).is_err());
    }

    #[test]
    fn test_touches_field() {
        let op = NewOperation::update("feature", json!("f1"), "color", json!("red")).stamp(hlc(1));
        assert!(op.touches_field("feature", &json!("f1"), Some("color")));
        assert!(!op.touches_field("feature", &json!("f1"), Some("width")));
        assert!(!op.touches_field("feature", &json!("f2"), Some("color")));
        assert!(!op.touches_field("datalayer", &json!("f1"), Some("color")));
        assert!(!op.touches_field("feature", &json!("f1"), None));
    }

    #[test]
    fn test_upsert_contains_key() {
        let op = NewOperation::upsert("feature", json!("f1"), json!({"color": "red"})).stamp(hlc(1));
        assert!(op.upsert_contains_key("color"));
        assert!(!op.upsert_contains_key("width"));

        let scalar = NewOperation::upsert("feature", json!("f1"), json!("red")).stamp(hlc(2));
        assert!(!scalar.upsert_contains_key("color"));

        let update = NewOperation::update("feature", json!("f1"), "color", json!({"color": 1}))
            .stamp(hlc(3));
        assert!(!update.upsert_contains_key("color"));
    }
}
