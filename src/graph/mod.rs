//! Process-model graph entities: nodes, relationships and their property maps.
//!
//! These are read-only projections of database records. They are built by a
//! store backend per request and normalized into JSON by [`json`].

mod json;

pub use json::{node_to_json, rel_to_json, JsonObject, OutputMode};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Relationship type of process-flow edges.
pub const SEQUENCE: &str = "SEQ";

/// Label of attachments whose quantity lives on the linking relationship.
pub const SPAREPART: &str = "Sparepart";

/// Relationship property merged into sparepart attachments.
pub const AMOUNT: &str = "amount";

/// A single property value. Neo4j only stores scalars and homogeneous lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<PropertyValue>),
}

impl From<&PropertyValue> for Value {
    fn from(value: &PropertyValue) -> Self {
        match value {
            PropertyValue::Null => Value::Null,
            PropertyValue::Boolean(b) => Value::Bool(*b),
            PropertyValue::Integer(i) => Value::Number((*i).into()),
            // NaN and infinities have no JSON form
            PropertyValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            PropertyValue::String(s) => Value::String(s.clone()),
            PropertyValue::List(items) => Value::Array(items.iter().map(Value::from).collect()),
        }
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Integer(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Float(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Boolean(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

/// Property map that keeps insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties(Vec<(String, PropertyValue)>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a property. A replaced key keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<PropertyValue>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<PropertyValue>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut props = Properties::new();
        for (k, v) in iter {
            props.insert(k, v);
        }
        props
    }
}

/// A graph node: identity, labels and properties.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: i64,
    labels: Vec<String>,
    pub properties: Properties,
}

impl Node {
    /// Build a node; duplicate labels are dropped, first occurrence wins.
    pub fn new<L, S>(id: i64, labels: L, properties: Properties) -> Self
    where
        L: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for label in labels {
            let label = label.into();
            if !unique.contains(&label) {
                unique.push(label);
            }
        }
        Self {
            id,
            labels: unique,
            properties,
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

/// A directed, typed relationship between two nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    pub id: i64,
    pub rel_type: String,
    pub start: i64,
    pub end: i64,
    pub properties: Properties,
}

impl Relationship {
    pub fn new(
        id: i64,
        rel_type: impl Into<String>,
        start: i64,
        end: i64,
        properties: Properties,
    ) -> Self {
        Self {
            id,
            rel_type: rel_type.into(),
            start,
            end,
            properties,
        }
    }

    pub fn is_sequence(&self) -> bool {
        self.rel_type == SEQUENCE
    }
}
