//! Core data model for the organizer graph.
//!
//! Nodes and links are always fetched from the graph store; the client only
//! ever holds transient snapshots of them wrapped in [`FetchedRecord`]s.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Identity ──────────────────────────────────────────────────────

/// Stable numeric handle assigned by the graph store to a node or link.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identity(pub i64);

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ── Properties ────────────────────────────────────────────────────

/// A scalar property value stored on a node or link.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PropertyValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

/// Property bag of a node or link, ordered by key.
pub type PropertyMap = BTreeMap<String, PropertyValue>;

// ── Graph Elements ────────────────────────────────────────────────

/// A typed, identified vertex in the graph store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphNode {
    pub identity: Identity,
    pub labels: Vec<String>,
    pub properties: PropertyMap,
}

impl GraphNode {
    /// The first label, used as the node's entity type.
    pub fn primary_label(&self) -> Option<&str> {
        self.labels.first().map(String::as_str)
    }

    /// String value of a property, if present and a string.
    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(PropertyValue::as_str)
    }
}

/// A typed, directed, identified edge between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphLink {
    pub identity: Identity,
    pub link_type: String,
    pub start: Identity,
    pub end: Identity,
    #[serde(default)]
    pub properties: PropertyMap,
}

/// A single column value of a result row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    Node(GraphNode),
    Link(GraphLink),
    Scalar(PropertyValue),
    Null,
}

// ── Records ───────────────────────────────────────────────────────

/// One result row, keyed by the column names of the statement that produced it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, column: impl Into<String>, value: Value) -> Self {
        self.fields.insert(column.into(), value);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: Value) {
        self.fields.insert(column.into(), value);
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.get(column)
    }

    pub fn node(&self, column: &str) -> Option<&GraphNode> {
        match self.fields.get(column) {
            Some(Value::Node(n)) => Some(n),
            _ => None,
        }
    }

    pub fn link(&self, column: &str) -> Option<&GraphLink> {
        match self.fields.get(column) {
            Some(Value::Link(l)) => Some(l),
            _ => None,
        }
    }

    pub fn scalar(&self, column: &str) -> Option<&PropertyValue> {
        match self.fields.get(column) {
            Some(Value::Scalar(v)) => Some(v),
            _ => None,
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

/// A record as handed out by a binding, stamped with the completion time of
/// the fetch that produced it.
///
/// Two fetched records with identical content but different `loaded_at`
/// are distinct snapshots: dependents keyed on `loaded_at` re-fetch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FetchedRecord {
    pub record: Record,
    pub loaded_at: DateTime<Utc>,
}

impl FetchedRecord {
    pub fn new(record: Record, loaded_at: DateTime<Utc>) -> Self {
        Self { record, loaded_at }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.record.get(column)
    }

    pub fn node(&self, column: &str) -> Option<&GraphNode> {
        self.record.node(column)
    }

    pub fn link(&self, column: &str) -> Option<&GraphLink> {
        self.record.link(column)
    }

    /// Pair the node in `column` with this record's fetch time.
    pub fn fetched_node(&self, column: &str) -> Option<FetchedNode> {
        self.node(column).map(|node| FetchedNode {
            node: node.clone(),
            loaded_at: self.loaded_at,
        })
    }
}

/// A node snapshot together with the time it was fetched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FetchedNode {
    pub node: GraphNode,
    pub loaded_at: DateTime<Utc>,
}

impl FetchedNode {
    pub fn identity(&self) -> Identity {
        self.node.identity
    }
}

// ── Query Parameters ──────────────────────────────────────────────

/// A query parameter: a scalar or a reference to a graph element.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ParamValue {
    Identity(Identity),
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl From<Identity> for ParamValue {
    fn from(id: Identity) -> Self {
        Self::Identity(id)
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for ParamValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

/// Named query parameters.
///
/// Equality is structural: two maps with the same entries are equal no
/// matter how they were built.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Params(BTreeMap<String, ParamValue>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    /// Identity-valued parameter, accepting a plain integer as well.
    pub fn identity(&self, name: &str) -> Option<Identity> {
        match self.0.get(name) {
            Some(ParamValue::Identity(id)) => Some(*id),
            Some(ParamValue::Integer(i)) => Some(Identity(*i)),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}
