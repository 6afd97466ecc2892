//! Entity schema: which node types exist, which fields their forms edit,
//! and how each type is described on a chip.
//!
//! The schema is a value handed to the views at startup rather than a
//! global table, so callers and tests can substitute their own.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;
use crate::ident::Ident;
use crate::types::{GraphNode, PropertyMap};

// ── Declarations ──────────────────────────────────────────────────

/// Primitive kind of an editable field.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    #[default]
    String,
}

/// One editable field of an entity type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldDef {
    pub name: Ident,
    #[serde(default)]
    pub kind: FieldKind,
}

impl FieldDef {
    pub fn string(name: &str) -> Result<Self, SchemaError> {
        Ok(Self {
            name: Ident::parse(name)?,
            kind: FieldKind::String,
        })
    }
}

/// How a node of a given type is turned into a display string.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DescribeRule {
    /// Interpolate `{field}` placeholders, e.g. `"{first} {last}"`.
    Template(String),
    /// Show a single property.
    Field(String),
    /// The `name` property if present, else the JSON of all properties.
    #[default]
    Fallback,
}

/// Configuration form of an entity type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntityDef {
    pub name: Ident,
    /// Collection title; defaults to the type name.
    #[serde(default)]
    pub title: Option<String>,
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub describe: DescribeRule,
}

// ── Describe Capability ───────────────────────────────────────────

/// Turns a property bag into a short display string.
pub trait Describe: Send + Sync {
    fn describe(&self, properties: &PropertyMap) -> String;
}

impl Describe for DescribeRule {
    fn describe(&self, properties: &PropertyMap) -> String {
        match self {
            Self::Template(template) => render_template(template, properties),
            Self::Field(field) => properties
                .get(field)
                .map(ToString::to_string)
                .unwrap_or_default(),
            Self::Fallback => match properties.get("name") {
                Some(name) => name.to_string(),
                None => serde_json::to_string(properties).unwrap_or_default(),
            },
        }
    }
}

/// Replace `{key}` with the property value; missing keys render empty.
fn render_template(template: &str, properties: &PropertyMap) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                if let Some(value) = properties.get(&after[..close]) {
                    out.push_str(&value.to_string());
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out.trim().to_string()
}

// ── Resolved Schema ───────────────────────────────────────────────

/// A declared entity type with its ordered fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityType {
    pub name: Ident,
    pub title: String,
    pub fields: Vec<FieldDef>,
}

impl EntityType {
    pub fn field_names(&self) -> impl Iterator<Item = &Ident> {
        self.fields.iter().map(|f| &f.name)
    }

    /// Resolve a field name, rejecting anything not declared for this type.
    pub fn field(&self, name: &str) -> Result<&Ident, SchemaError> {
        self.fields
            .iter()
            .map(|f| &f.name)
            .find(|n| n.as_str() == name)
            .ok_or_else(|| SchemaError::UnknownField {
                entity_type: self.name.to_string(),
                field: name.to_string(),
            })
    }
}

/// The full schema: entity types, their describers, and the suggested
/// relationship types.
#[derive(Clone)]
pub struct Schema {
    entities: Vec<EntityType>,
    describers: HashMap<String, Arc<dyn Describe>>,
    link_suggestions: Vec<Ident>,
    fallback: Arc<dyn Describe>,
}

impl Schema {
    /// Build a schema from configuration declarations.
    pub fn from_defs(defs: Vec<EntityDef>, link_suggestions: Vec<Ident>) -> Result<Self, SchemaError> {
        for (i, def) in defs.iter().enumerate() {
            if defs[..i].iter().any(|d| d.name == def.name) {
                return Err(SchemaError::DuplicateEntityType(def.name.to_string()));
            }
        }
        Ok(Self::build(defs, link_suggestions))
    }

    fn build(defs: Vec<EntityDef>, link_suggestions: Vec<Ident>) -> Self {
        let mut entities = Vec::with_capacity(defs.len());
        let mut describers: HashMap<String, Arc<dyn Describe>> = HashMap::new();

        for def in defs {
            describers.insert(def.name.to_string(), Arc::new(def.describe));
            entities.push(EntityType {
                title: def.title.unwrap_or_else(|| def.name.to_string()),
                name: def.name,
                fields: def.fields,
            });
        }

        Self {
            entities,
            describers,
            link_suggestions,
            fallback: Arc::new(DescribeRule::Fallback),
        }
    }

    /// Replace the describer for one entity type.
    pub fn with_describer(mut self, entity_type: &str, describer: Arc<dyn Describe>) -> Self {
        self.describers.insert(entity_type.to_string(), describer);
        self
    }

    pub fn entities(&self) -> &[EntityType] {
        &self.entities
    }

    pub fn entity(&self, name: &str) -> Result<&EntityType, SchemaError> {
        self.entities
            .iter()
            .find(|e| e.name.as_str() == name)
            .ok_or_else(|| SchemaError::UnknownEntityType(name.to_string()))
    }

    pub fn link_suggestions(&self) -> &[Ident] {
        &self.link_suggestions
    }

    /// Validate a relationship type. Any identifier is accepted unless
    /// `strict`, in which case it must be one of the suggestions.
    pub fn link_type(&self, raw: &str, strict: bool) -> Result<Ident, SchemaError> {
        let ident = Ident::parse(raw)?;
        if strict && !self.link_suggestions.contains(&ident) {
            return Err(SchemaError::LinkTypeNotAllowed(raw.to_string()));
        }
        Ok(ident)
    }

    /// Describe properties as a node of `entity_type`.
    pub fn describe_as(&self, entity_type: &str, properties: &PropertyMap) -> String {
        self.describers
            .get(entity_type)
            .unwrap_or(&self.fallback)
            .describe(properties)
    }

    /// Describe a node using the describer of its primary label.
    pub fn describe(&self, node: &GraphNode) -> String {
        self.describe_as(node.primary_label().unwrap_or_default(), &node.properties)
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("entities", &self.entities)
            .field("link_suggestions", &self.link_suggestions)
            .finish_non_exhaustive()
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::build(default_entities(), default_link_suggestions())
    }
}

fn entity(name: &str, title: &str, fields: &[&str], describe: DescribeRule) -> EntityDef {
    EntityDef {
        name: Ident(name.to_string()),
        title: Some(title.to_string()),
        fields: fields
            .iter()
            .map(|f| FieldDef {
                name: Ident(f.to_string()),
                kind: FieldKind::String,
            })
            .collect(),
        describe,
    }
}

/// The entity types the organizer ships with.
pub fn default_entities() -> Vec<EntityDef> {
    vec![
        entity(
            "Person",
            "People",
            &["first", "last"],
            DescribeRule::Template("{first} {last}".to_string()),
        ),
        entity("Organization", "Organizations", &["name"], DescribeRule::Fallback),
        entity("Division", "Divisions", &["name", "short_name"], DescribeRule::Fallback),
        entity("Department", "Departments", &["name", "short_name"], DescribeRule::Fallback),
        entity("Team", "Teams", &["name"], DescribeRule::Fallback),
        entity("JobTitle", "Job Titles", &["name"], DescribeRule::Fallback),
        entity(
            "Note",
            "Notes",
            &["title", "body"],
            DescribeRule::Field("title".to_string()),
        ),
    ]
}

/// Relationship types offered by the add-link flow.
pub fn default_link_suggestions() -> Vec<Ident> {
    [
        "WorksAt", "MemberOf", "PartOf", "ReportsTo", "Manages", "HasTitle", "Knows", "About",
    ]
    .iter()
    .map(|s| Ident(s.to_string()))
    .collect()
}
