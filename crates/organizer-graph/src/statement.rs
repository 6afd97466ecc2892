//! The statements the organizer issues against the graph, and their Cypher.
//!
//! Identities and property values always travel as parameters. Labels,
//! relationship types, and property keys cannot be parameterized in Cypher,
//! so they are carried as validated [`Ident`]s and only those are spliced
//! into the statement text.

use std::fmt;

use organizer_core::Ident;

use crate::client::GraphError;

/// Parameter names used by the built-in statements.
pub mod param {
    pub const ID: &str = "id";
    pub const FROM: &str = "from";
    pub const TO: &str = "to";
}

/// Result column names produced by the built-in statements.
pub mod column {
    pub const NODE: &str = "m";
    pub const LINK: &str = "link";
    pub const OTHER: &str = "other";
    pub const DELETED: &str = "deleted";
}

/// Whether an execution may mutate the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    /// Idempotent fetch.
    Read,
    /// May create, update, or delete.
    Write,
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
        }
    }
}

/// Which side of the focal node a relationship is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Outgoing,
    Incoming,
}

/// How a property write treats properties that are not listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteMode {
    /// `SET m = {...}`: the listed fields become the whole property bag.
    Replace,
    /// `SET m += {...}`: the listed fields are merged in.
    Merge,
}

/// A query template with named placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// Every node carrying `label`. Columns: `m`.
    ListEntities { label: Ident },
    /// The node with identity `$id`. Columns: `m`.
    EntityById,
    /// Relationships attached to node `$id`. Columns: `link`, `other`.
    Links { direction: Direction },
    /// MERGE a node keyed on `label` and every field (`$prop_<field>`).
    /// Columns: `m`.
    UpsertEntity { label: Ident, fields: Vec<Ident> },
    /// Write `$prop_<field>` for each field onto node `$id`. Columns: `m`.
    WriteProperties { fields: Vec<Ident>, mode: WriteMode },
    /// MERGE `($from)-[:link_type]->($to)`. Columns: `link`.
    CreateLink { link_type: Ident },
    /// Delete relationship `$id`. Columns: `deleted` (its identity).
    DeleteLink,
    /// Caller-supplied Cypher. Only executors that speak Cypher run it.
    Cypher {
        text: String,
        columns: Vec<String>,
        writes: bool,
    },
}

impl Statement {
    /// Name of the parameter carrying `field`'s value.
    pub fn property_param(field: &Ident) -> String {
        format!("prop_{field}")
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ListEntities { .. } => "list_entities",
            Self::EntityById => "entity_by_id",
            Self::Links {
                direction: Direction::Outgoing,
            } => "outgoing_links",
            Self::Links {
                direction: Direction::Incoming,
            } => "incoming_links",
            Self::UpsertEntity { .. } => "upsert_entity",
            Self::WriteProperties { .. } => "write_properties",
            Self::CreateLink { .. } => "create_link",
            Self::DeleteLink => "delete_link",
            Self::Cypher { .. } => "cypher",
        }
    }

    pub fn is_write(&self) -> bool {
        match self {
            Self::ListEntities { .. } | Self::EntityById | Self::Links { .. } => false,
            Self::UpsertEntity { .. }
            | Self::WriteProperties { .. }
            | Self::CreateLink { .. }
            | Self::DeleteLink => true,
            Self::Cypher { writes, .. } => *writes,
        }
    }

    /// Reject a mutating statement executed in read mode.
    pub fn check_mode(&self, mode: AccessMode) -> Result<(), GraphError> {
        if self.is_write() && mode == AccessMode::Read {
            return Err(GraphError::AccessMode {
                statement: self.name(),
            });
        }
        Ok(())
    }

    /// Columns of each returned record.
    pub fn columns(&self) -> Vec<&str> {
        match self {
            Self::ListEntities { .. }
            | Self::EntityById
            | Self::UpsertEntity { .. }
            | Self::WriteProperties { .. } => vec![column::NODE],
            Self::Links { .. } => vec![column::LINK, column::OTHER],
            Self::CreateLink { .. } => vec![column::LINK],
            Self::DeleteLink => vec![column::DELETED],
            Self::Cypher { columns, .. } => columns.iter().map(String::as_str).collect(),
        }
    }

    /// Render the Cypher text.
    pub fn cypher(&self) -> String {
        match self {
            Self::ListEntities { label } => {
                format!("MATCH (m:{label}) RETURN m ORDER BY id(m)")
            }
            Self::EntityById => "MATCH (m) WHERE id(m) = $id RETURN m".to_string(),
            Self::Links { direction } => {
                let pattern = match direction {
                    Direction::Outgoing => "(m)-[link]->(other)",
                    Direction::Incoming => "(m)<-[link]-(other)",
                };
                format!(
                    "MATCH {pattern} WHERE id(m) = $id
                     RETURN link, other ORDER BY id(link)"
                )
            }
            Self::UpsertEntity { label, fields } => {
                if fields.is_empty() {
                    format!("MERGE (m:{label}) RETURN m")
                } else {
                    format!("MERGE (m:{label} {}) RETURN m", property_map(fields))
                }
            }
            Self::WriteProperties { fields, mode } => {
                let op = match mode {
                    WriteMode::Replace => "=",
                    WriteMode::Merge => "+=",
                };
                format!(
                    "MATCH (m) WHERE id(m) = $id
                     SET m {op} {}
                     RETURN m",
                    property_map(fields)
                )
            }
            Self::CreateLink { link_type } => format!(
                "MATCH (m) WHERE id(m) = $from
                 MATCH (n) WHERE id(n) = $to
                 MERGE (m)-[link:{link_type}]->(n)
                 RETURN link"
            ),
            Self::DeleteLink => "MATCH ()-[doomed]->() WHERE id(doomed) = $id
                 WITH doomed, id(doomed) AS deleted
                 DELETE doomed
                 RETURN deleted"
                .to_string(),
            Self::Cypher { text, .. } => text.clone(),
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// `{first: $prop_first, last: $prop_last}`
fn property_map(fields: &[Ident]) -> String {
    let entries: Vec<String> = fields
        .iter()
        .map(|f| format!("{f}: ${}", Statement::property_param(f)))
        .collect();
    format!("{{{}}}", entries.join(", "))
}
