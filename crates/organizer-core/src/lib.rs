//! organizer-core: Shared data model, schema, and configuration for the
//! network organizer.
//!
//! This crate provides the foundational types used across all organizer crates:
//! - Graph elements (nodes, links) and fetched records
//! - Query parameter maps compared by value
//! - The entity schema and its describe rules
//! - Binding change events
//! - Configuration management
//! - Common error types

pub mod config;
pub mod error;
pub mod events;
pub mod ident;
pub mod schema;
pub mod types;

pub use config::{EditPolicy, OrganizerConfig};
pub use error::{OrganizerError, SchemaError};
pub use ident::Ident;
pub use schema::{Describe, DescribeRule, EntityType, Schema};
pub use types::{
    FetchedNode, FetchedRecord, GraphLink, GraphNode, Identity, ParamValue, Params, PropertyMap,
    PropertyValue, Record, Value,
};
