use thiserror::Error;

/// Errors raised while resolving names against the schema.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Unknown entity type: {0}")]
    UnknownEntityType(String),

    #[error("Field {field} is not declared for entity type {entity_type}")]
    UnknownField { entity_type: String, field: String },

    #[error("Link type {0} is not in the allowed list")]
    LinkTypeNotAllowed(String),

    #[error("Duplicate entity type in schema: {0}")]
    DuplicateEntityType(String),
}

/// Top-level error type for the organizer.
#[derive(Error, Debug)]
pub enum OrganizerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<config::ConfigError> for OrganizerError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}
