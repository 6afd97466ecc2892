//! Configuration management for the organizer.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (`ORGANIZER__` prefix, `__` separator)
//! 2. Config file (`organizer.toml` by default)
//! 3. Defaults

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::OrganizerError;
use crate::ident::Ident;
use crate::schema::{default_entities, default_link_suggestions, EntityDef, Schema};

/// Environment prefix shared by every section.
pub const ENV_PREFIX: &str = "ORGANIZER";

/// How the detail view writes an edited entity back to the store.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EditPolicy {
    /// Replace the whole property bag with every declared field, blanks
    /// included.
    #[default]
    Overwrite,
    /// Merge only the fields whose value changed since the form was seeded.
    Patch,
}

/// The `[organizer]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct OrganizerConfig {
    #[serde(default)]
    pub edit_policy: EditPolicy,

    /// Only accept link types from `link_suggestions`.
    #[serde(default)]
    pub strict_link_types: bool,

    #[serde(default = "default_link_suggestions")]
    pub link_suggestions: Vec<Ident>,

    #[serde(default = "default_entities")]
    pub entities: Vec<EntityDef>,
}

impl OrganizerConfig {
    /// Resolve the configured declarations into a schema.
    pub fn schema(&self) -> Result<Schema, OrganizerError> {
        Ok(Schema::from_defs(
            self.entities.clone(),
            self.link_suggestions.clone(),
        )?)
    }
}

impl Default for OrganizerConfig {
    fn default() -> Self {
        Self {
            edit_policy: EditPolicy::default(),
            strict_link_types: false,
            link_suggestions: default_link_suggestions(),
            entities: default_entities(),
        }
    }
}

/// Build the layered configuration for `file_prefix` (file is optional).
pub fn layered(file_prefix: &str) -> Result<config::Config, OrganizerError> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    Ok(cfg)
}

/// Load section `key`, falling back to `T::default()` only when the section
/// is absent. A section that is present but malformed is an error.
pub fn load_section<T>(file_prefix: &str, key: &str) -> Result<T, OrganizerError>
where
    T: DeserializeOwned + Default,
{
    let cfg = layered(file_prefix)?;
    match cfg.get::<T>(key) {
        Ok(section) => Ok(section),
        Err(config::ConfigError::NotFound(_)) => {
            tracing::debug!(file_prefix, section = key, "Section absent, using defaults");
            Ok(T::default())
        }
        Err(e) => Err(e.into()),
    }
}

/// Load the `[organizer]` section, falling back to defaults when absent.
pub fn load_organizer_config(file_prefix: &str) -> Result<OrganizerConfig, OrganizerError> {
    load_section(file_prefix, "organizer")
}
