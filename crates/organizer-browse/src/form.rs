//! Form state for creating and editing entities.

use std::collections::BTreeMap;

use organizer_core::{EntityType, Ident, Params, PropertyMap, SchemaError};
use organizer_graph::Statement;

/// Field values keyed by declared field name, plus the values the form was
/// seeded with.
///
/// Only fields declared on the entity type can be set. Values are strings;
/// blanks are kept and written as empty strings.
#[derive(Debug, Clone, PartialEq)]
pub struct FormState {
    entity: EntityType,
    seed: BTreeMap<String, String>,
    values: BTreeMap<String, String>,
}

impl FormState {
    /// Every declared field blank.
    pub fn blank(entity: &EntityType) -> Self {
        Self::seeded(entity, &PropertyMap::new())
    }

    /// Declared fields taken from `properties`; missing ones are blank.
    pub fn seeded(entity: &EntityType, properties: &PropertyMap) -> Self {
        let seed: BTreeMap<String, String> = entity
            .field_names()
            .map(|field| {
                let value = properties
                    .get(field.as_str())
                    .map(|v| v.to_string())
                    .unwrap_or_default();
                (field.to_string(), value)
            })
            .collect();
        Self {
            entity: entity.clone(),
            values: seed.clone(),
            seed,
        }
    }

    pub fn entity(&self) -> &EntityType {
        &self.entity
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.values.get(field).map(String::as_str)
    }

    /// Set a declared field.
    pub fn set(&mut self, field: &str, value: impl Into<String>) -> Result<(), SchemaError> {
        let field = self.entity.field(field)?;
        self.values.insert(field.to_string(), value.into());
        Ok(())
    }

    /// Declared fields in declaration order with their current values.
    pub fn values(&self) -> impl Iterator<Item = (&Ident, &str)> {
        self.entity.field_names().map(move |field| {
            let value = self.values.get(field.as_str()).map(String::as_str).unwrap_or("");
            (field, value)
        })
    }

    /// Fields whose value differs from the seed.
    pub fn changed_fields(&self) -> Vec<Ident> {
        self.entity
            .field_names()
            .filter(|field| self.values.get(field.as_str()) != self.seed.get(field.as_str()))
            .cloned()
            .collect()
    }

    pub fn all_fields(&self) -> Vec<Ident> {
        self.entity.field_names().cloned().collect()
    }

    /// Statement parameters for `fields`, one `prop_<field>` each.
    pub fn to_params(&self, fields: &[Ident]) -> Params {
        let mut params = Params::new();
        for field in fields {
            let value = self.get(field.as_str()).unwrap_or_default();
            params.insert(Statement::property_param(field), value);
        }
        params
    }
}
