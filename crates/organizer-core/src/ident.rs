//! Validated Cypher identifiers.
//!
//! Labels, relationship types, and property keys cannot be passed as query
//! parameters, so they are spliced into statement text. Only values that
//! pass [`Ident::parse`] ever reach a query.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

/// An ASCII identifier: a letter or underscore followed by letters, digits,
/// or underscores.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ident(pub(crate) String);

impl Ident {
    pub fn parse(raw: &str) -> Result<Self, SchemaError> {
        let mut chars = raw.chars();
        let valid_start = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
        if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            Ok(Self(raw.to_string()))
        } else {
            Err(SchemaError::InvalidIdentifier(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Ident {
    type Error = SchemaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Ident> for String {
    fn from(ident: Ident) -> Self {
        ident.0
    }
}

impl AsRef<str> for Ident {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_identifiers() {
        for raw in ["Person", "WorksAt", "short_name", "_private", "Team2"] {
            assert_eq!(Ident::parse(raw).unwrap().as_str(), raw);
        }
    }

    #[test]
    fn rejects_injection_attempts() {
        for raw in [
            "",
            "2fast",
            "Person) DETACH DELETE (n",
            "Works At",
            "a-b",
            "`quoted`",
            "Person:Admin",
        ] {
            assert!(
                matches!(Ident::parse(raw), Err(SchemaError::InvalidIdentifier(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn deserialization_validates() {
        let ok: Ident = serde_json::from_str("\"MemberOf\"").unwrap();
        assert_eq!(ok.as_str(), "MemberOf");
        assert!(serde_json::from_str::<Ident>("\"Member Of\"").is_err());
    }
}
