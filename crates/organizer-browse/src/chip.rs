//! Compact one-line renderings of nodes and links.

use std::fmt;

use organizer_core::{GraphLink, GraphNode, Identity, Schema};

/// A node as its identity badge plus its schema description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeChip {
    pub identity: Identity,
    pub label: String,
}

impl NodeChip {
    pub fn new(schema: &Schema, node: &GraphNode) -> Self {
        Self {
            identity: node.identity,
            label: schema.describe(node),
        }
    }
}

impl fmt::Display for NodeChip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.identity, self.label)
    }
}

/// A link as `from -[Type]-> to`, either end optional.
///
/// List views leave out the focal end: outgoing links show only the target,
/// incoming links only the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkChip {
    pub identity: Identity,
    pub link_type: String,
    pub from: Option<NodeChip>,
    pub to: Option<NodeChip>,
}

impl LinkChip {
    pub fn new(link: &GraphLink) -> Self {
        Self {
            identity: link.identity,
            link_type: link.link_type.clone(),
            from: None,
            to: None,
        }
    }

    pub fn with_from(mut self, from: NodeChip) -> Self {
        self.from = Some(from);
        self
    }

    pub fn with_to(mut self, to: NodeChip) -> Self {
        self.to = Some(to);
        self
    }
}

impl fmt::Display for LinkChip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(from) = &self.from {
            write!(f, "{from} ")?;
        }
        write!(f, "-[{}]->", self.link_type)?;
        if let Some(to) = &self.to {
            write!(f, " {to}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use organizer_core::{PropertyMap, PropertyValue};

    fn node(identity: i64, label: &str, props: &[(&str, &str)]) -> GraphNode {
        let properties: PropertyMap = props
            .iter()
            .map(|(k, v)| (k.to_string(), PropertyValue::from(*v)))
            .collect();
        GraphNode {
            identity: Identity(identity),
            labels: vec![label.to_string()],
            properties,
        }
    }

    #[test]
    fn person_chip_joins_names() {
        let schema = Schema::default();
        let chip = NodeChip::new(&schema, &node(3, "Person", &[("first", "Ada"), ("last", "Lovelace")]));
        assert_eq!(chip.to_string(), "[#3] Ada Lovelace");
    }

    #[test]
    fn unknown_label_falls_back_to_json() {
        let schema = Schema::default();
        let chip = NodeChip::new(&schema, &node(1, "Gadget", &[("serial", "X1")]));
        assert_eq!(chip.label, r#"{"serial":"X1"}"#);
    }

    #[test]
    fn link_chip_omits_missing_ends() {
        let schema = Schema::default();
        let link = GraphLink {
            identity: Identity(9),
            link_type: "WorksAt".into(),
            start: Identity(3),
            end: Identity(4),
            properties: PropertyMap::new(),
        };
        let org = NodeChip::new(&schema, &node(4, "Organization", &[("name", "Analytical Engines")]));

        let outgoing = LinkChip::new(&link).with_to(org.clone());
        assert_eq!(outgoing.to_string(), "-[WorksAt]-> [#4] Analytical Engines");

        let incoming = LinkChip::new(&link).with_from(org);
        assert_eq!(incoming.to_string(), "[#4] Analytical Engines -[WorksAt]->");
    }
}
