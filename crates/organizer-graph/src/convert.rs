//! Conversion from neo4rs rows into organizer records.

use organizer_core::{GraphLink, GraphNode, Identity, PropertyMap, PropertyValue, Record, Value};

/// Try each scalar type a property may hold, narrowest first.
macro_rules! scalar {
    ($source:expr, $key:expr) => {{
        if let Ok(b) = $source.get::<bool>($key) {
            Some(PropertyValue::Boolean(b))
        } else if let Ok(i) = $source.get::<i64>($key) {
            Some(PropertyValue::Integer(i))
        } else if let Ok(f) = $source.get::<f64>($key) {
            Some(PropertyValue::Float(f))
        } else if let Ok(s) = $source.get::<String>($key) {
            Some(PropertyValue::String(s))
        } else {
            None
        }
    }};
}

/// Convert one row, reading exactly the statement's declared columns.
pub(crate) fn row_to_record(row: &neo4rs::Row, columns: &[&str]) -> Record {
    let mut record = Record::new();
    for column in columns {
        record.insert(*column, column_value(row, column));
    }
    record
}

fn column_value(row: &neo4rs::Row, column: &str) -> Value {
    if let Ok(node) = row.get::<neo4rs::Node>(column) {
        return Value::Node(node_to_graph_node(&node));
    }
    if let Ok(rel) = row.get::<neo4rs::Relation>(column) {
        return Value::Link(relation_to_link(&rel));
    }
    match scalar!(row, column) {
        Some(v) => Value::Scalar(v),
        None => Value::Null,
    }
}

fn node_to_graph_node(node: &neo4rs::Node) -> GraphNode {
    let mut properties = PropertyMap::new();
    for key in node.keys() {
        // Lists and maps have no scalar form and are skipped.
        if let Some(v) = scalar!(node, key) {
            properties.insert(key.to_string(), v);
        }
    }

    GraphNode {
        identity: Identity(node.id()),
        labels: node.labels().iter().map(|l| l.to_string()).collect(),
        properties,
    }
}

fn relation_to_link(rel: &neo4rs::Relation) -> GraphLink {
    let mut properties = PropertyMap::new();
    for key in rel.keys() {
        if let Some(v) = scalar!(rel, key) {
            properties.insert(key.to_string(), v);
        }
    }

    GraphLink {
        identity: Identity(rel.id()),
        link_type: rel.typ().to_string(),
        start: Identity(rel.start_node_id()),
        end: Identity(rel.end_node_id()),
        properties,
    }
}
