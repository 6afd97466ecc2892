//! In-process graph store.
//!
//! Interprets the built-in [`Statement`]s directly over maps guarded by
//! `tokio::sync::RwLock`, with the same MERGE/SET semantics the Cypher
//! renditions have on Neo4j. Every execution is counted, and by default
//! logged so callers can assert which statements ran with which
//! parameters. Failures can be injected one execution at a time.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use organizer_core::{
    GraphLink, GraphNode, Ident, Identity, ParamValue, Params, PropertyMap, PropertyValue, Record,
    Value,
};

use crate::client::GraphError;
use crate::executor::GraphExecutor;
use crate::statement::{column, param, AccessMode, Direction, Statement, WriteMode};

/// One logged execution.
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub statement: Statement,
    pub params: Params,
    pub mode: AccessMode,
}

#[derive(Default)]
struct Store {
    next_id: i64,
    nodes: BTreeMap<Identity, GraphNode>,
    links: BTreeMap<Identity, GraphLink>,
}

impl Store {
    fn allocate(&mut self) -> Identity {
        let id = Identity(self.next_id);
        self.next_id += 1;
        id
    }

    fn create_node(&mut self, label: &str, properties: PropertyMap) -> GraphNode {
        let node = GraphNode {
            identity: self.allocate(),
            labels: vec![label.to_string()],
            properties,
        };
        self.nodes.insert(node.identity, node.clone());
        node
    }

    /// MERGE semantics: reuse an identical link, else create one.
    fn merge_link(&mut self, start: Identity, link_type: &str, end: Identity) -> Option<GraphLink> {
        if !self.nodes.contains_key(&start) || !self.nodes.contains_key(&end) {
            return None;
        }
        if let Some(existing) = self
            .links
            .values()
            .find(|l| l.start == start && l.end == end && l.link_type == link_type)
        {
            return Some(existing.clone());
        }
        let link = GraphLink {
            identity: self.allocate(),
            link_type: link_type.to_string(),
            start,
            end,
            properties: PropertyMap::new(),
        };
        self.links.insert(link.identity, link.clone());
        Some(link)
    }
}

/// A graph store living entirely in memory.
pub struct MemoryGraph {
    store: RwLock<Store>,
    log: Option<RwLock<Vec<Execution>>>,
    executed: AtomicUsize,
    failures: RwLock<VecDeque<String>>,
}

impl Default for MemoryGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGraph {
    /// An empty store that logs every execution.
    pub fn new() -> Self {
        Self {
            store: RwLock::default(),
            log: Some(RwLock::default()),
            executed: AtomicUsize::new(0),
            failures: RwLock::default(),
        }
    }

    /// An empty store that only counts executions. For long-running use
    /// such as an interactive session, where the log would grow unbounded.
    pub fn unlogged() -> Self {
        Self {
            log: None,
            ..Self::new()
        }
    }

    /// Make the next execution fail with `message`. Calls queue up.
    pub async fn fail_next(&self, message: impl Into<String>) {
        self.failures.write().await.push_back(message.into());
    }

    /// Every execution so far, oldest first. Empty when unlogged.
    pub async fn executions(&self) -> Vec<Execution> {
        match &self.log {
            Some(log) => log.read().await.clone(),
            None => Vec::new(),
        }
    }

    pub async fn execution_count(&self) -> usize {
        self.executed.load(Ordering::SeqCst)
    }

    /// Seed a node directly, bypassing the statement log.
    pub async fn insert_node(&self, label: &str, properties: PropertyMap) -> GraphNode {
        self.store.write().await.create_node(label, properties)
    }

    /// Seed a link directly. Returns `None` if either end is missing.
    pub async fn insert_link(
        &self,
        start: Identity,
        link_type: &str,
        end: Identity,
    ) -> Option<GraphLink> {
        self.store.write().await.merge_link(start, link_type, end)
    }

    /// Remove a node and every link attached to it, bypassing the log.
    pub async fn remove_node(&self, identity: Identity) -> Option<GraphNode> {
        let mut store = self.store.write().await;
        store
            .links
            .retain(|_, link| link.start != identity && link.end != identity);
        store.nodes.remove(&identity)
    }

    pub async fn node(&self, identity: Identity) -> Option<GraphNode> {
        self.store.read().await.nodes.get(&identity).cloned()
    }

    pub async fn links(&self) -> Vec<GraphLink> {
        self.store.read().await.links.values().cloned().collect()
    }
}

#[async_trait]
impl GraphExecutor for MemoryGraph {
    async fn execute(
        &self,
        statement: &Statement,
        params: &Params,
        mode: AccessMode,
    ) -> Result<Vec<Record>, GraphError> {
        self.executed.fetch_add(1, Ordering::SeqCst);
        if let Some(log) = &self.log {
            log.write().await.push(Execution {
                statement: statement.clone(),
                params: params.clone(),
                mode,
            });
        }

        if let Some(message) = self.failures.write().await.pop_front() {
            tracing::debug!(statement = statement.name(), %message, "Injected failure");
            return Err(GraphError::Unavailable(message));
        }
        statement.check_mode(mode)?;

        let mut store = self.store.write().await;
        let records = match statement {
            Statement::ListEntities { label } => store
                .nodes
                .values()
                .filter(|n| n.labels.iter().any(|l| l == label.as_str()))
                .map(node_record)
                .collect(),

            Statement::EntityById => {
                let id = identity(statement, params, param::ID)?;
                store.nodes.get(&id).map(node_record).into_iter().collect()
            }

            Statement::Links { direction } => {
                let id = identity(statement, params, param::ID)?;
                store
                    .links
                    .values()
                    .filter_map(|link| {
                        let other = match direction {
                            Direction::Outgoing if link.start == id => link.end,
                            Direction::Incoming if link.end == id => link.start,
                            _ => return None,
                        };
                        let other = store
                            .nodes
                            .get(&other)
                            .map_or(Value::Null, |n| Value::Node(n.clone()));
                        Some(
                            Record::new()
                                .with(column::LINK, Value::Link(link.clone()))
                                .with(column::OTHER, other),
                        )
                    })
                    .collect()
            }

            Statement::UpsertEntity { label, fields } => {
                let values = property_values(statement, fields, params)?;
                let existing = store.nodes.values().find(|n| {
                    n.labels.iter().any(|l| l == label.as_str())
                        && values.iter().all(|(k, v)| n.properties.get(k) == Some(v))
                }).cloned();
                let node = match existing {
                    Some(node) => node,
                    None => store.create_node(label.as_str(), values),
                };
                vec![node_record(&node)]
            }

            Statement::WriteProperties {
                fields,
                mode: write_mode,
            } => {
                let id = identity(statement, params, param::ID)?;
                let values = property_values(statement, fields, params)?;
                match store.nodes.get_mut(&id) {
                    Some(node) => {
                        match write_mode {
                            WriteMode::Replace => node.properties = values,
                            WriteMode::Merge => node.properties.extend(values),
                        }
                        vec![node_record(node)]
                    }
                    None => Vec::new(),
                }
            }

            Statement::CreateLink { link_type } => {
                let from = identity(statement, params, param::FROM)?;
                let to = identity(statement, params, param::TO)?;
                store
                    .merge_link(from, link_type.as_str(), to)
                    .map(|link| Record::new().with(column::LINK, Value::Link(link)))
                    .into_iter()
                    .collect()
            }

            Statement::DeleteLink => {
                let id = identity(statement, params, param::ID)?;
                store
                    .links
                    .remove(&id)
                    .map(|link| {
                        Record::new().with(
                            column::DELETED,
                            Value::Scalar(PropertyValue::Integer(link.identity.0)),
                        )
                    })
                    .into_iter()
                    .collect()
            }

            Statement::Cypher { .. } => return Err(GraphError::Unsupported(statement.name())),
        };

        tracing::debug!(
            statement = statement.name(),
            %mode,
            records = records.len(),
            "Executed in memory"
        );
        Ok(records)
    }
}

fn node_record(node: &GraphNode) -> Record {
    Record::new().with(column::NODE, Value::Node(node.clone()))
}

fn identity(statement: &Statement, params: &Params, name: &str) -> Result<Identity, GraphError> {
    params
        .identity(name)
        .ok_or_else(|| GraphError::MissingParam {
            statement: statement.name(),
            param: name.to_string(),
        })
}

fn property_values(
    statement: &Statement,
    fields: &[Ident],
    params: &Params,
) -> Result<PropertyMap, GraphError> {
    let mut values = PropertyMap::new();
    for field in fields {
        let name = Statement::property_param(field);
        let value = params.get(&name).ok_or_else(|| GraphError::MissingParam {
            statement: statement.name(),
            param: name.clone(),
        })?;
        values.insert(field.to_string(), property_value(value));
    }
    Ok(values)
}

fn property_value(value: &ParamValue) -> PropertyValue {
    match value {
        ParamValue::Identity(id) => PropertyValue::Integer(id.0),
        ParamValue::Boolean(b) => PropertyValue::Boolean(*b),
        ParamValue::Integer(i) => PropertyValue::Integer(*i),
        ParamValue::Float(f) => PropertyValue::Float(*f),
        ParamValue::String(s) => PropertyValue::String(s.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(s: &str) -> Ident {
        Ident::parse(s).unwrap()
    }

    fn upsert_person() -> Statement {
        Statement::UpsertEntity {
            label: ident("Person"),
            fields: vec![ident("first"), ident("last")],
        }
    }

    fn person_params(first: &str, last: &str) -> Params {
        Params::new()
            .with("prop_first", first)
            .with("prop_last", last)
    }

    #[tokio::test]
    async fn upsert_is_idempotent() {
        let graph = MemoryGraph::new();
        let first = graph
            .execute(&upsert_person(), &person_params("Ada", "Lovelace"), AccessMode::Write)
            .await
            .unwrap();
        let second = graph
            .execute(&upsert_person(), &person_params("Ada", "Lovelace"), AccessMode::Write)
            .await
            .unwrap();
        assert_eq!(
            first[0].node(column::NODE).unwrap().identity,
            second[0].node(column::NODE).unwrap().identity
        );

        let list = Statement::ListEntities {
            label: ident("Person"),
        };
        let people = graph
            .execute(&list, &Params::new(), AccessMode::Read)
            .await
            .unwrap();
        assert_eq!(people.len(), 1);
        assert_eq!(graph.execution_count().await, 3);
    }

    #[tokio::test]
    async fn replace_clears_unlisted_properties() {
        let graph = MemoryGraph::new();
        let mut props = PropertyMap::new();
        props.insert("name".into(), "Acme".into());
        props.insert("legacy".into(), "yes".into());
        let acme = graph.insert_node("Organization", props).await;

        let stmt = Statement::WriteProperties {
            fields: vec![ident("name")],
            mode: WriteMode::Replace,
        };
        let params = Params::new()
            .with(param::ID, acme.identity)
            .with("prop_name", "Acme Corp");
        graph.execute(&stmt, &params, AccessMode::Write).await.unwrap();

        let node = graph.node(acme.identity).await.unwrap();
        assert_eq!(node.property_str("name"), Some("Acme Corp"));
        assert!(node.properties.get("legacy").is_none());
    }

    #[tokio::test]
    async fn merge_keeps_unlisted_properties() {
        let graph = MemoryGraph::new();
        let mut props = PropertyMap::new();
        props.insert("name".into(), "Acme".into());
        props.insert("short_name".into(), "AC".into());
        let acme = graph.insert_node("Division", props).await;

        let stmt = Statement::WriteProperties {
            fields: vec![ident("name")],
            mode: WriteMode::Merge,
        };
        let params = Params::new()
            .with(param::ID, acme.identity)
            .with("prop_name", "Acme Labs");
        graph.execute(&stmt, &params, AccessMode::Write).await.unwrap();

        let node = graph.node(acme.identity).await.unwrap();
        assert_eq!(node.property_str("name"), Some("Acme Labs"));
        assert_eq!(node.property_str("short_name"), Some("AC"));
    }

    #[tokio::test]
    async fn links_by_direction_and_delete() {
        let graph = MemoryGraph::new();
        let ada = graph.insert_node("Person", PropertyMap::new()).await;
        let acme = graph.insert_node("Organization", PropertyMap::new()).await;

        let create = Statement::CreateLink {
            link_type: ident("WorksAt"),
        };
        let params = Params::new()
            .with(param::FROM, ada.identity)
            .with(param::TO, acme.identity);
        let created = graph.execute(&create, &params, AccessMode::Write).await.unwrap();
        let link = created[0].link(column::LINK).unwrap().clone();
        assert_eq!(link.start, ada.identity);

        // MERGE does not duplicate.
        graph.execute(&create, &params, AccessMode::Write).await.unwrap();
        assert_eq!(graph.links().await.len(), 1);

        let outgoing = Statement::Links {
            direction: Direction::Outgoing,
        };
        let incoming = Statement::Links {
            direction: Direction::Incoming,
        };
        let by_ada = Params::new().with(param::ID, ada.identity);
        let out = graph.execute(&outgoing, &by_ada, AccessMode::Read).await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].node(column::OTHER).unwrap().identity, acme.identity);
        let inc = graph.execute(&incoming, &by_ada, AccessMode::Read).await.unwrap();
        assert!(inc.is_empty());

        let delete = Params::new().with(param::ID, link.identity);
        let deleted = graph
            .execute(&Statement::DeleteLink, &delete, AccessMode::Write)
            .await
            .unwrap();
        assert_eq!(
            deleted[0].scalar(column::DELETED),
            Some(&PropertyValue::Integer(link.identity.0))
        );
        assert!(graph.links().await.is_empty());
    }

    #[tokio::test]
    async fn create_link_to_missing_node_returns_nothing() {
        let graph = MemoryGraph::new();
        let ada = graph.insert_node("Person", PropertyMap::new()).await;
        let params = Params::new()
            .with(param::FROM, ada.identity)
            .with(param::TO, Identity(999));
        let stmt = Statement::CreateLink {
            link_type: ident("WorksAt"),
        };
        let rows = graph.execute(&stmt, &params, AccessMode::Write).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn injected_failure_and_mode_checks() {
        let graph = MemoryGraph::new();
        graph.fail_next("connection reset").await;

        let list = Statement::ListEntities {
            label: ident("Team"),
        };
        let err = graph
            .execute(&list, &Params::new(), AccessMode::Read)
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::Unavailable(ref m) if m == "connection reset"));
        assert!(graph.execute(&list, &Params::new(), AccessMode::Read).await.is_ok());

        let err = graph
            .execute(&upsert_person(), &person_params("A", "B"), AccessMode::Read)
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::AccessMode { .. }));

        let err = graph
            .execute(&Statement::EntityById, &Params::new(), AccessMode::Read)
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::MissingParam { ref param, .. } if param == "id"));
    }

    #[tokio::test]
    async fn raw_cypher_is_not_interpreted() {
        let graph = MemoryGraph::new();
        let read = Statement::Cypher {
            text: "MATCH (m:Person) RETURN m".into(),
            columns: vec![column::NODE.into()],
            writes: false,
        };
        let err = graph
            .execute(&read, &Params::new(), AccessMode::Read)
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::Unsupported("cypher")));
        assert_eq!(
            err.to_string(),
            "Statement cypher is not supported by this executor"
        );

        // The mode check comes first for writing Cypher.
        let write = Statement::Cypher {
            text: "MATCH (m:Person) DETACH DELETE m".into(),
            columns: Vec::new(),
            writes: true,
        };
        let err = graph
            .execute(&write, &Params::new(), AccessMode::Read)
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::AccessMode { statement: "cypher" }));
        let err = graph
            .execute(&write, &Params::new(), AccessMode::Write)
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::Unsupported(_)));
        assert_eq!(graph.execution_count().await, 3);
    }

    #[tokio::test]
    async fn unlogged_graph_counts_without_keeping_executions() {
        let graph = MemoryGraph::unlogged();
        let list = Statement::ListEntities {
            label: ident("Team"),
        };
        for _ in 0..3 {
            graph.execute(&list, &Params::new(), AccessMode::Read).await.unwrap();
        }
        assert_eq!(graph.execution_count().await, 3);
        assert!(graph.executions().await.is_empty());

        let logged = MemoryGraph::new();
        logged.execute(&list, &Params::new(), AccessMode::Read).await.unwrap();
        assert_eq!(logged.executions().await.len(), 1);
    }
}
