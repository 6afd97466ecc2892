//! Neo4j connection management and the shared graph client.

use async_trait::async_trait;
use neo4rs::{query, ConfigBuilder, Graph, Query};
use serde::Deserialize;

use organizer_core::{ParamValue, Params, Record};

use crate::convert::row_to_record;
use crate::executor::GraphExecutor;
use crate::statement::{AccessMode, Statement};

/// Errors from graph operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Neo4j connection error: {0}")]
    Connection(String),

    #[error("Neo4j query error: {0}")]
    Query(#[from] neo4rs::Error),

    #[error("Statement {statement} mutates the graph and cannot run in read mode")]
    AccessMode { statement: &'static str },

    #[error("Statement {statement} is missing parameter ${param}")]
    MissingParam {
        statement: &'static str,
        param: String,
    },

    #[error("Statement {0} is not supported by this executor")]
    Unsupported(&'static str),

    #[error("Graph unavailable: {0}")]
    Unavailable(String),
}

/// Configuration for connecting to Neo4j.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "default_uri")]
    pub uri: String,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default = "default_password")]
    pub password: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_fetch_size")]
    pub fetch_size: usize,
}

fn default_uri() -> String {
    "bolt://localhost:7687".to_string()
}

fn default_user() -> String {
    "neo4j".to_string()
}

fn default_password() -> String {
    "organizer-dev".to_string()
}

fn default_max_connections() -> u32 {
    4
}

fn default_fetch_size() -> usize {
    256
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            user: default_user(),
            password: default_password(),
            max_connections: default_max_connections(),
            fetch_size: default_fetch_size(),
        }
    }
}

/// Thread-safe Neo4j graph client with connection pooling.
///
/// Concurrent independent requests share the pool without client-side
/// locking. Clone is cheap (inner Arc).
#[derive(Clone)]
pub struct GraphClient {
    graph: Graph,
}

impl GraphClient {
    /// Connect to Neo4j with the given configuration.
    ///
    /// neo4rs opens its pool lazily, so a `RETURN 1` ping forces the bolt
    /// handshake and surfaces an unreachable server here.
    pub async fn connect(config: &GraphConfig) -> Result<Self, GraphError> {
        let neo_config = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .max_connections(config.max_connections as usize)
            .fetch_size(config.fetch_size)
            .build()
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        let graph = Graph::connect(neo_config)
            .await
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        graph
            .run(query("RETURN 1"))
            .await
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        tracing::info!(uri = %config.uri, "Connected to Neo4j");
        Ok(Self { graph })
    }

    /// Execute a query without collecting results.
    pub async fn run(&self, query: Query) -> Result<(), GraphError> {
        self.graph.run(query).await?;
        Ok(())
    }

    /// Execute a query and collect all rows.
    pub async fn query_rows(&self, query: Query) -> Result<Vec<neo4rs::Row>, GraphError> {
        let mut stream = self.graph.execute(query).await?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await? {
            rows.push(row);
        }
        Ok(rows)
    }
}

#[async_trait]
impl GraphExecutor for GraphClient {
    async fn execute(
        &self,
        statement: &Statement,
        params: &Params,
        mode: AccessMode,
    ) -> Result<Vec<Record>, GraphError> {
        statement.check_mode(mode)?;

        let cypher = statement.cypher();
        let mut q = query(&cypher);
        for (name, value) in params.iter() {
            q = q.param(name, bolt_value(value));
        }

        tracing::debug!(statement = statement.name(), %mode, params = params.len(), "Executing statement");
        let rows = self.query_rows(q).await?;

        let columns = statement.columns();
        Ok(rows.iter().map(|row| row_to_record(row, &columns)).collect())
    }
}

fn bolt_value(value: &ParamValue) -> neo4rs::BoltType {
    match value {
        ParamValue::Identity(id) => id.0.into(),
        ParamValue::Boolean(b) => (*b).into(),
        ParamValue::Integer(i) => (*i).into(),
        ParamValue::Float(f) => (*f).into(),
        ParamValue::String(s) => s.clone().into(),
    }
}
