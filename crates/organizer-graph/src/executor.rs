//! The graph executor capability.

use async_trait::async_trait;

use organizer_core::{Params, Record};

use crate::client::GraphError;
use crate::statement::{AccessMode, Statement};

/// Executes a statement with named parameters against a graph store.
///
/// Implemented by [`GraphClient`](crate::GraphClient) for Neo4j and by
/// [`MemoryGraph`](crate::MemoryGraph) in process. Implementations must
/// reject a mutating statement in [`AccessMode::Read`].
#[async_trait]
pub trait GraphExecutor: Send + Sync {
    async fn execute(
        &self,
        statement: &Statement,
        params: &Params,
        mode: AccessMode,
    ) -> Result<Vec<Record>, GraphError>;
}
