//! Shared handles every view is opened with.

use std::fmt;
use std::sync::Arc;

use organizer_core::{EditPolicy, OrganizerConfig, OrganizerError, Schema};
use organizer_graph::GraphExecutor;

/// Executor, schema, and policy shared by every view in a session.
///
/// Clone is cheap; all handles are reference counted.
#[derive(Clone)]
pub struct ViewContext {
    executor: Arc<dyn GraphExecutor>,
    schema: Arc<Schema>,
    edit_policy: EditPolicy,
    strict_link_types: bool,
}

impl ViewContext {
    pub fn new(executor: Arc<dyn GraphExecutor>, schema: Schema) -> Self {
        Self {
            executor,
            schema: Arc::new(schema),
            edit_policy: EditPolicy::default(),
            strict_link_types: false,
        }
    }

    /// Build the schema and policies from loaded configuration.
    pub fn from_config(
        executor: Arc<dyn GraphExecutor>,
        config: &OrganizerConfig,
    ) -> Result<Self, OrganizerError> {
        Ok(Self::new(executor, config.schema()?)
            .with_edit_policy(config.edit_policy)
            .with_strict_link_types(config.strict_link_types))
    }

    pub fn with_edit_policy(mut self, policy: EditPolicy) -> Self {
        self.edit_policy = policy;
        self
    }

    pub fn with_strict_link_types(mut self, strict: bool) -> Self {
        self.strict_link_types = strict;
        self
    }

    pub fn executor(&self) -> Arc<dyn GraphExecutor> {
        Arc::clone(&self.executor)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn edit_policy(&self) -> EditPolicy {
        self.edit_policy
    }

    pub fn strict_link_types(&self) -> bool {
        self.strict_link_types
    }
}

impl fmt::Debug for ViewContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewContext")
            .field("schema", &self.schema)
            .field("edit_policy", &self.edit_policy)
            .field("strict_link_types", &self.strict_link_types)
            .finish_non_exhaustive()
    }
}
