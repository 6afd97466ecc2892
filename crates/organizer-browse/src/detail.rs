//! The detail pane of one entity: an edit form over its declared fields.

use organizer_binding::{BindingSpec, QueryBinding};
use organizer_core::{EditPolicy, EntityType, FetchedNode, Params};
use organizer_graph::statement::{column, param};
use organizer_graph::{Statement, WriteMode};

use crate::context::ViewContext;
use crate::error::{settle, Result, ViewError};
use crate::form::FormState;
use crate::links::NodeLinks;

pub struct EntityDetail {
    ctx: ViewContext,
    node: FetchedNode,
    form: FormState,
    owner: Option<QueryBinding>,
}

impl EntityDetail {
    /// Seed the form from `node`. `owner` is refreshed after every save.
    pub fn new(
        ctx: &ViewContext,
        entity: &EntityType,
        node: FetchedNode,
        owner: Option<QueryBinding>,
    ) -> Self {
        Self {
            ctx: ctx.clone(),
            form: FormState::seeded(entity, &node.node.properties),
            node,
            owner,
        }
    }

    pub fn node(&self) -> &FetchedNode {
        &self.node
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn set(&mut self, field: &str, value: impl Into<String>) -> Result<()> {
        self.form.set(field, value)?;
        Ok(())
    }

    /// Bind to a new node snapshot. The form is reseeded, discarding unsaved
    /// edits, when the identity or `loaded_at` differs. Returns whether it was.
    pub fn rebind(&mut self, node: FetchedNode) -> bool {
        if node.identity() == self.node.identity() && node.loaded_at == self.node.loaded_at {
            return false;
        }
        self.form = FormState::seeded(self.form.entity(), &node.node.properties);
        self.node = node;
        true
    }

    /// Write the form to the graph and refresh the owner.
    ///
    /// Under [`EditPolicy::Overwrite`] every declared field is written and
    /// the node's property bag is replaced. Under [`EditPolicy::Patch`] only
    /// changed fields are merged in; with nothing changed no query runs and
    /// `Ok(None)` is returned. On success the form is reseeded from the
    /// written node. A node deleted since it was loaded is
    /// [`ViewError::Gone`].
    pub async fn save(&mut self) -> Result<Option<FetchedNode>> {
        let (fields, mode) = match self.ctx.edit_policy() {
            EditPolicy::Overwrite => (self.form.all_fields(), WriteMode::Replace),
            EditPolicy::Patch => (self.form.changed_fields(), WriteMode::Merge),
        };
        if fields.is_empty() {
            tracing::debug!(identity = %self.node.identity(), "Nothing to save");
            return Ok(None);
        }

        let mut params: Params = self.form.to_params(&fields);
        params.insert(param::ID, self.node.identity());
        let binding = QueryBinding::builder(
            self.ctx.executor(),
            BindingSpec::write(Statement::WriteProperties { fields, mode }).with_params(params),
        )
        .build();
        if let Some(owner) = &self.owner {
            binding.add_dependent(owner)?;
        }

        tracing::info!(
            identity = %self.node.identity(),
            policy = ?self.ctx.edit_policy(),
            "Saving entity"
        );
        let saved = settle(&binding)
            .await?
            .first()
            .and_then(|r| r.fetched_node(column::NODE))
            .ok_or(ViewError::Gone(self.node.identity()))?;
        self.rebind(saved.clone());
        Ok(Some(saved))
    }

    /// Mount the relationship lists of this entity.
    pub async fn links(&self) -> NodeLinks {
        NodeLinks::open(&self.ctx, self.node.clone()).await
    }
}
