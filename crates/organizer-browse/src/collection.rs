//! All entities of one type, with a selection, a detail pane, and a create
//! form.

use organizer_binding::{BindingSpec, QueryBinding, RefreshOutcome};
use organizer_core::{EntityType, FetchedNode, Identity};
use organizer_graph::statement::column;
use organizer_graph::Statement;

use crate::chip::NodeChip;
use crate::context::ViewContext;
use crate::detail::EntityDetail;
use crate::error::{self, settle, Result, ViewError};
use crate::form::FormState;

pub struct EntityCollection {
    ctx: ViewContext,
    entity: EntityType,
    binding: QueryBinding,
    selected: Option<Identity>,
}

impl EntityCollection {
    /// Mount the list binding for `entity_type`.
    pub async fn open(ctx: &ViewContext, entity_type: &str) -> Result<Self> {
        let entity = ctx.schema().entity(entity_type)?.clone();
        let spec = BindingSpec::read(Statement::ListEntities {
            label: entity.name.clone(),
        });
        let binding = QueryBinding::mount(ctx.executor(), spec).await;
        Ok(Self {
            ctx: ctx.clone(),
            entity,
            binding,
            selected: None,
        })
    }

    pub fn entity_type(&self) -> &EntityType {
        &self.entity
    }

    pub fn binding(&self) -> &QueryBinding {
        &self.binding
    }

    pub fn items(&self) -> Result<Vec<FetchedNode>> {
        Ok(error::records(self.binding.result())?
            .iter()
            .filter_map(|r| r.fetched_node(column::NODE))
            .collect())
    }

    pub fn chips(&self) -> Result<Vec<NodeChip>> {
        let schema = self.ctx.schema();
        Ok(self
            .items()?
            .iter()
            .map(|item| NodeChip::new(schema, &item.node))
            .collect())
    }

    pub async fn refresh(&self) -> Result<usize> {
        match self.binding.refresh().await {
            RefreshOutcome::Updated { records } => Ok(records),
            RefreshOutcome::Superseded | RefreshOutcome::Failed => {
                error::records(self.binding.result()).map(|r| r.len())
            }
        }
    }

    /// Select the row at `index` of the current list.
    pub fn select(&mut self, index: usize) -> Result<FetchedNode> {
        let items = self.items()?;
        let len = items.len();
        let item = items
            .into_iter()
            .nth(index)
            .ok_or(ViewError::NoSuchRow { index, len })?;
        self.selected = Some(item.identity());
        Ok(item)
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// The selected entity as currently listed, or `None` if nothing is
    /// selected or it is no longer in the list.
    pub fn selected(&self) -> Option<FetchedNode> {
        let identity = self.selected?;
        self.items()
            .ok()?
            .into_iter()
            .find(|item| item.identity() == identity)
    }

    /// Detail pane for the selection. Saving it refreshes this list.
    pub fn detail(&self) -> Option<EntityDetail> {
        let node = self.selected()?;
        Some(EntityDetail::new(
            &self.ctx,
            &self.entity,
            node,
            Some(self.binding.clone()),
        ))
    }

    /// A blank create form. Submitting it refreshes this list.
    pub fn create_form(&self) -> CreateForm {
        CreateForm {
            ctx: self.ctx.clone(),
            form: FormState::blank(&self.entity),
            owner: self.binding.clone(),
        }
    }
}

/// Upsert form for a new entity, keyed on every declared field.
pub struct CreateForm {
    ctx: ViewContext,
    form: FormState,
    owner: QueryBinding,
}

impl CreateForm {
    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn set(&mut self, field: &str, value: impl Into<String>) -> Result<()> {
        self.form.set(field, value)?;
        Ok(())
    }

    /// MERGE the entity, then refresh the owning list. Blank fields are
    /// written as empty strings.
    pub async fn submit(&self) -> Result<Option<FetchedNode>> {
        let fields = self.form.all_fields();
        let params = self.form.to_params(&fields);
        let statement = Statement::UpsertEntity {
            label: self.form.entity().name.clone(),
            fields,
        };
        let binding =
            QueryBinding::builder(self.ctx.executor(), BindingSpec::write(statement).with_params(params))
                .build();
        binding.add_dependent(&self.owner)?;

        tracing::info!(entity_type = %self.form.entity().name, "Creating entity");
        Ok(settle(&binding)
            .await?
            .first()
            .and_then(|r| r.fetched_node(column::NODE)))
    }
}
