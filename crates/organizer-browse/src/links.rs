//! Relationship views of one focal entity.
//!
//! Outgoing and incoming relationships are two independent read bindings,
//! both keyed on the focal identity and re-fetched whenever the focal
//! node's `loaded_at` changes. Deleting or adding a relationship goes
//! through a write binding with both lists registered as dependents.

use organizer_binding::{BindingSpec, QueryBinding};
use organizer_core::{EntityType, FetchedNode, GraphLink, GraphNode, Ident, Identity, Params};
use organizer_graph::statement::{column, param};
use organizer_graph::{Direction, Statement};

use crate::chip::{LinkChip, NodeChip};
use crate::context::ViewContext;
use crate::error::{self, settle, Result, ViewError};

/// One row of a relationship list.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkEntry {
    pub link: GraphLink,
    pub other: GraphNode,
    pub chip: LinkChip,
}

pub struct NodeLinks {
    ctx: ViewContext,
    focal: FetchedNode,
    outgoing: QueryBinding,
    incoming: QueryBinding,
}

impl NodeLinks {
    /// Mount both relationship lists for `focal`.
    pub async fn open(ctx: &ViewContext, focal: FetchedNode) -> Self {
        let outgoing = mount_direction(ctx, &focal, Direction::Outgoing).await;
        let incoming = mount_direction(ctx, &focal, Direction::Incoming).await;
        Self {
            ctx: ctx.clone(),
            focal,
            outgoing,
            incoming,
        }
    }

    pub fn focal(&self) -> &FetchedNode {
        &self.focal
    }

    pub fn outgoing(&self) -> Result<Vec<LinkEntry>> {
        self.entries(&self.outgoing, Direction::Outgoing)
    }

    pub fn incoming(&self) -> Result<Vec<LinkEntry>> {
        self.entries(&self.incoming, Direction::Incoming)
    }

    pub fn outgoing_binding(&self) -> &QueryBinding {
        &self.outgoing
    }

    pub fn incoming_binding(&self) -> &QueryBinding {
        &self.incoming
    }

    /// Point both lists at a new focal node. They re-fetch if its identity
    /// or `loaded_at` changed.
    pub async fn retarget(&mut self, focal: FetchedNode) {
        let params = focal_params(&focal);
        let trigger = Some(focal.loaded_at);
        self.outgoing.set_inputs(params.clone(), trigger).await;
        self.incoming.set_inputs(params, trigger).await;
        self.focal = focal;
    }

    /// Delete one relationship by identity, then refresh both lists.
    pub async fn delete(&self, link: Identity) -> Result<()> {
        let binding = QueryBinding::builder(
            self.ctx.executor(),
            BindingSpec::write(Statement::DeleteLink).with_params(Params::new().with(param::ID, link)),
        )
        .build();
        binding.add_dependent(&self.outgoing)?;
        binding.add_dependent(&self.incoming)?;

        tracing::info!(focal = %self.focal.identity(), %link, "Deleting relationship");
        settle(&binding).await.map(|_| ())
    }

    /// Start the add-relationship flow from the focal node.
    pub fn add_link(&self) -> AddLinkFlow {
        AddLinkFlow {
            ctx: self.ctx.clone(),
            from: self.focal.identity(),
            dependents: vec![self.outgoing.clone(), self.incoming.clone()],
            link_type: None,
            target_type: None,
            search: None,
            target: None,
        }
    }

    fn entries(&self, binding: &QueryBinding, direction: Direction) -> Result<Vec<LinkEntry>> {
        let schema = self.ctx.schema();
        let entries = error::records(binding.result())?
            .iter()
            .filter_map(|record| {
                let link = record.link(column::LINK)?.clone();
                let other = record.node(column::OTHER)?.clone();
                let other_chip = NodeChip::new(schema, &other);
                let chip = match direction {
                    Direction::Outgoing => LinkChip::new(&link).with_to(other_chip),
                    Direction::Incoming => LinkChip::new(&link).with_from(other_chip),
                };
                Some(LinkEntry { link, other, chip })
            })
            .collect();
        Ok(entries)
    }
}

async fn mount_direction(ctx: &ViewContext, focal: &FetchedNode, direction: Direction) -> QueryBinding {
    let spec = BindingSpec::read(Statement::Links { direction })
        .with_params(focal_params(focal))
        .with_trigger(focal.loaded_at);
    QueryBinding::mount(ctx.executor(), spec).await
}

fn focal_params(focal: &FetchedNode) -> Params {
    Params::new().with(param::ID, focal.identity())
}

// ── Add relationship ───────────────────────────────────────────────

/// Three steps: link type, target entity type, target entity.
pub struct AddLinkFlow {
    ctx: ViewContext,
    from: Identity,
    dependents: Vec<QueryBinding>,
    link_type: Option<Ident>,
    target_type: Option<EntityType>,
    search: Option<QueryBinding>,
    target: Option<GraphNode>,
}

impl AddLinkFlow {
    pub fn suggestions(&self) -> &[Ident] {
        self.ctx.schema().link_suggestions()
    }

    pub fn link_type(&self) -> Option<&Ident> {
        self.link_type.as_ref()
    }

    pub fn target_type(&self) -> Option<&EntityType> {
        self.target_type.as_ref()
    }

    pub fn target(&self) -> Option<&GraphNode> {
        self.target.as_ref()
    }

    /// Any valid identifier, or only a suggestion in strict mode.
    pub fn choose_link_type(&mut self, raw: &str) -> Result<()> {
        let link_type = self
            .ctx
            .schema()
            .link_type(raw, self.ctx.strict_link_types())?;
        self.link_type = Some(link_type);
        Ok(())
    }

    /// Open the search list for a target type. Clears any chosen target.
    pub async fn choose_target_type(&mut self, name: &str) -> Result<()> {
        let entity = self.ctx.schema().entity(name)?.clone();
        let spec = BindingSpec::read(Statement::ListEntities {
            label: entity.name.clone(),
        });
        self.search = Some(QueryBinding::mount(self.ctx.executor(), spec).await);
        self.target_type = Some(entity);
        self.target = None;
        Ok(())
    }

    /// Entities of the chosen target type; empty before one is chosen.
    pub fn candidates(&self) -> Result<Vec<FetchedNode>> {
        match &self.search {
            Some(search) => Ok(error::records(search.result())?
                .iter()
                .filter_map(|r| r.fetched_node(column::NODE))
                .collect()),
            None => Ok(Vec::new()),
        }
    }

    pub fn candidate_chips(&self) -> Result<Vec<NodeChip>> {
        let schema = self.ctx.schema();
        Ok(self
            .candidates()?
            .iter()
            .map(|c| NodeChip::new(schema, &c.node))
            .collect())
    }

    pub fn choose_target(&mut self, index: usize) -> Result<()> {
        let candidates = self.candidates()?;
        let len = candidates.len();
        let chosen = candidates
            .into_iter()
            .nth(index)
            .ok_or(ViewError::NoSuchRow { index, len })?;
        self.target = Some(chosen.node);
        Ok(())
    }

    pub fn can_submit(&self) -> bool {
        self.link_type.is_some() && self.target.is_some()
    }

    /// Create the relationship, then refresh both lists of the focal node.
    ///
    /// Returns `None` if either end no longer exists.
    pub async fn submit(&self) -> Result<Option<GraphLink>> {
        let link_type = self.link_type.clone().ok_or(ViewError::Incomplete("link type"))?;
        let target = self.target.as_ref().ok_or(ViewError::Incomplete("target"))?;

        let params = Params::new()
            .with(param::FROM, self.from)
            .with(param::TO, target.identity);
        let binding = QueryBinding::builder(
            self.ctx.executor(),
            BindingSpec::write(Statement::CreateLink { link_type }).with_params(params),
        )
        .build();
        for dependent in &self.dependents {
            binding.add_dependent(dependent)?;
        }

        tracing::info!(from = %self.from, to = %target.identity, "Creating relationship");
        let records = settle(&binding).await?;
        Ok(records
            .first()
            .and_then(|r| r.link(column::LINK))
            .cloned())
    }
}
