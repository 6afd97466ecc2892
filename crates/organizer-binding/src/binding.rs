//! The query binding: one statement, one parameter set, one mode, and a
//! locally cached, refreshable result.
//!
//! Read bindings fetch when mounted and again whenever their parameters or
//! refresh trigger change. Write bindings only execute on an explicit
//! [`QueryBinding::refresh`], typically from a form submit.
//!
//! Overlapping refreshes are not cancelled. Each execution takes a
//! sequence number when issued and a response only replaces the cache if
//! no later-issued response has been applied yet.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use organizer_core::events::{BindingEvent, BindingEventPayload, BindingId};
use organizer_core::{FetchedRecord, Params};
use organizer_graph::{AccessMode, GraphExecutor, Statement};

use crate::error::{BindingError, Result};
use crate::result::{BindingResult, QueryFailure, RefreshOutcome};

/// Capacity of each binding's event channel.
const EVENT_CAPACITY: usize = 32;

/// Callback invoked with the cached records after every successful refresh.
pub type OnRefresh = Arc<dyn Fn(&[FetchedRecord]) + Send + Sync>;

type OnDone = Box<dyn FnOnce() + Send>;

/// Construction inputs of a binding.
#[derive(Debug, Clone)]
pub struct BindingSpec {
    pub statement: Statement,
    pub params: Params,
    pub mode: AccessMode,
    /// Change-detection value only; a new trigger re-fetches a read binding.
    pub trigger: Option<DateTime<Utc>>,
}

impl BindingSpec {
    pub fn read(statement: Statement) -> Self {
        Self {
            statement,
            params: Params::new(),
            mode: AccessMode::Read,
            trigger: None,
        }
    }

    pub fn write(statement: Statement) -> Self {
        Self {
            mode: AccessMode::Write,
            ..Self::read(statement)
        }
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    pub fn with_trigger(mut self, trigger: DateTime<Utc>) -> Self {
        self.trigger = Some(trigger);
        self
    }
}

/// Builder for a [`QueryBinding`] with an optional completion callback.
pub struct BindingBuilder {
    executor: Arc<dyn GraphExecutor>,
    spec: BindingSpec,
    on_refresh: Option<OnRefresh>,
}

impl BindingBuilder {
    /// Invoke `f` with the cached records after every successful refresh.
    pub fn on_refresh(mut self, f: impl Fn(&[FetchedRecord]) + Send + Sync + 'static) -> Self {
        self.on_refresh = Some(Arc::new(f));
        self
    }

    /// Create the binding without executing anything.
    pub fn build(self) -> QueryBinding {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        QueryBinding {
            inner: Arc::new(Inner {
                id: BindingId::new(),
                executor: self.executor,
                statement: self.spec.statement,
                mode: self.spec.mode,
                inputs: RwLock::new(Inputs {
                    params: self.spec.params,
                    trigger: self.spec.trigger,
                }),
                state: RwLock::new(State::default()),
                issued: AtomicU64::new(0),
                on_refresh: self.on_refresh,
                dependents: RwLock::new(Vec::new()),
                events,
            }),
        }
    }

    /// Create the binding and, for read mode, perform the initial fetch.
    pub async fn mount(self) -> QueryBinding {
        let binding = self.build();
        if binding.mode() == AccessMode::Read {
            binding.refresh().await;
        }
        binding
    }
}

struct Inputs {
    params: Params,
    trigger: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct State {
    result: BindingResult,
    /// Sequence number of the response currently in `result`.
    applied_seq: u64,
}

struct Inner {
    id: BindingId,
    executor: Arc<dyn GraphExecutor>,
    statement: Statement,
    mode: AccessMode,
    inputs: RwLock<Inputs>,
    state: RwLock<State>,
    issued: AtomicU64,
    on_refresh: Option<OnRefresh>,
    dependents: RwLock<Vec<QueryBinding>>,
    events: broadcast::Sender<BindingEvent>,
}

/// A live, refreshable result set bound to one statement.
///
/// Clone is cheap (inner Arc); clones share the same cache.
#[derive(Clone)]
pub struct QueryBinding {
    inner: Arc<Inner>,
}

impl QueryBinding {
    pub fn builder(executor: Arc<dyn GraphExecutor>, spec: BindingSpec) -> BindingBuilder {
        BindingBuilder {
            executor,
            spec,
            on_refresh: None,
        }
    }

    /// Build and mount a binding without a completion callback.
    pub async fn mount(executor: Arc<dyn GraphExecutor>, spec: BindingSpec) -> Self {
        Self::builder(executor, spec).mount().await
    }

    pub fn id(&self) -> BindingId {
        self.inner.id
    }

    pub fn mode(&self) -> AccessMode {
        self.inner.mode
    }

    pub fn statement(&self) -> &Statement {
        &self.inner.statement
    }

    pub fn params(&self) -> Params {
        self.read_inputs().params.clone()
    }

    pub fn trigger(&self) -> Option<DateTime<Utc>> {
        self.read_inputs().trigger
    }

    /// Snapshot of the cached result.
    pub fn result(&self) -> BindingResult {
        self.read_state().result.clone()
    }

    /// Snapshot of the usable records (empty after a failure).
    pub fn records(&self) -> Vec<FetchedRecord> {
        self.read_state().result.records().to_vec()
    }

    /// Hand the current result and this binding (for `refresh`) to a
    /// rendering function.
    pub fn render<T>(&self, f: impl FnOnce(&BindingResult, &QueryBinding) -> T) -> T {
        let result = self.result();
        f(&result, self)
    }

    /// Receive an event every time a refresh changes the cache.
    pub fn subscribe(&self) -> broadcast::Receiver<BindingEvent> {
        self.inner.events.subscribe()
    }

    /// Refresh `dependent` after every successful refresh of this binding.
    pub fn add_dependent(&self, dependent: &QueryBinding) -> Result<()> {
        if dependent.reaches(self) {
            return Err(BindingError::DependencyCycle {
                binding: self.id(),
                dependent: dependent.id(),
            });
        }
        self.inner
            .dependents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(dependent.clone());
        Ok(())
    }

    /// Replace the parameters. A read binding re-fetches once if they differ
    /// structurally from the current ones; equal parameters are a no-op.
    pub async fn set_params(&self, params: Params) -> Option<RefreshOutcome> {
        let changed = {
            let mut inputs = self.write_inputs();
            if inputs.params == params {
                false
            } else {
                inputs.params = params;
                true
            }
        };
        self.after_input_change(changed).await
    }

    /// Replace the refresh trigger. A read binding re-fetches if it changed.
    pub async fn set_trigger(&self, trigger: Option<DateTime<Utc>>) -> Option<RefreshOutcome> {
        let changed = {
            let mut inputs = self.write_inputs();
            if inputs.trigger == trigger {
                false
            } else {
                inputs.trigger = trigger;
                true
            }
        };
        self.after_input_change(changed).await
    }

    /// Replace parameters and trigger together. A read binding re-fetches at
    /// most once.
    pub async fn set_inputs(
        &self,
        params: Params,
        trigger: Option<DateTime<Utc>>,
    ) -> Option<RefreshOutcome> {
        let changed = {
            let mut inputs = self.write_inputs();
            let changed = inputs.params != params || inputs.trigger != trigger;
            inputs.params = params;
            inputs.trigger = trigger;
            changed
        };
        self.after_input_change(changed).await
    }

    /// Execute the statement with the current parameters.
    pub async fn refresh(&self) -> RefreshOutcome {
        self.run(None).await
    }

    /// Like [`refresh`](Self::refresh), then invoke `on_done` once the cache
    /// and every dependent have been updated. `on_done` is skipped on failure.
    pub async fn refresh_then(&self, on_done: impl FnOnce() + Send + 'static) -> RefreshOutcome {
        self.run(Some(Box::new(on_done))).await
    }

    async fn after_input_change(&self, changed: bool) -> Option<RefreshOutcome> {
        if changed && self.mode() == AccessMode::Read {
            Some(self.refresh().await)
        } else {
            None
        }
    }

    async fn run(&self, on_done: Option<OnDone>) -> RefreshOutcome {
        let seq = self.inner.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let params = self.params();
        let statement = &self.inner.statement;

        tracing::debug!(
            binding = %self.inner.id,
            %statement,
            mode = %self.inner.mode,
            seq,
            "Running query"
        );

        let fetched = self
            .inner
            .executor
            .execute(statement, &params, self.inner.mode)
            .await;

        let outcome = match fetched {
            Ok(records) => {
                let loaded_at = Utc::now();
                let records: Vec<FetchedRecord> = records
                    .into_iter()
                    .map(|r| FetchedRecord::new(r, loaded_at))
                    .collect();
                let count = records.len();
                if self.apply_records(seq, records) {
                    tracing::debug!(binding = %self.inner.id, %statement, records = count, "Query result");
                    self.publish(BindingEventPayload::Refreshed { records: count });
                    RefreshOutcome::Updated { records: count }
                } else {
                    tracing::debug!(binding = %self.inner.id, %statement, seq, "Discarding superseded result");
                    RefreshOutcome::Superseded
                }
            }
            Err(e) => {
                tracing::error!(binding = %self.inner.id, %statement, error = %e, "Query failed");
                let failure = QueryFailure {
                    error: Arc::new(e),
                    failed_at: Utc::now(),
                };
                let message = failure.message();
                if self.apply_failure(seq, failure) {
                    self.publish(BindingEventPayload::Failed { message });
                }
                return RefreshOutcome::Failed;
            }
        };

        if let Some(on_refresh) = &self.inner.on_refresh {
            on_refresh(&self.records());
        }

        let dependents = self
            .inner
            .dependents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for dependent in dependents {
            refresh_dependent(dependent).await;
        }

        if let Some(on_done) = on_done {
            on_done();
        }
        outcome
    }

    /// Store `failure` unless a later-issued response is already applied.
    fn apply_failure(&self, seq: u64, failure: QueryFailure) -> bool {
        let mut state = self.inner.state.write().unwrap_or_else(PoisonError::into_inner);
        if seq < state.applied_seq {
            return false;
        }
        state.applied_seq = seq;
        state.result = BindingResult::Failed(failure);
        true
    }

    /// Store successful records unless a later-issued success is already
    /// applied. An older success still replaces a newer failure.
    fn apply_records(&self, seq: u64, records: Vec<FetchedRecord>) -> bool {
        let mut state = self.inner.state.write().unwrap_or_else(PoisonError::into_inner);
        if seq < state.applied_seq && !state.result.is_failed() {
            return false;
        }
        state.applied_seq = state.applied_seq.max(seq);
        state.result = BindingResult::Records(records);
        true
    }

    fn publish(&self, payload: BindingEventPayload) {
        // No subscribers is fine.
        let _ = self.inner.events.send(BindingEvent::new(self.inner.id, payload));
    }

    /// Whether `target` is this binding or is refreshed (transitively) by it.
    fn reaches(&self, target: &QueryBinding) -> bool {
        if Arc::ptr_eq(&self.inner, &target.inner) {
            return true;
        }
        self.inner
            .dependents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|d| d.reaches(target))
    }

    fn read_inputs(&self) -> RwLockReadGuard<'_, Inputs> {
        self.inner.inputs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_inputs(&self) -> RwLockWriteGuard<'_, Inputs> {
        self.inner.inputs.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_state(&self) -> RwLockReadGuard<'_, State> {
        self.inner.state.read().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Dependents refresh recursively, so the future is boxed.
fn refresh_dependent(dependent: QueryBinding) -> Pin<Box<dyn Future<Output = RefreshOutcome> + Send>> {
    Box::pin(async move { dependent.run(None).await })
}

impl fmt::Debug for QueryBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryBinding")
            .field("id", &self.inner.id)
            .field("statement", &self.inner.statement)
            .field("mode", &self.inner.mode)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use organizer_core::{Ident, PropertyMap};
    use organizer_graph::MemoryGraph;

    fn teams() -> Statement {
        Statement::ListEntities {
            label: Ident::parse("Team").unwrap(),
        }
    }

    #[tokio::test]
    async fn build_does_not_fetch() {
        let graph = Arc::new(MemoryGraph::new());
        let binding = QueryBinding::builder(graph.clone(), BindingSpec::read(teams())).build();
        assert_eq!(graph.execution_count().await, 0);
        assert!(binding.records().is_empty());
        assert!(!binding.result().is_failed());
    }

    #[tokio::test]
    async fn render_hands_result_and_binding() {
        let graph = Arc::new(MemoryGraph::new());
        graph.insert_node("Team", PropertyMap::new()).await;
        let binding = QueryBinding::mount(graph.clone(), BindingSpec::read(teams())).await;

        let (count, same) = binding.render(|result, b| (result.records().len(), b.id() == binding.id()));
        assert_eq!(count, 1);
        assert!(same);
    }

    #[tokio::test]
    async fn self_dependency_is_a_cycle() {
        let graph = Arc::new(MemoryGraph::new());
        let a = QueryBinding::builder(graph.clone(), BindingSpec::read(teams())).build();
        let b = QueryBinding::builder(graph.clone(), BindingSpec::read(teams())).build();

        assert!(matches!(
            a.add_dependent(&a),
            Err(BindingError::DependencyCycle { .. })
        ));
        a.add_dependent(&b).unwrap();
        assert!(matches!(
            b.add_dependent(&a),
            Err(BindingError::DependencyCycle { .. })
        ));
    }

    #[tokio::test]
    async fn trigger_change_refetches_read_binding() {
        let graph = Arc::new(MemoryGraph::new());
        let at = Utc::now();
        let binding =
            QueryBinding::mount(graph.clone(), BindingSpec::read(teams()).with_trigger(at)).await;
        assert_eq!(graph.execution_count().await, 1);

        assert_eq!(binding.set_trigger(Some(at)).await, None);
        assert_eq!(graph.execution_count().await, 1);

        let later = at + chrono::Duration::milliseconds(5);
        assert!(binding.set_trigger(Some(later)).await.is_some());
        assert_eq!(graph.execution_count().await, 2);
        assert_eq!(binding.trigger(), Some(later));
    }

    #[tokio::test]
    async fn set_inputs_fetches_once_for_both_changes() {
        let graph = Arc::new(MemoryGraph::new());
        let at = Utc::now();
        let binding = QueryBinding::mount(
            graph.clone(),
            BindingSpec::read(Statement::EntityById)
                .with_params(Params::new().with("id", 1_i64))
                .with_trigger(at),
        )
        .await;

        let later = at + chrono::Duration::seconds(1);
        let outcome = binding
            .set_inputs(Params::new().with("id", 2_i64), Some(later))
            .await;
        assert!(outcome.is_some());
        assert_eq!(graph.execution_count().await, 2);
    }
}
