//! Refresh lifecycle of query bindings over the in-memory graph.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{oneshot, Notify};

use organizer_binding::{BindingSpec, QueryBinding, RefreshOutcome};
use organizer_core::events::BindingEventPayload;
use organizer_core::{Ident, Params, PropertyMap, PropertyValue, Record};
use organizer_graph::{AccessMode, GraphError, GraphExecutor, MemoryGraph, Statement};

fn ident(raw: &str) -> Ident {
    Ident::parse(raw).unwrap()
}

fn list(label: &str) -> Statement {
    Statement::ListEntities {
        label: ident(label),
    }
}

fn upsert_team() -> Statement {
    Statement::UpsertEntity {
        label: ident("Team"),
        fields: vec![ident("name")],
    }
}

fn named(name: &str) -> PropertyMap {
    let mut props = PropertyMap::new();
    props.insert("name".into(), PropertyValue::from(name));
    props
}

fn team_params(name: &str) -> Params {
    Params::new().with("prop_name", name)
}

// ── Mounting ───────────────────────────────────────────────────────

#[tokio::test]
async fn read_binding_fetches_once_on_mount() {
    let graph = Arc::new(MemoryGraph::new());
    graph.insert_node("Team", named("Platform")).await;

    let binding = QueryBinding::mount(graph.clone(), BindingSpec::read(list("Team"))).await;

    assert_eq!(graph.execution_count().await, 1);
    let records = binding.records();
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].node("m").and_then(|n| n.property_str("name")),
        Some("Platform")
    );
}

#[tokio::test]
async fn write_binding_waits_for_explicit_refresh() {
    let graph = Arc::new(MemoryGraph::new());
    let binding = QueryBinding::mount(
        graph.clone(),
        BindingSpec::write(upsert_team()).with_params(team_params("Infra")),
    )
    .await;

    assert_eq!(graph.execution_count().await, 0);
    assert!(binding.records().is_empty());

    let outcome = binding.refresh().await;
    assert_eq!(outcome, RefreshOutcome::Updated { records: 1 });
    assert_eq!(graph.execution_count().await, 1);
}

#[tokio::test]
async fn write_statement_in_read_mode_fails() {
    let graph = Arc::new(MemoryGraph::new());
    let binding = QueryBinding::mount(
        graph.clone(),
        BindingSpec::read(upsert_team()).with_params(team_params("Infra")),
    )
    .await;

    let failure = binding.result().failure().cloned().unwrap();
    assert!(matches!(*failure.error, GraphError::AccessMode { .. }));
    assert_eq!(graph.node(organizer_core::Identity(0)).await, None);
}

// ── Failures ───────────────────────────────────────────────────────

#[tokio::test]
async fn failure_leaves_marker_and_skips_callbacks() {
    let graph = Arc::new(MemoryGraph::new());
    graph.insert_node("Team", named("Platform")).await;

    let refreshed = Arc::new(AtomicUsize::new(0));
    let counter = refreshed.clone();
    let binding = QueryBinding::builder(graph.clone(), BindingSpec::read(list("Team")))
        .on_refresh(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .mount()
        .await;
    assert_eq!(refreshed.load(Ordering::SeqCst), 1);

    graph.fail_next("connection reset").await;
    let done = Arc::new(AtomicUsize::new(0));
    let flag = done.clone();
    let outcome = binding
        .refresh_then(move || {
            flag.fetch_add(1, Ordering::SeqCst);
        })
        .await;

    assert_eq!(outcome, RefreshOutcome::Failed);
    assert_eq!(done.load(Ordering::SeqCst), 0);
    assert_eq!(refreshed.load(Ordering::SeqCst), 1);

    let result = binding.result();
    assert!(result.is_failed());
    assert!(result.records().is_empty());
    assert!(result.failure().unwrap().message().contains("connection reset"));

    // A later success replaces the marker.
    assert!(binding.refresh().await.is_success());
    assert_eq!(binding.records().len(), 1);
}

// ── Callback ordering ──────────────────────────────────────────────

#[tokio::test]
async fn on_done_runs_once_after_cache_update() {
    let graph = Arc::new(MemoryGraph::new());
    let binding = QueryBinding::mount(
        graph.clone(),
        BindingSpec::write(upsert_team()).with_params(team_params("Infra")),
    )
    .await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let observer = binding.clone();
    let sink = seen.clone();
    binding
        .refresh_then(move || {
            sink.lock().unwrap().push(observer.records().len());
        })
        .await;

    assert_eq!(*seen.lock().unwrap(), vec![1]);
}

#[tokio::test]
async fn dependents_refresh_before_on_done() {
    let graph = Arc::new(MemoryGraph::new());
    let teams = QueryBinding::mount(graph.clone(), BindingSpec::read(list("Team"))).await;
    assert!(teams.records().is_empty());

    let create = QueryBinding::mount(
        graph.clone(),
        BindingSpec::write(upsert_team()).with_params(team_params("Infra")),
    )
    .await;
    create.add_dependent(&teams).unwrap();

    let seen = Arc::new(Mutex::new(None));
    let sink = seen.clone();
    let list_view = teams.clone();
    create
        .refresh_then(move || {
            *sink.lock().unwrap() = Some(list_view.records().len());
        })
        .await;

    assert_eq!(*seen.lock().unwrap(), Some(1));
    // mount, upsert, dependent refresh
    assert_eq!(graph.execution_count().await, 3);
}

#[tokio::test]
async fn dependents_chain_transitively() {
    let graph = Arc::new(MemoryGraph::new());
    let first = QueryBinding::mount(graph.clone(), BindingSpec::read(list("Team"))).await;
    let second = QueryBinding::mount(graph.clone(), BindingSpec::read(list("Team"))).await;
    let create = QueryBinding::mount(
        graph.clone(),
        BindingSpec::write(upsert_team()).with_params(team_params("Infra")),
    )
    .await;
    create.add_dependent(&first).unwrap();
    first.add_dependent(&second).unwrap();

    create.refresh().await;

    assert_eq!(first.records().len(), 1);
    assert_eq!(second.records().len(), 1);
}

// ── Inputs ─────────────────────────────────────────────────────────

#[tokio::test]
async fn param_change_refetches_only_when_different() {
    let graph = Arc::new(MemoryGraph::new());
    let node = graph.insert_node("Team", named("Platform")).await;
    let params = Params::new().with("id", node.identity);
    let binding = QueryBinding::mount(
        graph.clone(),
        BindingSpec::read(Statement::EntityById).with_params(params),
    )
    .await;
    assert_eq!(graph.execution_count().await, 1);

    // Structurally equal, freshly built.
    assert_eq!(binding.set_params(Params::new().with("id", node.identity)).await, None);
    assert_eq!(graph.execution_count().await, 1);

    let other = graph.insert_node("Team", named("Infra")).await;
    let outcome = binding.set_params(Params::new().with("id", other.identity)).await;
    assert_eq!(outcome, Some(RefreshOutcome::Updated { records: 1 }));
    assert_eq!(graph.execution_count().await, 2);
    assert_eq!(
        binding.records()[0].node("m").and_then(|n| n.property_str("name")),
        Some("Infra")
    );
}

#[tokio::test]
async fn write_binding_param_change_does_not_execute() {
    let graph = Arc::new(MemoryGraph::new());
    let binding = QueryBinding::mount(
        graph.clone(),
        BindingSpec::write(upsert_team()).with_params(team_params("Infra")),
    )
    .await;

    assert_eq!(binding.set_params(team_params("Platform")).await, None);
    assert_eq!(graph.execution_count().await, 0);
    assert_eq!(binding.params(), team_params("Platform"));
}

// ── Events ─────────────────────────────────────────────────────────

#[tokio::test]
async fn refreshes_are_broadcast() {
    let graph = Arc::new(MemoryGraph::new());
    graph.insert_node("Team", named("Platform")).await;
    let binding = QueryBinding::builder(graph.clone(), BindingSpec::read(list("Team"))).build();
    let mut events = binding.subscribe();

    binding.refresh().await;
    graph.fail_next("boom").await;
    binding.refresh().await;

    let first = events.recv().await.unwrap();
    assert_eq!(first.binding_id, binding.id());
    assert!(matches!(first.payload, BindingEventPayload::Refreshed { records: 1 }));

    let second = events.recv().await.unwrap();
    assert!(matches!(second.payload, BindingEventPayload::Failed { .. }));
}

// ── Overlapping refreshes ──────────────────────────────────────────

/// Lets the first execution run, then holds its response until released.
struct GatedGraph {
    graph: MemoryGraph,
    gate: tokio::sync::Mutex<Option<oneshot::Receiver<()>>>,
    entered: Notify,
}

#[async_trait]
impl GraphExecutor for GatedGraph {
    async fn execute(
        &self,
        statement: &Statement,
        params: &Params,
        mode: AccessMode,
    ) -> Result<Vec<Record>, GraphError> {
        let records = self.graph.execute(statement, params, mode).await;
        let gate = self.gate.lock().await.take();
        if let Some(gate) = gate {
            self.entered.notify_one();
            let _ = gate.await;
        }
        records
    }
}

#[tokio::test]
async fn stale_response_is_superseded() {
    let (release, gate) = oneshot::channel();
    let gated = Arc::new(GatedGraph {
        graph: MemoryGraph::new(),
        gate: tokio::sync::Mutex::new(Some(gate)),
        entered: Notify::new(),
    });
    gated.graph.insert_node("Team", named("Platform")).await;

    let binding = QueryBinding::builder(gated.clone(), BindingSpec::read(list("Team"))).build();

    let slow = tokio::spawn({
        let binding = binding.clone();
        async move { binding.refresh().await }
    });
    gated.entered.notified().await;

    gated.graph.insert_node("Team", named("Infra")).await;
    let fast = binding.refresh().await;
    assert_eq!(fast, RefreshOutcome::Updated { records: 2 });

    release.send(()).unwrap();
    let slow = slow.await.unwrap();
    assert_eq!(slow, RefreshOutcome::Superseded);
    assert_eq!(binding.records().len(), 2);
}

#[tokio::test]
async fn older_success_replaces_newer_failure() {
    let (release, gate) = oneshot::channel();
    let gated = Arc::new(GatedGraph {
        graph: MemoryGraph::new(),
        gate: tokio::sync::Mutex::new(Some(gate)),
        entered: Notify::new(),
    });
    gated.graph.insert_node("Team", named("Platform")).await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let binding = QueryBinding::builder(gated.clone(), BindingSpec::read(list("Team")))
        .on_refresh(move |records| sink.lock().unwrap().push(records.len()))
        .build();

    let done = Arc::new(AtomicUsize::new(0));
    let slow = tokio::spawn({
        let binding = binding.clone();
        let flag = done.clone();
        async move {
            binding
                .refresh_then(move || {
                    flag.fetch_add(1, Ordering::SeqCst);
                })
                .await
        }
    });
    gated.entered.notified().await;

    gated.graph.fail_next("leader changed").await;
    assert_eq!(binding.refresh().await, RefreshOutcome::Failed);
    assert!(binding.result().is_failed());

    release.send(()).unwrap();
    let slow = slow.await.unwrap();
    assert_eq!(slow, RefreshOutcome::Updated { records: 1 });
    assert!(slow.is_success());
    assert!(!binding.result().is_failed());
    assert_eq!(binding.records().len(), 1);
    assert_eq!(*seen.lock().unwrap(), vec![1]);
    assert_eq!(done.load(Ordering::SeqCst), 1);

    // The replaced failure does not block a newer refresh.
    assert_eq!(binding.refresh().await, RefreshOutcome::Updated { records: 1 });
}
