//! What a binding holds and what a refresh reports.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use organizer_core::FetchedRecord;
use organizer_graph::GraphError;

/// The error marker left in a binding after a failed execution.
#[derive(Debug, Clone)]
pub struct QueryFailure {
    pub error: Arc<GraphError>,
    pub failed_at: DateTime<Utc>,
}

impl QueryFailure {
    pub fn message(&self) -> String {
        self.error.to_string()
    }
}

/// The cached result of a binding.
///
/// A failure is a distinct state, never confused with an empty list.
#[derive(Debug, Clone)]
pub enum BindingResult {
    Records(Vec<FetchedRecord>),
    Failed(QueryFailure),
}

impl Default for BindingResult {
    fn default() -> Self {
        Self::Records(Vec::new())
    }
}

impl BindingResult {
    /// Usable records; a failure has none.
    pub fn records(&self) -> &[FetchedRecord] {
        match self {
            Self::Records(records) => records,
            Self::Failed(_) => &[],
        }
    }

    pub fn failure(&self) -> Option<&QueryFailure> {
        match self {
            Self::Records(_) => None,
            Self::Failed(failure) => Some(failure),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// How a single refresh settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The cache now holds the fetched records.
    Updated { records: usize },
    /// The fetch succeeded but a later-issued successful refresh had already
    /// been applied, so the cache was left alone.
    Superseded,
    /// The cache now holds an error marker.
    Failed,
}

impl RefreshOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed)
    }
}
