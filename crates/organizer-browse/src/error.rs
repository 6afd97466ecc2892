//! Error types for the organizer views.

use std::sync::Arc;

use thiserror::Error;

use organizer_binding::{BindingError, BindingResult, QueryBinding, QueryFailure};
use organizer_core::{FetchedRecord, Identity, SchemaError};
use organizer_graph::GraphError;

#[derive(Error, Debug, Clone)]
pub enum ViewError {
    #[error("Query failed: {0}")]
    Query(Arc<GraphError>),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Binding(#[from] BindingError),

    #[error("No row {index}: the list has {len}")]
    NoSuchRow { index: usize, len: usize },

    #[error("Cannot submit before a {0} is chosen")]
    Incomplete(&'static str),

    #[error("Entity {0} no longer exists")]
    Gone(Identity),
}

impl From<QueryFailure> for ViewError {
    fn from(failure: QueryFailure) -> Self {
        Self::Query(failure.error)
    }
}

pub type Result<T> = std::result::Result<T, ViewError>;

/// The usable records of a binding result, or its failure.
pub(crate) fn records(result: BindingResult) -> Result<Vec<FetchedRecord>> {
    match result {
        BindingResult::Records(records) => Ok(records),
        BindingResult::Failed(failure) => Err(failure.into()),
    }
}

/// Run a write binding once and return its records, or its failure.
pub(crate) async fn settle(binding: &QueryBinding) -> Result<Vec<FetchedRecord>> {
    binding.refresh().await;
    records(binding.result())
}
