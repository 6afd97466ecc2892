//! Organizer Binding: live, refreshable query results.
//!
//! A [`QueryBinding`] pairs a statement with parameters and an access mode
//! and keeps the latest result cached. Forms submit through write bindings
//! whose dependents (the lists they change) refresh afterwards.

pub mod binding;
pub mod error;
pub mod result;

pub use binding::{BindingBuilder, BindingSpec, OnRefresh, QueryBinding};
pub use error::BindingError;
pub use result::{BindingResult, QueryFailure, RefreshOutcome};
