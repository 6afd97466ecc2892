//! Error types for the organizer-binding crate.

use thiserror::Error;

use organizer_core::events::BindingId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindingError {
    #[error("Binding {dependent} already refreshes {binding}; adding it as a dependent would loop")]
    DependencyCycle {
        binding: BindingId,
        dependent: BindingId,
    },
}

pub type Result<T> = std::result::Result<T, BindingError>;
