//! Organizer Browse: headless views over the organizer graph.
//!
//! Each view owns one or more query bindings and exposes what a front end
//! needs to draw and drive it:
//! - [`EntityCollection`]: every entity of a type, a selection, a create form
//! - [`EntityDetail`]: an edit form for one entity
//! - [`NodeLinks`] and [`AddLinkFlow`]: relationships of one entity
//! - [`NodeChip`] and [`LinkChip`]: one-line renderings
//!
//! [`Session`] turns text commands into view operations for the
//! `organizer` binary.

pub mod chip;
pub mod collection;
pub mod context;
pub mod detail;
pub mod error;
pub mod form;
pub mod links;
pub mod session;

pub use chip::{LinkChip, NodeChip};
pub use collection::{CreateForm, EntityCollection};
pub use context::ViewContext;
pub use detail::EntityDetail;
pub use error::ViewError;
pub use form::FormState;
pub use links::{AddLinkFlow, LinkEntry, NodeLinks};
pub use session::{Command, Session};
