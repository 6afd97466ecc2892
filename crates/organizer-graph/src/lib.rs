//! organizer-graph: the graph executor capability for the network organizer.
//!
//! Every read and write the organizer performs is one of the closed set of
//! [`Statement`]s, executed through a [`GraphExecutor`]: the Neo4j
//! [`GraphClient`] in production or the in-process [`MemoryGraph`].

pub mod client;
mod convert;
pub mod executor;
pub mod memory;
pub mod statement;

pub use client::{GraphClient, GraphConfig, GraphError};
pub use executor::GraphExecutor;
pub use memory::{Execution, MemoryGraph};
pub use statement::{AccessMode, Direction, Statement, WriteMode};
