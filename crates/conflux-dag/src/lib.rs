//! Conflux DAG
//!
//! The pipeline execution graph. Builds a validated DAG from a declarative
//! list of node definitions, using `conflux-parsers` to discover dependency
//! edges from reference expressions, and tracks one mutable record per node
//! (and per fanned-out batch item) so the owning driver can release
//! downstream nodes exactly when their dependencies are satisfied.
//!
//! The graph is synchronous and in-memory only: it executes nothing,
//! performs no I/O, and persists nothing. Mutations take `&mut self`; the
//! driver loop that owns the graph serializes them, and read-only queries
//! may run concurrently through shared references.

mod dag;
mod error;
mod node;
mod progress;
mod state;

pub use dag::Dag;
pub use error::DagError;
pub use node::{BatchItem, GraphNode, NodeDef, NodeResult, NodeUpdate, StateUpdate};
pub use progress::{ActiveNode, BatchProgress, Progress};
pub use state::NodeState;
