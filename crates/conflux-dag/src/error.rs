//! Error types for graph construction and queries.

use thiserror::Error;

/// Errors raised by [`Dag`](crate::Dag) construction and lookups.
///
/// Build-time variants are surfaced to the pipeline author; the two
/// `NotFound` variants indicate a driver bug (names must come from the graph
/// itself) and are therefore loud rather than silently absorbed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DagError {
  /// Two or more definitions share a name; every offender is listed.
  #[error("found duplicate nodes {0}")]
  DuplicateNodes(String),

  /// `flowInput` is reserved for the pipeline payload.
  #[error("node {0} has invalid reserved name")]
  ReservedName(String),

  /// A node's input spec must be a JSON array.
  #[error("node {0} input must be an array")]
  InputNotArray(String),

  /// A single input spec cannot both drive fan-out and wait on a specific
  /// batch element.
  #[error("node {0} input cannot be batch and waitAny")]
  BatchWaitAnyConflict(String),

  /// Dependencies must be declared before their dependents.
  #[error("node {node} depends on {dependency} which does not exist")]
  MissingDependency { node: String, dependency: String },

  #[error("unable to find node {0}")]
  NodeNotFound(String),

  #[error("unable to find batch {0}")]
  BatchNotFound(String),
}
