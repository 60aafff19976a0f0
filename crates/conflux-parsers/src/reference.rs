//! The reference-expression grammar.
//!
//! String leaves are classified once into a closed [`Reference`] sum type;
//! downstream logic matches on the variants instead of re-deriving markers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reserved root name addressing the pipeline run's top-level payload.
/// No graph node may carry this name.
pub const FLOW_INPUT: &str = "flowInput";

const WAIT_NODE_MARKER: &str = "@";
const BATCH_MARKER: &str = "#";
const WAIT_ANY_BATCH_MARKER: &str = "*@";

/// The kind of dependency a reference expresses.
///
/// Serialized in camelCase (`waitNode`, `waitBatch`, `waitAnyBatch`) to stay
/// compatible with existing pipeline tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Relation {
  WaitNode,
  WaitBatch,
  WaitAnyBatch,
}

/// A classified reference expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Reference {
  /// `@name[.path]` — wait for a single completed result from `name`
  /// (or from the flow input), optionally projected through `path`.
  WaitNode { node: String, path: Option<String> },
  /// `#name[.path]` — the referenced result must be an array; the consuming
  /// node fans out once per element.
  WaitBatch { node: String, path: Option<String> },
  /// `*@name[.path]` — bound to a specific upstream batch element by index
  /// rather than driving fan-out of the consuming node.
  WaitAnyBatch { node: String, path: Option<String> },
  /// `#[<json>]` — inline batch data. The JSON is parsed lazily and
  /// permissively via [`Reference::raw_items`].
  RawBatch { raw: String },
  /// Not a reference. Includes every non-string leaf.
  Literal,
}

impl Reference {
  /// Classify a single input leaf.
  pub fn classify(input: &Value) -> Reference {
    let Some(expr) = input.as_str() else {
      return Reference::Literal;
    };
    if let Some(rest) = expr.strip_prefix(WAIT_ANY_BATCH_MARKER) {
      let (node, path) = split_path(rest);
      return Reference::WaitAnyBatch { node, path };
    }
    if let Some(rest) = expr.strip_prefix(BATCH_MARKER) {
      if rest.starts_with('[') {
        return Reference::RawBatch {
          raw: rest.to_string(),
        };
      }
      let (node, path) = split_path(rest);
      return Reference::WaitBatch { node, path };
    }
    if let Some(rest) = expr.strip_prefix(WAIT_NODE_MARKER) {
      let (node, path) = split_path(rest);
      return Reference::WaitNode { node, path };
    }
    Reference::Literal
  }

  /// The referenced node name, when this reference addresses one.
  pub fn node_name(&self) -> Option<&str> {
    match self {
      Reference::WaitNode { node, .. }
      | Reference::WaitBatch { node, .. }
      | Reference::WaitAnyBatch { node, .. } => Some(node),
      Reference::RawBatch { .. } | Reference::Literal => None,
    }
  }

  /// The dependency kind, when this reference addresses a node.
  pub fn relation(&self) -> Option<Relation> {
    match self {
      Reference::WaitNode { .. } => Some(Relation::WaitNode),
      Reference::WaitBatch { .. } => Some(Relation::WaitBatch),
      Reference::WaitAnyBatch { .. } => Some(Relation::WaitAnyBatch),
      Reference::RawBatch { .. } | Reference::Literal => None,
    }
  }

  /// Items of a raw batch literal; `None` when the embedded JSON is
  /// malformed (callers fall back to the literal string).
  pub fn raw_items(&self) -> Option<Vec<Value>> {
    match self {
      Reference::RawBatch { raw } => serde_json::from_str(raw).ok(),
      _ => None,
    }
  }
}

fn split_path(expr: &str) -> (String, Option<String>) {
  match expr.split_once('.') {
    Some((node, path)) => (node.to_string(), Some(path.to_string())),
    None => (expr.to_string(), None),
  }
}

/// A node reference discovered inside an input spec.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRef {
  pub node_name: String,
  pub relation: Relation,
}

impl NodeRef {
  /// False for `flowInput` references: the flow input is not a graph node
  /// and never contributes a dependency edge.
  pub fn is_node(&self) -> bool {
    self.node_name != FLOW_INPUT
  }

  /// True for `@name` references.
  pub fn is_wait_node(&self) -> bool {
    self.relation == Relation::WaitNode
  }

  /// True for `#name` references.
  pub fn is_wait_batch(&self) -> bool {
    self.relation == Relation::WaitBatch
  }

  /// True for `*@name` references.
  pub fn is_wait_any_batch(&self) -> bool {
    self.relation == Relation::WaitAnyBatch
  }
}

/// One already-computed upstream result handed in by the driver.
///
/// Entries are matched by `{relation, node}` and, for wait-any references,
/// additionally by `index`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentOutput {
  #[serde(rename = "type")]
  pub relation: Relation,
  pub node: String,
  pub result: Value,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub index: Option<usize>,
}
