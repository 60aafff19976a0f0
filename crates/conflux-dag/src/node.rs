//! Node records and update payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::NodeState;

/// One node of a pipeline definition, as authored.
///
/// `input` is kept as raw JSON: it must be an array (validated at graph
/// build) and its elements may embed reference expressions. Field names
/// follow the pipeline wire format (`nodeName`, `algorithmName`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDef {
  pub node_name: String,
  pub algorithm_name: String,
  #[serde(default)]
  pub input: Value,
}

/// Mutable per-node record tracked by the graph for one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
  pub name: String,
  pub algorithm: String,
  /// The original input spec, never resolved in place.
  pub input: Value,
  pub state: NodeState,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub result: Option<Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
  /// Fanned-out instances; empty unless this is a batch node.
  pub batch: Vec<BatchItem>,
}

impl GraphNode {
  pub(crate) fn new(def: &NodeDef) -> Self {
    GraphNode {
      name: def.node_name.clone(),
      algorithm: def.algorithm_name.clone(),
      input: def.input.clone(),
      state: NodeState::default(),
      result: None,
      error: None,
      batch: Vec::new(),
    }
  }

  /// True once the node has been fanned out into batch items.
  pub fn is_batch(&self) -> bool {
    !self.batch.is_empty()
  }

  /// The node's states: one per batch item, else its own as a singleton.
  pub fn states(&self) -> Vec<NodeState> {
    if self.is_batch() {
      self.batch.iter().map(|item| item.state).collect()
    } else {
      vec![self.state]
    }
  }

  /// The node's results: one per batch item, else a singleton. Unset
  /// results appear as `null`.
  pub fn results(&self) -> Vec<Value> {
    if self.is_batch() {
      self
        .batch
        .iter()
        .map(|item| item.result.clone().unwrap_or(Value::Null))
        .collect()
    } else {
      vec![self.result.clone().unwrap_or(Value::Null)]
    }
  }
}

/// One fanned-out instance of a batch node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItem {
  /// Unique within the owning node.
  pub batch_id: String,
  pub name: String,
  pub algorithm: String,
  #[serde(default)]
  pub state: NodeState,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub result: Option<Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

impl BatchItem {
  pub fn new(name: impl Into<String>, algorithm: impl Into<String>, batch_id: impl Into<String>) -> Self {
    BatchItem {
      batch_id: batch_id.into(),
      name: name.into(),
      algorithm: algorithm.into(),
      state: NodeState::default(),
      result: None,
      error: None,
    }
  }
}

/// Deep-merge payload for [`Dag::set_node`](crate::Dag::set_node); `None`
/// fields leave the record untouched, so the default value is a no-op.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeUpdate {
  pub state: Option<NodeState>,
  pub result: Option<Value>,
  pub error: Option<String>,
}

/// Overwrite payload for
/// [`Dag::update_node_state`](crate::Dag::update_node_state): `result` and
/// `error` are assigned as given, clearing stale values.
#[derive(Debug, Clone, PartialEq)]
pub struct StateUpdate {
  pub state: NodeState,
  pub result: Option<Value>,
  pub error: Option<String>,
}

/// Flattened result entry for final pipeline output assembly.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeResult {
  pub name: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub batch_id: Option<String>,
  pub algorithm: String,
  pub result: Option<Value>,
}
