//! Pipeline progress aggregation.

use std::collections::HashMap;

use serde::Serialize;

use crate::dag::Dag;
use crate::state::NodeState;

/// Share of batch items already dispatched for a batch node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchProgress {
  pub active: usize,
  pub total: usize,
}

/// A node currently doing work.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveNode {
  pub name: String,
  pub algorithm: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub batch: Option<BatchProgress>,
}

/// Aggregated snapshot of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
  /// Percentage of terminal nodes/batch items, formatted with two decimals.
  pub progress: String,
  /// Human-readable summary, e.g. `"25.00% completed, 3 creating, 1 active"`.
  pub details: String,
  /// Count of nodes/batch items per state.
  pub states: HashMap<String, usize>,
  pub active_nodes: Vec<ActiveNode>,
}

impl Dag {
  /// Aggregate completion percentage, per-state counts and active nodes.
  ///
  /// Batch nodes contribute one entry per item; a batch node shows up in
  /// `active_nodes` once any of its items has been dispatched and not all of
  /// them are finished.
  pub fn progress(&self) -> Progress {
    let mut flat: Vec<NodeState> = Vec::new();
    for node in &self.nodes {
      flat.extend(node.states());
    }

    let total = flat.len().max(1);
    let completed = flat.iter().filter(|state| state.is_done()).count();
    let progress = format!("{:.2}", completed as f64 / total as f64 * 100.0);

    let mut order: Vec<NodeState> = Vec::new();
    let mut states: HashMap<String, usize> = HashMap::new();
    for state in &flat {
      if !order.contains(state) {
        order.push(*state);
      }
      *states.entry(state.to_string()).or_default() += 1;
    }
    let summary = order
      .iter()
      .map(|state| format!("{} {}", states[&state.to_string()], state))
      .collect::<Vec<_>>()
      .join(", ");
    let details = format!("{progress}% completed, {summary}");

    let mut active_nodes = Vec::new();
    for node in &self.nodes {
      if !node.is_batch() {
        if node.state == NodeState::Active {
          active_nodes.push(ActiveNode {
            name: node.name.clone(),
            algorithm: node.algorithm.clone(),
            batch: None,
          });
        }
        continue;
      }
      let batch_states = node.states();
      let all_done = batch_states.iter().all(|state| state.is_done());
      let all_idle = batch_states.iter().all(|state| state.is_idle());
      if all_done || all_idle {
        continue;
      }
      let active = batch_states
        .iter()
        .filter(|state| state.is_done() || **state == NodeState::Active)
        .count();
      if active > 0 {
        active_nodes.push(ActiveNode {
          name: node.name.clone(),
          algorithm: node.algorithm.clone(),
          batch: Some(BatchProgress {
            active,
            total: batch_states.len(),
          }),
        });
      }
    }

    Progress {
      progress,
      details,
      states,
      active_nodes,
    }
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use crate::node::{BatchItem, NodeDef, StateUpdate};

  use super::*;

  fn defs() -> Vec<NodeDef> {
    ["A", "B", "C", "D"]
      .into_iter()
      .map(|name| NodeDef {
        node_name: name.to_string(),
        algorithm_name: format!("{name}-alg"),
        input: json!([]),
      })
      .collect()
  }

  #[test]
  fn test_fresh_graph() {
    let dag = Dag::new(&defs()).unwrap();
    let progress = dag.progress();
    assert_eq!(progress.progress, "0.00");
    assert_eq!(progress.details, "0.00% completed, 4 creating");
    assert_eq!(progress.states["creating"], 4);
    assert!(progress.active_nodes.is_empty());
  }

  #[test]
  fn test_partial_completion() {
    let mut dag = Dag::new(&defs()).unwrap();
    dag
      .update_node_state(
        "A",
        None,
        StateUpdate {
          state: NodeState::Completed,
          result: None,
          error: None,
        },
      )
      .unwrap();
    dag
      .update_node_state(
        "B",
        None,
        StateUpdate {
          state: NodeState::Active,
          result: None,
          error: None,
        },
      )
      .unwrap();
    let progress = dag.progress();
    assert_eq!(progress.progress, "25.00");
    assert_eq!(
      progress.details,
      "25.00% completed, 1 completed, 1 active, 2 creating"
    );
    assert_eq!(progress.active_nodes.len(), 1);
    assert_eq!(progress.active_nodes[0].name, "B");
    assert_eq!(progress.active_nodes[0].batch, None);
  }

  #[test]
  fn test_batch_node_activity() {
    let mut dag = Dag::new(&defs()).unwrap();
    for i in 0..4 {
      dag.add_batch(BatchItem::new("A", "A-alg", format!("A#{i}"))).unwrap();
    }
    dag
      .update_node_state(
        "A",
        Some("A#0"),
        StateUpdate {
          state: NodeState::Active,
          result: None,
          error: None,
        },
      )
      .unwrap();
    dag
      .update_node_state(
        "A",
        Some("A#1"),
        StateUpdate {
          state: NodeState::Completed,
          result: None,
          error: None,
        },
      )
      .unwrap();
    let progress = dag.progress();
    assert_eq!(progress.active_nodes.len(), 1);
    assert_eq!(
      progress.active_nodes[0].batch,
      Some(BatchProgress { active: 2, total: 4 })
    );
  }

  #[test]
  fn test_idle_batch_node_not_active() {
    let mut dag = Dag::new(&defs()).unwrap();
    dag.add_batch(BatchItem::new("A", "A-alg", "A#0")).unwrap();
    assert!(dag.progress().active_nodes.is_empty());
  }
}
