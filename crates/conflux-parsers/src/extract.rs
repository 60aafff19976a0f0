//! Reference discovery inside input specs.

use serde_json::Value;

use crate::reference::{NodeRef, Reference};

/// Recursively walk an input value and return every reference found,
/// classified by marker.
///
/// References are deduplicated by `(node, relation)` in first-seen order.
/// `flowInput` references are included; callers that derive dependency edges
/// filter them with [`NodeRef::is_node`].
pub fn extract_nodes_from_input(input: &Value) -> Vec<NodeRef> {
  let mut refs = Vec::new();
  collect_refs(input, &mut refs);
  refs
}

fn collect_refs(input: &Value, refs: &mut Vec<NodeRef>) {
  match input {
    Value::Array(items) => {
      for item in items {
        collect_refs(item, refs);
      }
    }
    Value::Object(map) => {
      for item in map.values() {
        collect_refs(item, refs);
      }
    }
    leaf => {
      let reference = Reference::classify(leaf);
      if let (Some(node), Some(relation)) = (reference.node_name(), reference.relation()) {
        let node_ref = NodeRef {
          node_name: node.to_string(),
          relation,
        };
        if !refs.contains(&node_ref) {
          refs.push(node_ref);
        }
      }
    }
  }
}

/// Index of the first top-level input element that contains a batch marker
/// (`#name` or `#[...]`) anywhere inside it.
pub fn batch_input_index(input: &[Value]) -> Option<usize> {
  input.iter().position(|element| {
    contains(element, &|r| {
      matches!(r, Reference::WaitBatch { .. } | Reference::RawBatch { .. })
    })
  })
}

/// Index of the first top-level input element that contains a wait-any
/// marker (`*@name`) anywhere inside it.
pub fn wait_any_input_index(input: &[Value]) -> Option<usize> {
  input
    .iter()
    .position(|element| contains(element, &|r| matches!(r, Reference::WaitAnyBatch { .. })))
}

fn contains(input: &Value, pred: &dyn Fn(&Reference) -> bool) -> bool {
  match input {
    Value::Array(items) => items.iter().any(|item| contains(item, pred)),
    Value::Object(map) => map.values().any(|item| contains(item, pred)),
    leaf => pred(&Reference::classify(leaf)),
  }
}
