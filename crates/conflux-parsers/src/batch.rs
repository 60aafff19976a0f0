//! Batch detection and fan-out.
//!
//! A node's input spec supports a single batch dimension: one depth-first
//! scan locates the FIRST batch marker (array elements before object keys,
//! in declaration order) and the whole input is cloned once per element of
//! the referenced array, with that one position replaced. Any further batch
//! markers are left in place verbatim; multi-dimensional Cartesian expansion
//! is deliberately unsupported.

use serde_json::Value;

use crate::object_path;
use crate::reference::{FLOW_INPUT, ParentOutput, Reference};

/// One position inside the input tree.
#[derive(Debug, Clone)]
enum Segment {
  Index(usize),
  Key(String),
}

/// Expand `input` on its first batch marker.
///
/// Returns one clone of `input` per element of the resolved array, with the
/// marker position replaced by that element. The result is empty when no
/// batch marker exists anywhere, and also when the marker's reference does
/// not resolve to an array (callers treat both as "no batch"). A malformed
/// raw batch literal (`#[...]` with invalid JSON) falls back to the literal
/// string in a single variant instead of failing.
pub fn parse_batch_input(
  flow_input: Option<&Value>,
  input: &[Value],
  parent_output: &[ParentOutput],
) -> Vec<Vec<Value>> {
  let root = Value::Array(input.to_vec());
  let Some((path, reference)) = find_batch_marker(&root, Vec::new()) else {
    return Vec::new();
  };
  let items = match &reference {
    Reference::RawBatch { .. } => match reference.raw_items() {
      Some(items) => items,
      // permissive parse: the malformed literal stays in place
      None => return vec![input.to_vec()],
    },
    Reference::WaitBatch { node, path: ref_path } => {
      match resolve_batch_source(node, ref_path.as_deref(), flow_input, parent_output) {
        Some(items) => items,
        None => return Vec::new(),
      }
    }
    _ => return Vec::new(),
  };
  items
    .into_iter()
    .map(|item| replace_at(&root, &path, item))
    .collect()
}

/// Depth-first scan for the first batch marker. Positions are visited in
/// container order: array elements by index, object keys in declaration
/// order (`serde_json` is built with `preserve_order`).
fn find_batch_marker(value: &Value, path: Vec<Segment>) -> Option<(Vec<Segment>, Reference)> {
  match value {
    Value::Array(items) => {
      for (i, item) in items.iter().enumerate() {
        let mut child = path.clone();
        child.push(Segment::Index(i));
        if let Some(found) = find_batch_marker(item, child) {
          return Some(found);
        }
      }
      None
    }
    Value::Object(map) => {
      for (key, item) in map {
        let mut child = path.clone();
        child.push(Segment::Key(key.clone()));
        if let Some(found) = find_batch_marker(item, child) {
          return Some(found);
        }
      }
      None
    }
    leaf => match Reference::classify(leaf) {
      reference @ (Reference::WaitBatch { .. } | Reference::RawBatch { .. }) => {
        Some((path, reference))
      }
      _ => None,
    },
  }
}

/// Resolve the array a `#name[.path]` reference points at: the flow input
/// for `#flowInput...`, otherwise the matching parent-output entry.
fn resolve_batch_source(
  node: &str,
  ref_path: Option<&str>,
  flow_input: Option<&Value>,
  parent_output: &[ParentOutput],
) -> Option<Vec<Value>> {
  let source = if node == FLOW_INPUT {
    flow_input?
  } else {
    &parent_output.iter().find(|p| p.node == node)?.result
  };
  let resolved = match ref_path {
    Some(path) => object_path::get(source, path)?,
    None => source,
  };
  resolved.as_array().cloned()
}

fn replace_at(root: &Value, path: &[Segment], item: Value) -> Vec<Value> {
  let mut clone = root.clone();
  let mut slot = &mut clone;
  for segment in path {
    slot = match segment {
      Segment::Index(i) => &mut slot[*i],
      Segment::Key(key) => &mut slot[key.as_str()],
    };
  }
  *slot = item;
  match clone {
    Value::Array(items) => items,
    _ => Vec::new(),
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use crate::reference::Relation;

  use super::*;

  fn parent(node: &str, result: Value) -> ParentOutput {
    ParentOutput {
      relation: Relation::WaitBatch,
      node: node.to_string(),
      result,
      index: None,
    }
  }

  #[test]
  fn test_fan_out_over_flow_input() {
    let flow_input = json!({ "files": { "links": ["a", "b", "c"] } });
    let input = vec![json!("#flowInput.files.links")];
    let variants = parse_batch_input(Some(&flow_input), &input, &[]);
    assert_eq!(
      variants,
      vec![vec![json!("a")], vec![json!("b")], vec![json!("c")]]
    );
  }

  #[test]
  fn test_fan_out_over_parent_output() {
    let input = vec![json!("#green"), json!("other")];
    let variants = parse_batch_input(None, &input, &[parent("green", json!([10, 20, 30]))]);
    assert_eq!(variants.len(), 3);
    assert_eq!(variants[0], vec![json!(10), json!("other")]);
    assert_eq!(variants[2], vec![json!(30), json!("other")]);
  }

  #[test]
  fn test_fan_out_nested_position() {
    let input = vec![json!({ "data": "#green", "keep": "@yellow" })];
    let variants = parse_batch_input(None, &input, &[parent("green", json!([1, 2]))]);
    assert_eq!(
      variants,
      vec![
        vec![json!({ "data": 1, "keep": "@yellow" })],
        vec![json!({ "data": 2, "keep": "@yellow" })],
      ]
    );
  }

  #[test]
  fn test_raw_batch_literal() {
    let input = vec![json!("#[\"x\",\"y\"]")];
    let variants = parse_batch_input(None, &input, &[]);
    assert_eq!(variants, vec![vec![json!("x")], vec![json!("y")]]);
  }

  #[test]
  fn test_raw_batch_malformed_falls_back_to_literal() {
    let input = vec![json!("#[oops"), json!(1)];
    let variants = parse_batch_input(None, &input, &[]);
    assert_eq!(variants, vec![vec![json!("#[oops"), json!(1)]]);
  }

  #[test]
  fn test_no_marker_yields_empty() {
    let input = vec![json!("@green"), json!({ "x": 1 })];
    assert!(parse_batch_input(None, &input, &[]).is_empty());
  }

  #[test]
  fn test_unresolvable_batch_reference_yields_empty() {
    let input = vec![json!("#green")];
    assert!(parse_batch_input(None, &input, &[]).is_empty());

    // resolves, but not to an array
    let variants = parse_batch_input(None, &input, &[parent("green", json!(42))]);
    assert!(variants.is_empty());
  }

  #[test]
  fn test_first_marker_wins() {
    // two markers: only the first (depth-first) position fans out
    let input = vec![json!("#green"), json!("#yellow")];
    let parents = vec![
      parent("green", json!([1, 2])),
      parent("yellow", json!([8, 9])),
    ];
    let variants = parse_batch_input(None, &input, &parents);
    assert_eq!(
      variants,
      vec![
        vec![json!(1), json!("#yellow")],
        vec![json!(2), json!("#yellow")],
      ]
    );
  }

  #[test]
  fn test_array_position_before_object_key() {
    let input = vec![json!(["#green"]), json!({ "x": "#yellow" })];
    let parents = vec![parent("green", json!([1])), parent("yellow", json!([2]))];
    let variants = parse_batch_input(None, &input, &parents);
    assert_eq!(
      variants,
      vec![vec![json!([1]), json!({ "x": "#yellow" })]]
    );
  }

  #[test]
  fn test_path_projection_on_parent_result() {
    let input = vec![json!("#green.items")];
    let variants = parse_batch_input(
      None,
      &input,
      &[parent("green", json!({ "items": [true, false] }))],
    );
    assert_eq!(variants, vec![vec![json!(true)], vec![json!(false)]]);
  }
}
