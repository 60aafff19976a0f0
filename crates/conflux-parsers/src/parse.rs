//! Input resolution entry points.
//!
//! [`parse`] turns a node's raw input spec into the concrete runtime inputs
//! of its task instances: batch detection/fan-out first, then flow-input
//! substitution, then (when parent outputs are supplied) parent-output
//! substitution. [`parse_value`] is the generic recursive substitution both
//! passes share; the two contexts use different resolution rules, selected
//! by [`ResolveMode`].

use serde_json::Value;

use crate::batch::parse_batch_input;
use crate::error::ParseError;
use crate::object_path;
use crate::reference::{FLOW_INPUT, ParentOutput, Reference, Relation};

/// Selects the resolution rules for [`parse_value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
  /// Resolve `@flowInput[.path]` leaves by plain dot-path access into the
  /// flow-input object. Node references are left untouched.
  FlowInput,
  /// Resolve `@node[.path]` and `*@node[.path]` leaves against the
  /// parent-output entries; wait-any lookups also match the task index.
  ParentOutput,
}

/// Borrowed inputs for one resolution call.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseContext<'a> {
  /// The pipeline run's top-level payload.
  pub flow_input: Option<&'a Value>,
  /// The node's raw input spec.
  pub input: &'a [Value],
  /// Already-computed upstream results, when available.
  pub parent_output: Option<&'a [ParentOutput]>,
  /// Batch index of the consuming task, for wait-any matching.
  pub index: Option<usize>,
}

/// Result of [`parse`]: the resolved input variants for one node.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedInput {
  /// True when a batch marker drove fan-out.
  pub batch: bool,
  /// One fully resolved copy of the input spec per task instance. Exactly
  /// one entry when `batch` is false.
  pub input: Vec<Vec<Value>>,
}

/// Resolve a node's input spec into concrete task inputs.
pub fn parse(ctx: &ParseContext) -> ParsedInput {
  let parent_output = ctx.parent_output.unwrap_or(&[]);
  let expanded = parse_batch_input(ctx.flow_input, ctx.input, parent_output);
  let (batch, variants) = if expanded.is_empty() {
    (false, vec![ctx.input.to_vec()])
  } else {
    (true, expanded)
  };
  let input = variants
    .into_iter()
    .map(|variant| {
      let variant = resolve_sequence(ctx, variant, ResolveMode::FlowInput);
      if ctx.parent_output.is_some() {
        resolve_sequence(ctx, variant, ResolveMode::ParentOutput)
      } else {
        variant
      }
    })
    .collect();
  ParsedInput { batch, input }
}

fn resolve_sequence(ctx: &ParseContext, sequence: Vec<Value>, mode: ResolveMode) -> Vec<Value> {
  sequence
    .into_iter()
    .map(|value| parse_value(ctx, &value, mode))
    .collect()
}

/// Generic recursive substitution: every reference leaf the `mode` covers is
/// replaced with its resolved value, every other leaf is returned untouched.
pub fn parse_value(ctx: &ParseContext, input: &Value, mode: ResolveMode) -> Value {
  match input {
    Value::Array(items) => Value::Array(
      items
        .iter()
        .map(|item| parse_value(ctx, item, mode))
        .collect(),
    ),
    Value::Object(map) => Value::Object(
      map
        .iter()
        .map(|(key, item)| (key.clone(), parse_value(ctx, item, mode)))
        .collect(),
    ),
    leaf => resolve_leaf(ctx, leaf, mode),
  }
}

fn resolve_leaf(ctx: &ParseContext, leaf: &Value, mode: ResolveMode) -> Value {
  match (mode, Reference::classify(leaf)) {
    (ResolveMode::FlowInput, Reference::WaitNode { node, path }) if node == FLOW_INPUT => {
      // without a flow input the reference stays in place
      let Some(flow_input) = ctx.flow_input else {
        return leaf.clone();
      };
      match path.as_deref() {
        Some(path) => object_path::get(flow_input, path)
          .cloned()
          .unwrap_or(Value::Null),
        None => flow_input.clone(),
      }
    }
    (ResolveMode::ParentOutput, Reference::WaitNode { node, path }) if node != FLOW_INPUT => {
      resolve_parent(ctx, Relation::WaitNode, &node, path.as_deref())
    }
    (ResolveMode::ParentOutput, Reference::WaitAnyBatch { node, path }) => {
      resolve_parent(ctx, Relation::WaitAnyBatch, &node, path.as_deref())
    }
    _ => leaf.clone(),
  }
}

/// An unmatched lookup means "not ready yet", never an error: the driver
/// retries resolution once more parent results arrive.
fn resolve_parent(ctx: &ParseContext, relation: Relation, node: &str, path: Option<&str>) -> Value {
  let parents = ctx.parent_output.unwrap_or(&[]);
  let entry = parents.iter().find(|p| {
    p.relation == relation
      && p.node == node
      && (relation != Relation::WaitAnyBatch || p.index == ctx.index)
  });
  let Some(entry) = entry else {
    return Value::Null;
  };
  match path {
    Some(path) => object_path::get(&entry.result, path)
      .cloned()
      .unwrap_or(Value::Null),
    None => entry.result.clone(),
  }
}

/// Validate that every `@flowInput` reference in `input` resolves against
/// the given flow input. Used at graph build time, before any execution.
pub fn check_flow_input(flow_input: &Value, input: &Value) -> Result<(), ParseError> {
  match input {
    Value::Array(items) => items
      .iter()
      .try_for_each(|item| check_flow_input(flow_input, item)),
    Value::Object(map) => map
      .values()
      .try_for_each(|item| check_flow_input(flow_input, item)),
    leaf => {
      if let Reference::WaitNode { node, path } = Reference::classify(leaf) {
        if node == FLOW_INPUT {
          let found = match path.as_deref() {
            Some(path) => object_path::get(flow_input, path).is_some(),
            None => !flow_input.is_null(),
          };
          if !found {
            let full = match path {
              Some(path) => format!("{FLOW_INPUT}.{path}"),
              None => FLOW_INPUT.to_string(),
            };
            return Err(ParseError::MissingFlowInput(full));
          }
        }
      }
      Ok(())
    }
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use crate::extract::extract_nodes_from_input;

  use super::*;

  fn wait_node(node: &str, result: Value) -> ParentOutput {
    ParentOutput {
      relation: Relation::WaitNode,
      node: node.to_string(),
      result,
      index: None,
    }
  }

  fn wait_any(node: &str, index: usize, result: Value) -> ParentOutput {
    ParentOutput {
      relation: Relation::WaitAnyBatch,
      node: node.to_string(),
      result,
      index: Some(index),
    }
  }

  #[test]
  fn test_flow_input_resolution() {
    let flow_input = json!({ "value": 42 });
    let input = vec![json!({ "x": "@flowInput.value" })];
    let result = parse(&ParseContext {
      flow_input: Some(&flow_input),
      input: &input,
      ..Default::default()
    });
    assert!(!result.batch);
    assert_eq!(result.input, vec![vec![json!({ "x": 42 })]]);
  }

  #[test]
  fn test_flow_input_whole_object() {
    let flow_input = json!({ "a": 1 });
    let input = vec![json!("@flowInput")];
    let result = parse(&ParseContext {
      flow_input: Some(&flow_input),
      input: &input,
      ..Default::default()
    });
    assert_eq!(result.input, vec![vec![json!({ "a": 1 })]]);
  }

  #[test]
  fn test_flow_input_missing_path_resolves_to_null() {
    let flow_input = json!({ "a": 1 });
    let input = vec![json!("@flowInput.b")];
    let result = parse(&ParseContext {
      flow_input: Some(&flow_input),
      input: &input,
      ..Default::default()
    });
    assert_eq!(result.input, vec![vec![json!(null)]]);
  }

  #[test]
  fn test_batch_expansion() {
    let parents = vec![ParentOutput {
      relation: Relation::WaitBatch,
      node: "A".to_string(),
      result: json!([10, 20, 30]),
      index: None,
    }];
    let input = vec![json!("#A")];
    let result = parse(&ParseContext {
      input: &input,
      parent_output: Some(&parents),
      ..Default::default()
    });
    assert!(result.batch);
    assert_eq!(
      result.input,
      vec![vec![json!(10)], vec![json!(20)], vec![json!(30)]]
    );
  }

  #[test]
  fn test_parent_output_resolution_with_path() {
    let parents = vec![wait_node("green", json!({ "data": { "x": 7 } }))];
    let input = vec![json!("@green.data.x"), json!("keep")];
    let result = parse(&ParseContext {
      input: &input,
      parent_output: Some(&parents),
      ..Default::default()
    });
    assert_eq!(result.input, vec![vec![json!(7), json!("keep")]]);
  }

  #[test]
  fn test_unmatched_parent_resolves_to_null() {
    let parents = vec![wait_node("green", json!(1))];
    let input = vec![json!("@yellow")];
    let result = parse(&ParseContext {
      input: &input,
      parent_output: Some(&parents),
      ..Default::default()
    });
    assert_eq!(result.input, vec![vec![json!(null)]]);
  }

  #[test]
  fn test_wait_any_matches_index() {
    let parents = vec![
      wait_any("green", 0, json!("first")),
      wait_any("green", 1, json!("second")),
    ];
    let input = vec![json!("*@green")];
    let result = parse(&ParseContext {
      input: &input,
      parent_output: Some(&parents),
      index: Some(1),
      ..Default::default()
    });
    assert_eq!(result.input, vec![vec![json!("second")]]);
  }

  #[test]
  fn test_wait_any_unmatched_index_is_null() {
    let parents = vec![wait_any("green", 0, json!("first"))];
    let input = vec![json!("*@green")];
    let result = parse(&ParseContext {
      input: &input,
      parent_output: Some(&parents),
      index: Some(5),
      ..Default::default()
    });
    assert_eq!(result.input, vec![vec![json!(null)]]);
  }

  #[test]
  fn test_node_reference_untouched_without_parent_output() {
    let flow_input = json!({});
    let input = vec![json!("@green")];
    let result = parse(&ParseContext {
      flow_input: Some(&flow_input),
      input: &input,
      ..Default::default()
    });
    assert_eq!(result.input, vec![vec![json!("@green")]]);
  }

  #[test]
  fn test_no_residual_references_after_substitution() {
    let flow_input = json!({ "value": [1, 2] });
    let input = json!({ "x": "@flowInput.value", "y": ["plain", 3] });
    let resolved = parse_value(
      &ParseContext {
        flow_input: Some(&flow_input),
        ..Default::default()
      },
      &input,
      ResolveMode::FlowInput,
    );
    assert!(extract_nodes_from_input(&resolved).is_empty());
  }

  #[test]
  fn test_check_flow_input_ok() {
    let flow_input = json!({ "files": { "links": [] } });
    let input = json!(["@flowInput.files.links", "plain"]);
    assert!(check_flow_input(&flow_input, &input).is_ok());
  }

  #[test]
  fn test_check_flow_input_missing() {
    let flow_input = json!({ "files": {} });
    let input = json!(["@flowInput.files.links"]);
    let err = check_flow_input(&flow_input, &input).unwrap_err();
    assert_eq!(err.to_string(), "unable to find flowInput.files.links");
  }
}
