//! The pipeline execution graph.

use std::collections::HashMap;

use conflux_parsers::{batch_input_index, extract_nodes_from_input, wait_any_input_index};
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::DagError;
use crate::node::{BatchItem, GraphNode, NodeDef, NodeResult, NodeUpdate, StateUpdate};
use crate::state::NodeState;

/// A validated pipeline DAG with per-node execution state.
///
/// Nodes live in a flat arena: names resolve to indices once through
/// `indices`, node records sit in `nodes`, and edges are index adjacency
/// lists. Edges point from a dependency to its dependent and are derived
/// purely from the reference expressions found in each dependent's input
/// spec.
#[derive(Debug, Clone)]
pub struct Dag {
  indices: HashMap<String, usize>,
  pub(crate) nodes: Vec<GraphNode>,
  /// dependency index -> dependent indices
  adjacency: Vec<Vec<usize>>,
  /// dependent index -> dependency indices
  reverse_adjacency: Vec<Vec<usize>>,
}

impl Dag {
  /// Build a graph from pipeline node definitions.
  ///
  /// Definitions are processed in declaration order and every reference must
  /// name a node that appears earlier in the list, so a forward or undeclared
  /// reference fails here rather than at runtime. Cycle detection is a
  /// separate, opt-in check ([`Dag::is_acyclic`] / [`Dag::find_cycles`]) and
  /// is not run by the constructor.
  pub fn new(defs: &[NodeDef]) -> Result<Self, DagError> {
    let duplicates = find_duplicates(defs);
    if !duplicates.is_empty() {
      return Err(DagError::DuplicateNodes(duplicates.join(",")));
    }

    let mut dag = Dag {
      indices: HashMap::with_capacity(defs.len()),
      nodes: Vec::with_capacity(defs.len()),
      adjacency: vec![Vec::new(); defs.len()],
      reverse_adjacency: vec![Vec::new(); defs.len()],
    };
    let mut links: Vec<(usize, usize)> = Vec::new();

    for def in defs {
      if def.node_name == conflux_parsers::FLOW_INPUT {
        return Err(DagError::ReservedName(def.node_name.clone()));
      }
      let Some(input) = def.input.as_array() else {
        return Err(DagError::InputNotArray(def.node_name.clone()));
      };
      if batch_input_index(input).is_some() && wait_any_input_index(input).is_some() {
        return Err(DagError::BatchWaitAnyConflict(def.node_name.clone()));
      }

      let target = dag.nodes.len();
      for element in input {
        for node_ref in extract_nodes_from_input(element) {
          if !node_ref.is_node() {
            continue;
          }
          let Some(&source) = dag.indices.get(&node_ref.node_name) else {
            return Err(DagError::MissingDependency {
              node: def.node_name.clone(),
              dependency: node_ref.node_name,
            });
          };
          if !links.contains(&(source, target)) {
            links.push((source, target));
          }
        }
      }
      dag.indices.insert(def.node_name.clone(), target);
      dag.nodes.push(GraphNode::new(def));
    }

    for (source, target) in &links {
      dag.adjacency[*source].push(*target);
      dag.reverse_adjacency[*target].push(*source);
    }

    debug!(
      nodes = dag.nodes.len(),
      edges = links.len(),
      "pipeline graph built"
    );
    Ok(dag)
  }

  fn index(&self, name: &str) -> Result<usize, DagError> {
    self
      .indices
      .get(name)
      .copied()
      .ok_or_else(|| DagError::NodeNotFound(name.to_string()))
  }

  /// Nodes with no incoming edges, in declaration order: the initial
  /// runnable set.
  pub fn find_entry_nodes(&self) -> Vec<String> {
    self
      .nodes
      .iter()
      .enumerate()
      .filter(|(i, _)| self.reverse_adjacency[*i].is_empty())
      .map(|(_, node)| node.name.clone())
      .collect()
  }

  pub fn get_node(&self, name: &str) -> Result<&GraphNode, DagError> {
    Ok(&self.nodes[self.index(name)?])
  }

  /// Every node record, in declaration order.
  pub fn get_all_nodes(&self) -> Vec<&GraphNode> {
    self.nodes.iter().collect()
  }

  /// Deep-merge `update` into the node record; `None` fields are untouched,
  /// so an empty update is a no-op.
  pub fn set_node(&mut self, name: &str, update: NodeUpdate) -> Result<(), DagError> {
    let index = self.index(name)?;
    let node = &mut self.nodes[index];
    if let Some(state) = update.state {
      node.state = state;
    }
    if let Some(result) = update.result {
      node.result = Some(result);
    }
    if let Some(error) = update.error {
      node.error = Some(error);
    }
    Ok(())
  }

  /// Append a fanned-out instance, converting the node into a batch node.
  pub fn add_batch(&mut self, item: BatchItem) -> Result<(), DagError> {
    let index = self.index(&item.name)?;
    trace!(node = %item.name, batch = %item.batch_id, "batch item added");
    self.nodes[index].batch.push(item);
    Ok(())
  }

  /// Update the node itself, or one specific batch item when `batch_id` is
  /// given. `result` and `error` are overwritten as supplied.
  pub fn update_node_state(
    &mut self,
    name: &str,
    batch_id: Option<&str>,
    update: StateUpdate,
  ) -> Result<(), DagError> {
    let index = self.index(name)?;
    let node = &mut self.nodes[index];
    match batch_id {
      Some(id) => {
        let item = node
          .batch
          .iter_mut()
          .find(|item| item.batch_id == id)
          .ok_or_else(|| DagError::BatchNotFound(id.to_string()))?;
        trace!(node = %name, batch = %id, state = %update.state, "state updated");
        item.state = update.state;
        item.result = update.result;
        item.error = update.error;
      }
      None => {
        trace!(node = %name, state = %update.state, "state updated");
        node.state = update.state;
        node.result = update.result;
        node.error = update.error;
      }
    }
    Ok(())
  }

  /// State of the node, or of one batch item when `batch_id` is given.
  pub fn get_node_state(&self, name: &str, batch_id: Option<&str>) -> Result<NodeState, DagError> {
    let node = self.get_node(name)?;
    match batch_id {
      Some(id) => node
        .batch
        .iter()
        .find(|item| item.batch_id == id)
        .map(|item| item.state)
        .ok_or_else(|| DagError::BatchNotFound(id.to_string())),
      None => Ok(node.state),
    }
  }

  /// All states of a node: one per batch item, else its own as a singleton.
  pub fn get_node_states(&self, name: &str) -> Result<Vec<NodeState>, DagError> {
    Ok(self.get_node(name)?.states())
  }

  /// All results of a node: one per batch item, else a singleton.
  pub fn node_results(&self, name: &str) -> Result<Vec<Value>, DagError> {
    Ok(self.get_node(name)?.results())
  }

  /// Results of every direct predecessor, keyed by parent name.
  pub fn parents_results(&self, name: &str) -> Result<HashMap<String, Vec<Value>>, DagError> {
    let index = self.index(name)?;
    let mut results = HashMap::new();
    for &parent in &self.reverse_adjacency[index] {
      let node = &self.nodes[parent];
      results.insert(node.name.clone(), node.results());
    }
    Ok(results)
  }

  /// True iff every state of every parent is `Completed`. A single failed or
  /// still-pending parent blocks release of the dependent.
  pub fn is_all_parents_finished(&self, name: &str) -> Result<bool, DagError> {
    let index = self.index(name)?;
    Ok(self.reverse_adjacency[index].iter().all(|&parent| {
      self.nodes[parent]
        .states()
        .iter()
        .all(|state| *state == NodeState::Completed)
    }))
  }

  /// True iff every node and every batch item is completed or failed.
  pub fn is_all_nodes_done(&self) -> bool {
    self
      .nodes
      .iter()
      .all(|node| node.states().iter().all(|state| state.is_done()))
  }

  /// Flattened `{name, batchId?, algorithm, result}` entries across the
  /// whole graph, for final pipeline output assembly.
  pub fn all_nodes_results(&self) -> Vec<NodeResult> {
    let mut results = Vec::new();
    for node in &self.nodes {
      if node.is_batch() {
        for item in &node.batch {
          results.push(NodeResult {
            name: item.name.clone(),
            batch_id: Some(item.batch_id.clone()),
            algorithm: item.algorithm.clone(),
            result: item.result.clone(),
          });
        }
      } else {
        results.push(NodeResult {
          name: node.name.clone(),
          batch_id: None,
          algorithm: node.algorithm.clone(),
          result: node.result.clone(),
        });
      }
    }
    results
  }

  /// Direct predecessors of a node.
  pub fn parents(&self, name: &str) -> Result<Vec<String>, DagError> {
    let index = self.index(name)?;
    Ok(
      self.reverse_adjacency[index]
        .iter()
        .map(|&parent| self.nodes[parent].name.clone())
        .collect(),
    )
  }

  /// Direct successors of a node.
  pub fn childs(&self, name: &str) -> Result<Vec<String>, DagError> {
    let index = self.index(name)?;
    Ok(
      self.adjacency[index]
        .iter()
        .map(|&child| self.nodes[child].name.clone())
        .collect(),
    )
  }

  /// Edges always point from dependency to dependent.
  pub fn is_directed(&self) -> bool {
    true
  }

  /// Three-color depth-first cycle check. Declaration-order validation in
  /// [`Dag::new`] already rules cycles out for graphs built from
  /// definitions; this stays exposed as an explicit introspection operation.
  pub fn is_acyclic(&self) -> bool {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
      White,
      Grey,
      Black,
    }

    fn visit(dag: &Dag, v: usize, marks: &mut [Mark]) -> bool {
      marks[v] = Mark::Grey;
      for &w in &dag.adjacency[v] {
        match marks[w] {
          Mark::Grey => return false,
          Mark::White => {
            if !visit(dag, w, marks) {
              return false;
            }
          }
          Mark::Black => {}
        }
      }
      marks[v] = Mark::Black;
      true
    }

    let mut marks = vec![Mark::White; self.nodes.len()];
    (0..self.nodes.len()).all(|v| marks[v] != Mark::White || visit(self, v, &mut marks))
  }

  /// Cycles as groups of node names: strongly connected components with more
  /// than one member, plus single nodes with a self-loop.
  pub fn find_cycles(&self) -> Vec<Vec<String>> {
    let mut state = SccState {
      next: 0,
      index: vec![None; self.nodes.len()],
      lowlink: vec![0; self.nodes.len()],
      on_stack: vec![false; self.nodes.len()],
      stack: Vec::new(),
      components: Vec::new(),
    };
    for v in 0..self.nodes.len() {
      if state.index[v].is_none() {
        self.strong_connect(v, &mut state);
      }
    }
    state
      .components
      .into_iter()
      .filter(|component| {
        component.len() > 1 || self.adjacency[component[0]].contains(&component[0])
      })
      .map(|component| {
        component
          .into_iter()
          .map(|v| self.nodes[v].name.clone())
          .collect()
      })
      .collect()
  }

  fn strong_connect(&self, v: usize, state: &mut SccState) {
    state.index[v] = Some(state.next);
    state.lowlink[v] = state.next;
    state.next += 1;
    state.stack.push(v);
    state.on_stack[v] = true;
    for &w in &self.adjacency[v] {
      match state.index[w] {
        None => {
          self.strong_connect(w, state);
          state.lowlink[v] = state.lowlink[v].min(state.lowlink[w]);
        }
        Some(w_index) if state.on_stack[w] => {
          state.lowlink[v] = state.lowlink[v].min(w_index);
        }
        _ => {}
      }
    }
    if state.index[v] == Some(state.lowlink[v]) {
      let mut component = Vec::new();
      while let Some(w) = state.stack.pop() {
        state.on_stack[w] = false;
        component.push(w);
        if w == v {
          break;
        }
      }
      state.components.push(component);
    }
  }
}

struct SccState {
  next: usize,
  index: Vec<Option<usize>>,
  lowlink: Vec<usize>,
  on_stack: Vec<bool>,
  stack: Vec<usize>,
  components: Vec<Vec<usize>>,
}

/// Every name that appears more than once, in first-seen order.
fn find_duplicates(defs: &[NodeDef]) -> Vec<String> {
  let mut counts: HashMap<&str, usize> = HashMap::new();
  for def in defs {
    *counts.entry(def.node_name.as_str()).or_default() += 1;
  }
  let mut duplicates = Vec::new();
  for def in defs {
    if counts[def.node_name.as_str()] > 1 && !duplicates.contains(&def.node_name) {
      duplicates.push(def.node_name.clone());
    }
  }
  duplicates
}
