//! Node execution states.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Execution state of a node or batch item.
///
/// Only `Completed` and `Failed` are terminal; every other state counts as
/// "not yet finished" for completion aggregation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
  #[default]
  Creating,
  Pending,
  Active,
  Completed,
  Failed,
  Stopped,
  Skipped,
}

impl NodeState {
  /// True for the two terminal states.
  pub fn is_done(&self) -> bool {
    matches!(self, NodeState::Completed | NodeState::Failed)
  }

  /// True for states that have not started running yet.
  pub fn is_idle(&self) -> bool {
    matches!(self, NodeState::Creating | NodeState::Pending)
  }
}

impl fmt::Display for NodeState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let text = match self {
      NodeState::Creating => "creating",
      NodeState::Pending => "pending",
      NodeState::Active => "active",
      NodeState::Completed => "completed",
      NodeState::Failed => "failed",
      NodeState::Stopped => "stopped",
      NodeState::Skipped => "skipped",
    };
    f.write_str(text)
  }
}
