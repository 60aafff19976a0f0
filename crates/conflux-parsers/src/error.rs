//! Error types for input parsing.

use thiserror::Error;

/// Errors raised while validating reference expressions.
///
/// Resolution itself never errors: unmatched lookups resolve to `null` so
/// the driver can retry once more parent results arrive.
#[derive(Debug, Error)]
pub enum ParseError {
  /// A `@flowInput` reference points at a path the flow input does not have.
  #[error("unable to find {0}")]
  MissingFlowInput(String),
}
