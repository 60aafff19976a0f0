//! Conflux Parsers
//!
//! Reference-expression parsing and input resolution for Conflux pipelines.
//!
//! A pipeline node's input spec is an array of arbitrary JSON values whose
//! string leaves may embed references to other nodes' outputs or to the
//! pipeline's flow input. Detection is purely syntactic, based on a leading
//! marker:
//!
//! | Marker | Form           | Meaning                                        |
//! |--------|----------------|------------------------------------------------|
//! | `@`    | `@name[.path]` | Wait for a node's completed result (or `@flowInput`) |
//! | `#`    | `#name[.path]` | Batch: the result must be an array, fan out per element |
//! | `*@`   | `*@name[.path]`| Wait-any: bind to one upstream batch element by index |
//! | `#[`   | `#[<json>]`    | Raw batch literal: inline JSON array           |
//!
//! Everything here is a pure function over borrowed data; no state is held
//! anywhere, so the resolver is safe to share across pipeline runs.

mod batch;
mod error;
mod extract;
mod object_path;
mod parse;
mod reference;

pub use batch::parse_batch_input;
pub use error::ParseError;
pub use extract::{batch_input_index, extract_nodes_from_input, wait_any_input_index};
pub use parse::{ParseContext, ParsedInput, ResolveMode, check_flow_input, parse, parse_value};
pub use reference::{FLOW_INPUT, NodeRef, ParentOutput, Reference, Relation};
