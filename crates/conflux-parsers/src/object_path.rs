//! Dot-path access into JSON values.

use serde_json::Value;

/// Look up a dot-separated `path` (e.g. `"files.links.0"`) inside `value`.
///
/// Object keys and numeric array indices are supported; any miss along the
/// way yields `None`.
pub(crate) fn get<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
  let mut current = value;
  for segment in path.split('.') {
    current = match current {
      Value::Object(map) => map.get(segment)?,
      Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
      _ => return None,
    };
  }
  Some(current)
}
