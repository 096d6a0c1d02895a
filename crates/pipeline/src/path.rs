//! Minimal JSONPath subset used by extractors and decomposition roots.
//!
//! Syntax: optional leading `$.`, then dot-separated keys; a segment may be
//! `name[index]` for array indexing. No wildcards, filters, or recursive
//! descent. Traversal returns `None` on any type mismatch.

use i3x_core::Value;

/// Evaluate a path expression against a value.
///
/// `$` (or the empty expression) selects the whole value.
pub fn evaluate<'a>(value: &'a Value, expr: &str) -> Option<&'a Value> {
    let expr = expr.trim();
    let rest = match expr.strip_prefix("$.") {
        Some(rest) => rest,
        None => match expr.strip_prefix('$') {
            Some(rest) => rest,
            None => expr,
        },
    };
    if rest.is_empty() {
        return Some(value);
    }
    let mut current = value;
    for segment in rest.split('.') {
        let (key, index) = parse_segment(segment)?;
        if !key.is_empty() {
            current = current.get(key)?;
        }
        if let Some(index) = index {
            current = match current {
                Value::List(items) => items.get(index)?,
                _ => return None,
            };
        }
    }
    Some(current)
}

/// Split `name[3]` into `("name", Some(3))`; a plain key has no index.
fn parse_segment(segment: &str) -> Option<(&str, Option<usize>)> {
    match segment.find('[') {
        None => Some((segment, None)),
        Some(open) => {
            let close = segment.find(']')?;
            if close < open || close != segment.len() - 1 {
                return None;
            }
            let index = segment[open + 1..close].parse().ok()?;
            Some((&segment[..open], Some(index)))
        }
    }
}
