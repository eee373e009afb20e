//! Filter evaluation and ordering over JSON documents

use serde_json::Value;
use std::cmp::Ordering;

use auth_core::{Document, Filter, SortOrder};

/// Look up a possibly dotted field path
pub fn field<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// Equality with array-contains semantics; a missing field equals `null`
fn value_matches(stored: Option<&Value>, expected: &Value) -> bool {
    match stored {
        None => expected.is_null(),
        Some(Value::Array(items)) if !expected.is_array() => items.contains(expected),
        Some(value) => value == expected,
    }
}

/// Evaluate a filter against a document
pub fn matches(doc: &Document, filter: &Filter, text_fields: &[String]) -> bool {
    match filter {
        Filter::All => true,
        Filter::Eq(path, expected) => value_matches(field(doc, path), expected),
        Filter::Ne(path, expected) => !value_matches(field(doc, path), expected),
        Filter::In(path, candidates) => {
            let stored = field(doc, path);
            candidates.iter().any(|c| value_matches(stored, c))
        }
        Filter::And(parts) => parts.iter().all(|f| matches(doc, f, text_fields)),
        Filter::Or(parts) => parts.iter().any(|f| matches(doc, f, text_fields)),
        Filter::Text(needle) => {
            let needle = needle.to_lowercase();
            text_fields.iter().any(|path| {
                field(doc, path)
                    .and_then(Value::as_str)
                    .is_some_and(|s| s.to_lowercase().contains(&needle))
            })
        }
    }
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Object(_)) => 5,
    }
}

/// Total order over JSON values: null < bool < number < string < array < object
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(x @ (Value::Array(_) | Value::Object(_))), Some(y)) if type_rank(a) == type_rank(b) => {
            x.to_string().cmp(&y.to_string())
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Compare two documents by a sort specification
pub fn compare_documents(a: &Document, b: &Document, sort: &[(String, SortOrder)]) -> Ordering {
    for (path, order) in sort {
        let ordering = compare_values(field(a, path), field(b, path));
        let ordering = match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}
