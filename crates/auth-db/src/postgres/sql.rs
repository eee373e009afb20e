//! Filter and sort compilation to SQL over the `body` JSONB column

use serde_json::{Map, Value};
use sqlx::{Postgres, QueryBuilder};

use auth_core::{DomainError, DomainResult, Filter, SortOrder};

/// Split a dotted field path into a PostgreSQL text array
pub fn path_array(path: &str) -> Vec<String> {
    path.split('.').map(String::from).collect()
}

/// Wrap `value` in nested objects following `path`
fn nest(path: &str, value: Value) -> Value {
    path.rsplit('.').fold(value, |inner, key| {
        let mut map = Map::new();
        map.insert(key.to_string(), inner);
        Value::Object(map)
    })
}

fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn push_eq(builder: &mut QueryBuilder<'_, Postgres>, path: &str, value: &Value) {
    if value.is_null() {
        builder.push("(body #> ");
        builder.push_bind(path_array(path));
        builder.push(" IS NULL OR body #> ");
        builder.push_bind(path_array(path));
        builder.push(" = 'null'::jsonb)");
    } else {
        // Scalar equality, or membership when the stored field is an array
        builder.push("(body @> ");
        builder.push_bind(nest(path, value.clone()));
        builder.push(" OR body @> ");
        builder.push_bind(nest(path, Value::Array(vec![value.clone()])));
        builder.push(")");
    }
}

/// Append a boolean SQL expression for `filter`
pub fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &Filter, text_fields: &[String]) {
    match filter {
        Filter::All => {
            builder.push("TRUE");
        }
        Filter::Eq(path, value) => push_eq(builder, path, value),
        Filter::Ne(path, value) => {
            builder.push("NOT ");
            push_eq(builder, path, value);
        }
        Filter::In(path, values) => {
            push_joined(builder, values.iter(), " OR ", "FALSE", |b, v| push_eq(b, path, v));
        }
        Filter::And(parts) => {
            push_joined(builder, parts.iter(), " AND ", "TRUE", |b, f| {
                push_filter(b, f, text_fields);
            });
        }
        Filter::Or(parts) => {
            push_joined(builder, parts.iter(), " OR ", "FALSE", |b, f| {
                push_filter(b, f, text_fields);
            });
        }
        Filter::Text(needle) => {
            let pattern = escape_like(needle);
            push_joined(builder, text_fields.iter(), " OR ", "FALSE", |b, field| {
                b.push("COALESCE(body #>> ");
                b.push_bind(path_array(field));
                b.push(", '') ILIKE ");
                b.push_bind(pattern.clone());
            });
        }
    }
}

fn push_joined<'a, T, I, F>(
    builder: &mut QueryBuilder<'_, Postgres>,
    items: I,
    separator: &str,
    empty: &str,
    mut push_item: F,
) where
    T: 'a + ?Sized,
    I: ExactSizeIterator<Item = &'a T>,
    F: FnMut(&mut QueryBuilder<'_, Postgres>, &'a T),
{
    if items.len() == 0 {
        builder.push(empty);
        return;
    }
    builder.push("(");
    for (i, item) in items.enumerate() {
        if i > 0 {
            builder.push(separator);
        }
        push_item(builder, item);
    }
    builder.push(")");
}

/// Append an ORDER BY clause; ties fall back to insertion order
pub fn push_order_by(builder: &mut QueryBuilder<'_, Postgres>, sort: &[(String, SortOrder)]) {
    builder.push(" ORDER BY ");
    for (path, order) in sort {
        builder.push("body #> ");
        builder.push_bind(path_array(path));
        builder.push(match order {
            SortOrder::Asc => " ASC NULLS FIRST, ",
            SortOrder::Desc => " DESC NULLS LAST, ",
        });
    }
    builder.push("seq ASC");
}

/// Validate a name that is spliced into DDL
pub fn ddl_identifier(name: &str) -> DomainResult<&str> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    if valid {
        Ok(name)
    } else {
        Err(DomainError::InvalidArgument(format!(
            "'{name}' cannot be used as a collection, field or index name"
        )))
    }
}

/// Name of the expression index backing a unique index
pub fn unique_index_name(collection: &str, index: &str) -> String {
    format!("odm_{collection}__{index}").replace('.', "_")
}
