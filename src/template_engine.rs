//! `{{ path.to.value }}` substitution over a JSON value tree.
//!
//! Lookups never fail: a path that cannot be followed leaves the placeholder
//! text in place, so a template with a typo still renders.

use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::Serialize;
use serde_json::Value;

use crate::document::{Cell, Row, Table};
use crate::errors::AppResult;

static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();

/// `{{ path.to.value }}`, capturing the dotted path.
fn placeholder() -> &'static Regex {
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{\{ *([A-Za-z0-9_]+(?:\.[A-Za-z0-9_]+)*) *\}\}").expect("placeholder pattern is valid")
    })
}

/// Result of following a path: a single value, or one result per element
/// when the path crossed a sequence.
enum Resolved<'a> {
    Value(&'a Value),
    Many(Vec<Resolved<'a>>),
}

/// Converts a typed record into the value tree placeholders are resolved against.
pub fn to_data<T: Serialize>(record: &T) -> AppResult<Value> {
    Ok(serde_json::to_value(record)?)
}

/// Replaces every placeholder in `text` with the value found at its path in `data`.
pub fn resolve(text: &str, data: &Value) -> String {
    placeholder()
        .replace_all(text, |caps: &Captures| {
            let path: Vec<&str> = caps[1].split('.').collect();
            match lookup(data, &path) {
                Some(resolved) => render_resolved(&resolved),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Resolves every cell of `table` against `data`.
pub fn fill_table<'t, T: Table>(table: &'t mut T, data: &Value) -> &'t mut T {
    fill_table_with(table, data, |_| {})
}

/// Resolves every cell of `table` against `data`, then hands the cell to `on_cell`.
pub fn fill_table_with<'t, T, F>(table: &'t mut T, data: &Value, mut on_cell: F) -> &'t mut T
where
    T: Table,
    F: FnMut(&mut T::Cell),
{
    for row in table.rows_mut() {
        for cell in row.cells_mut() {
            let text = resolve(&cell.text(), data);
            cell.set_text(&text);
            on_cell(cell);
        }
    }
    table
}

/// Path of the first placeholder in `text`, without the braces.
pub fn extract_key(text: &str) -> Option<String> {
    placeholder().captures(text).map(|caps| caps[1].to_string())
}

fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<Resolved<'a>> {
    match (value, path.split_first()) {
        (Value::Null, _) => None,
        (_, None) => Some(Resolved::Value(value)),
        // broadcast the rest of the path over every element
        (Value::Array(items), Some(_)) => items
            .iter()
            .map(|item| lookup(item, path))
            .collect::<Option<Vec<_>>>()
            .map(Resolved::Many),
        (Value::Object(map), Some((head, rest))) => map.get(*head).and_then(|v| lookup(v, rest)),
        _ => None,
    }
}

fn render_resolved(resolved: &Resolved<'_>) -> String {
    match resolved {
        Resolved::Value(value) => render_value(value),
        Resolved::Many(items) => items.iter().map(render_resolved).collect::<Vec<_>>().join("\n"),
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(render_value).collect::<Vec<_>>().join("\n"),
        other => other.to_string(),
    }
}
