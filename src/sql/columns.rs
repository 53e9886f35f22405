//! Column types of a table, as read from the catalog when a persistence opens.
//! Placeholders are cast to the column type and non-native columns are projected through JSON,
//! so every column value reaches the driver and comes back in a decodable form.

use super::builder::quote_identifier;
use serde_json::Value;

/// Column name and `format_type` rendering, in table order. Empty when the table is unknown, in
/// which case statements fall back to untyped placeholders and `*` projections.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableColumns {
    columns: Vec<(String, String)>,
}

impl TableColumns {
    pub fn new<I, K, V>(columns: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        TableColumns {
            columns: columns.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn type_of(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, t)| t.as_str())
    }

    /// `$n`, or `$n::<type>` when the column type is known.
    pub fn placeholder(&self, column: &str, n: usize) -> String {
        match self.type_of(column) {
            Some(t) => format!("${}::{}", n, t),
            None => format!("${}", n),
        }
    }

    /// Reshape a value for a cast placeholder. JSON columns receive the JSON text and array
    /// columns a Postgres array literal; everything else binds as is.
    pub fn bind_value(&self, column: &str, value: Value) -> Value {
        let Some(t) = self.type_of(column) else {
            return value;
        };
        if value.is_null() {
            return value;
        }
        if is_json_type(t) {
            return Value::String(value.to_string());
        }
        if t.ends_with("[]") {
            if let Value::Array(items) = &value {
                return Value::String(array_literal(items));
            }
        }
        value
    }

    /// Select list for whole rows: `*` when unknown, otherwise every column by name with
    /// non-native types read as `to_jsonb("c") AS "c"`.
    pub fn projection(&self) -> String {
        if self.columns.is_empty() {
            return "*".to_string();
        }
        self.columns
            .iter()
            .map(|(name, t)| {
                let q = quote_identifier(name);
                if is_native_type(t) {
                    q
                } else {
                    format!("to_jsonb({}) AS {}", q, q)
                }
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// `timestamp(3) with time zone` -> `timestamp with time zone`.
fn base_type(t: &str) -> String {
    let mut out = String::with_capacity(t.len());
    let mut depth = 0usize;
    for c in t.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out.trim().to_string()
}

fn is_json_type(t: &str) -> bool {
    matches!(t, "json" | "jsonb")
}

/// Types the row decoder reads directly.
fn is_native_type(t: &str) -> bool {
    matches!(
        base_type(t).as_str(),
        "smallint"
            | "integer"
            | "bigint"
            | "real"
            | "double precision"
            | "boolean"
            | "uuid"
            | "timestamp with time zone"
            | "timestamp without time zone"
            | "date"
            | "text"
            | "name"
            | "character varying"
            | "character"
            | "bpchar"
            | "json"
            | "jsonb"
    )
}

/// `{"a","b",NULL}`; nested arrays become nested braces.
fn array_literal(items: &[Value]) -> String {
    let elements = items
        .iter()
        .map(|item| match item {
            Value::Null => "NULL".to_string(),
            Value::Array(inner) => array_literal(inner),
            Value::String(s) => quote_element(s),
            other => quote_element(&other.to_string()),
        })
        .collect::<Vec<_>>()
        .join(",");
    format!("{{{}}}", elements)
}

fn quote_element(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}
