//! SQL fragments and statements built from a key/value view of an item.
//! Identifiers are composed here; values always travel as positional parameters.

use super::columns::TableColumns;
use serde_json::{Map, Value};

/// Quote an identifier: `name` -> `"name"`. A value that starts with a single quote is a literal
/// and passes through unchanged, as does the empty string.
pub fn quote_identifier(value: &str) -> String {
    if value.is_empty() || value.starts_with('\'') {
        return value.to_string();
    }
    format!("\"{}\"", value)
}

/// `"schema"."table"` when a schema is set, `"table"` otherwise.
pub fn quoted_table_name(schema: Option<&str>, table: &str) -> String {
    match schema.filter(|s| !s.is_empty()) {
        Some(schema) => format!("{}.{}", quote_identifier(schema), quote_identifier(table)),
        None => quote_identifier(table),
    }
}

/// Anything that can be numbered into `$1,$2,...`: a key/value row, a plain list of values, or
/// a list of values for one column.
pub trait ParameterSource {
    /// The column each placeholder binds to, `None` for untyped list elements.
    fn parameter_columns(&self) -> Vec<Option<&str>>;
}

impl ParameterSource for Map<String, Value> {
    fn parameter_columns(&self) -> Vec<Option<&str>> {
        self.keys().map(|k| Some(k.as_str())).collect()
    }
}

impl ParameterSource for [Value] {
    fn parameter_columns(&self) -> Vec<Option<&str>> {
        vec![None; self.len()]
    }
}

impl ParameterSource for Vec<Value> {
    fn parameter_columns(&self) -> Vec<Option<&str>> {
        self.as_slice().parameter_columns()
    }
}

/// Values that all bind to `column`, such as an id list.
#[derive(Clone, Copy, Debug)]
pub struct ColumnValues<'a> {
    pub column: &'a str,
    pub values: &'a [Value],
}

impl ParameterSource for ColumnValues<'_> {
    fn parameter_columns(&self) -> Vec<Option<&str>> {
        vec![Some(self.column); self.values.len()]
    }
}

/// `"c1","c2",...` in map order.
pub fn generate_columns(row: &Map<String, Value>) -> String {
    row.keys().map(|k| quote_identifier(k)).collect::<Vec<_>>().join(",")
}

/// `$1,$2,...`, one placeholder per key or list element, each cast to its column type when known.
pub fn generate_parameters<S: ParameterSource + ?Sized>(values: &S, columns: &TableColumns) -> String {
    values
        .parameter_columns()
        .into_iter()
        .enumerate()
        .map(|(i, column)| match column {
            Some(column) => columns.placeholder(column, i + 1),
            None => format!("${}", i + 1),
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// `("c1"=$1,"c2"=$2, "c1","c2")`: the SET clause and the column list it was numbered from.
pub fn generate_set_parameters(row: &Map<String, Value>, columns: &TableColumns) -> (String, String) {
    let set = row
        .keys()
        .enumerate()
        .map(|(i, k)| format!("{}={}", quote_identifier(k), columns.placeholder(k, i + 1)))
        .collect::<Vec<_>>()
        .join(",");
    (set, generate_columns(row))
}

/// Values for a column list produced by [`generate_columns`] or [`generate_set_parameters`], in
/// the same order and shaped for their placeholders. A column missing from the row binds as null.
pub fn generate_values(column_list: &str, row: &Map<String, Value>, columns: &TableColumns) -> Vec<Value> {
    if column_list.is_empty() {
        return Vec::new();
    }
    column_list
        .replace('"', "")
        .split(',')
        .map(|c| columns.bind_value(c, row.get(c).cloned().unwrap_or(Value::Null)))
        .collect()
}

/// A statement together with the values for its placeholders, in placeholder order.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new(sql: String) -> Self {
        QueryBuf { sql, params: Vec::new() }
    }

    fn with_params(sql: String, params: Vec<Value>) -> Self {
        QueryBuf { sql, params }
    }
}

fn where_clause(filter: Option<&str>) -> String {
    filter
        .filter(|f| !f.is_empty())
        .map(|f| format!(" WHERE {}", f))
        .unwrap_or_default()
}

fn id_values(ids: Vec<Value>, columns: &TableColumns) -> Vec<Value> {
    ids.into_iter().map(|id| columns.bind_value("id", id)).collect()
}

/// INSERT ... RETURNING <projection>.
pub fn insert(table: &str, columns: &TableColumns, row: &Map<String, Value>) -> QueryBuf {
    let column_list = generate_columns(row);
    let params = generate_parameters(row, columns);
    let values = generate_values(&column_list, row, columns);
    QueryBuf::with_params(
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            table,
            column_list,
            params,
            columns.projection()
        ),
        values,
    )
}

/// INSERT ... ON CONFLICT ("id") DO UPDATE SET ... RETURNING <projection>. The VALUES and SET
/// placeholders share one numbering, so each value is bound once.
pub fn upsert(table: &str, columns: &TableColumns, row: &Map<String, Value>) -> QueryBuf {
    let params = generate_parameters(row, columns);
    let (set, column_list) = generate_set_parameters(row, columns);
    let values = generate_values(&column_list, row, columns);
    QueryBuf::with_params(
        format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT (\"id\") DO UPDATE SET {} RETURNING {}",
            table,
            column_list,
            params,
            set,
            columns.projection()
        ),
        values,
    )
}

/// UPDATE ... SET <row> WHERE "id"=$N RETURNING <projection>, where N follows the SET
/// placeholders. An empty row degrades to a lookup by id.
pub fn update_by_id(table: &str, columns: &TableColumns, id: Value, row: &Map<String, Value>) -> QueryBuf {
    if row.is_empty() {
        let mut q = select_by_id(table, columns);
        q.params.push(columns.bind_value("id", id));
        return q;
    }
    let (set, column_list) = generate_set_parameters(row, columns);
    let mut values = generate_values(&column_list, row, columns);
    values.push(columns.bind_value("id", id));
    QueryBuf::with_params(
        format!(
            "UPDATE {} SET {} WHERE \"id\"={} RETURNING {}",
            table,
            set,
            columns.placeholder("id", values.len()),
            columns.projection()
        ),
        values,
    )
}

/// Server-side JSONB merge of `data` into the document column: omitted fields keep their values.
pub fn merge_data_by_id(table: &str, columns: &TableColumns, id: Value, data: Value) -> QueryBuf {
    QueryBuf::with_params(
        format!(
            "UPDATE {} SET \"data\"=\"data\"||{} WHERE \"id\"={} RETURNING {}",
            table,
            columns.placeholder("data", 2),
            columns.placeholder("id", 1),
            columns.projection()
        ),
        vec![columns.bind_value("id", id), columns.bind_value("data", data)],
    )
}

/// SELECT <projection> ... WHERE "id"=$1; caller pushes the id (see [`TableColumns::bind_value`]).
pub fn select_by_id(table: &str, columns: &TableColumns) -> QueryBuf {
    QueryBuf::new(format!(
        "SELECT {} FROM {} WHERE \"id\"={}",
        columns.projection(),
        table,
        columns.placeholder("id", 1)
    ))
}

/// SELECT <projection> ... WHERE "id" IN($1,...). Empty id lists are handled by the caller.
pub fn select_by_ids(table: &str, columns: &TableColumns, ids: Vec<Value>) -> QueryBuf {
    let params = generate_parameters(&ColumnValues { column: "id", values: &ids }, columns);
    QueryBuf::with_params(
        format!("SELECT {} FROM {} WHERE \"id\" IN({})", columns.projection(), table, params),
        id_values(ids, columns),
    )
}

pub fn delete_by_id(table: &str, columns: &TableColumns, id: Value) -> QueryBuf {
    QueryBuf::with_params(
        format!(
            "DELETE FROM {} WHERE \"id\"={} RETURNING {}",
            table,
            columns.placeholder("id", 1),
            columns.projection()
        ),
        vec![columns.bind_value("id", id)],
    )
}

pub fn delete_by_ids(table: &str, columns: &TableColumns, ids: Vec<Value>) -> QueryBuf {
    let params = generate_parameters(&ColumnValues { column: "id", values: &ids }, columns);
    QueryBuf::with_params(
        format!("DELETE FROM {} WHERE \"id\" IN({})", table, params),
        id_values(ids, columns),
    )
}

/// DELETE with an optional pre-rendered filter; no filter deletes every row.
pub fn delete_by_filter(table: &str, filter: Option<&str>) -> QueryBuf {
    QueryBuf::new(format!("DELETE FROM {}{}", table, where_clause(filter)))
}

/// SELECT [select|<projection>] ... [WHERE] [ORDER BY] [OFFSET] [LIMIT]. Filter, sort and
/// select are pre-rendered fragments; a caller's select list is used verbatim.
pub fn select_list(
    table: &str,
    columns: &TableColumns,
    filter: Option<&str>,
    sort: Option<&str>,
    select: Option<&str>,
    skip: Option<i64>,
    take: Option<i64>,
) -> QueryBuf {
    let select = match select.filter(|s| !s.is_empty()) {
        Some(select) => select.to_string(),
        None => columns.projection(),
    };
    let order_clause = sort
        .filter(|s| !s.is_empty())
        .map(|s| format!(" ORDER BY {}", s))
        .unwrap_or_default();
    let offset_clause = skip
        .filter(|n| *n >= 0)
        .map(|n| format!(" OFFSET {}", n))
        .unwrap_or_default();
    let limit_clause = take.map(|n| format!(" LIMIT {}", n)).unwrap_or_default();
    QueryBuf::new(format!(
        "SELECT {} FROM {}{}{}{}{}",
        select,
        table,
        where_clause(filter),
        order_clause,
        offset_clause,
        limit_clause
    ))
}

pub fn select_count(table: &str, filter: Option<&str>) -> QueryBuf {
    QueryBuf::new(format!("SELECT COUNT(*) AS count FROM {}{}", table, where_clause(filter)))
}

/// One row at a fixed position among the filtered rows.
pub fn select_at_offset(table: &str, columns: &TableColumns, filter: Option<&str>, offset: i64) -> QueryBuf {
    select_list(table, columns, filter, None, None, Some(offset), Some(1))
}
