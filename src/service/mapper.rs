//! Row <-> public item conversion. Rows travel as JSON maps keyed by column name; the item shape
//! is fixed by the persistence's type parameter and reached through serde.

use crate::error::{PersistenceError, PersistenceResult};
use crate::schema::SchemaBuilder;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::postgres::{PgColumn, PgRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};

/// How items are laid out in the table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TableLayout {
    /// One column per item field.
    #[default]
    Columns,
    /// Two columns: `id` and a `data` document holding the whole item.
    JsonDocument,
}

/// Per-entity capabilities a persistence is built with. Only the schema is required; the
/// conversions follow [`layout`](Self::layout) unless overridden.
pub trait PersistenceOverrides<T>: Send + Sync
where
    T: Serialize + DeserializeOwned,
{
    /// Declare DDL for the table. Runs on every open; applied only when the table is missing.
    fn define_schema(&self, schema: &mut SchemaBuilder);

    fn layout(&self) -> TableLayout {
        TableLayout::Columns
    }

    fn convert_to_public(&self, row: Map<String, Value>) -> PersistenceResult<T> {
        to_public(self.layout(), row)
    }

    fn convert_from_public(&self, item: &T) -> PersistenceResult<Map<String, Value>> {
        from_public(self.layout(), item)
    }

    /// Fields to set in a partial update. Document tables merge them into `data` server-side,
    /// so no layout needs to rewrite them.
    fn convert_from_public_partial(&self, data: Map<String, Value>) -> PersistenceResult<Map<String, Value>> {
        Ok(data)
    }
}

/// Column name -> value for every column of the row. A non-null value of a type the decoder
/// does not know is a `Conversion` error naming the column.
pub fn row_to_map(row: &PgRow) -> PersistenceResult<Map<String, Value>> {
    row.columns()
        .iter()
        .map(|col| cell_to_value(row, col).map(|value| (col.name().to_string(), value)))
        .collect()
}

fn decode<'r, V>(row: &'r PgRow, name: &str) -> Option<V>
where
    V: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get::<Option<V>, _>(name).ok().flatten()
}

fn cell_to_value(row: &PgRow, col: &PgColumn) -> PersistenceResult<Value> {
    let name = col.name();
    if row.try_get_raw(col.ordinal())?.is_null() {
        return Ok(Value::Null);
    }
    if let Some(n) = decode::<i16>(row, name) {
        return Ok(Value::from(n));
    }
    if let Some(n) = decode::<i32>(row, name) {
        return Ok(Value::from(n));
    }
    if let Some(n) = decode::<i64>(row, name) {
        return Ok(Value::from(n));
    }
    if let Some(n) = decode::<f32>(row, name).and_then(|n| serde_json::Number::from_f64(n as f64)) {
        return Ok(Value::Number(n));
    }
    if let Some(n) = decode::<f64>(row, name).and_then(serde_json::Number::from_f64) {
        return Ok(Value::Number(n));
    }
    if let Some(b) = decode::<bool>(row, name) {
        return Ok(Value::Bool(b));
    }
    if let Some(u) = decode::<uuid::Uuid>(row, name) {
        return Ok(Value::String(u.to_string()));
    }
    if let Some(d) = decode::<chrono::DateTime<chrono::Utc>>(row, name) {
        return Ok(Value::String(d.to_rfc3339()));
    }
    if let Some(d) = decode::<chrono::NaiveDateTime>(row, name) {
        return Ok(Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string()));
    }
    if let Some(d) = decode::<chrono::NaiveDate>(row, name) {
        return Ok(Value::String(d.format("%Y-%m-%d").to_string()));
    }
    if let Some(s) = decode::<String>(row, name) {
        return Ok(Value::String(s));
    }
    if let Some(v) = decode::<Value>(row, name) {
        return Ok(v);
    }
    Err(undecodable(name, col.type_info().name()))
}

fn undecodable(column: &str, type_name: &str) -> PersistenceError {
    let e: serde_json::Error = serde::de::Error::custom(format!(
        "column \"{}\" of type {} cannot be read; select it as text or json",
        column, type_name
    ));
    e.into()
}

/// Document tables prefer the `data` column and fall back to the whole row.
pub fn to_public<T: DeserializeOwned>(layout: TableLayout, mut row: Map<String, Value>) -> PersistenceResult<T> {
    let value = match layout {
        TableLayout::Columns => Value::Object(row),
        TableLayout::JsonDocument => match row.remove("data") {
            Some(Value::String(text)) => serde_json::from_str(&text)?,
            Some(data) if !data.is_null() => data,
            _ => Value::Object(row),
        },
    };
    Ok(serde_json::from_value(value)?)
}

/// The item's fields as a row, or `{id, data}` for document tables.
pub fn from_public<T: Serialize>(layout: TableLayout, item: &T) -> PersistenceResult<Map<String, Value>> {
    let fields = match serde_json::to_value(item)? {
        Value::Object(map) => map,
        other => {
            let e: serde_json::Error = serde::ser::Error::custom(format!("item must serialize to an object, got {}", other));
            return Err(e.into());
        }
    };
    Ok(match layout {
        TableLayout::Columns => fields,
        TableLayout::JsonDocument => {
            let id = fields.get("id").cloned().unwrap_or(Value::Null);
            let mut row = Map::new();
            row.insert("id".to_string(), id);
            row.insert("data".to_string(), Value::Object(fields));
            row
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Dummy {
        id: String,
        key: String,
        content: Option<String>,
    }

    fn map(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    fn dummy() -> Dummy {
        Dummy {
            id: "1".into(),
            key: "k1".into(),
            content: Some("c".into()),
        }
    }

    #[test]
    fn column_rows_map_field_for_field() {
        let row = map(json!({"id": "1", "key": "k1", "content": "c"}));
        let item: Dummy = to_public(TableLayout::Columns, row.clone()).unwrap();
        assert_eq!(item, dummy());
        assert_eq!(from_public(TableLayout::Columns, &item).unwrap(), row);
    }

    #[test]
    fn document_rows_prefer_data_column() {
        let row = map(json!({"id": "1", "data": {"id": "1", "key": "k1", "content": "c"}}));
        let item: Dummy = to_public(TableLayout::JsonDocument, row).unwrap();
        assert_eq!(item, dummy());
    }

    #[test]
    fn document_rows_without_data_use_whole_row() {
        let row = map(json!({"id": "1", "key": "k1", "content": null}));
        let item: Dummy = to_public(TableLayout::JsonDocument, row).unwrap();
        assert_eq!(item.content, None);
        assert_eq!(item.key, "k1");
    }

    #[test]
    fn document_text_column_is_parsed() {
        let row = map(json!({"id": "1", "data": "{\"id\":\"1\",\"key\":\"k1\",\"content\":\"c\"}"}));
        let item: Dummy = to_public(TableLayout::JsonDocument, row).unwrap();
        assert_eq!(item, dummy());
    }

    #[test]
    fn document_row_wraps_item_with_its_id() {
        let row = from_public(TableLayout::JsonDocument, &dummy()).unwrap();
        assert_eq!(row.get("id"), Some(&json!("1")));
        assert_eq!(row.get("data"), Some(&json!({"id": "1", "key": "k1", "content": "c"})));
        assert_eq!(row.len(), 2);
    }

    #[test]
    fn non_object_items_are_rejected() {
        assert!(from_public(TableLayout::Columns, &42).is_err());
    }

    #[test]
    fn undecodable_column_names_column_and_type() {
        let err = undecodable("price", "NUMERIC");
        assert!(matches!(err, crate::error::PersistenceError::Conversion(_)));
        let message = err.to_string();
        assert!(message.contains("\"price\""), "{}", message);
        assert!(message.contains("NUMERIC"), "{}", message);
    }

    #[test]
    fn mismatched_row_is_conversion_error() {
        let row = map(json!({"id": 1}));
        let err = to_public::<Dummy>(TableLayout::Columns, row).unwrap_err();
        assert!(matches!(err, crate::error::PersistenceError::Conversion(_)));
    }
}
