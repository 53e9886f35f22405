//! Advisory schema bootstrap: DDL collected before open and applied once, only when the table
//! does not exist yet. This is not a migration tool; an existing table is left as it is.

use crate::error::{PersistenceError, PersistenceResult};
use crate::sql::{quote_identifier, TableColumns};
use sqlx::PgPool;
use tracing::{debug, error};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexOrder {
    Asc,
    Desc,
}

/// Ordered DDL statements for one table.
#[derive(Clone, Debug, Default)]
pub struct SchemaBuilder {
    table: String,
    statements: Vec<String>,
}

impl SchemaBuilder {
    /// `table` is the quoted (optionally schema-qualified) table name.
    pub fn new(table: impl Into<String>) -> Self {
        SchemaBuilder {
            table: table.into(),
            statements: Vec::new(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Append a raw DDL statement. Caller-supplied DDL is not quoted or checked.
    pub fn ensure_schema(&mut self, statement: impl Into<String>) {
        self.statements.push(statement.into());
    }

    pub fn clear_schema(&mut self) {
        self.statements.clear();
    }

    /// `CREATE [UNIQUE] INDEX IF NOT EXISTS "name" ON <table> [USING type] ("k1", "k2" DESC)`.
    pub fn ensure_index(&mut self, name: &str, keys: &[(&str, IndexOrder)], unique: bool, index_type: Option<&str>) {
        let mut sql = String::from("CREATE");
        if unique {
            sql.push_str(" UNIQUE");
        }
        sql.push_str(&format!(" INDEX IF NOT EXISTS {} ON {}", quote_identifier(name), self.table));
        if let Some(t) = index_type.filter(|t| !t.is_empty()) {
            sql.push_str(&format!(" USING {}", t));
        }
        let fields = keys
            .iter()
            .map(|(key, order)| match order {
                IndexOrder::Asc => quote_identifier(key),
                IndexOrder::Desc => format!("{} DESC", quote_identifier(key)),
            })
            .collect::<Vec<_>>()
            .join(", ");
        sql.push_str(&format!(" ({})", fields));
        self.ensure_schema(sql);
    }

    /// Two-column document table: `"id"` primary key and `"data"` document.
    /// Types default to TEXT and JSONB.
    pub fn ensure_table(&mut self, id_type: Option<&str>, data_type: Option<&str>) {
        let id_type = id_type.filter(|t| !t.is_empty()).unwrap_or("TEXT");
        let data_type = data_type.filter(|t| !t.is_empty()).unwrap_or("JSONB");
        self.ensure_schema(format!(
            "CREATE TABLE IF NOT EXISTS {} (\"id\" {} PRIMARY KEY, \"data\" {})",
            self.table, id_type, data_type
        ));
    }

    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Apply the statements when the table does not resolve yet. A failing existence check is
    /// `CONNECT_FAILED`; a failing statement is logged and the rest still run.
    pub async fn create_schema(&self, pool: &PgPool, trace_id: Option<&str>) -> PersistenceResult<()> {
        if self.statements.is_empty() {
            return Ok(());
        }
        let exists: bool = sqlx::query_scalar("SELECT to_regclass($1) IS NOT NULL")
            .bind(&self.table)
            .fetch_one(pool)
            .await
            .map_err(|e| PersistenceError::connect_failed("Connection to postgres failed", Some(Box::new(e))))?;
        if exists {
            return Ok(());
        }

        debug!(trace_id = ?trace_id, table = %self.table, "Table does not exist. Creating database objects...");
        for statement in &self.statements {
            if let Err(e) = sqlx::query(statement).execute(pool).await {
                error!(trace_id = ?trace_id, table = %self.table, sql = %statement, error = %e, "Failed to autocreate database object");
            }
        }
        Ok(())
    }

    /// Column names and types of the table in column order; empty when the table is missing.
    pub async fn read_columns(&self, pool: &PgPool) -> PersistenceResult<TableColumns> {
        let columns: Vec<(String, String)> = sqlx::query_as(
            "SELECT a.attname::text, format_type(a.atttypid, a.atttypmod) FROM pg_attribute a \
             WHERE a.attrelid = to_regclass($1) AND a.attnum > 0 AND NOT a.attisdropped ORDER BY a.attnum",
        )
        .bind(&self.table)
        .fetch_all(pool)
        .await?;
        Ok(TableColumns::new(columns))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_statement_orders_keys() {
        let mut schema = SchemaBuilder::new("\"app\".\"dummies\"");
        schema.ensure_index("dummies_key", &[("key", IndexOrder::Asc), ("content", IndexOrder::Desc)], true, None);
        assert_eq!(
            schema.statements(),
            ["CREATE UNIQUE INDEX IF NOT EXISTS \"dummies_key\" ON \"app\".\"dummies\" (\"key\", \"content\" DESC)"]
        );
    }

    #[test]
    fn index_statement_with_method() {
        let mut schema = SchemaBuilder::new("\"dummies\"");
        schema.ensure_index("dummies_data", &[("data", IndexOrder::Asc)], false, Some("GIN"));
        assert_eq!(
            schema.statements()[0],
            "CREATE INDEX IF NOT EXISTS \"dummies_data\" ON \"dummies\" USING GIN (\"data\")"
        );
    }

    #[test]
    fn document_table_defaults() {
        let mut schema = SchemaBuilder::new("\"dummies\"");
        schema.ensure_table(None, None);
        schema.ensure_table(Some("VARCHAR(32)"), Some("JSON"));
        assert_eq!(
            schema.statements(),
            [
                "CREATE TABLE IF NOT EXISTS \"dummies\" (\"id\" TEXT PRIMARY KEY, \"data\" JSONB)",
                "CREATE TABLE IF NOT EXISTS \"dummies\" (\"id\" VARCHAR(32) PRIMARY KEY, \"data\" JSON)",
            ]
        );
    }

    #[test]
    fn statements_keep_order_until_cleared() {
        let mut schema = SchemaBuilder::new("\"t\"");
        schema.ensure_schema("CREATE SCHEMA IF NOT EXISTS \"s\"");
        schema.ensure_schema("CREATE TABLE \"t\" (id TEXT)");
        assert_eq!(schema.statements().len(), 2);
        assert!(schema.statements()[0].starts_with("CREATE SCHEMA"));
        schema.clear_schema();
        assert!(schema.is_empty());
    }
}
