//! Generic CRUD execution against PostgreSQL for one table and one item type.

use crate::config::ConfigParams;
use crate::connection::PostgresConnection;
use crate::error::{PersistenceError, PersistenceResult};
use crate::page::{DataPage, PagingParams};
use crate::refer::References;
use crate::schema::SchemaBuilder;
use crate::service::mapper::{row_to_map, PersistenceOverrides};
use crate::sql::{self, quote_identifier, quoted_table_name, PgBindValue, QueryBuf, TableColumns};
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, trace};

const DEFAULT_MAX_PAGE_SIZE: i64 = 100;

fn default_config() -> ConfigParams {
    ConfigParams::from_tuples([("options.max_page_size", "100")])
}

/// CRUD engine bound to one item shape `T`. Entity-specific behaviour (schema, conversions)
/// comes from `O`.
pub struct PostgresPersistence<T, O> {
    overrides: O,
    config: ConfigParams,
    table_name: String,
    schema_name: Option<String>,
    max_page_size: i64,
    connection: Option<Arc<PostgresConnection>>,
    local_connection: bool,
    pool: Option<PgPool>,
    database_name: Option<String>,
    columns: TableColumns,
    _item: PhantomData<fn() -> T>,
}

impl<T, O> PostgresPersistence<T, O>
where
    T: Serialize + DeserializeOwned + Send + Sync,
    O: PersistenceOverrides<T>,
{
    pub fn new(table_name: impl Into<String>, overrides: O) -> Self {
        PostgresPersistence {
            overrides,
            config: default_config(),
            table_name: table_name.into(),
            schema_name: None,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            connection: None,
            local_connection: false,
            pool: None,
            database_name: None,
            columns: TableColumns::default(),
            _item: PhantomData,
        }
    }

    /// Reads `collection` / `table` (the latter wins), `schema` and `options.max_page_size`
    /// (a value below 1 keeps the default). The full config is kept for a locally created connection.
    pub fn configure(&mut self, config: &ConfigParams) {
        let config = config.set_defaults(&default_config());
        if let Some(name) = config.get_non_empty("collection") {
            self.table_name = name.to_string();
        }
        if let Some(name) = config.get_non_empty("table") {
            self.table_name = name.to_string();
        }
        if let Some(schema) = config.get_non_empty("schema") {
            self.schema_name = Some(schema.to_string());
        }
        self.max_page_size = config
            .get_as_nullable_integer("options.max_page_size")
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_PAGE_SIZE);
        self.config = config;
    }

    /// Use the connection registered in `references`, or create a local one from the configured
    /// parameters and wire it with the same references.
    pub fn set_references(&mut self, references: References) {
        match references.connection() {
            Some(connection) => {
                self.connection = Some(connection);
                self.local_connection = false;
            }
            None => {
                let mut connection = PostgresConnection::new();
                connection.configure(&self.config);
                connection.set_references(references);
                self.connection = Some(Arc::new(connection));
                self.local_connection = true;
            }
        }
    }

    pub fn unset_references(&mut self) {
        self.connection = None;
        self.local_connection = false;
    }

    pub fn is_open(&self) -> bool {
        self.pool.is_some()
    }

    /// Open a local connection (a shared one is opened by its owner), take its pool and apply
    /// the declared schema when the table is missing.
    pub async fn open(&mut self, trace_id: Option<&str>) -> PersistenceResult<()> {
        if self.is_open() {
            return Ok(());
        }
        if self.connection.is_none() {
            self.set_references(References::new());
        }
        let connection = self
            .connection
            .clone()
            .ok_or_else(|| PersistenceError::invalid_state("NO_CONNECTION", "PostgreSQL connection is missing"))?;
        if self.local_connection {
            connection.open(trace_id).await?;
        }
        if !connection.is_open() {
            return Err(PersistenceError::connect_failed("PostgreSQL connection is not opened", None));
        }
        let pool = connection
            .get_pool()
            .ok_or_else(|| PersistenceError::invalid_state("NO_CONNECTION", "PostgreSQL connection is missing"))?;

        let mut schema = SchemaBuilder::new(self.quoted_table_name());
        if let Some(name) = &self.schema_name {
            schema.ensure_schema(format!("CREATE SCHEMA IF NOT EXISTS {}", quote_identifier(name)));
        }
        self.overrides.define_schema(&mut schema);
        schema.create_schema(&pool, trace_id).await?;
        self.columns = schema.read_columns(&pool).await?;

        self.database_name = connection.get_database_name();
        self.pool = Some(pool);
        debug!(trace_id = ?trace_id, table = %self.table_name, database = ?self.database_name, columns = self.columns.len(), "Opened persistence");
        Ok(())
    }

    /// Release the pool; a local connection is closed as well.
    pub async fn close(&mut self, trace_id: Option<&str>) -> PersistenceResult<()> {
        if self.local_connection {
            if let Some(connection) = &self.connection {
                connection.close(trace_id).await?;
            }
        }
        if self.pool.take().is_some() {
            debug!(trace_id = ?trace_id, table = %self.table_name, "Closed persistence");
        }
        self.database_name = None;
        self.columns = TableColumns::default();
        Ok(())
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn schema_name(&self) -> Option<&str> {
        self.schema_name.as_deref()
    }

    pub fn max_page_size(&self) -> i64 {
        self.max_page_size
    }

    pub fn overrides(&self) -> &O {
        &self.overrides
    }

    /// Column types read at open; empty while closed or when the table is missing.
    pub fn columns(&self) -> &TableColumns {
        &self.columns
    }

    pub fn quoted_table_name(&self) -> String {
        quoted_table_name(self.schema_name.as_deref(), &self.table_name)
    }

    /// The open pool; `NO_CONNECTION` when closed.
    pub fn client(&self) -> PersistenceResult<&PgPool> {
        self.pool
            .as_ref()
            .ok_or_else(|| PersistenceError::invalid_state("NO_CONNECTION", "PostgreSQL connection is not opened"))
    }

    pub(crate) fn to_public(&self, row: Map<String, Value>) -> PersistenceResult<T> {
        self.overrides.convert_to_public(row)
    }

    pub(crate) fn to_public_all(&self, rows: Vec<Map<String, Value>>) -> PersistenceResult<Vec<T>> {
        rows.into_iter().map(|row| self.to_public(row)).collect()
    }

    pub(crate) async fn query_many(&self, q: &QueryBuf) -> PersistenceResult<Vec<Map<String, Value>>> {
        let pool = self.client()?;
        debug!(sql = %q.sql, params = ?q.params, "query");
        let rows = bind_all(q).fetch_all(pool).await?;
        rows.iter().map(row_to_map).collect()
    }

    pub(crate) async fn query_optional(&self, q: &QueryBuf) -> PersistenceResult<Option<Map<String, Value>>> {
        let pool = self.client()?;
        debug!(sql = %q.sql, params = ?q.params, "query");
        let row = bind_all(q).fetch_optional(pool).await?;
        row.as_ref().map(row_to_map).transpose()
    }

    pub(crate) async fn execute(&self, q: &QueryBuf) -> PersistenceResult<u64> {
        let pool = self.client()?;
        debug!(sql = %q.sql, params = ?q.params, "execute");
        let result = bind_all(q).execute(pool).await?;
        Ok(result.rows_affected())
    }

    async fn query_count(&self, q: &QueryBuf) -> PersistenceResult<i64> {
        let pool = self.client()?;
        debug!(sql = %q.sql, params = ?q.params, "query");
        let row: PgRow = bind_all(q).fetch_one(pool).await?;
        Ok(row.try_get::<i64, _>("count")?)
    }

    /// Remove every row. `NO_TABLE` when no table name is configured.
    pub async fn clear(&self, trace_id: Option<&str>) -> PersistenceResult<()> {
        if self.table_name.is_empty() {
            return Err(PersistenceError::invalid_state("NO_TABLE", "Table name is not defined"));
        }
        self.execute(&sql::delete_by_filter(&self.quoted_table_name(), None)).await?;
        trace!(trace_id = ?trace_id, table = %self.table_name, "Cleared table");
        Ok(())
    }

    /// Insert the item and return the stored row.
    pub async fn create(&self, trace_id: Option<&str>, item: &T) -> PersistenceResult<Option<T>> {
        let row = self.overrides.convert_from_public(item)?;
        let q = sql::insert(&self.quoted_table_name(), &self.columns, &row);
        let created = self.query_optional(&q).await?;
        trace!(trace_id = ?trace_id, table = %self.table_name, id = ?row.get("id"), "Created in table");
        created.map(|row| self.to_public(row)).transpose()
    }

    /// One page of matching rows. `filter`, `sort` and `select` are SQL fragments. The total is
    /// counted with a second query when `paging.total` is set.
    pub async fn get_page_by_filter(
        &self,
        trace_id: Option<&str>,
        filter: Option<&str>,
        paging: Option<&PagingParams>,
        sort: Option<&str>,
        select: Option<&str>,
    ) -> PersistenceResult<DataPage<T>> {
        let paging = paging.cloned().unwrap_or_default();
        let table = self.quoted_table_name();
        let q = sql::select_list(
            &table,
            &self.columns,
            filter,
            sort,
            select,
            paging.skip(),
            Some(paging.take(self.max_page_size)),
        );
        let rows = self.query_many(&q).await?;
        trace!(trace_id = ?trace_id, table = %self.table_name, count = rows.len(), "Retrieved from table");
        let items = self.to_public_all(rows)?;

        let total = if paging.total {
            Some(self.query_count(&sql::select_count(&table, filter)).await?)
        } else {
            None
        };
        Ok(DataPage::new(items, total))
    }

    /// Every matching row, unbounded.
    pub async fn get_list_by_filter(
        &self,
        trace_id: Option<&str>,
        filter: Option<&str>,
        sort: Option<&str>,
        select: Option<&str>,
    ) -> PersistenceResult<Vec<T>> {
        let q = sql::select_list(&self.quoted_table_name(), &self.columns, filter, sort, select, None, None);
        let rows = self.query_many(&q).await?;
        trace!(trace_id = ?trace_id, table = %self.table_name, count = rows.len(), "Retrieved from table");
        self.to_public_all(rows)
    }

    pub async fn get_count_by_filter(&self, trace_id: Option<&str>, filter: Option<&str>) -> PersistenceResult<i64> {
        let count = self.query_count(&sql::select_count(&self.quoted_table_name(), filter)).await?;
        trace!(trace_id = ?trace_id, table = %self.table_name, count, "Counted in table");
        Ok(count)
    }

    /// A uniformly chosen matching row, `None` when nothing matches.
    pub async fn get_one_random(&self, trace_id: Option<&str>, filter: Option<&str>) -> PersistenceResult<Option<T>> {
        let table = self.quoted_table_name();
        let count = self.query_count(&sql::select_count(&table, filter)).await?;
        if count <= 0 {
            trace!(trace_id = ?trace_id, table = %self.table_name, "Nothing found for get_one_random");
            return Ok(None);
        }
        let offset = rand::thread_rng().gen_range(0..count);
        let row = self.query_optional(&sql::select_at_offset(&table, &self.columns, filter, offset)).await?;
        match row {
            Some(row) => {
                trace!(trace_id = ?trace_id, table = %self.table_name, "Retrieved random item");
                Ok(Some(self.to_public(row)?))
            }
            None => {
                trace!(trace_id = ?trace_id, table = %self.table_name, "Random item wasn't found");
                Ok(None)
            }
        }
    }

    /// Delete matching rows (all rows without a filter); returns how many were removed.
    pub async fn delete_by_filter(&self, trace_id: Option<&str>, filter: Option<&str>) -> PersistenceResult<u64> {
        let count = self.execute(&sql::delete_by_filter(&self.quoted_table_name(), filter)).await?;
        trace!(trace_id = ?trace_id, table = %self.table_name, count, "Deleted from table");
        Ok(count)
    }
}

impl<T, O> std::fmt::Debug for PostgresPersistence<T, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresPersistence")
            .field("table_name", &self.table_name)
            .field("schema_name", &self.schema_name)
            .field("max_page_size", &self.max_page_size)
            .field("local_connection", &self.local_connection)
            .field("open", &self.pool.is_some())
            .finish()
    }
}

fn bind_all(q: &QueryBuf) -> Query<'_, Postgres, PgArguments> {
    q.params
        .iter()
        .fold(sqlx::query(&q.sql), |query, p| query.bind(PgBindValue::from_json(p)))
}
