//! CRUD by id for [`Identifiable`] items, layered on [`PostgresPersistence`].

use crate::config::ConfigParams;
use crate::error::PersistenceResult;
use crate::identity::Identifiable;
use crate::page::{DataPage, PagingParams};
use crate::refer::References;
use crate::service::crud::PostgresPersistence;
use crate::service::mapper::{PersistenceOverrides, TableLayout};
use crate::sql;
use serde_json::{Map, Value};
use tracing::trace;

pub struct IdentifiablePostgresPersistence<T, O> {
    base: PostgresPersistence<T, O>,
}

impl<T, O> IdentifiablePostgresPersistence<T, O>
where
    T: Identifiable,
    O: PersistenceOverrides<T>,
{
    pub fn new(table_name: impl Into<String>, overrides: O) -> Self {
        IdentifiablePostgresPersistence {
            base: PostgresPersistence::new(table_name, overrides),
        }
    }

    /// The underlying engine, for filter-based operations not forwarded here.
    pub fn base(&self) -> &PostgresPersistence<T, O> {
        &self.base
    }

    pub fn configure(&mut self, config: &ConfigParams) {
        self.base.configure(config);
    }

    pub fn set_references(&mut self, references: References) {
        self.base.set_references(references);
    }

    pub fn unset_references(&mut self) {
        self.base.unset_references();
    }

    pub async fn open(&mut self, trace_id: Option<&str>) -> PersistenceResult<()> {
        self.base.open(trace_id).await
    }

    pub async fn close(&mut self, trace_id: Option<&str>) -> PersistenceResult<()> {
        self.base.close(trace_id).await
    }

    pub fn is_open(&self) -> bool {
        self.base.is_open()
    }

    pub async fn clear(&self, trace_id: Option<&str>) -> PersistenceResult<()> {
        self.base.clear(trace_id).await
    }

    pub async fn get_page_by_filter(
        &self,
        trace_id: Option<&str>,
        filter: Option<&str>,
        paging: Option<&PagingParams>,
        sort: Option<&str>,
        select: Option<&str>,
    ) -> PersistenceResult<DataPage<T>> {
        self.base.get_page_by_filter(trace_id, filter, paging, sort, select).await
    }

    pub async fn get_list_by_filter(
        &self,
        trace_id: Option<&str>,
        filter: Option<&str>,
        sort: Option<&str>,
        select: Option<&str>,
    ) -> PersistenceResult<Vec<T>> {
        self.base.get_list_by_filter(trace_id, filter, sort, select).await
    }

    pub async fn get_count_by_filter(&self, trace_id: Option<&str>, filter: Option<&str>) -> PersistenceResult<i64> {
        self.base.get_count_by_filter(trace_id, filter).await
    }

    pub async fn get_one_random(&self, trace_id: Option<&str>, filter: Option<&str>) -> PersistenceResult<Option<T>> {
        self.base.get_one_random(trace_id, filter).await
    }

    pub async fn delete_by_filter(&self, trace_id: Option<&str>, filter: Option<&str>) -> PersistenceResult<u64> {
        self.base.delete_by_filter(trace_id, filter).await
    }

    /// Rows whose id is in `ids`, in database order.
    pub async fn get_list_by_ids(&self, trace_id: Option<&str>, ids: &[T::Key]) -> PersistenceResult<Vec<T>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = ids_to_values::<T>(ids)?;
        let rows = self
            .base
            .query_many(&sql::select_by_ids(&self.base.quoted_table_name(), self.base.columns(), ids))
            .await?;
        trace!(trace_id = ?trace_id, table = %self.base.table_name(), count = rows.len(), "Retrieved from table");
        self.base.to_public_all(rows)
    }

    pub async fn get_one_by_id(&self, trace_id: Option<&str>, id: &T::Key) -> PersistenceResult<Option<T>> {
        let columns = self.base.columns();
        let mut q = sql::select_by_id(&self.base.quoted_table_name(), columns);
        q.params.push(columns.bind_value("id", serde_json::to_value(id)?));
        let row = self.base.query_optional(&q).await?;
        match row {
            Some(row) => {
                trace!(trace_id = ?trace_id, table = %self.base.table_name(), id = %id, "Retrieved from table");
                Ok(Some(self.base.to_public(row)?))
            }
            None => {
                trace!(trace_id = ?trace_id, table = %self.base.table_name(), id = %id, "Nothing found in table");
                Ok(None)
            }
        }
    }

    /// Insert a copy of the item, generating its id first when the id policy allows.
    pub async fn create(&self, trace_id: Option<&str>, item: &T) -> PersistenceResult<Option<T>> {
        let mut item = item.clone();
        item.ensure_id();
        self.base.create(trace_id, &item).await
    }

    /// Insert or replace by id.
    pub async fn set(&self, trace_id: Option<&str>, item: &T) -> PersistenceResult<Option<T>> {
        let mut item = item.clone();
        item.ensure_id();
        let row = self.base.overrides().convert_from_public(&item)?;
        let stored = self
            .base
            .query_optional(&sql::upsert(&self.base.quoted_table_name(), self.base.columns(), &row))
            .await?;
        trace!(trace_id = ?trace_id, table = %self.base.table_name(), id = ?item.id().map(|id| id.to_string()), "Set in table");
        stored.map(|row| self.base.to_public(row)).transpose()
    }

    /// Replace every field but the id. `None` when the item has no id or no row matches.
    pub async fn update(&self, trace_id: Option<&str>, item: &T) -> PersistenceResult<Option<T>> {
        let item = item.clone();
        let Some(id) = item.id() else {
            return Ok(None);
        };
        let mut row = self.base.overrides().convert_from_public(&item)?;
        row.remove("id");
        let q = sql::update_by_id(
            &self.base.quoted_table_name(),
            self.base.columns(),
            serde_json::to_value(&id)?,
            &row,
        );
        let updated = self.base.query_optional(&q).await?;
        trace!(trace_id = ?trace_id, table = %self.base.table_name(), id = %id, found = updated.is_some(), "Updated in table");
        updated.map(|row| self.base.to_public(row)).transpose()
    }

    /// Set only the given fields. Document tables merge them into the stored document.
    pub async fn update_partially(
        &self,
        trace_id: Option<&str>,
        id: &T::Key,
        data: Map<String, Value>,
    ) -> PersistenceResult<Option<T>> {
        let mut row = self.base.overrides().convert_from_public_partial(data)?;
        let table = self.base.quoted_table_name();
        let columns = self.base.columns();
        let id_value = serde_json::to_value(id)?;
        let q = match self.base.overrides().layout() {
            TableLayout::Columns => {
                row.remove("id");
                sql::update_by_id(&table, columns, id_value, &row)
            }
            TableLayout::JsonDocument => sql::merge_data_by_id(&table, columns, id_value, Value::Object(row)),
        };
        let updated = self.base.query_optional(&q).await?;
        trace!(trace_id = ?trace_id, table = %self.base.table_name(), id = %id, found = updated.is_some(), "Updated partially in table");
        updated.map(|row| self.base.to_public(row)).transpose()
    }

    /// The deleted item, `None` when no row matched.
    pub async fn delete_by_id(&self, trace_id: Option<&str>, id: &T::Key) -> PersistenceResult<Option<T>> {
        let q = sql::delete_by_id(&self.base.quoted_table_name(), self.base.columns(), serde_json::to_value(id)?);
        let deleted = self.base.query_optional(&q).await?;
        trace!(trace_id = ?trace_id, table = %self.base.table_name(), id = %id, found = deleted.is_some(), "Deleted from table");
        deleted.map(|row| self.base.to_public(row)).transpose()
    }

    /// Number of rows removed; unknown ids are ignored.
    pub async fn delete_by_ids(&self, trace_id: Option<&str>, ids: &[T::Key]) -> PersistenceResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let ids = ids_to_values::<T>(ids)?;
        let count = self
            .base
            .execute(&sql::delete_by_ids(&self.base.quoted_table_name(), self.base.columns(), ids))
            .await?;
        trace!(trace_id = ?trace_id, table = %self.base.table_name(), count, "Deleted from table");
        Ok(count)
    }
}

fn ids_to_values<T: Identifiable>(ids: &[T::Key]) -> PersistenceResult<Vec<Value>> {
    ids.iter()
        .map(|id| serde_json::to_value(id).map_err(Into::into))
        .collect()
}

impl<T, O> std::fmt::Debug for IdentifiablePostgresPersistence<T, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("IdentifiablePostgresPersistence").field(&self.base).finish()
    }
}
