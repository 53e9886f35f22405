//! Plain tables with non-text columns: integer, numeric, timestamptz, uuid, arrays and booleans.

mod common;

use chrono::{DateTime, TimeZone, Utc};
use common::{db_config, init_tracing};
use pg_persistence::{
    Identifiable, IdentifiablePostgresPersistence, PagingParams, PersistenceError, PersistenceOverrides, SchemaBuilder,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Invoice {
    id: Option<Uuid>,
    quantity: Option<i32>,
    price: f64,
    issued_at: DateTime<Utc>,
    customer: Uuid,
    tags: Vec<String>,
    paid: bool,
    note: Option<String>,
}

impl Invoice {
    fn new(quantity: Option<i32>, price: f64) -> Self {
        Invoice {
            id: None,
            quantity,
            price,
            issued_at: Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap(),
            customer: Uuid::new_v4(),
            tags: vec!["net-30".to_string(), "eu".to_string()],
            paid: false,
            note: None,
        }
    }
}

impl Identifiable for Invoice {
    type Key = Uuid;

    fn id(&self) -> Option<Uuid> {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = Some(id);
    }

    fn generate_id() -> Option<Uuid> {
        Some(Uuid::new_v4())
    }
}

struct InvoiceTable;

impl PersistenceOverrides<Invoice> for InvoiceTable {
    fn define_schema(&self, schema: &mut SchemaBuilder) {
        let table = schema.table().to_string();
        schema.ensure_schema(format!(
            "CREATE TABLE {} (\"id\" UUID PRIMARY KEY, \"quantity\" INTEGER, \"price\" NUMERIC(10,2), \
             \"issued_at\" TIMESTAMPTZ, \"customer\" UUID, \"tags\" TEXT[], \"paid\" BOOLEAN, \"note\" TEXT)",
            table
        ));
    }
}

async fn open_persistence(table: &str) -> Option<IdentifiablePostgresPersistence<Invoice, InvoiceTable>> {
    init_tracing();
    let mut config = db_config()?;
    config.set("table", table);
    let mut persistence = IdentifiablePostgresPersistence::new(table, InvoiceTable);
    persistence.configure(&config);
    persistence.open(None).await.unwrap();
    persistence.clear(None).await.unwrap();
    Some(persistence)
}

#[tokio::test]
async fn typed_columns_round_trip() {
    let Some(mut persistence) = open_persistence("invoices_round_trip").await else {
        return;
    };
    assert_eq!(persistence.base().columns().type_of("price"), Some("numeric(10,2)"));

    let created = persistence
        .create(None, &Invoice::new(None, 12.5))
        .await
        .unwrap()
        .expect("created invoice");
    let id = created.id.expect("generated id");
    assert_eq!(created.quantity, None);
    assert_eq!(created.price, 12.5);
    assert_eq!(created.tags, ["net-30", "eu"]);

    let read = persistence.get_one_by_id(None, &id).await.unwrap().expect("stored invoice");
    assert_eq!(read, created);

    let mut changed = read.clone();
    changed.quantity = Some(3);
    changed.price = 19.99;
    changed.paid = true;
    changed.note = Some("sent".to_string());
    let updated = persistence.update(None, &changed).await.unwrap().expect("updated invoice");
    assert_eq!(updated, changed);

    let mut partial = Map::new();
    partial.insert("quantity".into(), Value::Null);
    partial.insert("price".into(), json!(5));
    partial.insert("tags".into(), json!([]));
    let patched = persistence
        .update_partially(None, &id, partial)
        .await
        .unwrap()
        .expect("patched invoice");
    assert_eq!(patched.quantity, None);
    assert_eq!(patched.price, 5.0);
    assert!(patched.tags.is_empty());
    assert_eq!(patched.note.as_deref(), Some("sent"));

    let deleted = persistence.delete_by_id(None, &id).await.unwrap().expect("deleted invoice");
    assert_eq!(deleted.id, Some(id));
    assert!(persistence.get_one_by_id(None, &id).await.unwrap().is_none());
    persistence.close(None).await.unwrap();
}

#[tokio::test]
async fn typed_ids_in_batch_operations() {
    let Some(mut persistence) = open_persistence("invoices_batch").await else {
        return;
    };
    let mut ids = Vec::new();
    for price in [1.0, 2.0, 3.0] {
        let created = persistence.create(None, &Invoice::new(Some(1), price)).await.unwrap();
        ids.push(created.and_then(|i| i.id).expect("generated id"));
    }

    let mut replaced = Invoice::new(Some(7), 70.0);
    replaced.id = Some(ids[0]);
    let set = persistence.set(None, &replaced).await.unwrap().expect("set invoice");
    assert_eq!(set, replaced);

    let listed = persistence.get_list_by_ids(None, &ids[..2]).await.unwrap();
    assert_eq!(listed.len(), 2);

    let page = persistence
        .get_page_by_filter(
            None,
            Some("\"price\" >= 2"),
            Some(&PagingParams::new(None, None, true)),
            Some("\"price\""),
            None,
        )
        .await
        .unwrap();
    let prices: Vec<f64> = page.data.iter().map(|i| i.price).collect();
    assert_eq!(prices, [2.0, 3.0, 70.0]);
    assert_eq!(page.total, Some(3));

    assert_eq!(persistence.delete_by_ids(None, &ids).await.unwrap(), 3);
    persistence.close(None).await.unwrap();
}

#[tokio::test]
async fn undecodable_selected_column_is_conversion_error() {
    let Some(mut persistence) = open_persistence("invoices_select").await else {
        return;
    };
    persistence.create(None, &Invoice::new(Some(1), 4.25)).await.unwrap();

    let err = persistence
        .get_list_by_filter(None, None, None, Some("\"id\",\"price\""))
        .await
        .unwrap_err();
    assert!(matches!(err, PersistenceError::Conversion(_)), "{:?}", err);
    assert!(err.to_string().contains("\"price\""), "{}", err);
    persistence.close(None).await.unwrap();
}
