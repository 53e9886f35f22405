//! Shared fixture for the live-database tests. Tests skip when neither `POSTGRES_URI` nor
//! `POSTGRES_HOST` is configured.

#![allow(dead_code)]

use pg_persistence::{
    ConfigParams, IdGenerator, Identifiable, IdentifiablePostgresPersistence, PagingParams, PersistenceOverrides,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dummy {
    pub id: Option<String>,
    pub key: String,
    pub content: String,
}

impl Dummy {
    pub fn new(key: &str, content: &str) -> Self {
        Dummy {
            id: None,
            key: key.to_string(),
            content: content.to_string(),
        }
    }
}

impl Identifiable for Dummy {
    type Key = String;

    fn id(&self) -> Option<String> {
        self.id.clone()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn generate_id() -> Option<String> {
        Some(IdGenerator::next_long())
    }
}

/// Connection config from the environment, `None` when no database is configured.
pub fn db_config() -> Option<ConfigParams> {
    let config = ConfigParams::from_env();
    if config.get_non_empty("connection.uri").is_none() && config.get_non_empty("connection.host").is_none() {
        eprintln!("POSTGRES_URI / POSTGRES_HOST not set, skipping database test");
        return None;
    }
    Some(config)
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pg_persistence=debug")),
        )
        .with_test_writer()
        .try_init();
}

fn fields(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Create, read, update, partially update and delete one item.
pub async fn test_crud_operations<O>(persistence: &IdentifiablePostgresPersistence<Dummy, O>)
where
    O: PersistenceOverrides<Dummy>,
{
    let dummy1 = persistence
        .create(None, &Dummy::new("Key 1", "Content 1"))
        .await
        .unwrap()
        .expect("created item");
    let id1 = dummy1.id.clone().expect("generated id");
    assert_eq!(id1.len(), 32);
    assert_eq!(dummy1.key, "Key 1");
    assert_eq!(dummy1.content, "Content 1");

    let dummy2 = persistence
        .create(None, &Dummy::new("Key 2", "Content 2"))
        .await
        .unwrap()
        .expect("created item");

    let page = persistence
        .get_page_by_filter(None, None, Some(&PagingParams::new(None, None, true)), None, None)
        .await
        .unwrap();
    assert_eq!(page.data.len(), 2);
    assert_eq!(page.total, Some(2));

    let found = persistence.get_one_by_id(None, &id1).await.unwrap();
    assert_eq!(found.as_ref(), Some(&dummy1));

    let mut changed = dummy1.clone();
    changed.content = "Updated Content 1".into();
    let updated = persistence.update(None, &changed).await.unwrap().expect("updated item");
    assert_eq!(updated.id.as_deref(), Some(id1.as_str()));
    assert_eq!(updated.key, "Key 1");
    assert_eq!(updated.content, "Updated Content 1");

    let partial = persistence
        .update_partially(None, &id1, fields(json!({"content": "Partially Updated Content 1"})))
        .await
        .unwrap()
        .expect("updated item");
    assert_eq!(partial.key, "Key 1");
    assert_eq!(partial.content, "Partially Updated Content 1");

    let deleted = persistence.delete_by_id(None, &id1).await.unwrap().expect("deleted item");
    assert_eq!(deleted.id.as_deref(), Some(id1.as_str()));
    assert!(persistence.get_one_by_id(None, &id1).await.unwrap().is_none());
    assert!(persistence.delete_by_id(None, &id1).await.unwrap().is_none());

    let missing = Dummy {
        id: Some(IdGenerator::next_long()),
        ..dummy2.clone()
    };
    assert!(persistence.update(None, &missing).await.unwrap().is_none());

    assert_eq!(persistence.get_count_by_filter(None, None).await.unwrap(), 1);
}

/// Batch reads and deletes by id, upsert, paging and random access.
pub async fn test_batch_operations<O>(persistence: &IdentifiablePostgresPersistence<Dummy, O>)
where
    O: PersistenceOverrides<Dummy>,
{
    let mut ids = Vec::new();
    for i in 0..5 {
        let created = persistence
            .create(None, &Dummy::new(&format!("Key {}", i), &format!("Content {}", i)))
            .await
            .unwrap()
            .expect("created item");
        ids.push(created.id.expect("generated id"));
    }

    let list = persistence.get_list_by_ids(None, &ids[..3]).await.unwrap();
    assert_eq!(list.len(), 3);

    let page = persistence
        .get_page_by_filter(None, None, Some(&PagingParams::new(Some(0), Some(2), true)), None, None)
        .await
        .unwrap();
    assert_eq!(page.data.len(), 2);
    assert_eq!(page.total, Some(5));

    let page = persistence
        .get_page_by_filter(None, None, Some(&PagingParams::new(Some(4), Some(2), false)), None, None)
        .await
        .unwrap();
    assert_eq!(page.data.len(), 1);
    assert_eq!(page.total, None);

    let random = persistence.get_one_random(None, None).await.unwrap().expect("random item");
    assert!(ids.contains(random.id.as_ref().expect("stored id")));

    let mut replaced = random.clone();
    replaced.content = "Set content".into();
    persistence.set(None, &replaced).await.unwrap().expect("set item");
    let set_again = persistence.set(None, &replaced).await.unwrap().expect("set item");
    assert_eq!(set_again.content, "Set content");
    assert_eq!(persistence.get_count_by_filter(None, None).await.unwrap(), 5);

    let fresh = persistence
        .set(None, &Dummy::new("Key set", "New by set"))
        .await
        .unwrap()
        .expect("set item");
    assert!(fresh.id.is_some());
    assert_eq!(persistence.get_count_by_filter(None, None).await.unwrap(), 6);

    let mut to_delete = ids[..2].to_vec();
    to_delete.push(IdGenerator::next_long());
    assert_eq!(persistence.delete_by_ids(None, &to_delete).await.unwrap(), 2);
    assert!(persistence.get_list_by_ids(None, &ids[..2]).await.unwrap().is_empty());
    assert_eq!(persistence.get_count_by_filter(None, None).await.unwrap(), 4);

    persistence.clear(None).await.unwrap();
    assert!(persistence.get_one_random(None, None).await.unwrap().is_none());
}
