//! Items addressed by a unique `id`, and the id generator used by items that create their own ids.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt::Display;

/// A data item with a unique `id` field. The id is serialized under the `id` key.
pub trait Identifiable: Serialize + DeserializeOwned + Clone + Send + Sync {
    type Key: Clone + Serialize + Display + Send + Sync;

    fn id(&self) -> Option<Self::Key>;

    fn set_id(&mut self, id: Self::Key);

    /// Id for an item stored without one. `None` leaves the id unset.
    fn generate_id() -> Option<Self::Key> {
        None
    }

    /// Assign a generated id when the item has none. Existing ids are kept.
    fn ensure_id(&mut self) {
        if self.id().is_none() {
            if let Some(id) = Self::generate_id() {
                self.set_id(id);
            }
        }
    }
}

/// Untyped items: the id is the string under the `id` entry, generated when missing.
impl Identifiable for Map<String, Value> {
    type Key = String;

    fn id(&self) -> Option<String> {
        self.get("id").and_then(Value::as_str).map(String::from)
    }

    fn set_id(&mut self, id: String) {
        self.insert("id".to_string(), Value::String(id));
    }

    fn generate_id() -> Option<String> {
        Some(IdGenerator::next_long())
    }
}

pub struct IdGenerator;

impl IdGenerator {
    /// 32 lowercase hex characters.
    pub fn next_long() -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }
}
