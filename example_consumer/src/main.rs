//! Example consumer: a separate Rust project that uses pg-persistence as a dependency.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Connection settings come from `POSTGRES_URI` or `POSTGRES_HOST`/`POSTGRES_PORT`/`POSTGRES_DB`
//! with `POSTGRES_USER`/`POSTGRES_PASSWORD` (a `.env` file is read when present).

use pg_persistence::{
    ConfigParams, IdGenerator, Identifiable, IdentifiablePostgresPersistence, IndexOrder, PagingParams,
    PersistenceOverrides, SchemaBuilder, TableLayout,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Note {
    id: Option<String>,
    title: String,
    body: String,
}

impl Identifiable for Note {
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

struct NoteDocuments;

impl PersistenceOverrides<Note> for NoteDocuments {
    fn define_schema(&self, schema: &mut SchemaBuilder) {
        schema.ensure_table(None, None);
        schema.ensure_index("notes_data", &[("data", IndexOrder::Asc)], false, Some("GIN"));
    }

    fn layout(&self) -> TableLayout {
        TableLayout::JsonDocument
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pg_persistence=info")),
        )
        .init();

    let config = ConfigParams::from_env().override_with(&ConfigParams::from_tuples([("table", "notes")]));
    let mut notes = IdentifiablePostgresPersistence::new("notes", NoteDocuments);
    notes.configure(&config);
    notes.open(Some("example")).await?;

    let created = notes
        .create(
            Some("example"),
            &Note {
                id: None,
                title: "First".into(),
                body: "Stored as a JSONB document".into(),
            },
        )
        .await?
        .ok_or("insert returned no row")?;
    let id = created.id.clone().ok_or("created note has no id")?;
    tracing::info!(id = %id, "created note");

    let mut changes = Map::new();
    changes.insert("body".into(), Value::from("Merged server-side"));
    let updated = notes.update_partially(Some("example"), &id, changes).await?;
    tracing::info!(note = ?updated, "updated note");

    let page = notes
        .get_page_by_filter(Some("example"), None, Some(&PagingParams::new(Some(0), Some(10), true)), None, None)
        .await?;
    tracing::info!(returned = page.data.len(), total = ?page.total, "listed notes");

    let deleted = notes.delete_by_id(Some("example"), &id).await?;
    tracing::info!(found = deleted.is_some(), "deleted note");

    notes.close(Some("example")).await?;
    Ok(())
}
