//! Generic PostgreSQL persistence: connection resolution, pooled connections, advisory schema
//! bootstrap and a CRUD engine shared by any serde item type.

pub mod config;
pub mod connection;
pub mod error;
pub mod identity;
pub mod page;
pub mod refer;
pub mod schema;
pub mod service;
pub mod sql;

pub use config::{ConfigParams, ConnectionParams, CredentialParams, PostgresConnectionResolver};
pub use connection::PostgresConnection;
pub use error::{ConfigError, PersistenceError, PersistenceResult};
pub use identity::{IdGenerator, Identifiable};
pub use page::{DataPage, PagingParams};
pub use refer::{CredentialStore, Discovery, MemoryCredentialStore, MemoryDiscovery, References};
pub use schema::{IndexOrder, SchemaBuilder};
pub use service::{IdentifiablePostgresPersistence, PersistenceOverrides, PostgresPersistence, TableLayout};
