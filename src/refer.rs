//! Collaborators a persistence is wired with: discovery services, credential stores and an
//! optional shared connection.

use crate::config::{ConnectionParams, CredentialParams};
use crate::connection::PostgresConnection;
use crate::error::PersistenceResult;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Resolves a discovery key into the endpoints registered under it.
#[async_trait]
pub trait Discovery: Send + Sync {
    async fn resolve_all(&self, trace_id: Option<&str>, key: &str) -> PersistenceResult<Vec<ConnectionParams>>;
}

/// Resolves a store key into a credential. `Ok(None)` when the store has no entry for the key.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn lookup(&self, trace_id: Option<&str>, key: &str) -> PersistenceResult<Option<CredentialParams>>;
}

/// Discovery backed by a fixed in-process table.
#[derive(Clone, Debug, Default)]
pub struct MemoryDiscovery {
    items: HashMap<String, Vec<ConnectionParams>>,
}

impl MemoryDiscovery {
    pub fn new() -> Self {
        MemoryDiscovery::default()
    }

    pub fn register(&mut self, key: impl Into<String>, connection: ConnectionParams) {
        self.items.entry(key.into()).or_default().push(connection);
    }

    pub fn with(mut self, key: impl Into<String>, connection: ConnectionParams) -> Self {
        self.register(key, connection);
        self
    }
}

#[async_trait]
impl Discovery for MemoryDiscovery {
    async fn resolve_all(&self, _trace_id: Option<&str>, key: &str) -> PersistenceResult<Vec<ConnectionParams>> {
        Ok(self.items.get(key).cloned().unwrap_or_default())
    }
}

/// Credential store backed by a fixed in-process table.
#[derive(Clone, Debug, Default)]
pub struct MemoryCredentialStore {
    items: HashMap<String, CredentialParams>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        MemoryCredentialStore::default()
    }

    pub fn store(&mut self, key: impl Into<String>, credential: CredentialParams) {
        self.items.insert(key.into(), credential);
    }

    pub fn with(mut self, key: impl Into<String>, credential: CredentialParams) -> Self {
        self.store(key, credential);
        self
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn lookup(&self, _trace_id: Option<&str>, key: &str) -> PersistenceResult<Option<CredentialParams>> {
        Ok(self.items.get(key).cloned())
    }
}

/// Set of references handed to `set_references`. Cheap to clone.
#[derive(Clone, Default)]
pub struct References {
    discovery: Vec<Arc<dyn Discovery>>,
    credential_stores: Vec<Arc<dyn CredentialStore>>,
    connection: Option<Arc<PostgresConnection>>,
}

impl References {
    pub fn new() -> Self {
        References::default()
    }

    pub fn with_discovery(mut self, discovery: Arc<dyn Discovery>) -> Self {
        self.discovery.push(discovery);
        self
    }

    pub fn with_credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.credential_stores.push(store);
        self
    }

    /// Share one connection (and its pool) between several persistence components.
    /// The caller keeps ownership: it opens and closes the connection.
    pub fn with_connection(mut self, connection: Arc<PostgresConnection>) -> Self {
        self.connection = Some(connection);
        self
    }

    pub fn discovery(&self) -> &[Arc<dyn Discovery>] {
        &self.discovery
    }

    pub fn credential_stores(&self) -> &[Arc<dyn CredentialStore>] {
        &self.credential_stores
    }

    /// The shared connection, if one was registered.
    pub fn connection(&self) -> Option<Arc<PostgresConnection>> {
        self.connection.clone()
    }
}

impl std::fmt::Debug for References {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("References")
            .field("discovery", &self.discovery.len())
            .field("credential_stores", &self.credential_stores.len())
            .field("has_connection", &self.connection.is_some())
            .finish()
    }
}
