//! Resolve configured endpoints and credentials (through discovery and credential stores) into a
//! connection URI.

use crate::config::{compose_uri, validate_connections, ConfigParams, ConnectionParams, CredentialParams};
use crate::error::{ConfigError, PersistenceError, PersistenceResult};
use crate::refer::References;
use tracing::debug;

#[derive(Clone, Debug, Default)]
pub struct PostgresConnectionResolver {
    connections: Vec<ConnectionParams>,
    credentials: Vec<CredentialParams>,
    references: References,
}

impl PostgresConnectionResolver {
    pub fn new() -> Self {
        PostgresConnectionResolver::default()
    }

    pub fn configure(&mut self, config: &ConfigParams) {
        self.connections = ConnectionParams::many_from_config(config);
        self.credentials = CredentialParams::many_from_config(config);
    }

    pub fn set_references(&mut self, references: References) {
        self.references = references;
    }

    pub fn connections(&self) -> &[ConnectionParams] {
        &self.connections
    }

    /// Endpoints and credential are looked up concurrently; both lookups finish before the URI is
    /// composed. An endpoint failure is reported in preference to a credential failure.
    pub async fn resolve(&self, trace_id: Option<&str>) -> PersistenceResult<String> {
        let (connections, credential) = tokio::join!(
            async {
                let connections = self.resolve_all_connections(trace_id).await?;
                validate_connections(&connections)?;
                Ok::<_, PersistenceError>(connections)
            },
            self.lookup_credential(trace_id)
        );
        let connections = connections?;
        let credential = credential?;
        Ok(compose_uri(&connections, credential.as_ref()))
    }

    /// Configured endpoints with every `discovery_key` entry replaced by what discovery returns.
    pub async fn resolve_all_connections(&self, trace_id: Option<&str>) -> PersistenceResult<Vec<ConnectionParams>> {
        let mut resolved = Vec::with_capacity(self.connections.len());
        for connection in &self.connections {
            let Some(key) = connection.discovery_key() else {
                resolved.push(connection.clone());
                continue;
            };
            if self.references.discovery().is_empty() {
                return Err(ConfigError::CannotResolve(key.to_string()).into());
            }
            for discovery in self.references.discovery() {
                let found = discovery.resolve_all(trace_id, key).await?;
                debug!(trace_id = ?trace_id, key = %key, count = found.len(), "resolved connections in discovery");
                resolved.extend(found);
            }
        }
        Ok(resolved)
    }

    /// First usable credential: a literal one, or the first `store_key` a credential store knows.
    pub async fn lookup_credential(&self, trace_id: Option<&str>) -> PersistenceResult<Option<CredentialParams>> {
        for credential in &self.credentials {
            let Some(key) = credential.store_key() else {
                return Ok(Some(credential.clone()));
            };
            if self.references.credential_stores().is_empty() {
                return Err(ConfigError::NoCredentialStore(key.to_string()).into());
            }
            for store in self.references.credential_stores() {
                if let Some(found) = store.lookup(trace_id, key).await? {
                    debug!(trace_id = ?trace_id, key = %key, "resolved credential in store");
                    return Ok(Some(found));
                }
            }
        }
        Ok(None)
    }
}
