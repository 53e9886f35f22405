//! PostgreSQL connection: owns the pool built from the resolved URI and the `options.*` settings.
//!
//! One connection can be shared by several persistence components through
//! [`References::with_connection`](crate::refer::References::with_connection); the component that
//! created it is the one that closes it.

use crate::config::{ConfigParams, PostgresConnectionResolver};
use crate::error::{PersistenceError, PersistenceResult};
use crate::refer::References;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::borrow::Cow;
use std::str::FromStr;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error};

fn default_config() -> ConfigParams {
    ConfigParams::from_tuples([
        ("options.connect_timeout", "0"),
        ("options.idle_timeout", "10000"),
        ("options.max_pool_size", "3"),
    ])
}

struct OpenState {
    pool: PgPool,
    database_name: String,
}

pub struct PostgresConnection {
    resolver: PostgresConnectionResolver,
    options: ConfigParams,
    state: RwLock<Option<OpenState>>,
    /// Held across open and close so concurrent callers build at most one pool.
    lifecycle: Mutex<()>,
}

impl Default for PostgresConnection {
    fn default() -> Self {
        PostgresConnection::new()
    }
}

impl PostgresConnection {
    pub fn new() -> Self {
        PostgresConnection {
            resolver: PostgresConnectionResolver::new(),
            options: default_config().get_section("options"),
            state: RwLock::new(None),
            lifecycle: Mutex::new(()),
        }
    }

    pub fn configure(&mut self, config: &ConfigParams) {
        let config = config.set_defaults(&default_config());
        self.resolver.configure(&config);
        self.options = self.options.override_with(&config.get_section("options"));
    }

    pub fn set_references(&mut self, references: References) {
        self.resolver.set_references(references);
    }

    pub fn is_open(&self) -> bool {
        self.read_state().is_some()
    }

    /// Resolve the URI and establish the pool. A resolution failure is logged and leaves the
    /// connection closed without returning an error; callers check [`is_open`](Self::is_open).
    /// A pool that cannot be established is `CONNECT_FAILED`. Concurrent calls wait for the one
    /// in flight and then find the connection open.
    pub async fn open(&self, trace_id: Option<&str>) -> PersistenceResult<()> {
        if self.is_open() {
            return Ok(());
        }
        let _lifecycle = self.lifecycle.lock().await;
        if self.is_open() {
            return Ok(());
        }
        let uri = match self.resolver.resolve(trace_id).await {
            Ok(uri) => uri,
            Err(e) => {
                error!(trace_id = ?trace_id, error = %e, "Failed to resolve Postgres connection");
                return Ok(());
            }
        };

        let connect_options = connect_options(&uri).map_err(|e| {
            PersistenceError::connect_failed("Connection to postgres failed", Some(Box::new(e)))
        })?;
        debug!(trace_id = ?trace_id, "Connecting to postgres");
        let pool = self
            .pool_options()
            .connect_with(connect_options.clone())
            .await
            .map_err(|e| PersistenceError::connect_failed("Connection to postgres failed", Some(Box::new(e))))?;

        let database_name = connect_options.get_database().unwrap_or_default().to_string();
        debug!(trace_id = ?trace_id, database = %database_name, "Connected to postgres");
        *self.write_state() = Some(OpenState { pool, database_name });
        Ok(())
    }

    /// Release the pool. No-op when not open.
    pub async fn close(&self, trace_id: Option<&str>) -> PersistenceResult<()> {
        let _lifecycle = self.lifecycle.lock().await;
        let state = self.write_state().take();
        let Some(state) = state else {
            return Ok(());
        };
        state.pool.close().await;
        debug!(trace_id = ?trace_id, database = %state.database_name, "Disconnected from postgres database");
        Ok(())
    }

    /// The live pool, `None` when closed. Pools are reference counted; clones share connections.
    pub fn get_pool(&self) -> Option<PgPool> {
        self.read_state().as_ref().map(|s| s.pool.clone())
    }

    pub fn get_database_name(&self) -> Option<String> {
        self.read_state().as_ref().map(|s| s.database_name.clone())
    }

    fn pool_options(&self) -> PgPoolOptions {
        let mut options = PgPoolOptions::new();
        let positive = |key: &str| self.options.get_as_nullable_integer(key).filter(|v| *v > 0);
        if let Some(size) = positive("max_pool_size") {
            options = options.max_connections(u32::try_from(size).unwrap_or(u32::MAX));
        }
        if let Some(ms) = positive("idle_timeout") {
            options = options.idle_timeout(Some(Duration::from_millis(ms as u64)));
        }
        if let Some(ms) = positive("connect_timeout") {
            options = options.acquire_timeout(Duration::from_millis(ms as u64));
        }
        options
    }

    fn read_state(&self) -> RwLockReadGuard<'_, Option<OpenState>> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, Option<OpenState>> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for PostgresConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresConnection")
            .field("options", &self.options)
            .field("database_name", &self.get_database_name())
            .field("open", &self.is_open())
            .finish()
    }
}

/// Driver options for a resolved URI. sqlx addresses a single node, so a composed multi-node URI
/// connects to its first node.
fn connect_options(uri: &str) -> Result<PgConnectOptions, sqlx::Error> {
    let uri = first_node(uri);
    PgConnectOptions::from_str(&uri)
}

fn first_node(uri: &str) -> Cow<'_, str> {
    let Some((scheme, rest)) = uri.split_once("://") else {
        return Cow::Borrowed(uri);
    };
    let authority_end = rest.find(['/', '?']).unwrap_or(rest.len());
    let (authority, tail) = rest.split_at(authority_end);
    let (userinfo, hosts) = match authority.rsplit_once('@') {
        Some((user, hosts)) => (Some(user), hosts),
        None => (None, authority),
    };
    let Some((first, others)) = hosts.split_once(',') else {
        return Cow::Borrowed(uri);
    };
    debug!(first = %first, others = %others, "multi-node uri; connecting to the first node");
    let userinfo = userinfo.map(|u| format!("{}@", u)).unwrap_or_default();
    Cow::Owned(format!("{}://{}{}{}", scheme, userinfo, first, tail))
}
