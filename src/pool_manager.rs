use std::sync::{Arc, LazyLock};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::Result;
use crate::connection::SqlConnection;
use crate::error::DbError;
use crate::udbc::DEFAULT_DB_NAME;
use crate::udbc::pool::Pool;

/// The global registry of the `usql` library.
/// Register pools here once and open connections by name anywhere.
pub static U: LazyLock<PoolManager> = LazyLock::new(PoolManager::new);

/// A registry of named connection pools.
///
/// Different backends (MySQL, SQLite, ...) can be registered side by side
/// under unique names; [`connect`](PoolManager::connect) leases a
/// [`SqlConnection`] from one of them.
pub struct PoolManager {
    pools: DashMap<String, Arc<dyn Pool>>,
}

impl Default for PoolManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PoolManager {
    pub fn new() -> Self {
        Self {
            pools: DashMap::new(),
        }
    }

    /// Registers a pool under its own name.
    ///
    /// # Errors
    /// Returns an error if a pool with the same name is already registered.
    pub fn register(&self, pool: impl Pool + 'static) -> Result<()> {
        let name = pool.name().to_string();
        match self.pools.entry(name) {
            Entry::Occupied(e) => Err(DbError::Driver(format!(
                "Pool with name '{}' already registered",
                e.key()
            ))),
            Entry::Vacant(e) => {
                e.insert(Arc::new(pool));
                Ok(())
            }
        }
    }

    pub fn pool(&self, name: &str) -> Option<Arc<dyn Pool>> {
        self.pools.get(name).map(|v| v.value().clone())
    }

    /// Opens a connection on the default pool.
    pub async fn connect(&self) -> Result<SqlConnection> {
        self.connect_by_name(DEFAULT_DB_NAME).await
    }

    /// Opens a connection on the pool registered as `name`.
    pub async fn connect_by_name(&self, name: &str) -> Result<SqlConnection> {
        let pool = self
            .pool(name)
            .ok_or_else(|| DbError::Driver(format!("No pool registered as '{}'", name)))?;
        SqlConnection::open(pool).await
    }

    /// Unregisters the pool and closes it. Connections still open keep
    /// their sessions until they are closed.
    pub async fn close(&self, name: &str) -> Result<()> {
        match self.pools.remove(name) {
            Some((_, pool)) => pool.close().await,
            None => Err(DbError::Driver(format!("No pool registered as '{}'", name))),
        }
    }
}
