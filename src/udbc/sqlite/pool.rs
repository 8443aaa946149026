use async_trait::async_trait;
use log::{debug, info, warn};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::time::timeout;

use crate::Result;
use crate::error::DbError;
use crate::udbc::pool::Pool;
use crate::udbc::sqlite::connection::SqliteTransport;
use crate::udbc::transport::Transport;
use crate::udbc::{ConnectionOptions, DEFAULT_DB_NAME};

const SQLITE_TYPE: &str = "sqlite";

#[derive(Debug, Clone, PartialEq)]
enum SqliteTarget {
    Memory,
    Path(String),
}

struct IdleConnection {
    conn: rusqlite::Connection,
    created: Instant,
}

/// `SqlitePool` hands out SQLite sessions and keeps released ones for reuse.
///
/// Every session of a `sqlite::memory:` pool is a separate database; use a
/// shared-cache URI such as `sqlite:file:name?mode=memory&cache=shared` when
/// several handles must see the same in-memory data.
pub struct SqlitePool {
    url: String,
    name: String,
    options: ConnectionOptions,
    target: Option<SqliteTarget>,
    idle: Mutex<Vec<IdleConnection>>,
    permits: Arc<Semaphore>,
}

impl SqlitePool {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            name: DEFAULT_DB_NAME.to_string(),
            url: url.into(),
            options: ConnectionOptions::default(),
            target: None,
            idle: Mutex::new(Vec::new()),
            permits: Arc::new(Semaphore::new(0)),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn options(mut self, options: ConnectionOptions) -> Self {
        self.options = options;
        self
    }

    fn parse_target(url: &str) -> Result<SqliteTarget> {
        let trimmed = url.trim();
        let stripped = trimmed
            .strip_prefix("sqlite://")
            .or_else(|| trimmed.strip_prefix("sqlite:"))
            .unwrap_or(trimmed)
            .trim();

        if stripped.is_empty() {
            return Err(DbError::InvalidUrl(url.to_string()));
        }

        if stripped == ":memory:" {
            return Ok(SqliteTarget::Memory);
        }

        Ok(SqliteTarget::Path(stripped.to_string()))
    }

    /// Validates the URL and options and prepares the pool for use.
    ///
    /// # Errors
    /// Returns `Error` if:
    /// - The URL names no database.
    /// - `max_open_conns` is 0 or above [`Semaphore::MAX_PERMITS`].
    pub fn build(mut self) -> Result<Self> {
        self.target = Some(Self::parse_target(&self.url)?);
        if self.options.max_open_conns == 0 {
            return Err(self.err_context(
                "Invalid pool constraints: max_open_conns must be greater than 0",
            ));
        }
        let max_open = usize::try_from(self.options.max_open_conns)
            .ok()
            .filter(|n| *n <= Semaphore::MAX_PERMITS)
            .ok_or_else(|| {
                self.err_context(format!(
                    "Invalid pool constraints: max_open_conns must not exceed {}",
                    Semaphore::MAX_PERMITS
                ))
            })?;
        self.permits = Arc::new(Semaphore::new(max_open));
        info!(
            "[{}] sqlite pool ready: target={:?}, max_open={}, max_idle={}",
            self.name, self.target, self.options.max_open_conns, self.options.max_idle_conns
        );
        Ok(self)
    }

    fn err_context<T: std::fmt::Display>(&self, msg: T) -> DbError {
        DbError::Driver(format!("[{}] {}", self.name, msg))
    }

    fn open_connection(target: &SqliteTarget, timeout_secs: u64) -> Result<rusqlite::Connection> {
        let conn = match target {
            SqliteTarget::Memory => rusqlite::Connection::open_in_memory()?,
            SqliteTarget::Path(p) => rusqlite::Connection::open(p)?,
        };

        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        if timeout_secs > 0 {
            conn.busy_timeout(Duration::from_secs(timeout_secs))?;
        }

        Ok(conn)
    }

    fn expired(&self, created: Instant) -> bool {
        self.options.max_lifetime > 0
            && created.elapsed() >= Duration::from_secs(self.options.max_lifetime)
    }

    fn take_idle(&self) -> Option<IdleConnection> {
        let mut idle = self.idle.lock().unwrap_or_else(|e| e.into_inner());
        while let Some(candidate) = idle.pop() {
            if self.expired(candidate.created) {
                debug!("[{}] dropping expired idle session", self.name);
                continue;
            }
            return Some(candidate);
        }
        None
    }

    /// Number of released sessions currently kept for reuse.
    pub fn idle_count(&self) -> usize {
        self.idle.lock().map(|idle| idle.len()).unwrap_or(0)
    }
}

#[async_trait]
impl Pool for SqlitePool {
    fn name(&self) -> &str {
        &self.name
    }

    fn r#type(&self) -> &str {
        SQLITE_TYPE
    }

    fn query_timeout(&self) -> Option<Duration> {
        (self.options.query_timeout > 0).then(|| Duration::from_secs(self.options.query_timeout))
    }

    async fn acquire(&self) -> Result<Box<dyn Transport>> {
        let target = self
            .target
            .clone()
            .ok_or_else(|| self.err_context("Pool not initialized (call build() first)"))?;

        let permit_fut = self.permits.clone().acquire_owned();
        let permit = if self.options.timeout > 0 {
            match timeout(Duration::from_secs(self.options.timeout), permit_fut).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(DbError::Timeout(format!(
                        "[{}] no session available within {}s",
                        self.name, self.options.timeout
                    )));
                }
            }
        } else {
            permit_fut.await
        }
        .map_err(|_| self.err_context("Pool is closed"))?;

        if let Some(idle) = self.take_idle() {
            return Ok(Box::new(SqliteTransport::leased(
                idle.conn,
                idle.created,
                Some(permit),
            )));
        }

        let timeout_secs = self.options.timeout;
        let conn = tokio::task::spawn_blocking(move || Self::open_connection(&target, timeout_secs))
            .await
            .map_err(|e| DbError::ConnectionLost(e.to_string()))??;
        debug!("[{}] opened new sqlite session", self.name);
        Ok(Box::new(SqliteTransport::leased(conn, Instant::now(), Some(permit))))
    }

    async fn release(&self, transport: Box<dyn Transport>) -> Result<()> {
        let transport = transport
            .into_any()
            .downcast::<SqliteTransport>()
            .map_err(|_| self.err_context("Released session does not belong to a sqlite pool"))?;
        let SqliteTransport {
            conn,
            created,
            permit,
        } = *transport;

        let Ok(conn) = Arc::try_unwrap(conn).map(|m| m.into_inner()) else {
            warn!("[{}] session still in use on release, discarding", self.name);
            return Ok(());
        };
        if !conn.is_autocommit() {
            warn!("[{}] session released inside a transaction, discarding", self.name);
            return Ok(());
        }
        if self.permits.is_closed() || self.expired(created) {
            return Ok(());
        }

        let mut idle = self.idle.lock().unwrap_or_else(|e| e.into_inner());
        if (idle.len() as u64) < self.options.max_idle_conns {
            idle.push(IdleConnection { conn, created });
        }
        drop(idle);
        drop(permit);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.permits.close();
        let drained = {
            let mut idle = self.idle.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *idle)
        };
        info!(
            "[{}] sqlite pool closed, {} idle sessions dropped",
            self.name,
            drained.len()
        );
        Ok(())
    }
}
