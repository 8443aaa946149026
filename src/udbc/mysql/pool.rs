use crate::Result;
use crate::error::DbError;
use crate::udbc::mysql::connection::MysqlTransport;
use crate::udbc::pool::Pool;
use crate::udbc::transport::Transport;
use crate::udbc::{ConnectionOptions, DEFAULT_DB_NAME};
use async_trait::async_trait;
use log::info;
use mysql_async::{Opts, OptsBuilder, PoolConstraints, PoolOpts};
use std::time::Duration;
use tokio::time::timeout;

const MYSQL_TYPE: &str = "mysql";

/// `MysqlPool` leases sessions from a `mysql_async` connection pool.
///
/// Configuration is validated strictly on [`build`](MysqlPool::build) and
/// session acquisition honours the configured timeout.
pub struct MysqlPool {
    url: String,
    name: String,
    options: Option<ConnectionOptions>,
    pool: Option<mysql_async::Pool>,
}

impl MysqlPool {
    /// Creates a new `MysqlPool` with the given connection URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            name: DEFAULT_DB_NAME.to_string(),
            url: url.into(),
            options: None,
            pool: None,
        }
    }

    /// Sets the registration name of the pool.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Configures pool size, lifetime and timeouts.
    pub fn options(mut self, options: ConnectionOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Builds the connection pool and prepares it for use.
    ///
    /// # Errors
    /// Returns `Error` if:
    /// - The connection URL is invalid.
    /// - Pool constraints are invalid (e.g., max_idle > max_open or max_open == 0).
    pub fn build(mut self) -> Result<Self> {
        let opts = Opts::from_url(&self.url).map_err(|e| {
            DbError::InvalidUrl(format!("[{}] Invalid connection URL: {}", self.name, e))
        })?;

        let mut builder = OptsBuilder::from_opts(opts);

        if let Some(options) = &self.options {
            if options.max_open_conns == 0 {
                return Err(self.err_context(
                    "Invalid pool constraints: max_open_conns must be greater than 0",
                ));
            }

            // mysql_async requires: min <= max and max > 0
            let constraints = PoolConstraints::new(
                options.max_idle_conns as usize,
                options.max_open_conns as usize,
            )
            .ok_or_else(|| {
                self.err_context(format!(
                    "Invalid pool constraints: max_idle_conns ({}) > max_open_conns ({})",
                    options.max_idle_conns, options.max_open_conns
                ))
            })?;

            let mut pool_opts = PoolOpts::default().with_constraints(constraints);

            if options.max_lifetime > 0 {
                pool_opts = pool_opts
                    .with_inactive_connection_ttl(Duration::from_secs(options.max_lifetime));
            }

            builder = builder.pool_opts(pool_opts);
        }

        self.pool = Some(mysql_async::Pool::new(builder));
        info!("[{}] mysql pool ready", self.name);
        Ok(self)
    }

    fn err_context<T: std::fmt::Display>(&self, msg: T) -> DbError {
        DbError::Driver(format!("[{}] {}", self.name, msg))
    }
}

#[async_trait]
impl Pool for MysqlPool {
    fn name(&self) -> &str {
        &self.name
    }

    fn r#type(&self) -> &str {
        MYSQL_TYPE
    }

    fn query_timeout(&self) -> Option<Duration> {
        self.options
            .as_ref()
            .filter(|o| o.query_timeout > 0)
            .map(|o| Duration::from_secs(o.query_timeout))
    }

    async fn acquire(&self) -> Result<Box<dyn Transport>> {
        let pool = self.pool.as_ref().ok_or_else(|| {
            self.err_context("Connection pool not initialized (call build() first)")
        })?;

        let get_conn_fut = pool.get_conn();
        let limit = self.options.as_ref().map(|o| o.timeout).unwrap_or(0);

        let conn = if limit > 0 {
            match timeout(Duration::from_secs(limit), get_conn_fut).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(DbError::Timeout(format!(
                        "[{}] Connection acquisition timed out (timeout: {}s)",
                        self.name, limit
                    )));
                }
            }
        } else {
            get_conn_fut.await
        }?;

        Ok(Box::new(MysqlTransport::new(conn)))
    }

    async fn release(&self, transport: Box<dyn Transport>) -> Result<()> {
        // mysql_async takes the socket back when the `Conn` is dropped.
        transport
            .into_any()
            .downcast::<MysqlTransport>()
            .map(drop)
            .map_err(|_| self.err_context("Released session does not belong to a mysql pool"))
    }

    async fn close(&self) -> Result<()> {
        if let Some(pool) = &self.pool {
            // disconnect() consumes the handle; the clone shares the pool.
            pool.clone()
                .disconnect()
                .await
                .map_err(|e| self.err_context(format!("Failed to close pool: {}", e)))?;
            info!("[{}] mysql pool closed", self.name);
        }
        Ok(())
    }
}
