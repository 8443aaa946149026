use crate::Result;
use crate::udbc::transport::Transport;
use async_trait::async_trait;
use std::time::Duration;

/// `Pool` is the source and sink of backend sessions.
///
/// A pool is responsible for:
/// - Providing metadata about itself (name, backend type)
/// - Handing out exclusive sessions via [`acquire`](Pool::acquire)
/// - Taking back sessions that were closed cleanly via [`release`](Pool::release)
/// - Cleaning up resources when closed
///
/// A session that is never released (because it failed or timed out) is
/// simply dropped; pools must not rely on getting every session back.
#[async_trait]
pub trait Pool: Send + Sync {
    /// Returns the registration name of the pool.
    fn name(&self) -> &str;

    /// Returns the backend type.
    ///
    /// Example: "mysql", "sqlite"
    fn r#type(&self) -> &str;

    /// Command time limit given to handles opened on this pool.
    fn query_timeout(&self) -> Option<Duration> {
        None
    }

    /// Leases a session.
    ///
    /// # Returns
    /// - `Ok(Box<dyn Transport>)` if a session is available or could be opened
    /// - `Err(DbError::Timeout)` if none became available in time
    async fn acquire(&self) -> Result<Box<dyn Transport>>;

    /// Returns a session obtained from [`acquire`](Pool::acquire).
    async fn release(&self, transport: Box<dyn Transport>) -> Result<()>;

    /// Closes the pool and releases any idle sessions.
    ///
    /// Later calls to [`acquire`](Pool::acquire) fail.
    async fn close(&self) -> Result<()>;
}
