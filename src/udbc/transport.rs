use crate::Result;
use crate::udbc::params::Params;
use crate::udbc::result::{ResultSet, UpdateResult};
use async_trait::async_trait;
use std::any::Any;

/// One backend session, as handed out by a [`Pool`](crate::udbc::pool::Pool).
///
/// A transport is driven by exactly one connection handle at a time, so
/// every method takes `&mut self` and never runs concurrently with another.
/// Failures must be classified: `ConnectionLost` when the session is gone,
/// `Timeout` when the backend gave up waiting, `SyntaxError` and
/// `ConstraintViolation` where the backend reports them.
#[async_trait]
pub trait Transport: Send {
    /// Run a statement that produces rows.
    ///
    /// # Arguments
    /// * `sql` - The SQL query string, with `?` placeholders
    /// * `params` - Values bound to the placeholders
    async fn query(&mut self, sql: &str, params: &Params) -> Result<ResultSet>;

    /// Run an INSERT, UPDATE or DELETE and report affected rows and
    /// generated keys.
    async fn update(&mut self, sql: &str, params: &Params) -> Result<UpdateResult>;

    /// Run a statement whose outcome carries no data, such as DDL.
    async fn execute(&mut self, sql: &str) -> Result<()>;

    // ---------- transaction ----------
    /// Begin a transaction
    async fn begin(&mut self) -> Result<()>;
    /// Commit the current transaction
    async fn commit(&mut self) -> Result<()>;
    /// Rollback the current transaction
    async fn rollback(&mut self) -> Result<()>;
    /// Whether the backend still holds an open transaction. A backend may
    /// abandon one on its own after a failed statement.
    async fn in_transaction(&mut self) -> Result<bool>;

    /// Lets the owning pool recover its concrete session type on release.
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}
