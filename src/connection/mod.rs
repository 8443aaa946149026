//! Connection handles: one leased backend session, driven by a dedicated
//! dispatcher task that runs the handle's commands strictly in submission
//! order.

mod command;
mod worker;

pub use command::Command;

use crate::Result;
use crate::connection::command::{Reply, Request};
use crate::connection::worker::Worker;
use crate::error::DbError;
use crate::transaction::TxMode;
use crate::udbc::params::Params;
use crate::udbc::pool::Pool;
use crate::udbc::result::{ResultSet, UpdateResult};
use crate::udbc::value::Value;
use log::{info, warn};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// A callback bound to the outcome it waits for.
type CallbackJob = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Runs a handle's callbacks one at a time, in the order they were queued.
async fn run_callbacks(mut jobs: mpsc::UnboundedReceiver<CallbackJob>) {
    while let Some(job) = jobs.recv().await {
        // Each job on its own task, so a panicking callback only loses itself.
        if let Err(e) = tokio::spawn(job).await {
            warn!("completion callback failed: {}", e);
        }
    }
}

/// The pending outcome of one submitted command.
///
/// Resolves exactly once, with the command's result or its failure.
/// Dropping it does not cancel the command.
#[must_use = "the command runs anyway, but its outcome is lost"]
pub struct Completion<T> {
    rx: oneshot::Receiver<Result<T>>,
    callbacks: mpsc::UnboundedSender<CallbackJob>,
}

impl<T> Completion<T> {
    fn channel(callbacks: mpsc::UnboundedSender<CallbackJob>) -> (Reply<T>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx, callbacks })
    }

    /// Hands the outcome to `callback` once it is known.
    ///
    /// Callbacks of one handle run one after another, in the order they
    /// were attached; attaching each right after submitting its command
    /// makes that the submission order.
    pub fn on_complete<F>(self, callback: F)
    where
        T: Send + 'static,
        F: FnOnce(Result<T>) + Send + 'static,
    {
        let Completion { rx, callbacks } = self;
        let job: CallbackJob = Box::pin(async move { callback(settled(rx.await)) });
        if let Err(mpsc::error::SendError(job)) = callbacks.send(job) {
            // The handle's callback runner is gone with its runtime.
            tokio::spawn(job);
        }
    }
}

fn settled<T>(received: std::result::Result<Result<T>, oneshot::error::RecvError>) -> Result<T> {
    received.unwrap_or_else(|_| {
        Err(DbError::ConnectionLost(
            "connection dispatcher stopped".to_string(),
        ))
    })
}

impl<T> Future for Completion<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().rx).poll(cx).map(settled)
    }
}

/// An exclusive handle on one backend session.
///
/// Every operation returns immediately with a [`Completion`]; the handle's
/// dispatcher runs the commands one at a time, in the order they were
/// submitted, so completions resolve in that order too. Handles are
/// independent of each other.
///
/// ```no_run
/// # async fn demo(pool: std::sync::Arc<dyn usql::udbc::pool::Pool>) -> usql::Result<()> {
/// let conn = usql::connection::SqlConnection::open(pool).await?;
/// conn.update_with_params("INSERT INTO t (id, name) VALUES (?, ?)", usql::params![1i64, "a"])
///     .await?;
/// let rows = conn.query("SELECT * FROM t").await?;
/// conn.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct SqlConnection {
    id: u64,
    pool_name: String,
    requests: mpsc::UnboundedSender<Request>,
    callbacks: mpsc::UnboundedSender<CallbackJob>,
}

impl SqlConnection {
    /// Leases a session from `pool` and starts its dispatcher.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn open(pool: Arc<dyn Pool>) -> Result<Self> {
        let transport = pool.acquire().await?;
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        let pool_name = pool.name().to_string();
        let (requests, rx) = mpsc::unbounded_channel();
        tokio::spawn(Worker::new(id, pool, transport).run(rx));
        let (callbacks, jobs) = mpsc::unbounded_channel();
        tokio::spawn(run_callbacks(jobs));
        info!("[{}#{}] connection opened", pool_name, id);
        Ok(Self {
            id,
            pool_name,
            requests,
            callbacks,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn pool_name(&self) -> &str {
        &self.pool_name
    }

    fn submit<T>(&self, request: impl FnOnce(Reply<T>) -> Request) -> Completion<T> {
        let (reply, completion) = Completion::channel(self.callbacks.clone());
        // A failed send drops the reply, which resolves the completion.
        if self.requests.send(request(reply)).is_err() {
            warn!(
                "[{}#{}] dispatcher is gone, command not submitted",
                self.pool_name, self.id
            );
        }
        completion
    }

    /// Runs a statement that returns nothing, such as DDL.
    pub fn execute(&self, sql: impl Into<String>) -> Completion<()> {
        let sql = sql.into();
        self.submit(|reply| Request::Execute { sql, reply })
    }

    pub fn query(&self, sql: impl Into<String>) -> Completion<ResultSet> {
        self.query_with_params(sql, Params::None)
    }

    pub fn query_with_params(
        &self,
        sql: impl Into<String>,
        params: impl Into<Params>,
    ) -> Completion<ResultSet> {
        let command = Command::new(sql, params);
        self.submit(|reply| Request::Query { command, reply })
    }

    /// First row of the result, if there is one.
    pub fn query_single(&self, sql: impl Into<String>) -> Completion<Option<Vec<Value>>> {
        self.query_single_with_params(sql, Params::None)
    }

    pub fn query_single_with_params(
        &self,
        sql: impl Into<String>,
        params: impl Into<Params>,
    ) -> Completion<Option<Vec<Value>>> {
        let command = Command::new(sql, params);
        self.submit(|reply| Request::QuerySingle { command, reply })
    }

    pub fn update(&self, sql: impl Into<String>) -> Completion<UpdateResult> {
        self.update_with_params(sql, Params::None)
    }

    pub fn update_with_params(
        &self,
        sql: impl Into<String>,
        params: impl Into<Params>,
    ) -> Completion<UpdateResult> {
        let command = Command::new(sql, params);
        self.submit(|reply| Request::Update { command, reply })
    }

    /// Runs the statements in order and reports each affected-row count.
    /// Stops at the first failure, which becomes the outcome of the batch.
    pub fn batch<I, S>(&self, statements: I) -> Completion<Vec<u64>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let commands = statements
            .into_iter()
            .map(Command::unparameterized)
            .collect();
        self.submit(|reply| Request::Batch { commands, reply })
    }

    /// Runs one statement once per parameter set.
    pub fn batch_with_params<I, P>(&self, sql: impl Into<String>, params: I) -> Completion<Vec<u64>>
    where
        I: IntoIterator<Item = P>,
        P: Into<Params>,
    {
        let sql = sql.into();
        let commands = params
            .into_iter()
            .map(|p| Command::new(sql.clone(), p))
            .collect();
        self.submit(|reply| Request::Batch { commands, reply })
    }

    /// Switches between auto-commit and manual transactions.
    ///
    /// Turning auto-commit on commits pending work first; if that commit
    /// fails the outcome is [`DbError::CommitFailed`] and the handle stays
    /// in manual mode with its transaction open. Turning it off sends
    /// nothing to the backend.
    pub fn set_auto_commit(&self, enabled: bool) -> Completion<()> {
        self.submit(|reply| Request::SetAutoCommit { enabled, reply })
    }

    /// Fails with [`DbError::NoActiveTransaction`] in auto-commit mode.
    pub fn commit(&self) -> Completion<()> {
        self.submit(Request::Commit)
    }

    /// Fails with [`DbError::NoActiveTransaction`] in auto-commit mode.
    pub fn rollback(&self) -> Completion<()> {
        self.submit(Request::Rollback)
    }

    /// Limits how long each later command may run; `None` removes the limit.
    /// A command that runs out of time fails with [`DbError::Timeout`] and
    /// closes the handle, since its session is left mid-statement.
    pub fn set_query_timeout(&self, limit: Option<Duration>) -> Completion<()> {
        self.submit(|reply| Request::SetQueryTimeout { limit, reply })
    }

    /// Transaction mode once every command submitted before this one has run.
    pub fn transaction_mode(&self) -> Completion<TxMode> {
        self.submit(Request::Mode)
    }

    /// Closes the handle after the commands already submitted, rolling back
    /// an open transaction and returning the session to its pool. Commands
    /// submitted afterwards fail with [`DbError::AlreadyClosed`], and so does
    /// a second close.
    pub fn close(&self) -> Completion<()> {
        self.submit(Request::Close)
    }
}
