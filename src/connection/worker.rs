use crate::Result;
use crate::connection::command::{Command, Request};
use crate::error::DbError;
use crate::transaction::{AutoCommitStep, TxState};
use crate::udbc::pool::Pool;
use crate::udbc::result::{ResultSet, UpdateResult};
use crate::udbc::transport::Transport;
use log::{debug, info, warn};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;

/// Runs `fut` under the optional limit; `None` means it ran out of time.
async fn limited<T>(
    limit: Option<Duration>,
    fut: impl Future<Output = Result<T>>,
) -> Option<Result<T>> {
    match limit {
        None => Some(fut.await),
        Some(limit) => timeout(limit, fut).await.ok(),
    }
}

/// Owns one leased session and drains the handle's request queue, one
/// command at a time.
pub(crate) struct Worker {
    id: u64,
    pool: Arc<dyn Pool>,
    transport: Option<Box<dyn Transport>>,
    tx: TxState,
    query_timeout: Option<Duration>,
}

impl Worker {
    pub fn new(id: u64, pool: Arc<dyn Pool>, transport: Box<dyn Transport>) -> Self {
        let query_timeout = pool.query_timeout();
        Self {
            id,
            pool,
            transport: Some(transport),
            tx: TxState::default(),
            query_timeout,
        }
    }

    pub async fn run(mut self, mut requests: UnboundedReceiver<Request>) {
        while let Some(request) = requests.recv().await {
            self.handle(request).await;
        }
        // Handle dropped: everything it queued has been answered.
        if self.transport.is_some() {
            debug!("[{}#{}] dropped without close", self.pool.name(), self.id);
            if let Err(e) = self.close().await {
                warn!(
                    "[{}#{}] failed to release dropped connection: {}",
                    self.pool.name(),
                    self.id,
                    e
                );
            }
        }
    }

    // A caller that dropped its completion no longer wants the result.
    async fn handle(&mut self, request: Request) {
        match request {
            Request::Execute { sql, reply } => {
                let _ = reply.send(self.execute(&sql).await);
            }
            Request::Query { command, reply } => {
                let _ = reply.send(self.query(&command).await);
            }
            Request::QuerySingle { command, reply } => {
                let first = self
                    .query(&command)
                    .await
                    .map(|rs| rs.into_results().into_iter().next());
                let _ = reply.send(first);
            }
            Request::Update { command, reply } => {
                let _ = reply.send(self.update(&command).await);
            }
            Request::Batch { commands, reply } => {
                let _ = reply.send(self.batch(commands).await);
            }
            Request::SetAutoCommit { enabled, reply } => {
                let _ = reply.send(self.set_auto_commit(enabled).await);
            }
            Request::Commit(reply) => {
                let _ = reply.send(self.commit().await);
            }
            Request::Rollback(reply) => {
                let _ = reply.send(self.rollback().await);
            }
            Request::SetQueryTimeout { limit, reply } => {
                let result = self.ensure_open();
                if result.is_ok() {
                    self.query_timeout = limit;
                }
                let _ = reply.send(result);
            }
            Request::Mode(reply) => {
                let _ = reply.send(self.ensure_open().map(|_| self.tx.mode()));
            }
            Request::Close(reply) => {
                let _ = reply.send(self.close().await);
            }
        }
    }

    fn ensure_open(&self) -> Result<()> {
        match self.transport {
            Some(_) => Ok(()),
            None => Err(DbError::AlreadyClosed),
        }
    }

    fn session(&mut self) -> Result<&mut Box<dyn Transport>> {
        self.transport.as_mut().ok_or(DbError::AlreadyClosed)
    }

    fn discard(&mut self, reason: &DbError) {
        if self.transport.take().is_some() {
            warn!(
                "[{}#{}] session discarded, connection closed: {}",
                self.pool.name(),
                self.id,
                reason
            );
        }
    }

    /// A lost session closes the handle; a command that outran the query
    /// timeout leaves the session mid-statement, so that closes it too.
    fn finish<T>(&mut self, outcome: Option<Result<T>>) -> Result<T> {
        match outcome {
            Some(Err(e)) if e.is_fatal() => {
                self.discard(&e);
                Err(e)
            }
            Some(result) => result,
            None => {
                let e = DbError::Timeout(format!(
                    "command exceeded {}ms",
                    self.query_timeout.unwrap_or_default().as_millis()
                ));
                self.discard(&e);
                Err(e)
            }
        }
    }

    /// Like [`finish`](Self::finish), and after a failed statement checks
    /// whether the backend abandoned the open transaction.
    async fn settle<T>(&mut self, outcome: Option<Result<T>>) -> Result<T> {
        let result = self.finish(outcome);
        if result.is_err() {
            self.resync().await;
        }
        result
    }

    async fn resync(&mut self) {
        if !self.tx.is_active() {
            return;
        }
        let Some(transport) = self.transport.as_mut() else {
            return;
        };
        match transport.in_transaction().await {
            Ok(true) => {}
            Ok(false) => {
                self.tx.ended();
                warn!(
                    "[{}#{}] backend rolled back the transaction",
                    self.pool.name(),
                    self.id
                );
            }
            Err(e) => debug!(
                "[{}#{}] transaction state unknown: {}",
                self.pool.name(),
                self.id,
                e
            ),
        }
    }

    fn trace<T>(
        &self,
        op: &str,
        command: &Command,
        start: Instant,
        result: &Result<T>,
        describe: impl FnOnce(&T) -> String,
    ) {
        let elapsed = start.elapsed().as_millis();
        match result {
            Ok(v) => debug!(
                "[{}#{}] {}: sql=\n{}, params={}, elapsed={}ms, {}",
                self.pool.name(),
                self.id,
                op,
                &command.sql,
                &command.params,
                elapsed,
                describe(v)
            ),
            Err(e) => debug!(
                "[{}#{}] {}: sql=\n{}, params={}, elapsed={}ms, error={:?}",
                self.pool.name(),
                self.id,
                op,
                &command.sql,
                &command.params,
                elapsed,
                e
            ),
        }
    }

    /// Manual mode sends `BEGIN` right before the first command of a
    /// transaction.
    async fn begin_if_needed(&mut self) -> Result<()> {
        self.ensure_open()?;
        if !self.tx.needs_begin() {
            return Ok(());
        }
        let limit = self.query_timeout;
        let outcome = limited(limit, self.session()?.begin()).await;
        self.finish(outcome)?;
        self.tx.begun();
        debug!("[{}#{}] transaction begun", self.pool.name(), self.id);
        Ok(())
    }

    async fn execute(&mut self, sql: &str) -> Result<()> {
        let command = Command::unparameterized(sql);
        let start = Instant::now();
        let result = self.execute_inner(&command).await;
        self.trace("Execute", &command, start, &result, |_| "ok".to_string());
        result
    }

    async fn execute_inner(&mut self, command: &Command) -> Result<()> {
        self.begin_if_needed().await?;
        let limit = self.query_timeout;
        let outcome = limited(limit, self.session()?.execute(&command.sql)).await;
        self.settle(outcome).await
    }

    async fn query(&mut self, command: &Command) -> Result<ResultSet> {
        let start = Instant::now();
        let result = self.query_inner(command).await;
        self.trace("Query", command, start, &result, |rs| {
            format!("rows={}", rs.len())
        });
        result
    }

    async fn query_inner(&mut self, command: &Command) -> Result<ResultSet> {
        self.begin_if_needed().await?;
        let limit = self.query_timeout;
        let outcome = limited(
            limit,
            self.session()?.query(&command.sql, &command.params),
        )
        .await;
        self.settle(outcome).await
    }

    async fn update(&mut self, command: &Command) -> Result<UpdateResult> {
        let start = Instant::now();
        let result = self.update_inner(command).await;
        self.trace("Update", command, start, &result, |r| {
            format!("affected={}, keys={:?}", r.updated, r.keys)
        });
        result
    }

    async fn update_inner(&mut self, command: &Command) -> Result<UpdateResult> {
        self.begin_if_needed().await?;
        let limit = self.query_timeout;
        let outcome = limited(
            limit,
            self.session()?.update(&command.sql, &command.params),
        )
        .await;
        self.settle(outcome).await
    }

    /// Stops at the first failing statement; earlier ones stay applied
    /// (or pending, in manual mode).
    async fn batch(&mut self, commands: Vec<Command>) -> Result<Vec<u64>> {
        self.ensure_open()?;
        let mut counts = Vec::with_capacity(commands.len());
        for command in &commands {
            counts.push(self.update(command).await?.updated);
        }
        Ok(counts)
    }

    async fn set_auto_commit(&mut self, enabled: bool) -> Result<()> {
        self.ensure_open()?;
        match self.tx.plan_auto_commit(enabled) {
            AutoCommitStep::Unchanged => {}
            AutoCommitStep::Switch => self.tx.apply_auto_commit(enabled),
            AutoCommitStep::CommitThenSwitch => {
                self.commit_active().await?;
                self.tx.apply_auto_commit(enabled);
            }
        }
        debug!(
            "[{}#{}] auto-commit {} ({:?})",
            self.pool.name(),
            self.id,
            enabled,
            self.tx.mode()
        );
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.tx.require_manual()?;
        if !self.tx.is_active() {
            return Ok(());
        }
        self.commit_active().await
    }

    /// On failure the backend transaction stays open, unless the session was
    /// lost or the backend rolled it back.
    async fn commit_active(&mut self) -> Result<()> {
        let limit = self.query_timeout;
        let outcome = limited(limit, self.session()?.commit()).await;
        match self.finish(outcome) {
            Ok(()) => {
                self.tx.ended();
                debug!("[{}#{}] transaction committed", self.pool.name(), self.id);
                Ok(())
            }
            Err(e) => {
                warn!("[{}#{}] commit failed: {}", self.pool.name(), self.id, e);
                self.resync().await;
                Err(DbError::CommitFailed(e.to_string()))
            }
        }
    }

    async fn rollback(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.tx.require_manual()?;
        if !self.tx.is_active() {
            return Ok(());
        }
        self.rollback_active().await
    }

    /// A rollback the backend refuses because it already left the
    /// transaction still counts as done.
    async fn rollback_active(&mut self) -> Result<()> {
        let limit = self.query_timeout;
        let outcome = limited(limit, self.session()?.rollback()).await;
        if let Err(e) = self.settle(outcome).await {
            if self.tx.is_active() || self.transport.is_none() {
                return Err(e);
            }
            debug!("[{}#{}] nothing left to roll back: {}", self.pool.name(), self.id, e);
            return Ok(());
        }
        self.tx.ended();
        debug!("[{}#{}] transaction rolled back", self.pool.name(), self.id);
        Ok(())
    }

    /// Rolls back an open transaction, then hands the session back to the
    /// pool. A session whose rollback failed is discarded instead.
    async fn close(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.tx.is_active()
            && let Err(e) = self.rollback_active().await
        {
            self.discard(&e);
            return Err(e);
        }
        let transport = self.transport.take().ok_or(DbError::AlreadyClosed)?;
        self.pool.release(transport).await?;
        info!("[{}#{}] connection closed", self.pool.name(), self.id);
        Ok(())
    }
}
