#![allow(dead_code)]

use async_trait::async_trait;
use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use usql::DbError;
use usql::udbc::params::Params;
use usql::udbc::pool::Pool;
use usql::udbc::result::{ResultSet, UpdateResult};
use usql::udbc::transport::Transport;
use usql::udbc::value::Value;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Failures and delays a [`FakeTransport`] plays back.
#[derive(Default)]
pub struct Script {
    pub fail_commit: Option<DbError>,
    /// SQL containing `SLEEP` waits this long before answering.
    pub delay: Duration,
}

/// In-memory backend that records every call instead of running SQL.
///
/// SQL containing `LOSE` fails with `ConnectionLost`, SQL containing `BAD`
/// fails with `SyntaxError`, SQL containing `ABORT` fails with
/// `ConstraintViolation` and drops the open transaction, as SQLite does for
/// `ON CONFLICT ROLLBACK`.
pub struct FakeTransport {
    log: Arc<Mutex<Vec<String>>>,
    script: Arc<Mutex<Script>>,
    in_tx: bool,
}

impl FakeTransport {
    fn record(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }

    async fn run(&mut self, kind: &str, sql: &str) -> Result<(), DbError> {
        let delay = self.script.lock().unwrap().delay;
        if sql.contains("SLEEP") {
            tokio::time::sleep(delay).await;
        }
        self.record(format!("{}:{}", kind, sql));
        if sql.contains("LOSE") {
            return Err(DbError::ConnectionLost("socket reset".to_string()));
        }
        if sql.contains("ABORT") {
            self.in_tx = false;
            return Err(DbError::ConstraintViolation("UNIQUE constraint failed".to_string()));
        }
        if sql.contains("BAD") {
            return Err(DbError::SyntaxError(format!("near \"{}\"", sql)));
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn query(&mut self, sql: &str, params: &Params) -> Result<ResultSet, DbError> {
        self.run("query", sql).await?;
        let row = vec![Value::Str(sql.to_string()), Value::I64(params.len() as i64)];
        ResultSet::new(vec!["sql".to_string(), "params".to_string()], vec![row])
    }

    async fn update(&mut self, sql: &str, _params: &Params) -> Result<UpdateResult, DbError> {
        self.run("update", sql).await?;
        Ok(UpdateResult::new(1, vec![]))
    }

    async fn execute(&mut self, sql: &str) -> Result<(), DbError> {
        self.run("execute", sql).await
    }

    async fn begin(&mut self) -> Result<(), DbError> {
        self.record("begin".to_string());
        self.in_tx = true;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), DbError> {
        self.record("commit".to_string());
        match self.script.lock().unwrap().fail_commit.clone() {
            Some(e) => Err(e),
            None => {
                self.in_tx = false;
                Ok(())
            }
        }
    }

    async fn rollback(&mut self) -> Result<(), DbError> {
        if !self.in_tx {
            return Err(DbError::Database(
                "cannot rollback - no transaction is active".to_string(),
            ));
        }
        self.record("rollback".to_string());
        self.in_tx = false;
        Ok(())
    }

    async fn in_transaction(&mut self) -> Result<bool, DbError> {
        Ok(self.in_tx)
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

#[derive(Default)]
pub struct FakePool {
    pub log: Arc<Mutex<Vec<String>>>,
    pub script: Arc<Mutex<Script>>,
    pub acquired: AtomicUsize,
    pub released: AtomicUsize,
}

impl FakePool {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn script(&self, f: impl FnOnce(&mut Script)) {
        f(&mut self.script.lock().unwrap());
    }
}

#[async_trait]
impl Pool for FakePool {
    fn name(&self) -> &str {
        "fake"
    }

    fn r#type(&self) -> &str {
        "fake"
    }

    async fn acquire(&self) -> Result<Box<dyn Transport>, DbError> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeTransport {
            log: self.log.clone(),
            script: self.script.clone(),
            in_tx: false,
        }))
    }

    async fn release(&self, transport: Box<dyn Transport>) -> Result<(), DbError> {
        transport
            .into_any()
            .downcast::<FakeTransport>()
            .map_err(|_| DbError::Driver("foreign transport".to_string()))?;
        self.released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<(), DbError> {
        Ok(())
    }
}

/// Waits up to a second for `cond` to hold.
pub async fn eventually(cond: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}
