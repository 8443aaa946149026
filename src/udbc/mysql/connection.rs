use async_trait::async_trait;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, Error as MyError, Row as MyRow};
use std::any::Any;

use crate::Result;
use crate::udbc::mysql::error::ends_transaction;
use crate::udbc::mysql::value_codec::{from_mysql_value, to_mysql_params};
use crate::udbc::params::Params;
use crate::udbc::result::{ResultSet, UpdateResult};
use crate::udbc::transport::Transport;
use crate::udbc::value::Value;

/// A leased MySQL session. Dropping it hands the socket back to the
/// `mysql_async` pool.
pub struct MysqlTransport {
    pub(crate) conn: Conn,
    in_transaction: bool,
}

impl MysqlTransport {
    pub fn new(conn: Conn) -> Self {
        Self {
            conn,
            in_transaction: false,
        }
    }

    /// Clears the transaction flag when the server has already rolled back.
    fn track<T>(&mut self, result: std::result::Result<T, MyError>) -> Result<T> {
        if let Err(e) = &result
            && ends_transaction(e)
        {
            self.in_transaction = false;
        }
        Ok(result?)
    }
}

#[async_trait]
impl Transport for MysqlTransport {
    async fn query(&mut self, sql: &str, params: &Params) -> Result<ResultSet> {
        let params = to_mysql_params(params)?;
        let fetched = self.conn.exec(sql, params).await;
        let rows: Vec<MyRow> = self.track(fetched)?;
        // Column metadata is only reachable through a row, so an empty
        // result has no column names.
        let columns = rows
            .first()
            .map(|row| {
                row.columns_ref()
                    .iter()
                    .map(|c| c.name_str().to_string())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        let results = rows
            .into_iter()
            .map(|row| row.unwrap().into_iter().map(from_mysql_value).collect())
            .collect();
        ResultSet::new(columns, results)
    }

    async fn update(&mut self, sql: &str, params: &Params) -> Result<UpdateResult> {
        let params = to_mysql_params(params)?;
        let done = self.conn.exec_drop(sql, params).await;
        self.track(done)?;
        let keys = self
            .conn
            .last_insert_id()
            .filter(|id| *id > 0)
            .map(|id| vec![Value::U64(id)])
            .unwrap_or_default();
        Ok(UpdateResult::new(self.conn.affected_rows(), keys))
    }

    async fn execute(&mut self, sql: &str) -> Result<()> {
        let done = self.conn.query_drop(sql).await;
        self.track(done)
    }

    async fn begin(&mut self) -> Result<()> {
        self.conn.query_drop("BEGIN").await?;
        self.in_transaction = true;
        Ok(())
    }

    // A failed COMMIT keeps the transaction unless the server says it is gone.
    async fn commit(&mut self) -> Result<()> {
        let done = self.conn.query_drop("COMMIT").await;
        if done.is_ok() {
            self.in_transaction = false;
        }
        self.track(done)
    }

    async fn rollback(&mut self) -> Result<()> {
        let done = self.conn.query_drop("ROLLBACK").await;
        if done.is_ok() {
            self.in_transaction = false;
        }
        self.track(done)
    }

    async fn in_transaction(&mut self) -> Result<bool> {
        Ok(self.in_transaction)
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}
