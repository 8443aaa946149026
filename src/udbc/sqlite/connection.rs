use async_trait::async_trait;
use rusqlite::params_from_iter;
use std::any::Any;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, OwnedSemaphorePermit};

use crate::Result;
use crate::error::DbError;
use crate::udbc::params::Params;
use crate::udbc::result::{ResultSet, UpdateResult};
use crate::udbc::sqlite::value_codec::{from_sqlite_value, to_sqlite_params};
use crate::udbc::transport::Transport;
use crate::udbc::value::Value;

/// A leased SQLite session. Statements run on the blocking thread pool.
pub struct SqliteTransport {
    pub(crate) conn: Arc<Mutex<rusqlite::Connection>>,
    pub(crate) created: Instant,
    pub(crate) permit: Option<OwnedSemaphorePermit>,
}

impl SqliteTransport {
    pub fn new(conn: rusqlite::Connection) -> Self {
        Self::leased(conn, Instant::now(), None)
    }

    pub(crate) fn leased(
        conn: rusqlite::Connection,
        created: Instant,
        permit: Option<OwnedSemaphorePermit>,
    ) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            created,
            permit,
        }
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&rusqlite::Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            f(&conn)
        })
        .await
        .map_err(|e| DbError::ConnectionLost(e.to_string()))?
    }
}

const DML_VERBS: [&str; 5] = ["INSERT", "REPLACE", "SELECT", "UPDATE", "DELETE"];

/// First keyword of the statement proper. Comments, quoted text and a
/// leading `WITH` clause are skipped.
fn statement_verb(sql: &str) -> Option<String> {
    let bytes = sql.as_bytes();
    let mut i = 0;
    let mut depth = 0usize;
    let mut in_with = false;
    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i < bytes.len() && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
                    i += 1;
                }
                i += 2;
            }
            b'\'' | b'"' | b'`' => {
                i += 1;
                while i < bytes.len() && bytes[i] != c {
                    i += 1;
                }
                i += 1;
            }
            b'[' => {
                while i < bytes.len() && bytes[i] != b']' {
                    i += 1;
                }
                i += 1;
            }
            b'(' => {
                depth += 1;
                i += 1;
            }
            b')' => {
                depth = depth.saturating_sub(1);
                i += 1;
            }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                if depth > 0 {
                    continue;
                }
                let word = sql[start..i].to_ascii_uppercase();
                if !in_with {
                    if word == "WITH" {
                        in_with = true;
                        continue;
                    }
                    return Some(word);
                }
                if DML_VERBS.contains(&word.as_str()) {
                    return Some(word);
                }
            }
            _ => i += 1,
        }
    }
    None
}

fn is_insert(sql: &str) -> bool {
    matches!(statement_verb(sql).as_deref(), Some("INSERT" | "REPLACE"))
}

#[async_trait]
impl Transport for SqliteTransport {
    async fn query(&mut self, sql: &str, params: &Params) -> Result<ResultSet> {
        let sql = sql.to_string();
        let params = to_sqlite_params(params)?;
        self.blocking(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let column_count = stmt.column_count();
            let columns = (0..column_count)
                .map(|i| {
                    stmt.column_name(i)
                        .map(|s| s.to_string())
                        .unwrap_or_else(|_| i.to_string())
                })
                .collect::<Vec<_>>();

            let mut rows = stmt.query(params_from_iter(params))?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                let mut values = Vec::with_capacity(column_count);
                for i in 0..column_count {
                    values.push(from_sqlite_value(row.get_ref(i)?));
                }
                out.push(values);
            }
            ResultSet::new(columns, out)
        })
        .await
    }

    async fn update(&mut self, sql: &str, params: &Params) -> Result<UpdateResult> {
        let sql = sql.to_string();
        let params = to_sqlite_params(params)?;
        self.blocking(move |conn| {
            let affected = conn.execute(&sql, params_from_iter(params))? as u64;
            let keys = if affected > 0 && is_insert(&sql) {
                vec![Value::I64(conn.last_insert_rowid())]
            } else {
                Vec::new()
            };
            Ok(UpdateResult::new(affected, keys))
        })
        .await
    }

    async fn execute(&mut self, sql: &str) -> Result<()> {
        let sql = sql.to_string();
        self.blocking(move |conn| Ok(conn.execute_batch(&sql)?)).await
    }

    async fn begin(&mut self) -> Result<()> {
        self.blocking(|conn| Ok(conn.execute_batch("BEGIN")?)).await
    }

    async fn commit(&mut self) -> Result<()> {
        self.blocking(|conn| Ok(conn.execute_batch("COMMIT")?)).await
    }

    async fn rollback(&mut self) -> Result<()> {
        self.blocking(|conn| Ok(conn.execute_batch("ROLLBACK")?)).await
    }

    async fn in_transaction(&mut self) -> Result<bool> {
        Ok(!self.conn.lock().await.is_autocommit())
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::params;

    async fn transport() -> SqliteTransport {
        let mut t = SqliteTransport::new(rusqlite::Connection::open_in_memory().unwrap());
        t.execute("CREATE TABLE user (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL)")
            .await
            .unwrap();
        t
    }

    #[test]
    fn test_is_insert() {
        assert!(is_insert("  INSERT INTO t VALUES (1)"));
        assert!(is_insert("replace into t values (1)"));
        assert!(!is_insert("UPDATE t SET a = 1"));
        assert!(!is_insert("in"));
        assert!(is_insert("-- audit\n/* bulk */ INSERT INTO t VALUES (1)"));
        assert!(is_insert(
            "WITH RECURSIVE n(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM n WHERE x < 3) \
             INSERT INTO t SELECT x FROM n"
        ));
        assert!(!is_insert("WITH gone AS (SELECT 'insert') DELETE FROM t WHERE id IN gone"));
        assert!(!is_insert("/* INSERT */ SELECT 1"));
    }

    #[tokio::test]
    async fn test_keys_for_cte_insert() {
        let mut t = transport().await;
        let r = t
            .update(
                "-- seed\nWITH src(name) AS (VALUES ('carol')) INSERT INTO user(name) SELECT name FROM src",
                &Params::None,
            )
            .await
            .unwrap();
        assert_eq!(r, UpdateResult::new(1, vec![Value::I64(1)]));
    }

    #[tokio::test]
    async fn test_in_transaction_follows_backend() {
        let mut t = transport().await;
        assert!(!t.in_transaction().await.unwrap());
        t.begin().await.unwrap();
        assert!(t.in_transaction().await.unwrap());
        t.rollback().await.unwrap();
        assert!(!t.in_transaction().await.unwrap());
    }

    #[tokio::test]
    async fn test_update_reports_generated_key() {
        let mut t = transport().await;
        let r = t
            .update("INSERT INTO user(name) VALUES (?)", &params!["alice"])
            .await
            .unwrap();
        assert_eq!(r.updated, 1);
        assert_eq!(r.keys, vec![Value::I64(1)]);

        let r = t
            .update("UPDATE user SET name = ? WHERE id = ?", &params!["bob", 1i64])
            .await
            .unwrap();
        assert_eq!(r, UpdateResult::new(1, vec![]));

        let rows = t
            .query("SELECT id, name FROM user WHERE id = ?", &params![1i64])
            .await
            .unwrap();
        assert_eq!(rows.column_names(), &["id".to_string(), "name".to_string()]);
        assert_eq!(
            rows.row(0).unwrap().get("name"),
            Some(&Value::Str("bob".to_string()))
        );
    }

    #[tokio::test]
    async fn test_rollback_discards_work() {
        let mut t = transport().await;
        t.begin().await.unwrap();
        t.update("INSERT INTO user(name) VALUES ('x')", &Params::None)
            .await
            .unwrap();
        t.rollback().await.unwrap();
        let rows = t.query("SELECT * FROM user", &Params::None).await.unwrap();
        assert!(rows.is_empty());

        let err = t.commit().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Database);
    }
}
