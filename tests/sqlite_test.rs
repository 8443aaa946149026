#![cfg(feature = "sqlite")]

mod common;

use common::init_logger;
use std::sync::Arc;
use usql::udbc::ConnectionOptions;
use usql::udbc::params::Params;
use usql::udbc::pool::Pool;
use usql::udbc::sqlite::SqlitePool;
use usql::udbc::value::Value;
use usql::{DbError, ErrorKind, SqlConnection, TxMode, params};

/// A single-session pool, so every handle sees the same in-memory database.
fn memory_pool() -> Arc<SqlitePool> {
    let options = ConnectionOptions {
        max_open_conns: 1,
        max_idle_conns: 1,
        timeout: 5,
        ..Default::default()
    };
    Arc::new(
        SqlitePool::new("sqlite::memory:")
            .options(options)
            .build()
            .unwrap(),
    )
}

async fn open_with_table(pool: &Arc<SqlitePool>) -> SqlConnection {
    let conn = SqlConnection::open(pool.clone()).await.unwrap();
    conn.execute("CREATE TABLE IF NOT EXISTS users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)")
        .await
        .unwrap();
    conn
}

async fn count_users(conn: &SqlConnection) -> i64 {
    let row = conn
        .query_single("SELECT COUNT(*) FROM users")
        .await
        .unwrap()
        .unwrap();
    row[0].as_i64().unwrap()
}

#[tokio::test]
async fn test_insert_then_select_by_key() {
    init_logger();
    let pool = memory_pool();
    let conn = open_with_table(&pool).await;

    let inserted = conn
        .update_with_params("INSERT INTO users (id, name) VALUES (?, ?)", params![1i64, "a"])
        .await
        .unwrap();
    assert_eq!(inserted.updated, 1);

    let rows = conn
        .query_with_params("SELECT id, name FROM users WHERE id = ?", params![1i64])
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    let row = rows.row(0).unwrap();
    assert_eq!(row.get_as::<i64>("id").unwrap(), 1);
    assert_eq!(row.get_as::<String>("name").unwrap(), "a");

    // Any serializable tuple works as a parameter list.
    let args = Params::from_serialize(&(2i64, "b")).unwrap();
    conn.update_with_params("INSERT INTO users (id, name) VALUES (?, ?)", args)
        .await
        .unwrap();
    let rows = conn
        .query_with_params(
            "SELECT name FROM users WHERE id = ?",
            Params::encode(Some([2i64])),
        )
        .await
        .unwrap();
    assert_eq!(rows.column::<String>("name").unwrap(), vec!["b"]);
    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_generated_keys() {
    init_logger();
    let pool = memory_pool();
    let conn = open_with_table(&pool).await;

    let first = conn
        .update_with_params("INSERT INTO users (name) VALUES (?)", params!["x"])
        .await
        .unwrap();
    let second = conn
        .update_with_params("INSERT INTO users (name) VALUES (?)", params!["y"])
        .await
        .unwrap();
    assert_eq!(first.keys, vec![Value::I64(1)]);
    assert_eq!(second.keys, vec![Value::I64(2)]);

    let changed = conn
        .update_with_params("UPDATE users SET name = ? WHERE id > ?", params!["z", 0i64])
        .await
        .unwrap();
    assert_eq!(changed.updated, 2);
    assert!(changed.keys.is_empty());
}

#[tokio::test]
async fn test_absent_and_empty_params_agree() {
    init_logger();
    let pool = memory_pool();
    let conn = open_with_table(&pool).await;

    let none = conn.query("SELECT 1 AS one").await.unwrap();
    let empty = conn
        .query_with_params("SELECT 1 AS one", Vec::<Value>::new())
        .await
        .unwrap();
    let absent = conn
        .query_with_params("SELECT 1 AS one", Params::encode(None::<Vec<i64>>))
        .await
        .unwrap();
    assert_eq!(none.results(), empty.results());
    assert_eq!(none.results(), absent.results());
    assert_eq!(none.column_names(), ["one"]);
}

#[tokio::test]
async fn test_statement_errors_are_classified() {
    init_logger();
    let pool = memory_pool();
    let conn = open_with_table(&pool).await;
    conn.update_with_params("INSERT INTO users (id, name) VALUES (?, ?)", params![1i64, "a"])
        .await
        .unwrap();

    let syntax = conn.query("SELEC * FROM users").await.unwrap_err();
    assert_eq!(syntax.kind(), ErrorKind::SyntaxError);

    let duplicate = conn
        .update_with_params("INSERT INTO users (id, name) VALUES (?, ?)", params![1i64, "b"])
        .await
        .unwrap_err();
    assert_eq!(duplicate.kind(), ErrorKind::ConstraintViolation);

    let missing = conn
        .update_with_params("INSERT INTO users (id, name) VALUES (?, ?)", params![2i64, None::<String>])
        .await
        .unwrap_err();
    assert_eq!(missing.kind(), ErrorKind::ConstraintViolation);

    // None of those close the handle.
    assert_eq!(count_users(&conn).await, 1);
}

#[tokio::test]
async fn test_commit_persists_and_close_discards() {
    init_logger();
    let pool = memory_pool();
    let conn = open_with_table(&pool).await;

    conn.set_auto_commit(false).await.unwrap();
    conn.update_with_params("INSERT INTO users (id, name) VALUES (?, ?)", params![1i64, "kept"])
        .await
        .unwrap();
    conn.commit().await.unwrap();
    conn.update_with_params("INSERT INTO users (id, name) VALUES (?, ?)", params![2i64, "lost"])
        .await
        .unwrap();
    assert_eq!(conn.transaction_mode().await.unwrap(), TxMode::InTransaction);
    conn.close().await.unwrap();

    // The pool hands the same session back.
    let conn = SqlConnection::open(pool.clone()).await.unwrap();
    let rows = conn.query("SELECT name FROM users").await.unwrap();
    assert_eq!(rows.column::<String>("name").unwrap(), vec!["kept"]);
    conn.close().await.unwrap();
    assert_eq!(pool.idle_count(), 1);
}

#[tokio::test]
async fn test_rollback_discards_pending_work() {
    init_logger();
    let pool = memory_pool();
    let conn = open_with_table(&pool).await;

    conn.set_auto_commit(false).await.unwrap();
    conn.batch([
        "INSERT INTO users (id, name) VALUES (1, 'a')",
        "INSERT INTO users (id, name) VALUES (2, 'b')",
    ])
    .await
    .unwrap();
    assert_eq!(count_users(&conn).await, 2);
    conn.rollback().await.unwrap();
    assert_eq!(count_users(&conn).await, 0);

    // Switching back commits whatever the reads began.
    conn.set_auto_commit(true).await.unwrap();
    assert_eq!(conn.commit().await, Err(DbError::NoActiveTransaction));
}

#[tokio::test]
async fn test_deferred_constraint_fails_commit() {
    init_logger();
    let pool = memory_pool();
    let conn = SqlConnection::open(pool.clone()).await.unwrap();
    conn.batch([
        "CREATE TABLE parent (id INTEGER PRIMARY KEY)",
        "CREATE TABLE child (id INTEGER PRIMARY KEY, parent_id INTEGER \
         REFERENCES parent(id) DEFERRABLE INITIALLY DEFERRED)",
    ])
    .await
    .unwrap();

    conn.set_auto_commit(false).await.unwrap();
    conn.update("INSERT INTO child (id, parent_id) VALUES (1, 99)")
        .await
        .unwrap();
    let err = conn.commit().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CommitFailed);

    // Still inside the failed transaction; a rollback clears it.
    assert_eq!(conn.transaction_mode().await.unwrap(), TxMode::InTransaction);
    conn.rollback().await.unwrap();
    let orphans = conn
        .query_single("SELECT COUNT(*) FROM child")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(orphans, vec![Value::I64(0)]);
}

#[tokio::test]
async fn test_conflict_rollback_leaves_handle_usable() {
    init_logger();
    let pool = memory_pool();
    let conn = SqlConnection::open(pool.clone()).await.unwrap();
    conn.execute("CREATE TABLE tags (id INTEGER PRIMARY KEY ON CONFLICT ROLLBACK, label TEXT)")
        .await
        .unwrap();

    conn.set_auto_commit(false).await.unwrap();
    conn.update("INSERT INTO tags (id, label) VALUES (1, 'a')")
        .await
        .unwrap();
    let err = conn
        .update("INSERT INTO tags (id, label) VALUES (1, 'b')")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConstraintViolation);

    // SQLite already rolled the whole transaction back.
    assert_eq!(conn.transaction_mode().await.unwrap(), TxMode::InTransaction);
    conn.rollback().await.unwrap();
    conn.commit().await.unwrap();

    conn.update("INSERT INTO tags (id, label) VALUES (2, 'c')")
        .await
        .unwrap();
    conn.set_auto_commit(true).await.unwrap();
    let labels = conn.query("SELECT label FROM tags").await.unwrap();
    assert_eq!(labels.column::<String>("label").unwrap(), vec!["c"]);
    conn.close().await.unwrap();
    assert_eq!(pool.idle_count(), 1);
}

#[tokio::test]
async fn test_batch_with_params_reports_counts() {
    init_logger();
    let pool = memory_pool();
    let conn = open_with_table(&pool).await;

    let counts = conn
        .batch_with_params(
            "INSERT INTO users (id, name) VALUES (?, ?)",
            [params![1i64, "a"], params![2i64, "b"], params![3i64, "c"]],
        )
        .await
        .unwrap();
    assert_eq!(counts, vec![1, 1, 1]);

    let counts = conn
        .batch(["DELETE FROM users WHERE id < 3", "DELETE FROM users WHERE id = 42"])
        .await
        .unwrap();
    assert_eq!(counts, vec![2, 0]);

    let missing = conn
        .query_single_with_params("SELECT name FROM users WHERE id = ?", params![1i64])
        .await
        .unwrap();
    assert_eq!(missing, None);
    let left = conn
        .query_single_with_params("SELECT name FROM users WHERE id = ?", params![3i64])
        .await
        .unwrap();
    assert_eq!(left, Some(vec![Value::Str("c".to_string())]));
}

#[tokio::test]
async fn test_parallel_handles() {
    init_logger();
    let left = memory_pool();
    let right = memory_pool();
    let a = open_with_table(&left).await;
    let b = open_with_table(&right).await;

    let (ra, rb) = tokio::join!(
        a.batch_with_params(
            "INSERT INTO users (id, name) VALUES (?, ?)",
            (1..=50i64).map(|i| params![i, format!("a{}", i)]),
        ),
        b.batch_with_params(
            "INSERT INTO users (id, name) VALUES (?, ?)",
            (1..=20i64).map(|i| params![i, format!("b{}", i)]),
        ),
    );
    assert_eq!(ra.unwrap().len(), 50);
    assert_eq!(rb.unwrap().len(), 20);
    assert_eq!(count_users(&a).await, 50);
    assert_eq!(count_users(&b).await, 20);
}

#[tokio::test]
async fn test_closed_pool_refuses_handles() {
    init_logger();
    let pool = memory_pool();
    pool.close().await.unwrap();
    let err = SqlConnection::open(pool.clone()).await.err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Driver);
}
