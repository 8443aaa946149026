#![cfg(feature = "sqlite")]

mod common;

use common::init_logger;
use usql::pool_manager::PoolManager;
use usql::udbc::pool::Pool;
use usql::udbc::sqlite::SqlitePool;
use usql::{DbError, ErrorKind, U};

fn sqlite(name: &str) -> SqlitePool {
    SqlitePool::new("sqlite::memory:").name(name).build().unwrap()
}

#[tokio::test]
async fn test_connect_by_name() {
    init_logger();
    let manager = PoolManager::new();
    manager.register(sqlite("default")).unwrap();
    manager.register(sqlite("reports")).unwrap();

    let conn = manager.connect().await.unwrap();
    assert_eq!(conn.pool_name(), "default");
    conn.close().await.unwrap();

    let conn = manager.connect_by_name("reports").await.unwrap();
    assert_eq!(conn.pool_name(), "reports");
    let row = conn.query_single("SELECT 40 + 2").await.unwrap();
    assert_eq!(row.unwrap()[0].as_i64(), Some(42));
    conn.close().await.unwrap();

    assert_eq!(manager.pool("reports").unwrap().r#type(), "sqlite");
}

#[tokio::test]
async fn test_duplicate_and_unknown_names() {
    init_logger();
    let manager = PoolManager::new();
    manager.register(sqlite("main")).unwrap();

    let dup = manager.register(sqlite("main")).unwrap_err();
    assert!(matches!(dup, DbError::Driver(ref m) if m.contains("main")));

    let missing = manager.connect_by_name("nowhere").await.err().unwrap();
    assert_eq!(missing.kind(), ErrorKind::Driver);
    // Nothing registered under the default name here.
    assert!(manager.connect().await.is_err());
}

#[tokio::test]
async fn test_close_unregisters_pool() {
    init_logger();
    let manager = PoolManager::new();
    manager.register(sqlite("temp")).unwrap();

    let conn = manager.connect_by_name("temp").await.unwrap();
    manager.close("temp").await.unwrap();
    assert!(manager.pool("temp").is_none());
    assert!(manager.connect_by_name("temp").await.is_err());
    assert!(manager.close("temp").await.is_err());

    // An open handle keeps working on its leased session.
    assert_eq!(conn.query_single("SELECT 1").await.unwrap().map(|r| r.len()), Some(1));
    conn.close().await.unwrap();

    // The name is free again.
    manager.register(sqlite("temp")).unwrap();
}

#[tokio::test]
async fn test_global_registry() {
    init_logger();
    U.register(sqlite("global_registry_test")).unwrap();
    let conn = U.connect_by_name("global_registry_test").await.unwrap();
    conn.execute("CREATE TABLE t (id INTEGER)").await.unwrap();
    conn.close().await.unwrap();
    U.close("global_registry_test").await.unwrap();
}
