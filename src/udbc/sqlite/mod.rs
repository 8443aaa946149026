pub mod connection;
pub mod error;
pub mod pool;
pub mod value_codec;

pub use connection::SqliteTransport;
pub use pool::SqlitePool;
