pub mod connection;
pub mod error;
pub mod pool_manager;
pub mod transaction;
pub mod udbc;

pub type Result<T> = std::result::Result<T, error::DbError>;

pub use connection::{Completion, SqlConnection};
pub use error::{DbError, ErrorKind};
pub use pool_manager::U;
pub use transaction::TxMode;
