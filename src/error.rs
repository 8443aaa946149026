use thiserror::Error;

/// Failure taxonomy without payloads, for matching on what went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    AlreadyClosed,
    NoActiveTransaction,
    CommitFailed,
    SyntaxError,
    ConstraintViolation,
    ConnectionLost,
    Timeout,
    Database,
    InvalidUrl,
    Driver,
    Serialization,
    TypeMismatch,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DbError {
    #[error("Connection already closed")]
    AlreadyClosed,
    #[error("No active transaction")]
    NoActiveTransaction,
    #[error("Commit Failed: {0}")]
    CommitFailed(String),
    #[error("SQL Syntax Error: {0}")]
    SyntaxError(String),
    #[error("Constraint Violation: {0}")]
    ConstraintViolation(String),
    #[error("Connection Lost: {0}")]
    ConnectionLost(String),
    #[error("Timeout: {0}")]
    Timeout(String),
    #[error("Database Error: {0}")]
    Database(String),
    #[error("Invalid Database Url: {0}")]
    InvalidUrl(String),
    #[error("Driver Error: {0}")]
    Driver(String),
    #[error("Serialization Error: {0}")]
    Serialization(String),
    #[error("Type Mismatch: {0}")]
    TypeMismatch(String),
}

impl DbError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::AlreadyClosed => ErrorKind::AlreadyClosed,
            DbError::NoActiveTransaction => ErrorKind::NoActiveTransaction,
            DbError::CommitFailed(_) => ErrorKind::CommitFailed,
            DbError::SyntaxError(_) => ErrorKind::SyntaxError,
            DbError::ConstraintViolation(_) => ErrorKind::ConstraintViolation,
            DbError::ConnectionLost(_) => ErrorKind::ConnectionLost,
            DbError::Timeout(_) => ErrorKind::Timeout,
            DbError::Database(_) => ErrorKind::Database,
            DbError::InvalidUrl(_) => ErrorKind::InvalidUrl,
            DbError::Driver(_) => ErrorKind::Driver,
            DbError::Serialization(_) => ErrorKind::Serialization,
            DbError::TypeMismatch(_) => ErrorKind::TypeMismatch,
        }
    }

    /// Whether the session that produced this error is gone and must be
    /// discarded instead of being handed back to the pool.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DbError::ConnectionLost(_))
    }
}

impl serde::ser::Error for DbError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        DbError::Serialization(msg.to_string())
    }
}
