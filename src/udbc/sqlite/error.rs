use crate::error::DbError;
use rusqlite::ErrorCode;

// SQLite reports most statement problems as a generic SQLITE_ERROR, so the
// message is the only thing that tells a malformed statement apart.
const SYNTAX_MARKERS: [&str; 5] = [
    "syntax error",
    "incomplete input",
    "unrecognized token",
    "no such table",
    "no such column",
];

impl From<rusqlite::Error> for DbError {
    fn from(e: rusqlite::Error) -> Self {
        let msg = e.to_string();
        match e.sqlite_error_code() {
            Some(ErrorCode::ConstraintViolation) => DbError::ConstraintViolation(msg),
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => DbError::Timeout(msg),
            Some(
                ErrorCode::CannotOpen
                | ErrorCode::SystemIoFailure
                | ErrorCode::NotADatabase
                | ErrorCode::DatabaseCorrupt,
            ) => DbError::ConnectionLost(msg),
            _ if SYNTAX_MARKERS.iter().any(|m| msg.contains(m)) => DbError::SyntaxError(msg),
            _ => DbError::Database(msg),
        }
    }
}
