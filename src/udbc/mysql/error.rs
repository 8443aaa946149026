use crate::error::DbError;
use mysql_async::Error as MyError;

// Server error codes, see the MySQL "Server Error Message Reference".
const ER_PARSE_ERROR: u16 = 1064;
const ER_NO_SUCH_TABLE: u16 = 1146;
const ER_BAD_FIELD_ERROR: u16 = 1054;
const ER_DUP_ENTRY: u16 = 1062;
const ER_BAD_NULL_ERROR: u16 = 1048;
const ER_ROW_IS_REFERENCED_2: u16 = 1451;
const ER_NO_REFERENCED_ROW_2: u16 = 1452;
const ER_CHECK_CONSTRAINT_VIOLATED: u16 = 3819;
const ER_LOCK_WAIT_TIMEOUT: u16 = 1205;
const ER_QUERY_TIMEOUT: u16 = 3024;
const ER_LOCK_DEADLOCK: u16 = 1213;

/// InnoDB rolls back the whole transaction when it picks a deadlock victim;
/// a lost session takes the transaction with it.
pub(crate) fn ends_transaction(e: &MyError) -> bool {
    match e {
        MyError::Server(server) => server.code == ER_LOCK_DEADLOCK,
        MyError::Io(_) => true,
        _ => false,
    }
}

impl From<MyError> for DbError {
    fn from(e: MyError) -> Self {
        match e {
            MyError::Server(ref server) => {
                let msg = e.to_string();
                match server.code {
                    ER_PARSE_ERROR | ER_NO_SUCH_TABLE | ER_BAD_FIELD_ERROR => {
                        DbError::SyntaxError(msg)
                    }
                    ER_DUP_ENTRY
                    | ER_BAD_NULL_ERROR
                    | ER_ROW_IS_REFERENCED_2
                    | ER_NO_REFERENCED_ROW_2
                    | ER_CHECK_CONSTRAINT_VIOLATED => DbError::ConstraintViolation(msg),
                    ER_LOCK_WAIT_TIMEOUT | ER_QUERY_TIMEOUT => DbError::Timeout(msg),
                    _ => DbError::Database(msg),
                }
            }
            MyError::Io(_) => DbError::ConnectionLost(e.to_string()),
            MyError::Url(_) => DbError::InvalidUrl(e.to_string()),
            MyError::Driver(_) => DbError::Driver(e.to_string()),
            _ => DbError::Database(e.to_string()),
        }
    }
}
