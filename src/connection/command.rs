use crate::Result;
use crate::transaction::TxMode;
use crate::udbc::params::Params;
use crate::udbc::result::{ResultSet, UpdateResult};
use crate::udbc::value::Value;
use std::time::Duration;
use tokio::sync::oneshot;

/// One SQL statement and its bind parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub sql: String,
    pub params: Params,
}

impl Command {
    pub fn new(sql: impl Into<String>, params: impl Into<Params>) -> Self {
        Self {
            sql: sql.into(),
            params: params.into(),
        }
    }

    pub fn unparameterized(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Params::None,
        }
    }
}

pub(crate) type Reply<T> = oneshot::Sender<Result<T>>;

/// Work queued on a handle's dispatcher, each item carrying the sender of
/// its own completion.
pub(crate) enum Request {
    Execute {
        sql: String,
        reply: Reply<()>,
    },
    Query {
        command: Command,
        reply: Reply<ResultSet>,
    },
    QuerySingle {
        command: Command,
        reply: Reply<Option<Vec<Value>>>,
    },
    Update {
        command: Command,
        reply: Reply<UpdateResult>,
    },
    Batch {
        commands: Vec<Command>,
        reply: Reply<Vec<u64>>,
    },
    SetAutoCommit {
        enabled: bool,
        reply: Reply<()>,
    },
    Commit(Reply<()>),
    Rollback(Reply<()>),
    SetQueryTimeout {
        limit: Option<Duration>,
        reply: Reply<()>,
    },
    Mode(Reply<TxMode>),
    Close(Reply<()>),
}
