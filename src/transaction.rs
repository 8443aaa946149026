use crate::Result;
use crate::error::DbError;

/// Transaction mode of a connection handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TxMode {
    /// Every command is its own transaction.
    #[default]
    AutoCommit,
    /// Commands accumulate until `commit` or `rollback`.
    InTransaction,
}

/// What has to reach the backend for a requested auto-commit change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AutoCommitStep {
    /// Requested mode is the current one.
    Unchanged,
    /// Flip the flag, nothing to send.
    Switch,
    /// Commit the open backend transaction, then flip the flag.
    CommitThenSwitch,
}

/// Per-handle transaction bookkeeping.
///
/// In manual mode the backend transaction is begun lazily, right before the
/// first command, so `active` tracks whether a `BEGIN` has actually been sent.
#[derive(Debug, Clone, Default)]
pub(crate) struct TxState {
    mode: TxMode,
    active: bool,
}

impl TxState {
    pub fn mode(&self) -> TxMode {
        self.mode
    }

    /// Whether a backend transaction is open.
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn plan_auto_commit(&self, enabled: bool) -> AutoCommitStep {
        match (self.mode, enabled) {
            (TxMode::AutoCommit, true) | (TxMode::InTransaction, false) => {
                AutoCommitStep::Unchanged
            }
            (TxMode::AutoCommit, false) => AutoCommitStep::Switch,
            (TxMode::InTransaction, true) if self.active => AutoCommitStep::CommitThenSwitch,
            (TxMode::InTransaction, true) => AutoCommitStep::Switch,
        }
    }

    /// Applies a planned change once the backend part (if any) succeeded.
    pub fn apply_auto_commit(&mut self, enabled: bool) {
        self.mode = if enabled {
            TxMode::AutoCommit
        } else {
            TxMode::InTransaction
        };
        if enabled {
            self.active = false;
        }
    }

    /// Commit and rollback are only meaningful in manual mode.
    pub fn require_manual(&self) -> Result<()> {
        match self.mode {
            TxMode::AutoCommit => Err(DbError::NoActiveTransaction),
            TxMode::InTransaction => Ok(()),
        }
    }

    pub fn needs_begin(&self) -> bool {
        self.mode == TxMode::InTransaction && !self.active
    }

    pub fn begun(&mut self) {
        self.active = true;
    }

    /// The backend transaction was committed or rolled back; manual mode stays.
    pub fn ended(&mut self) {
        self.active = false;
    }
}
