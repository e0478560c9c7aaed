use std::io::{Read, Write};

use log::debug;

use super::{Connection, Reply, unexpected_reply};
use crate::{Result, protocol::Request};

/// Where the session stands with respect to its single transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransactionState {
    #[default]
    Idle,
    Active,
    Committing,
    RollingBack,
}

impl TransactionState {
    pub fn is_active(self) -> bool {
        self != TransactionState::Idle
    }
}

impl<S: Read + Write> Connection<S> {
    pub fn transaction_state(&self) -> TransactionState {
        self.transaction
    }

    pub fn in_transaction(&self) -> bool {
        self.transaction.is_active()
    }

    /// Start a transaction. Does nothing when one is already open.
    pub fn begin(&mut self) -> Result<()> {
        if self.in_transaction() {
            debug!("begin ignored, transaction already active");
            return Ok(());
        }

        self.messages.clear();
        match self.round_trip(&Request::BeginTransaction)? {
            Reply::Done => {
                debug!("transaction started");
                Ok(())
            }
            other => Err(unexpected_reply(&other)),
        }
    }

    /// Commit the open transaction. The session is idle afterwards whatever
    /// the server answers.
    pub fn commit(&mut self) -> Result<bool> {
        self.finish(TransactionState::Committing, &Request::CommitTransaction)
    }

    /// Roll back the open transaction. The session is idle afterwards whatever
    /// the server answers.
    pub fn rollback(&mut self) -> Result<bool> {
        self.finish(TransactionState::RollingBack, &Request::RollbackTransaction)
    }

    fn finish(&mut self, state: TransactionState, request: &Request<'_>) -> Result<bool> {
        self.messages.clear();
        self.transaction = state;

        let reply = self.round_trip(request);
        self.transaction = TransactionState::Idle;
        debug!("transaction ended by {}", request.code());

        match reply? {
            Reply::Done => Ok(true),
            other => Err(unexpected_reply(&other)),
        }
    }
}
