//! Driver errors.
//!
//! Failures are grouped the way a database client reports them: interface
//! problems (the socket, unexpected messages), handshake failures, bad
//! queries, and errors the server reports while running a request. Transport
//! faults are wrapped from the framer unchanged.
use std::{io, path::PathBuf};

use thiserror::Error;

use crate::protocol::{Diagnostic, TransportError};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Socket setup failed or the server sent something out of turn.
    #[error("interface error: {0}")]
    Interface(String),

    #[error("authentication failed: {0}")]
    Authentication(Diagnostic),

    /// The server refused the session for a reason other than credentials.
    #[error("operational error: {0}")]
    Operational(Diagnostic),

    /// The query was rejected or the driver was used incorrectly.
    #[error("programming error: {0}")]
    Programming(String),

    /// Server-reported failure. `message` joins every diagnostic line
    /// collected while running the request.
    #[error("database error: {message}")]
    Database { code: Option<u32>, message: String },

    #[error("failed to begin transaction: {0}")]
    TransactionBeginFailed(Diagnostic),

    #[error("failed to commit transaction: {0}")]
    TransactionFailed(Diagnostic),

    #[error("failed to roll back transaction: {0}")]
    RollbackFailed(Diagnostic),

    #[error("failed to read bulk-load source '{path}': {source}")]
    BulkLoadSource { path: PathBuf, source: io::Error },

    #[error("server item is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("connection is closed")]
    ConnectionClosed,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl Error {
    pub(crate) fn database(diagnostic: &Diagnostic) -> Self {
        Error::Database {
            code: diagnostic.code,
            message: diagnostic.to_string(),
        }
    }

    /// Whether the session is unusable after this error.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Transport(err) => err.is_fatal(),
            Error::ConnectionClosed | Error::Authentication(_) | Error::Operational(_) => true,
            _ => false,
        }
    }
}
