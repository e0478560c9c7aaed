pub mod cli;
pub mod command;
pub mod config;
pub mod connection;
pub mod error;
pub mod protocol;

pub use cli::{PromptError, prompt};
pub use command::{Command, CommandError};
pub use config::{ConfigError, ConnectionConfig};
pub use connection::{
    Connection, DebugHandler, QueryResult, ResultKind, SharedConnection, TransactionState,
};
pub use error::{Error, Result};
pub use protocol::{Diagnostic, ResultFormat};
