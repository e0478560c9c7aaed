//! Shell commands.
//!
//! This module defines the [`Command`] enum, the lines a user can type at the
//! `sedna-shell` prompt. Lines starting with a dot are shell commands; any
//! other non-empty line is sent to the server as a query.
//!
//! # Example
//! ```rust
//! use sedna::Command;
//!
//! let cmd: Command = ".load books.xml books".try_into().unwrap();
//! assert_eq!(
//!     cmd,
//!     Command::Load {
//!         path: "books.xml".into(),
//!         document: "books".to_string(),
//!         collection: None,
//!     }
//! );
//! ```
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("unrecognized command '{0}'")]
    UnrecognizedCommand(String),

    #[error("invalid '{command}' command, {reason}")]
    InvalidCommandArguments { command: String, reason: String },

    #[error("no command provided")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// XQuery or update statement for the server.
    Query(String),
    /// Close the session and leave the shell.
    Exit,
    Begin,
    Commit,
    Rollback,
    Documents,
    Collections,
    Modules,
    Indexes,
    /// Upload a local file as a document.
    Load {
        path: PathBuf,
        document: String,
        collection: Option<String>,
    },
    Trace(bool),
    Debug(bool),
    /// Print the server time of the last query.
    Time,
}

fn switch(command: &str, args: &[&str]) -> Result<bool, CommandError> {
    match args {
        ["on"] => Ok(true),
        ["off"] => Ok(false),
        _ => Err(CommandError::InvalidCommandArguments {
            command: command.to_string(),
            reason: format!("expected 'on' or 'off'. Example: {command} on"),
        }),
    }
}

impl TryFrom<&str> for Command {
    type Error = CommandError;

    fn try_from(line: &str) -> Result<Self, Self::Error> {
        let line = line.trim();
        if line.is_empty() {
            return Err(CommandError::Empty);
        }
        if !line.starts_with('.') {
            return Ok(Command::Query(line.to_string()));
        }

        let parts = line.split_whitespace().collect::<Vec<&str>>();
        let (name, args) = (parts[0], &parts[1..]);
        let no_args = |command: Command| {
            if args.is_empty() {
                Ok(command)
            } else {
                Err(CommandError::InvalidCommandArguments {
                    command: name.to_string(),
                    reason: "takes no arguments".to_string(),
                })
            }
        };

        match name {
            ".exit" => no_args(Command::Exit),
            ".begin" => no_args(Command::Begin),
            ".commit" => no_args(Command::Commit),
            ".rollback" => no_args(Command::Rollback),
            ".documents" => no_args(Command::Documents),
            ".collections" => no_args(Command::Collections),
            ".modules" => no_args(Command::Modules),
            ".indexes" => no_args(Command::Indexes),
            ".time" => no_args(Command::Time),
            ".trace" => switch(name, args).map(Command::Trace),
            ".debug" => switch(name, args).map(Command::Debug),
            ".load" => match args {
                [path, document] | [path, document, _] => Ok(Command::Load {
                    path: PathBuf::from(path),
                    document: document.to_string(),
                    collection: args.get(2).map(|c| c.to_string()),
                }),
                _ => Err(CommandError::InvalidCommandArguments {
                    command: name.to_string(),
                    reason: "requires a file and a document name. Example: .load books.xml books"
                        .to_string(),
                }),
            },
            _ => Err(CommandError::UnrecognizedCommand(name.to_string())),
        }
    }
}
