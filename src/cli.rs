//! Prompt utilities for `sedna-shell`.
use std::io::{self, BufRead, Write};

use thiserror::Error;

use crate::{Command, CommandError};

#[derive(Debug, Error)]
pub enum PromptError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("terminal error: {0}")]
    Io(#[from] io::Error),

    /// Input closed.
    #[error("end of input")]
    Eof,
}

/// Prompt the user for the next shell command.
pub fn prompt<R, W>(mut reader: R, mut writer: W) -> Result<Command, PromptError>
where
    R: BufRead,
    W: Write,
{
    let mut s = String::default();
    write!(&mut writer, "sedna> ")?;
    writer.flush()?;

    if reader.read_line(&mut s)? == 0 {
        return Err(PromptError::Eof);
    }
    Ok(Command::try_from(s.as_str())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_prints_correctly() {
        let input = b".exit\n";
        let mut output = Vec::new();

        prompt(&input[..], &mut output).unwrap();

        let output = String::from_utf8(output).expect("not valid UTF-8");
        assert_eq!("sedna> ", output);
    }

    #[test]
    fn prompt_handles_queries() {
        let input = b"count(doc('auction')//item)\n";
        let mut output = Vec::new();

        let res = prompt(&input[..], &mut output).unwrap();
        assert_eq!(
            Command::Query("count(doc('auction')//item)".to_string()),
            res
        );
    }

    #[test]
    fn prompt_unrecognized_command() {
        let input = b".something_wrong\n";
        let mut output = Vec::new();

        let err = prompt(&input[..], &mut output).unwrap_err();
        assert_eq!(err.to_string(), "unrecognized command '.something_wrong'");
    }

    #[test]
    fn prompt_end_of_input() {
        let mut output = Vec::new();

        assert!(matches!(prompt(&b""[..], &mut output), Err(PromptError::Eof)));
    }
}
