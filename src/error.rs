//! Errors reported to the user. None of them end the shell.

use std::io;

use thiserror::Error;

use crate::parser::ParseError;
use crate::utils::describe;

#[derive(Debug, Error)]
pub enum ShellError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A redirection target could not be opened.
    #[error("{path}: {}", describe(.source))]
    RedirectOpen { path: String, source: io::Error },

    /// No search-path directory held a program that could be started.
    #[error("{program}: {}", describe(.source))]
    Spawn { program: String, source: io::Error },

    #[error("cd: {path}: {}", describe(.source))]
    Cd { path: String, source: io::Error },

    #[error("cd: HOME not set")]
    NoHome,

    #[error("{0}: too many arguments")]
    TooManyArgs(String),

    #[error("{}", describe(.0))]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, ShellError>;
