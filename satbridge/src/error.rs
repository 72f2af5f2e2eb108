//! Error taxonomy of the front end.
use std::io;

use thiserror::Error;

use satbridge_dimacs::{ParserError, ReadError};
use satbridge_formula::FormatError;

/// Possible errors of the front end.
///
/// An unsatisfiable formula is never an error. Nothing is retried, every error is reported to the
/// caller at the point where it was detected, after any spawned process was reaped.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed literal or clause passed to `add`, `assume` or `read`.
    #[error("Malformed formula input: {0}")]
    Format(#[from] FormatError),
    /// Malformed DIMACS text passed to `read`.
    #[error("Malformed DIMACS input: {0}")]
    Dimacs(#[from] ParserError),
    /// A backend exited with a status outside of its contract.
    #[error(
        "Backend '{}' exited with unexpected status {}",
        program,
        status.map_or_else(|| "(killed by signal)".to_owned(), |code| code.to_string())
    )]
    Backend {
        program: String,
        status: Option<i32>,
        output: String,
    },
    /// A backend's output did not contain the expected result.
    #[error("Could not parse output of backend '{}': {}", program, message)]
    Parse { program: String, message: String },
    /// An argument outside of its documented range.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// An operation was called in a state where it is not defined.
    #[error("Precondition violated: {0}")]
    PreconditionViolation(&'static str),
    /// The solver returned without deciding satisfiability.
    #[error("The solver stopped without a result")]
    Interrupted,
    /// A backend could not be started.
    #[error("Could not start backend '{}': {}", program, source)]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("I/O error while talking to a backend: {0}")]
    Io(#[from] io::Error),
}

impl From<ReadError> for Error {
    fn from(err: ReadError) -> Error {
        match err {
            ReadError::Io(err) => Error::Io(err),
            ReadError::Parser(err) => Error::Dimacs(err),
            ReadError::Format(err) => Error::Format(err),
        }
    }
}

impl Error {
    pub(crate) fn parse(program: &str, message: impl Into<String>) -> Error {
        Error::Parse {
            program: program.to_owned(),
            message: message.into(),
        }
    }
}
