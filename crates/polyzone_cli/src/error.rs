//! CLI error handling.
//!
//! Setup failures (configuration, logging, database, input files) are
//! reported on stderr with exit code 2. Registry failures are rendered as
//! JSON envelopes on stdout with exit code 1.

use polyzone_core::db::DbError;
use polyzone_core::{ConfigError, LoggingError};
use std::fmt;
use std::path::PathBuf;
use std::process;

#[derive(Debug)]
pub enum CliError {
    Config(ConfigError),
    LoggingInit(LoggingError),
    Database(DbError),
    ReadInput { path: Option<PathBuf>, error: std::io::Error },
    ParseInput(serde_json::Error),
}

impl CliError {
    /// Exit the process with the error message and setup exit code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {self}");
        if let CliError::Database(err) = self {
            if err.is_retryable() {
                eprintln!("The database is locked by another writer; retry shortly.");
            }
        }
        process::exit(2)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(err) => write!(f, "invalid configuration: {err}"),
            CliError::LoggingInit(err) => write!(f, "failed to initialize logging: {err}"),
            CliError::Database(err) => write!(f, "failed to open database: {err}"),
            CliError::ReadInput {
                path: Some(path),
                error,
            } => write!(f, "failed to read `{}`: {error}", path.display()),
            CliError::ReadInput { path: None, error } => {
                write!(f, "failed to read stdin: {error}")
            }
            CliError::ParseInput(err) => write!(f, "input is not valid JSON: {err}"),
        }
    }
}

impl std::error::Error for CliError {}
