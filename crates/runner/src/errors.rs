//! Runner error types
//!
//! Only conditions that halt a run live here. Scholarly API failures are
//! absorbed by the resolver and engine and never surface as `RunError`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunError {
    #[error("Output file {} already exists and no usable checkpoint is pending; delete it to re-run", output.display())]
    AlreadyComplete { output: PathBuf },

    #[error("Input dataset error for {}: {message}", path.display())]
    Input { path: PathBuf, message: String },

    #[error("Checkpoint error for {}: {message}", path.display())]
    Checkpoint { path: PathBuf, message: String },

    #[error("Output error for {}: {message}", path.display())]
    Output { path: PathBuf, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RunError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::AlreadyComplete { .. } => 2,
            _ => 1,
        }
    }

    pub(crate) fn input(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        RunError::Input {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn checkpoint(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        RunError::Checkpoint {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn output(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        RunError::Output {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

impl From<snowball_common::errors::AppError> for RunError {
    fn from(e: snowball_common::errors::AppError) -> Self {
        RunError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let done = RunError::AlreadyComplete {
            output: PathBuf::from("out.csv"),
        };
        assert_eq!(done.exit_code(), 2);
        assert!(done.to_string().contains("out.csv"));

        let io = RunError::checkpoint("ckpt.json", "disk full");
        assert_eq!(io.exit_code(), 1);
    }
}
