//! Harness error type

use crate::harness::FixtureError;
use crate::manager::{CallError, DeploymentError};
use crate::pipe::PipeError;
use thiserror::Error;

/// Errors surfaced by the compile adapter and the test vectors
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Compilation failed:\n{}", .0.join("\n"))]
    Compilation(Vec<String>),
    #[error("Contract {0} not found in compiler output")]
    Lookup(String),
    #[error("Invalid ABI: {0}")]
    AbiParse(#[source] serde_json::Error),
    #[error("Invalid bytecode: {0}")]
    InvalidBytecode(#[from] hex::FromHexError),
    #[error("Deployment failed: {0}")]
    Deployment(#[from] DeploymentError),
    #[error(transparent)]
    Call(#[from] CallError),
    #[error(transparent)]
    Pipe(#[from] PipeError),
    #[error("Vector used before its setup completed")]
    NotConfigured,
    #[error("Vector already holds a contract manager")]
    AlreadyConfigured,
    #[error("Case not run: vector setup did not complete")]
    SetupIncomplete,
    #[error(transparent)]
    Fixture(#[from] FixtureError),
    #[error("Compiler task failed: {0}")]
    CompilerTask(#[from] tokio::task::JoinError),
    #[error("{0}")]
    Failed(String),
}

impl HarnessError {
    /// Diagnostics of a failed compilation, empty otherwise
    pub fn diagnostics(&self) -> &[String] {
        match self {
            HarnessError::Compilation(errors) => errors.as_slice(),
            _ => &[],
        }
    }
}

pub type HarnessResult<T> = Result<T, HarnessError>;

/// Fail the current case with `message` unless `condition` holds
pub fn ensure(condition: bool, message: impl Into<String>) -> HarnessResult<()> {
    if condition {
        Ok(())
    } else {
        Err(HarnessError::Failed(message.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compilation_lists_every_diagnostic() {
        let err = HarnessError::Compilation(vec!["1:1: a".into(), "2:1: b".into()]);
        assert_eq!(err.to_string(), "Compilation failed:\n1:1: a\n2:1: b");
        assert_eq!(err.diagnostics().len(), 2);
        assert!(HarnessError::NotConfigured.diagnostics().is_empty());
    }

    #[test]
    fn test_ensure() {
        assert!(ensure(true, "unused").is_ok());
        assert!(matches!(
            ensure(false, "balance mismatch"),
            Err(HarnessError::Failed(msg)) if msg == "balance mismatch"
        ));
    }
}
