//! Pipes
//!
//! A pipe is the transport a contract manager uses to reach a chain on
//! behalf of one account. [`DevPipe`] talks to the in-process [`Db`].
//!
//! [`Db`]: crate::chain::Db

pub mod dev;

use crate::chain::ChainError;
use crate::contract::ExecutionResult;
use crate::crypto::KeyError;
use async_trait::async_trait;
use thiserror::Error;

pub use dev::DevPipe;

/// Pipe errors
#[derive(Error, Debug)]
pub enum PipeError {
    #[error("Account {0} is not registered on this chain")]
    UnknownAccount(String),
    #[error("Signing failed: {0}")]
    Signing(#[from] KeyError),
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error("Chain returned no {0} in the receipt")]
    MissingReceiptField(&'static str),
}

/// Transport to a chain, bound to one account
#[async_trait]
pub trait Pipe: Send + Sync {
    /// Address requests are sent from
    fn account(&self) -> &str;

    /// Deploy code and return the new contract address
    async fn deploy(&self, code: Vec<u8>) -> Result<String, PipeError>;

    /// State-changing call
    async fn transact(
        &self,
        address: &str,
        args: Vec<u64>,
        gas_limit: Option<u64>,
    ) -> Result<ExecutionResult, PipeError>;

    /// Read-only call; nothing is committed
    async fn call(
        &self,
        address: &str,
        args: Vec<u64>,
        gas_limit: Option<u64>,
    ) -> Result<ExecutionResult, PipeError>;

    async fn code_at(&self, address: &str) -> Result<Option<Vec<u8>>, PipeError>;
}
