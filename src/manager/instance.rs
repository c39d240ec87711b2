//! Deployed contract handle

use crate::abi::{Abi, FunctionAbi};
use crate::contract::ExecutionResult;
use crate::pipe::{Pipe, PipeError};
use std::sync::Arc;
use thiserror::Error;

/// Errors from calling a contract function
#[derive(Error, Debug)]
pub enum CallError {
    #[error("Contract has no function named {0}")]
    UnknownFunction(String),
    #[error("{function} takes {expected} argument(s), {actual} given")]
    ArgumentCount {
        function: String,
        expected: usize,
        actual: usize,
    },
    #[error(transparent)]
    Pipe(#[from] PipeError),
}

/// A contract living at an address, callable through its ABI
#[derive(Clone)]
pub struct ContractInstance {
    address: String,
    abi: Arc<Abi>,
    pipe: Arc<dyn Pipe>,
}

impl std::fmt::Debug for ContractInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractInstance")
            .field("address", &self.address)
            .field("functions", &self.functions())
            .finish()
    }
}

impl ContractInstance {
    pub(crate) fn new(address: String, abi: Arc<Abi>, pipe: Arc<dyn Pipe>) -> Self {
        Self { address, abi, pipe }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn abi(&self) -> &Abi {
        &self.abi
    }

    /// Names of the callable functions, in ABI order
    pub fn functions(&self) -> Vec<&str> {
        self.abi.functions().map(|f| f.name.as_str()).collect()
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.abi.function(name).is_some()
    }

    /// Call `name`. Constant functions are evaluated without a transaction.
    pub async fn call(&self, name: &str, args: &[u64]) -> Result<Option<u64>, CallError> {
        let function = self.resolve(name, args)?;
        let call_data = call_data(function, args);

        let result = if function.constant {
            self.pipe.call(&self.address, call_data, None).await?
        } else {
            self.pipe.transact(&self.address, call_data, None).await?
        };
        Ok(result.return_value)
    }

    /// Send `name` as a transaction regardless of mutability
    pub async fn transact(
        &self,
        name: &str,
        args: &[u64],
        gas_limit: Option<u64>,
    ) -> Result<ExecutionResult, CallError> {
        let function = self.resolve(name, args)?;
        let call_data = call_data(function, args);
        Ok(self.pipe.transact(&self.address, call_data, gas_limit).await?)
    }

    fn resolve(&self, name: &str, args: &[u64]) -> Result<&FunctionAbi, CallError> {
        let function = self
            .abi
            .function(name)
            .ok_or_else(|| CallError::UnknownFunction(name.to_string()))?;
        if function.inputs.len() != args.len() {
            return Err(CallError::ArgumentCount {
                function: function.signature(),
                expected: function.inputs.len(),
                actual: args.len(),
            });
        }
        Ok(function)
    }
}

/// Selector word followed by the arguments
fn call_data(function: &FunctionAbi, args: &[u64]) -> Vec<u64> {
    std::iter::once(function.selector())
        .chain(args.iter().copied())
        .collect()
}
