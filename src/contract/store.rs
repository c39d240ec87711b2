//! Deployed contract registry
//!
//! Owns contract code and committed storage, derives addresses and runs
//! calls through the VM.

use crate::contract::opcodes::OpCode;
use crate::contract::vm::{ExecutionContext, ExecutionResult, VmError, VM};
use crate::crypto::hash::sha256_hex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Contract errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractError {
    #[error("Contract not found: {0}")]
    NotFound(String),
    #[error("Contract already exists: {0}")]
    AlreadyExists(String),
    #[error("VM error: {0}")]
    Vm(#[from] VmError),
    #[error("Invalid bytecode: {0}")]
    InvalidBytecode(String),
}

/// A deployed contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub address: String,
    pub code: Vec<u8>,
    pub storage: BTreeMap<u64, u64>,
    pub deployer: String,
    pub deployed_at: u64,
}

impl Contract {
    pub fn new(address: String, code: Vec<u8>, deployer: String, block_number: u64) -> Self {
        Self {
            address,
            code,
            storage: BTreeMap::new(),
            deployer,
            deployed_at: block_number,
        }
    }

    /// Run against committed storage without mutating it
    pub fn simulate(&self, context: ExecutionContext) -> Result<ExecutionResult, VmError> {
        VM::new(&self.code, &self.storage, context).execute()
    }

    /// Run and commit storage writes on success
    pub fn execute(&mut self, context: ExecutionContext) -> Result<ExecutionResult, VmError> {
        let result = self.simulate(context)?;
        self.storage.extend(&result.storage_changes);
        Ok(result)
    }
}

/// All contracts deployed on one chain
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContractStore {
    contracts: BTreeMap<String, Contract>,
    nonce: u64,
}

impl ContractStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register new code and return its address
    pub fn deploy(
        &mut self,
        code: Vec<u8>,
        deployer: &str,
        block_number: u64,
    ) -> Result<String, ContractError> {
        validate_code(&code)?;

        let address = self.generate_address(deployer);
        self.nonce += 1;

        if self.contracts.contains_key(&address) {
            return Err(ContractError::AlreadyExists(address));
        }

        let contract = Contract::new(address.clone(), code, deployer.to_string(), block_number);
        self.contracts.insert(address.clone(), contract);

        log::info!("Contract deployed at {} by {}", address, deployer);
        Ok(address)
    }

    /// Execute and commit
    pub fn execute(
        &mut self,
        address: &str,
        context: ExecutionContext,
    ) -> Result<ExecutionResult, ContractError> {
        let contract = self
            .contracts
            .get_mut(address)
            .ok_or_else(|| ContractError::NotFound(address.to_string()))?;
        Ok(contract.execute(context)?)
    }

    /// Execute without committing
    pub fn simulate(
        &self,
        address: &str,
        context: ExecutionContext,
    ) -> Result<ExecutionResult, ContractError> {
        let contract = self
            .get(address)
            .ok_or_else(|| ContractError::NotFound(address.to_string()))?;
        Ok(contract.simulate(context)?)
    }

    pub fn get(&self, address: &str) -> Option<&Contract> {
        self.contracts.get(address)
    }

    pub fn list(&self) -> Vec<String> {
        self.contracts.keys().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.contracts.len()
    }

    /// `0x` + first 40 hex chars of sha256("deployer:nonce")
    fn generate_address(&self, deployer: &str) -> String {
        let hex = sha256_hex(format!("{}:{}", deployer, self.nonce).as_bytes());
        format!("0x{}", &hex[..40])
    }
}

/// Reject empty code and code that starts with an unknown opcode
fn validate_code(code: &[u8]) -> Result<(), ContractError> {
    match code.first() {
        None => Err(ContractError::InvalidBytecode("empty code".to_string())),
        Some(byte) if OpCode::from_byte(*byte).is_none() => Err(ContractError::InvalidBytecode(
            format!("unknown leading opcode 0x{:02x}", byte),
        )),
        Some(_) => Ok(()),
    }
}
