//! In-process development chain
//!
//! `Db` is a cheap, cloneable handle over shared chain state. Every state
//! change arrives as a [`SignedRequest`] and is checked against the sender's
//! registered key and nonce before it is applied. Each applied request
//! produces one block.

use crate::chain::account::{Account, Payload, SignedRequest};
use crate::contract::{ContractError, ContractStore, ExecutionContext, ExecutionResult};
use crate::crypto::keys::KeyError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, BufWriter};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// Chain errors
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("Unknown account: {0}")]
    UnknownAccount(String),
    #[error("Account already registered: {0}")]
    DuplicateAccount(String),
    #[error("Bad nonce for {account}: expected {expected}, got {actual}")]
    BadNonce {
        account: String,
        expected: u64,
        actual: u64,
    },
    #[error("Signature check failed for {0}")]
    InvalidSignature(String),
    #[error("Key error: {0}")]
    Key(#[from] KeyError),
    #[error("Invalid code encoding: {0}")]
    CodeEncoding(#[from] hex::FromHexError),
    #[error("{0}")]
    Contract(#[from] ContractError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A registered account as the chain sees it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub public_key: String,
    pub nonce: u64,
}

/// What applying a request produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub block_number: u64,
    /// Set for deployments
    pub contract_address: Option<String>,
    /// Set for transactions
    pub result: Option<ExecutionResult>,
}

/// Everything the chain knows
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChainState {
    pub chain_id: String,
    pub block_number: u64,
    pub accounts: BTreeMap<String, AccountRecord>,
    pub contracts: ContractStore,
}

/// Shared handle to a development chain
#[derive(Debug, Clone)]
pub struct Db {
    state: Arc<RwLock<ChainState>>,
}

impl Db {
    pub fn new(chain_id: impl Into<String>) -> Self {
        Self::from_state(ChainState {
            chain_id: chain_id.into(),
            ..Default::default()
        })
    }

    pub fn from_state(state: ChainState) -> Self {
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// True when both handles point at the same chain
    pub fn same_chain(&self, other: &Db) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    pub async fn chain_id(&self) -> String {
        self.state.read().await.chain_id.clone()
    }

    pub async fn block_number(&self) -> u64 {
        self.state.read().await.block_number
    }

    pub async fn register_account(&self, account: &Account) -> Result<(), ChainError> {
        let mut state = self.state.write().await;
        if state.accounts.contains_key(account.address()) {
            return Err(ChainError::DuplicateAccount(account.address().to_string()));
        }
        state.accounts.insert(
            account.address().to_string(),
            AccountRecord {
                public_key: account.public_key_hex(),
                nonce: 0,
            },
        );
        log::debug!("Registered account {}", account.address());
        Ok(())
    }

    pub async fn account(&self, address: &str) -> Option<AccountRecord> {
        self.state.read().await.accounts.get(address).cloned()
    }

    /// Verify and apply a signed request
    pub async fn submit(&self, request: SignedRequest) -> Result<Receipt, ChainError> {
        let mut state = self.state.write().await;

        let record = state
            .accounts
            .get(&request.from)
            .ok_or_else(|| ChainError::UnknownAccount(request.from.clone()))?;
        if request.nonce != record.nonce {
            return Err(ChainError::BadNonce {
                account: request.from.clone(),
                expected: record.nonce,
                actual: request.nonce,
            });
        }
        if !request.verify(&record.public_key)? {
            return Err(ChainError::InvalidSignature(request.from.clone()));
        }

        let block_number = state.block_number + 1;
        let receipt = match request.payload {
            Payload::Deploy { code } => {
                let code = hex::decode(code)?;
                let address = state.contracts.deploy(code, &request.from, block_number)?;
                Receipt {
                    block_number,
                    contract_address: Some(address),
                    result: None,
                }
            }
            Payload::Transact {
                address,
                args,
                gas_limit,
            } => {
                let context = ExecutionContext {
                    caller: request.from.clone(),
                    contract_address: address.clone(),
                    timestamp: chrono::Utc::now().timestamp() as u64,
                    block_number,
                    args,
                    gas_limit,
                };
                let result = state.contracts.execute(&address, context)?;
                Receipt {
                    block_number,
                    contract_address: None,
                    result: Some(result),
                }
            }
        };

        // Only successful requests consume a nonce and a block
        state.block_number = block_number;
        if let Some(record) = state.accounts.get_mut(&request.from) {
            record.nonce += 1;
        }

        Ok(receipt)
    }

    /// Read-only execution against the latest block
    pub async fn call(
        &self,
        from: &str,
        address: &str,
        args: Vec<u64>,
        gas_limit: u64,
    ) -> Result<ExecutionResult, ChainError> {
        let state = self.state.read().await;
        let context = ExecutionContext {
            caller: from.to_string(),
            contract_address: address.to_string(),
            timestamp: chrono::Utc::now().timestamp() as u64,
            block_number: state.block_number,
            args,
            gas_limit,
        };
        Ok(state.contracts.simulate(address, context)?)
    }

    pub async fn code_at(&self, address: &str) -> Option<Vec<u8>> {
        let state = self.state.read().await;
        state.contracts.get(address).map(|contract| contract.code.clone())
    }

    pub async fn snapshot(&self) -> ChainState {
        self.state.read().await.clone()
    }

    /// Write the chain state as pretty JSON, via a temporary file
    pub async fn save(&self, path: &Path) -> Result<(), ChainError> {
        let snapshot = self.snapshot().await;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = path.with_extension("tmp");
        let writer = BufWriter::new(fs::File::create(&temp_path)?);
        serde_json::to_writer_pretty(writer, &snapshot)?;
        fs::rename(&temp_path, path)?;

        log::info!(
            "Saved chain {} at block {} to {:?}",
            snapshot.chain_id,
            snapshot.block_number,
            path
        );
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ChainError> {
        let data = fs::read_to_string(path)?;
        let state: ChainState = serde_json::from_str(&data)?;
        Ok(Self::from_state(state))
    }
}
