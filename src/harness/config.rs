//! Vector options and the genesis fixture

use crate::chain::Account;
use crate::contract::DEFAULT_GAS_LIMIT;
use crate::crypto::KeyError;
use serde::{Deserialize, Serialize};

/// Name of the genesis file inside a fixture directory
pub const GENESIS_FILE: &str = "genesis.json";

/// Name of the chain snapshot written when `persist` is set
pub const SNAPSHOT_FILE: &str = "contracts.json";

/// Options passed through `Vector::before`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorOptions {
    /// Default gas limit for calls made through the manager
    pub gas_limit: u64,
    /// Write the chain snapshot into the test directory after setup
    pub persist: bool,
}

impl Default for VectorOptions {
    fn default() -> Self {
        Self {
            gas_limit: DEFAULT_GAS_LIMIT,
            persist: false,
        }
    }
}

impl VectorOptions {
    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    pub fn persisted(mut self) -> Self {
        self.persist = true;
        self
    }
}

/// One account in the genesis file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAccount {
    /// Hex secret key; generated when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
}

impl GenesisAccount {
    pub fn account(&self) -> Result<Account, KeyError> {
        match &self.private_key {
            Some(key) => Account::from_private_key_hex(key),
            None => Ok(Account::generate()),
        }
    }
}

/// Chain bootstrap description. The first account is the test account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genesis {
    pub chain_id: String,
    pub accounts: Vec<GenesisAccount>,
}

impl Default for Genesis {
    fn default() -> Self {
        Self {
            chain_id: "harness-dev".to_string(),
            accounts: vec![GenesisAccount::default()],
        }
    }
}
