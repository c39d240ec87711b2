//! Contract manager
//!
//! The capability object handed to tests. It owns a [`Pipe`] and turns ABIs
//! into factories (for new deployments) or instances (for existing
//! addresses).
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example(manager: contract_harness::manager::ContractManager) -> Result<(), Box<dyn std::error::Error>> {
//! use contract_harness::abi::Abi;
//! use contract_harness::manager::DeployOptions;
//!
//! let abi = Abi::from_json(r#"[{"type":"function","name":"f","outputs":[{"name":"","type":"uint256"}]}]"#)?;
//! let factory = manager.new_contract_factory(abi);
//! let instance = factory.deploy(DeployOptions::new(vec![0x42])).await?;
//! println!("deployed at {}", instance.address());
//! # Ok(())
//! # }
//! ```

pub mod factory;
pub mod instance;

use crate::abi::Abi;
use crate::pipe::Pipe;
use std::sync::Arc;

pub use factory::{ContractFactory, DeployOptions, DeploymentError};
pub use instance::{CallError, ContractInstance};

/// Produces contract factories and instances over one pipe
#[derive(Clone)]
pub struct ContractManager {
    pipe: Arc<dyn Pipe>,
}

impl std::fmt::Debug for ContractManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractManager")
            .field("account", &self.pipe.account())
            .finish()
    }
}

impl ContractManager {
    pub fn new(pipe: Arc<dyn Pipe>) -> Self {
        log::debug!("Created contract manager for {}", pipe.account());
        Self { pipe }
    }

    /// Factory for deploying new contracts with `abi`
    pub fn new_contract_factory(&self, abi: Abi) -> ContractFactory {
        ContractFactory::new(Arc::new(abi), self.pipe.clone())
    }

    /// Handle to a contract already deployed at `address`
    pub fn contract_at(&self, abi: Abi, address: impl Into<String>) -> ContractInstance {
        ContractInstance::new(address.into(), Arc::new(abi), self.pipe.clone())
    }

    pub fn pipe(&self) -> &Arc<dyn Pipe> {
        &self.pipe
    }

    pub fn account(&self) -> &str {
        self.pipe.account()
    }
}
