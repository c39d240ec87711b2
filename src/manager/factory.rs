//! Contract factory

use super::instance::ContractInstance;
use crate::abi::Abi;
use crate::pipe::{Pipe, PipeError};
use std::sync::Arc;
use thiserror::Error;

/// A deployment the chain refused; the chain's message is kept verbatim
#[derive(Error, Debug)]
#[error(transparent)]
pub struct DeploymentError(#[from] pub PipeError);

/// Options for one deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployOptions {
    /// Bytecode to deploy
    pub data: Vec<u8>,
}

impl DeployOptions {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

/// Deploys new contracts bound to one ABI
#[derive(Clone)]
pub struct ContractFactory {
    abi: Arc<Abi>,
    pipe: Arc<dyn Pipe>,
}

impl ContractFactory {
    pub(crate) fn new(abi: Arc<Abi>, pipe: Arc<dyn Pipe>) -> Self {
        Self { abi, pipe }
    }

    pub fn abi(&self) -> &Abi {
        &self.abi
    }

    /// Deploy and resolve with the live instance
    pub async fn deploy(&self, options: DeployOptions) -> Result<ContractInstance, DeploymentError> {
        let size = options.data.len();
        let address = self.pipe.deploy(options.data).await?;
        log::info!(
            "Deployed {} bytes to {} from {}",
            size,
            address,
            self.pipe.account()
        );
        Ok(self.at(address))
    }

    /// Instance at an existing address, sharing this factory's ABI
    pub fn at(&self, address: impl Into<String>) -> ContractInstance {
        ContractInstance::new(address.into(), self.abi.clone(), self.pipe.clone())
    }
}
