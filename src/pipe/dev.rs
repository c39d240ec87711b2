//! Pipe over an in-process development chain

use super::{Pipe, PipeError};
use crate::chain::{Account, Db, Payload};
use crate::contract::{ExecutionResult, DEFAULT_GAS_LIMIT};
use async_trait::async_trait;
use tokio::sync::Mutex;

/// Signs requests as one account and submits them to a [`Db`]
pub struct DevPipe {
    db: Db,
    account: Account,
    gas_limit: u64,
    /// Serializes nonce lookup and submission
    submit_lock: Mutex<()>,
}

impl DevPipe {
    /// Bind to `(db, account)`; the account must be registered
    pub async fn new(db: Db, account: Account) -> Result<Self, PipeError> {
        if db.account(account.address()).await.is_none() {
            return Err(PipeError::UnknownAccount(account.address().to_string()));
        }

        log::debug!("Opened dev pipe for {}", account.address());
        Ok(Self {
            db,
            account,
            gas_limit: DEFAULT_GAS_LIMIT,
            submit_lock: Mutex::new(()),
        })
    }

    /// Override the gas limit used when a call does not specify one
    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    async fn submit(&self, payload: Payload) -> Result<crate::chain::Receipt, PipeError> {
        let _guard = self.submit_lock.lock().await;
        let nonce = self
            .db
            .account(self.account.address())
            .await
            .ok_or_else(|| PipeError::UnknownAccount(self.account.address().to_string()))?
            .nonce;

        let request = self.account.sign(nonce, payload)?;
        Ok(self.db.submit(request).await?)
    }
}

#[async_trait]
impl Pipe for DevPipe {
    fn account(&self) -> &str {
        self.account.address()
    }

    async fn deploy(&self, code: Vec<u8>) -> Result<String, PipeError> {
        let receipt = self
            .submit(Payload::Deploy {
                code: hex::encode(code),
            })
            .await?;
        receipt
            .contract_address
            .ok_or(PipeError::MissingReceiptField("contract address"))
    }

    async fn transact(
        &self,
        address: &str,
        args: Vec<u64>,
        gas_limit: Option<u64>,
    ) -> Result<ExecutionResult, PipeError> {
        let receipt = self
            .submit(Payload::Transact {
                address: address.to_string(),
                args,
                gas_limit: gas_limit.unwrap_or(self.gas_limit),
            })
            .await?;
        receipt
            .result
            .ok_or(PipeError::MissingReceiptField("execution result"))
    }

    async fn call(
        &self,
        address: &str,
        args: Vec<u64>,
        gas_limit: Option<u64>,
    ) -> Result<ExecutionResult, PipeError> {
        let gas_limit = gas_limit.unwrap_or(self.gas_limit);
        Ok(self
            .db
            .call(self.account.address(), address, args, gas_limit)
            .await?)
    }

    async fn code_at(&self, address: &str) -> Result<Option<Vec<u8>>, PipeError> {
        Ok(self.db.code_at(address).await)
    }
}
