//! Test accounts and signed requests

use crate::crypto::keys::{public_key_from_hex, verify_signature, KeyError, KeyPair};
use serde::{Deserialize, Serialize};

/// What a request asks the chain to do
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    Deploy {
        /// Hex encoded bytecode
        code: String,
    },
    Transact {
        address: String,
        args: Vec<u64>,
        gas_limit: u64,
    },
}

/// A payload signed by its sender
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedRequest {
    pub from: String,
    pub nonce: u64,
    pub payload: Payload,
    /// Compact secp256k1 signature, hex encoded
    pub signature: String,
}

impl SignedRequest {
    /// Bytes covered by the signature
    pub fn signing_bytes(from: &str, nonce: u64, payload: &Payload) -> Vec<u8> {
        // Infallible for plain data
        serde_json::to_vec(&(from, nonce, payload)).unwrap_or_default()
    }

    /// Check the signature against a hex encoded public key
    pub fn verify(&self, public_key_hex: &str) -> Result<bool, KeyError> {
        let public_key = public_key_from_hex(public_key_hex)?;
        let signature = hex::decode(&self.signature).map_err(|_| KeyError::InvalidSignature)?;
        let bytes = Self::signing_bytes(&self.from, self.nonce, &self.payload);
        verify_signature(&public_key, &bytes, &signature)
    }
}

/// An externally owned account used to deploy and call contracts
#[derive(Debug, Clone)]
pub struct Account {
    keys: KeyPair,
    address: String,
}

impl Account {
    pub fn generate() -> Self {
        Self::from_keys(KeyPair::generate())
    }

    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        Ok(Self::from_keys(KeyPair::from_private_key_hex(hex_key)?))
    }

    fn from_keys(keys: KeyPair) -> Self {
        let address = keys.address();
        Self { keys, address }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn public_key_hex(&self) -> String {
        self.keys.public_key_hex()
    }

    pub fn private_key_hex(&self) -> String {
        self.keys.private_key_hex()
    }

    /// Sign `payload` at `nonce`
    pub fn sign(&self, nonce: u64, payload: Payload) -> Result<SignedRequest, KeyError> {
        let bytes = SignedRequest::signing_bytes(&self.address, nonce, &payload);
        let signature = self.keys.sign(&bytes)?;
        Ok(SignedRequest {
            from: self.address.clone(),
            nonce,
            payload,
            signature: hex::encode(signature),
        })
    }
}
