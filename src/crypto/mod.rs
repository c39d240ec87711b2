//! Cryptographic utilities
//!
//! - SHA-256 hashing
//! - secp256k1 account keys and request signatures

pub mod hash;
pub mod keys;

pub use hash::{address_word, double_sha256, sha256, sha256_hex};
pub use keys::{public_key_from_hex, public_key_to_address, verify_signature, KeyError, KeyPair};
