//! Development chain
//!
//! A single-node, in-process chain that test pipes talk to. Accounts are
//! secp256k1 keys; deployments and transactions are signed requests.

pub mod account;
pub mod db;

pub use account::{Account, Payload, SignedRequest};
pub use db::{AccountRecord, ChainError, ChainState, Db, Receipt};
