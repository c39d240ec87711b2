//! contract-harness: compile, deploy and test contracts against a dev chain
//!
//! This crate provides:
//! - A compiler for a small Solidity-flavoured contract language
//! - A gas-metered stack VM with an assembler and disassembler
//! - An in-process development chain with signed requests
//! - Contract managers, factories and instances over a pluggable pipe
//! - Test vectors that inject a contract manager into setup and cases
//!
//! # Example
//!
//! ```rust
//! use contract_harness::harness::{compile, Vector, VectorOptions};
//! use std::path::Path;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let vector = Vector::local();
//! vector
//!     .before_with(Path::new("target/doc-run"), VectorOptions::default(), |manager| async move {
//!         let a = compile(&manager, "contract A { function f() returns (uint) { return 1; } }", "A").await?;
//!         assert_eq!(a.call("f", &[]).await?, Some(1));
//!         Ok(())
//!     })
//!     .await
//!     .unwrap();
//! # });
//! ```

pub mod abi;
pub mod chain;
pub mod compiler;
pub mod contract;
pub mod crypto;
pub mod error;
pub mod harness;
pub mod manager;
pub mod pipe;

// Re-export commonly used types
pub use abi::Abi;
pub use chain::{Account, Db};
pub use compiler::{Compiler, CompilerOutput, SourceCompiler};
pub use contract::{Assembler, ContractStore, OpCode, VM};
pub use crypto::KeyPair;
pub use error::{ensure, HarnessError, HarnessResult};
pub use harness::{compile, LocalVector, TestVector, Vector, VectorOptions};
pub use manager::{ContractFactory, ContractInstance, ContractManager, DeployOptions};
pub use pipe::{DevPipe, Pipe};
