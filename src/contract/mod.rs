//! Contract execution layer
//!
//! Provides the runtime that compiled contracts are deployed onto:
//! - A gas-metered stack VM
//! - A two-pass assembler and disassembler
//! - A contract store holding code and committed storage
//!
//! # Example
//!
//! ```rust
//! use contract_harness::contract::{Assembler, ContractStore, ExecutionContext};
//!
//! let bytecode = Assembler::new().assemble("
//!     PUSH 42
//!     RETURN
//! ").unwrap();
//!
//! let mut store = ContractStore::new();
//! let address = store.deploy(bytecode, "deployer_address", 1).unwrap();
//!
//! let result = store.execute(&address, ExecutionContext::default()).unwrap();
//! assert_eq!(result.return_value, Some(42));
//! ```

pub mod assembler;
pub mod opcodes;
pub mod store;
pub mod vm;

pub use assembler::{disassemble, Assembler, AssemblerError};
pub use opcodes::OpCode;
pub use store::{Contract, ContractError, ContractStore};
pub use vm::{ExecutionContext, ExecutionResult, VmError, DEFAULT_GAS_LIMIT, VM};
