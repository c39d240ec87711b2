//! Contract language compiler
//!
//! Compiles a small Solidity-flavoured language to VM bytecode and a JSON
//! ABI. The output mirrors what a solc-style compiler service returns:
//! a list of error strings plus a map from contract name to
//! `{interface, bytecode}`.
//!
//! # Example
//!
//! ```rust
//! use contract_harness::compiler::{Compiler, SourceCompiler};
//!
//! let output = Compiler.compile("contract A { function f() returns (uint) { return 1; } }", true);
//! assert!(output.errors.is_empty());
//! assert!(output.contract("A").is_some());
//! ```

pub mod ast;
pub mod codegen;
pub mod lexer;
pub mod parser;

use lexer::Pos;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Optimization flag used by the test harness
pub const HARNESS_OPTIMIZE: bool = true;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A positioned compiler message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub pos: Pos,
    pub severity: Severity,
    pub message: String,
}

impl Diagnostic {
    pub fn error(pos: Pos, message: impl Into<String>) -> Self {
        Self {
            pos,
            severity: Severity::Error,
            message: message.into(),
        }
    }

    pub fn warning(pos: Pos, message: impl Into<String>) -> Self {
        Self {
            pos,
            severity: Severity::Warning,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.severity {
            Severity::Error => write!(f, "{}:{}: {}", self.pos.line, self.pos.col, self.message),
            Severity::Warning => write!(
                f,
                "{}:{}: warning: {}",
                self.pos.line, self.pos.col, self.message
            ),
        }
    }
}

/// One compiled contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledContract {
    /// JSON encoded ABI
    pub interface: String,
    /// Hex encoded bytecode
    pub bytecode: String,
}

/// Everything a compile run produced
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerOutput {
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub contracts: BTreeMap<String, CompiledContract>,
}

impl CompilerOutput {
    /// Look up a contract by name. Keys qualified as `source:Name` match
    /// on the part after the last colon.
    pub fn contract(&self, name: &str) -> Option<&CompiledContract> {
        self.contracts.get(name).or_else(|| {
            self.contracts
                .iter()
                .find(|(key, _)| object_name(key) == name)
                .map(|(_, contract)| contract)
        })
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

fn object_name(key: &str) -> &str {
    key.trim().rsplit(':').next().unwrap_or_default()
}

/// Anything that can turn source text into compiler output
pub trait SourceCompiler: Send + Sync {
    fn compile(&self, source: &str, optimize: bool) -> CompilerOutput;
}

/// The built-in contract language compiler
#[derive(Debug, Clone, Copy, Default)]
pub struct Compiler;

impl SourceCompiler for Compiler {
    fn compile(&self, source: &str, optimize: bool) -> CompilerOutput {
        let mut output = CompilerOutput::default();

        let contracts = match lexer::tokenize(source)
            .and_then(|tokens| parser::Parser::new(tokens).parse_unit())
        {
            Ok(contracts) => contracts,
            Err(diagnostic) => {
                log::debug!("Parse failed: {}", diagnostic);
                output.errors.push(diagnostic.to_string());
                return output;
            }
        };

        for contract in &contracts {
            if output.contracts.contains_key(&contract.name) {
                output.errors.push(
                    Diagnostic::error(
                        contract.pos,
                        format!("contract '{}' already declared", contract.name),
                    )
                    .to_string(),
                );
                continue;
            }

            match codegen::lower_contract(contract, optimize) {
                Ok(lowered) => {
                    output
                        .warnings
                        .extend(lowered.warnings.iter().map(ToString::to_string));
                    let interface = match lowered.abi.to_json() {
                        Ok(json) => json,
                        Err(err) => {
                            output.errors.push(format!("{}: {}", contract.name, err));
                            continue;
                        }
                    };
                    output.contracts.insert(
                        contract.name.clone(),
                        CompiledContract {
                            interface,
                            bytecode: hex::encode(&lowered.bytecode),
                        },
                    );
                }
                Err(diagnostics) => {
                    output
                        .errors
                        .extend(diagnostics.iter().map(ToString::to_string));
                }
            }
        }

        // Output is all-or-nothing
        if output.has_errors() {
            output.contracts.clear();
        }

        log::debug!(
            "Compiled {} contract(s), {} error(s), {} warning(s)",
            output.contracts.len(),
            output.errors.len(),
            output.warnings.len()
        );
        output
    }
}
