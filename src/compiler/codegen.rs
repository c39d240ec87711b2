//! Code generation
//!
//! Lowers a checked contract to assembly text, then assembles it.
//!
//! Layout of the generated program:
//!
//! ```text
//! ARG 0                 ; selector
//! DUP / PUSH sel / EQ / JUMPI fn_<name>    (once per function)
//! POP / REVERT          ; no selector matched
//! :fn_<name>
//! POP                   ; drop the selector copy
//! <body>
//! PUSH 0 / RETURN       ; or HALT when nothing is returned
//! ```
//!
//! Parameter `i` is call-data word `i + 1`; state variable `k` lives at
//! storage key `k + 1`.

use super::lexer::Pos;
use super::ast::{BinOp, ContractDef, EnvVar, Expr, FunctionDef, Stmt};
use super::Diagnostic;
use crate::abi::{self, Abi, AbiEntry, EventAbi, FunctionAbi, Param};
use crate::contract::Assembler;
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

/// Output of a successful contract lowering
#[derive(Debug, Clone)]
pub struct Lowered {
    pub abi: Abi,
    pub assembly: String,
    pub bytecode: Vec<u8>,
    pub warnings: Vec<Diagnostic>,
}

/// Lower one contract; semantic errors are collected rather than stopping
/// at the first one
pub fn lower_contract(contract: &ContractDef, optimize: bool) -> Result<Lowered, Vec<Diagnostic>> {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    check_unique(
        contract
            .state_vars
            .iter()
            .map(|v| (v.name.as_str(), v.pos))
            .chain(contract.functions.iter().map(|f| (f.name.as_str(), f.pos)))
            .chain(contract.events.iter().map(|e| (e.name.as_str(), e.pos))),
        &mut errors,
    );

    let state_keys: HashMap<&str, u64> = contract
        .state_vars
        .iter()
        .enumerate()
        .map(|(index, var)| (var.name.as_str(), index as u64 + 1))
        .collect();

    let mut asm = String::new();
    asm.push_str("; dispatcher\nARG 0\n");
    for function in &contract.functions {
        let signature = function_abi(function).signature();
        let _ = writeln!(
            asm,
            "DUP\nPUSH {}\nEQ\nJUMPI fn_{}  ; {}",
            abi::selector(&signature),
            function.name,
            signature
        );
    }
    asm.push_str("POP\nREVERT\n");

    let mut labels = 0usize;
    for function in &contract.functions {
        let mut lowering = FunctionLowering {
            function,
            state_keys: &state_keys,
            used_params: HashSet::new(),
            labels: &mut labels,
            asm: &mut asm,
            errors: &mut errors,
            optimize,
        };
        lowering.lower();
        let used = lowering.used_params;

        check_unique(
            function.params.iter().map(|p| (p.name.as_str(), p.pos)),
            &mut errors,
        );
        for param in &function.params {
            if !used.contains(param.name.as_str()) {
                warnings.push(Diagnostic::warning(
                    param.pos,
                    format!(
                        "unused parameter '{}' in function '{}'",
                        param.name, function.name
                    ),
                ));
            }
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    let bytecode = Assembler::new()
        .assemble(&asm)
        .map_err(|err| vec![Diagnostic::error(contract.pos, format!("internal assembler error: {}", err))])?;

    log::debug!(
        "Lowered contract {} to {} bytes",
        contract.name,
        bytecode.len()
    );

    Ok(Lowered {
        abi: contract_abi(contract),
        assembly: asm,
        bytecode,
        warnings,
    })
}

fn check_unique<'a>(
    names: impl Iterator<Item = (&'a str, Pos)>,
    errors: &mut Vec<Diagnostic>,
) {
    let mut seen = HashSet::new();
    for (name, pos) in names {
        if !seen.insert(name) {
            errors.push(Diagnostic::error(
                pos,
                format!("identifier '{}' already declared", name),
            ));
        }
    }
}

fn function_abi(function: &FunctionDef) -> FunctionAbi {
    FunctionAbi {
        name: function.name.clone(),
        inputs: function
            .params
            .iter()
            .map(|p| Param::new(p.name.clone(), p.ty.abi_name()))
            .collect(),
        outputs: function
            .returns
            .iter()
            .map(|ty| Param::new("", ty.abi_name()))
            .collect(),
        constant: function.constant,
    }
}

fn contract_abi(contract: &ContractDef) -> Abi {
    let functions = contract
        .functions
        .iter()
        .map(|f| AbiEntry::Function(function_abi(f)));
    let events = contract.events.iter().map(|event| {
        AbiEntry::Event(EventAbi {
            name: event.name.clone(),
            inputs: event
                .params
                .iter()
                .map(|p| Param {
                    indexed: p.indexed,
                    ..Param::new(p.name.clone(), p.ty.abi_name())
                })
                .collect(),
            anonymous: false,
        })
    });
    Abi::new(functions.chain(events).collect())
}

/// `'a` borrows the AST, `'b` the per-contract output buffers
struct FunctionLowering<'a, 'b> {
    function: &'a FunctionDef,
    state_keys: &'b HashMap<&'a str, u64>,
    used_params: HashSet<&'a str>,
    labels: &'b mut usize,
    asm: &'b mut String,
    errors: &'b mut Vec<Diagnostic>,
    optimize: bool,
}

impl<'a, 'b> FunctionLowering<'a, 'b> {
    fn lower(&mut self) {
        let function = self.function;
        let _ = writeln!(self.asm, ":fn_{}\nPOP", function.name);
        for stmt in &function.body {
            self.stmt(stmt);
        }
        if self.function.returns.is_some() {
            self.emit("PUSH 0\nRETURN");
        } else {
            self.emit("HALT");
        }
    }

    fn emit(&mut self, line: &str) {
        self.asm.push_str(line);
        self.asm.push('\n');
    }

    fn label(&mut self, prefix: &str) -> String {
        *self.labels += 1;
        format!("{}_{}", prefix, self.labels)
    }

    fn stmt(&mut self, stmt: &'a Stmt) {
        match stmt {
            Stmt::Return(value, pos) => match (value, self.function.returns) {
                (Some(expr), Some(_)) => {
                    self.expr(expr);
                    self.emit("RETURN");
                }
                (None, None) => self.emit("HALT"),
                (Some(expr), None) => {
                    self.expr(expr);
                    self.errors.push(Diagnostic::error(
                        *pos,
                        format!(
                            "function '{}' does not declare a return value",
                            self.function.name
                        ),
                    ));
                }
                (None, Some(_)) => self.errors.push(Diagnostic::error(
                    *pos,
                    format!("function '{}' must return a value", self.function.name),
                )),
            },
            Stmt::Assign { target, value, pos } => {
                if self.function.constant {
                    self.errors.push(Diagnostic::error(
                        *pos,
                        format!(
                            "constant function '{}' cannot modify state",
                            self.function.name
                        ),
                    ));
                }
                if self.param_index(target).is_some() {
                    self.errors.push(Diagnostic::error(
                        *pos,
                        format!("cannot assign to parameter '{}'", target),
                    ));
                    return;
                }
                let Some(key) = self.state_keys.get(target.as_str()).copied() else {
                    self.errors.push(Diagnostic::error(
                        *pos,
                        format!("undeclared identifier '{}'", target),
                    ));
                    return;
                };
                self.emit(&format!("PUSH {}", key));
                self.expr(value);
                self.emit("SSTORE");
            }
            Stmt::If {
                cond,
                then,
                otherwise,
            } => {
                let else_label = self.label("else");
                let end_label = self.label("endif");
                self.expr(cond);
                self.emit("ISZERO");
                self.emit(&format!("JUMPI {}", else_label));
                for stmt in then {
                    self.stmt(stmt);
                }
                self.emit(&format!("JUMP {}", end_label));
                self.emit(&format!(":{}", else_label));
                for stmt in otherwise {
                    self.stmt(stmt);
                }
                self.emit(&format!(":{}", end_label));
            }
            Stmt::Require(cond) => {
                let ok_label = self.label("ok");
                self.expr(cond);
                self.emit(&format!("JUMPI {}", ok_label));
                self.emit("REVERT");
                self.emit(&format!(":{}", ok_label));
            }
        }
    }

    fn param_index(&self, name: &str) -> Option<usize> {
        self.function.params.iter().position(|p| p.name == name)
    }

    fn expr(&mut self, expr: &'a Expr) {
        self.mark_params(expr);
        if self.optimize {
            let folded = expr.clone().fold_constants();
            self.lower_expr(&folded);
        } else {
            self.lower_expr(expr);
        }
    }

    fn mark_params(&mut self, expr: &'a Expr) {
        match expr {
            Expr::Ident(name, _) => {
                if self.param_index(name).is_some() {
                    self.used_params.insert(name.as_str());
                }
            }
            Expr::Not(inner) => self.mark_params(inner),
            Expr::Binary(_, lhs, rhs) => {
                self.mark_params(lhs);
                self.mark_params(rhs);
            }
            Expr::Number(_) | Expr::Env(_) => {}
        }
    }

    fn lower_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Number(value) => self.emit(&format!("PUSH {}", value)),
            Expr::Env(EnvVar::Sender) => self.emit("CALLER"),
            Expr::Env(EnvVar::BlockNumber) => self.emit("BLOCKNUMBER"),
            Expr::Env(EnvVar::Timestamp) => self.emit("TIMESTAMP"),
            Expr::Ident(name, pos) => {
                if let Some(index) = self.param_index(name) {
                    self.emit(&format!("ARG {}", index + 1));
                } else if let Some(key) = self.state_keys.get(name.as_str()).copied() {
                    self.emit(&format!("PUSH {}\nSLOAD", key));
                } else {
                    self.errors.push(Diagnostic::error(
                        *pos,
                        format!("undeclared identifier '{}'", name),
                    ));
                }
            }
            Expr::Not(inner) => {
                self.lower_expr(inner);
                self.emit("ISZERO");
            }
            Expr::Binary(op, lhs, rhs) => {
                let logical = matches!(op, BinOp::And | BinOp::Or);
                self.lower_expr(lhs);
                if logical {
                    self.emit("ISZERO\nISZERO");
                }
                self.lower_expr(rhs);
                if logical {
                    self.emit("ISZERO\nISZERO");
                }
                self.emit(match op {
                    BinOp::Add => "ADD",
                    BinOp::Sub => "SUB",
                    BinOp::Mul => "MUL",
                    BinOp::Div => "DIV",
                    BinOp::Mod => "MOD",
                    BinOp::Eq => "EQ",
                    BinOp::Neq => "NEQ",
                    BinOp::Lt => "LT",
                    BinOp::Gt => "GT",
                    BinOp::Le => "LE",
                    BinOp::Ge => "GE",
                    BinOp::And => "AND",
                    BinOp::Or => "OR",
                });
            }
        }
    }
}
