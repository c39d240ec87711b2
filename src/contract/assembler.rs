//! Two-pass assembler
//!
//! Turns assembly text into VM bytecode. One instruction per line,
//! `:name` defines a label, `;` and `#` start comments.

use crate::contract::opcodes::OpCode;
use std::collections::HashMap;
use std::fmt::Write as _;
use thiserror::Error;

/// Assembler errors, tagged with the 1-based source line
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssemblerError {
    #[error("line {0}: unknown instruction {1}")]
    UnknownInstruction(usize, String),
    #[error("line {0}: {1} requires an operand")]
    MissingOperand(usize, &'static str),
    #[error("line {0}: invalid number {1}")]
    InvalidNumber(usize, String),
    #[error("line {0}: duplicate label {1}")]
    DuplicateLabel(usize, String),
    #[error("undefined label: {0}")]
    UndefinedLabel(String),
}

/// Assembler state, reusable across inputs
#[derive(Default)]
pub struct Assembler {
    code: Vec<u8>,
    labels: HashMap<String, u32>,
    /// (immediate offset, label name)
    label_refs: Vec<(usize, String)>,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble source text to bytecode
    pub fn assemble(&mut self, source: &str) -> Result<Vec<u8>, AssemblerError> {
        self.code.clear();
        self.labels.clear();
        self.label_refs.clear();

        for (index, line) in source.lines().enumerate() {
            let line_no = index + 1;
            let line = strip_comment(line).trim();
            if line.is_empty() {
                continue;
            }

            if let Some(label) = line.strip_prefix(':') {
                let label = label.trim().to_string();
                if self.labels.contains_key(&label) {
                    return Err(AssemblerError::DuplicateLabel(line_no, label));
                }
                self.labels.insert(label, self.code.len() as u32);
                continue;
            }

            self.assemble_instruction(line_no, line)?;
        }

        for (pos, label) in &self.label_refs {
            let addr = self
                .labels
                .get(label)
                .ok_or_else(|| AssemblerError::UndefinedLabel(label.clone()))?;
            self.code[*pos..*pos + 4].copy_from_slice(&addr.to_be_bytes());
        }

        Ok(std::mem::take(&mut self.code))
    }

    fn assemble_instruction(&mut self, line_no: usize, line: &str) -> Result<(), AssemblerError> {
        let mut parts = line.split_whitespace();
        let mnemonic = parts.next().unwrap_or_default();
        let operand = parts.next();

        let opcode = OpCode::from_mnemonic(mnemonic).ok_or_else(|| {
            AssemblerError::UnknownInstruction(line_no, mnemonic.to_uppercase())
        })?;
        self.code.push(opcode as u8);

        match opcode {
            OpCode::Push => {
                let value = operand
                    .map(|s| parse_number(line_no, s))
                    .transpose()?
                    .unwrap_or(0);
                self.code.extend_from_slice(&value.to_be_bytes());
            }
            OpCode::Jump | OpCode::JumpIf => {
                let label = operand.ok_or(AssemblerError::MissingOperand(line_no, opcode.name()))?;
                self.label_refs.push((self.code.len(), label.to_string()));
                self.code.extend_from_slice(&[0; 4]);
            }
            OpCode::Arg => {
                let raw = operand.ok_or(AssemblerError::MissingOperand(line_no, "ARG"))?;
                let index = u8::try_from(parse_number(line_no, raw)?)
                    .map_err(|_| AssemblerError::InvalidNumber(line_no, raw.to_string()))?;
                self.code.push(index);
            }
            _ => {}
        }

        Ok(())
    }
}

fn strip_comment(line: &str) -> &str {
    line.find([';', '#']).map_or(line, |at| &line[..at])
}

/// Parse a decimal or `0x` hex immediate
fn parse_number(line_no: usize, s: &str) -> Result<u64, AssemblerError> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse::<u64>(),
    };
    parsed.map_err(|_| AssemblerError::InvalidNumber(line_no, s.to_string()))
}

/// Render bytecode as one instruction per line
pub fn disassemble(code: &[u8]) -> String {
    let mut output = String::new();
    let mut pc = 0;

    while pc < code.len() {
        let byte = code[pc];
        let Some(opcode) = OpCode::from_byte(byte) else {
            let _ = writeln!(output, "{:04x}: UNKNOWN 0x{:02x}", pc, byte);
            pc += 1;
            continue;
        };

        let _ = write!(output, "{:04x}: {}", pc, opcode.name());
        pc += 1;

        let width = opcode.arg_bytes();
        if let Some(immediate) = code.get(pc..pc + width).filter(|_| width > 0) {
            let value = immediate
                .iter()
                .fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
            match opcode {
                OpCode::Jump | OpCode::JumpIf => {
                    let _ = write!(output, " 0x{:04x}", value);
                }
                _ => {
                    let _ = write!(output, " {}", value);
                }
            }
            pc += width;
        }

        output.push('\n');
    }

    output
}
