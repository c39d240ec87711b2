//! Contract virtual machine
//!
//! A gas-metered stack machine over 64-bit words. Storage writes are
//! buffered in the VM and only reach the contract when execution succeeds.

use crate::contract::opcodes::OpCode;
use crate::crypto::hash::address_word;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Maximum stack depth
const MAX_STACK_SIZE: usize = 1024;

/// Default gas limit
pub const DEFAULT_GAS_LIMIT: u64 = 100_000;

/// VM execution errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error("Stack overflow")]
    StackOverflow,
    #[error("Stack underflow")]
    StackUnderflow,
    #[error("Invalid opcode: 0x{0:02x}")]
    InvalidOpcode(u8),
    #[error("Truncated immediate at offset {0}")]
    TruncatedImmediate(usize),
    #[error("Out of gas")]
    OutOfGas,
    #[error("Invalid jump destination: {0}")]
    InvalidJump(u32),
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Invalid argument index: {0}")]
    InvalidArgument(u8),
    #[error("Execution reverted")]
    Reverted,
}

/// Environment visible to running code
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub caller: String,
    pub contract_address: String,
    pub timestamp: u64,
    pub block_number: u64,
    /// Call data; word 0 is the function selector for compiled contracts
    pub args: Vec<u64>,
    pub gas_limit: u64,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self {
            caller: String::new(),
            contract_address: String::new(),
            timestamp: 0,
            block_number: 0,
            args: Vec::new(),
            gas_limit: DEFAULT_GAS_LIMIT,
        }
    }
}

/// Outcome of a successful execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub return_value: Option<u64>,
    pub gas_used: u64,
    /// Storage writes made by this execution
    pub storage_changes: BTreeMap<u64, u64>,
}

/// The virtual machine
pub struct VM<'a> {
    stack: Vec<u64>,
    pc: usize,
    gas: u64,
    code: &'a [u8],
    storage: &'a BTreeMap<u64, u64>,
    storage_changes: BTreeMap<u64, u64>,
    context: ExecutionContext,
    halted: bool,
    return_value: Option<u64>,
}

impl<'a> VM<'a> {
    /// Create a VM over borrowed code and committed storage
    pub fn new(code: &'a [u8], storage: &'a BTreeMap<u64, u64>, context: ExecutionContext) -> Self {
        Self {
            stack: Vec::with_capacity(64),
            pc: 0,
            gas: context.gas_limit,
            code,
            storage,
            storage_changes: BTreeMap::new(),
            context,
            halted: false,
            return_value: None,
        }
    }

    /// Run until HALT, RETURN or the end of code
    pub fn execute(mut self) -> Result<ExecutionResult, VmError> {
        while !self.halted && self.pc < self.code.len() {
            self.step()?;
        }

        Ok(ExecutionResult {
            return_value: self.return_value,
            gas_used: self.context.gas_limit - self.gas,
            storage_changes: self.storage_changes,
        })
    }

    fn step(&mut self) -> Result<(), VmError> {
        let byte = self.code[self.pc];
        let opcode = OpCode::from_byte(byte).ok_or(VmError::InvalidOpcode(byte))?;

        let cost = opcode.gas_cost();
        if self.gas < cost {
            return Err(VmError::OutOfGas);
        }
        self.gas -= cost;
        self.pc += 1;

        match opcode {
            OpCode::Push => {
                let value = self.read_u64()?;
                self.push(value)?;
            }
            OpCode::Pop => {
                self.pop()?;
            }
            OpCode::Dup => {
                let value = *self.stack.last().ok_or(VmError::StackUnderflow)?;
                self.push(value)?;
            }
            OpCode::Swap => {
                let len = self.stack.len();
                if len < 2 {
                    return Err(VmError::StackUnderflow);
                }
                self.stack.swap(len - 1, len - 2);
            }
            OpCode::Add => self.binary(|a, b| Ok(a.wrapping_add(b)))?,
            OpCode::Sub => self.binary(|a, b| Ok(a.wrapping_sub(b)))?,
            OpCode::Mul => self.binary(|a, b| Ok(a.wrapping_mul(b)))?,
            OpCode::Div => self.binary(|a, b| a.checked_div(b).ok_or(VmError::DivisionByZero))?,
            OpCode::Mod => self.binary(|a, b| a.checked_rem(b).ok_or(VmError::DivisionByZero))?,
            OpCode::Eq => self.binary(|a, b| Ok((a == b) as u64))?,
            OpCode::Lt => self.binary(|a, b| Ok((a < b) as u64))?,
            OpCode::Gt => self.binary(|a, b| Ok((a > b) as u64))?,
            OpCode::Le => self.binary(|a, b| Ok((a <= b) as u64))?,
            OpCode::Ge => self.binary(|a, b| Ok((a >= b) as u64))?,
            OpCode::Neq => self.binary(|a, b| Ok((a != b) as u64))?,
            OpCode::And => self.binary(|a, b| Ok(a & b))?,
            OpCode::Or => self.binary(|a, b| Ok(a | b))?,
            OpCode::IsZero => {
                let a = self.pop()?;
                self.push((a == 0) as u64)?;
            }
            OpCode::Not => {
                let a = self.pop()?;
                self.push(!a)?;
            }
            OpCode::Jump => {
                let offset = self.read_u32()?;
                self.jump(offset)?;
            }
            OpCode::JumpIf => {
                let offset = self.read_u32()?;
                if self.pop()? != 0 {
                    self.jump(offset)?;
                }
            }
            OpCode::Halt => {
                self.halted = true;
            }
            OpCode::Return => {
                self.return_value = Some(self.pop()?);
                self.halted = true;
            }
            OpCode::Revert => {
                return Err(VmError::Reverted);
            }
            OpCode::SStore => {
                let value = self.pop()?;
                let key = self.pop()?;
                self.storage_changes.insert(key, value);
            }
            OpCode::SLoad => {
                let key = self.pop()?;
                let value = self
                    .storage_changes
                    .get(&key)
                    .or_else(|| self.storage.get(&key))
                    .copied()
                    .unwrap_or(0);
                self.push(value)?;
            }
            OpCode::Caller => {
                let word = address_word(&self.context.caller);
                self.push(word)?;
            }
            OpCode::Timestamp => self.push(self.context.timestamp)?,
            OpCode::BlockNumber => self.push(self.context.block_number)?,
            OpCode::Arg => {
                let index = self.read_u8()?;
                let value = self
                    .context
                    .args
                    .get(index as usize)
                    .copied()
                    .ok_or(VmError::InvalidArgument(index))?;
                self.push(value)?;
            }
            OpCode::ArgCount => {
                let count = self.context.args.len() as u64;
                self.push(count)?;
            }
            OpCode::Nop => {}
        }

        Ok(())
    }

    fn binary<F>(&mut self, op: F) -> Result<(), VmError>
    where
        F: FnOnce(u64, u64) -> Result<u64, VmError>,
    {
        let b = self.pop()?;
        let a = self.pop()?;
        let value = op(a, b)?;
        self.push(value)
    }

    fn jump(&mut self, offset: u32) -> Result<(), VmError> {
        if offset as usize >= self.code.len() {
            return Err(VmError::InvalidJump(offset));
        }
        self.pc = offset as usize;
        Ok(())
    }

    fn push(&mut self, value: u64) -> Result<(), VmError> {
        if self.stack.len() >= MAX_STACK_SIZE {
            return Err(VmError::StackOverflow);
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Result<u64, VmError> {
        self.stack.pop().ok_or(VmError::StackUnderflow)
    }

    fn read_immediate<const N: usize>(&mut self) -> Result<[u8; N], VmError> {
        let end = self.pc + N;
        let bytes: [u8; N] = self
            .code
            .get(self.pc..end)
            .and_then(|slice| slice.try_into().ok())
            .ok_or(VmError::TruncatedImmediate(self.pc))?;
        self.pc = end;
        Ok(bytes)
    }

    fn read_u8(&mut self) -> Result<u8, VmError> {
        Ok(self.read_immediate::<1>()?[0])
    }

    fn read_u32(&mut self) -> Result<u32, VmError> {
        Ok(u32::from_be_bytes(self.read_immediate::<4>()?))
    }

    fn read_u64(&mut self) -> Result<u64, VmError> {
        Ok(u64::from_be_bytes(self.read_immediate::<8>()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_push(value: u64) -> Vec<u8> {
        let mut bytes = vec![OpCode::Push as u8];
        bytes.extend_from_slice(&value.to_be_bytes());
        bytes
    }

    fn run(code: &[u8], context: ExecutionContext) -> Result<ExecutionResult, VmError> {
        let storage = BTreeMap::new();
        VM::new(code, &storage, context).execute()
    }

    #[test]
    fn test_simple_addition() {
        let mut code = make_push(10);
        code.extend(make_push(20));
        code.push(OpCode::Add as u8);
        code.push(OpCode::Return as u8);

        let result = run(&code, ExecutionContext::default()).unwrap();
        assert_eq!(result.return_value, Some(30));
    }

    #[test]
    fn test_comparison() {
        let mut code = make_push(10);
        code.extend(make_push(20));
        code.push(OpCode::Lt as u8);
        code.push(OpCode::Return as u8);

        let result = run(&code, ExecutionContext::default()).unwrap();
        assert_eq!(result.return_value, Some(1));
    }

    #[test]
    fn test_storage_reads_own_writes() {
        let mut code = make_push(1);
        code.extend(make_push(42));
        code.push(OpCode::SStore as u8);
        code.extend(make_push(1));
        code.push(OpCode::SLoad as u8);
        code.push(OpCode::Return as u8);

        let result = run(&code, ExecutionContext::default()).unwrap();
        assert_eq!(result.return_value, Some(42));
        assert_eq!(result.storage_changes.get(&1), Some(&42));
    }

    #[test]
    fn test_committed_storage_is_read() {
        let mut storage = BTreeMap::new();
        storage.insert(7, 99);
        let mut code = make_push(7);
        code.push(OpCode::SLoad as u8);
        code.push(OpCode::Return as u8);

        let result = VM::new(&code, &storage, ExecutionContext::default())
            .execute()
            .unwrap();
        assert_eq!(result.return_value, Some(99));
        assert!(result.storage_changes.is_empty());
    }

    #[test]
    fn test_out_of_gas() {
        let mut code = Vec::new();
        for _ in 0..1000 {
            code.extend(make_push(1));
        }
        let context = ExecutionContext {
            gas_limit: 100,
            ..Default::default()
        };

        assert_eq!(run(&code, context), Err(VmError::OutOfGas));
    }

    #[test]
    fn test_division_by_zero() {
        let mut code = make_push(1);
        code.extend(make_push(0));
        code.push(OpCode::Div as u8);

        assert_eq!(
            run(&code, ExecutionContext::default()),
            Err(VmError::DivisionByZero)
        );
    }

    #[test]
    fn test_missing_argument() {
        let code = vec![OpCode::Arg as u8, 2];
        let context = ExecutionContext {
            args: vec![1],
            ..Default::default()
        };

        assert_eq!(run(&code, context), Err(VmError::InvalidArgument(2)));
    }

    #[test]
    fn test_truncated_push() {
        let code = vec![OpCode::Push as u8, 0, 0];
        assert_eq!(
            run(&code, ExecutionContext::default()),
            Err(VmError::TruncatedImmediate(1))
        );
    }

    #[test]
    fn test_revert() {
        let code = vec![OpCode::Revert as u8];
        assert_eq!(
            run(&code, ExecutionContext::default()),
            Err(VmError::Reverted)
        );
    }
}
