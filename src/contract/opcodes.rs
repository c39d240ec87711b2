//! Contract VM instruction set
//!
//! One byte per opcode. `PUSH` carries an 8-byte big-endian immediate,
//! the jumps carry a 4-byte code offset and `ARG` carries a 1-byte index.

use serde::{Deserialize, Serialize};

/// Opcodes understood by the VM and the assembler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum OpCode {
    // Stack (0x00 - 0x0F)
    Push = 0x00,
    Pop = 0x01,
    Dup = 0x02,
    Swap = 0x03,

    // Arithmetic (0x10 - 0x1F)
    Add = 0x10,
    Sub = 0x11,
    Mul = 0x12,
    Div = 0x13,
    Mod = 0x14,

    // Comparison (0x20 - 0x2F)
    Eq = 0x20,
    Lt = 0x21,
    Gt = 0x22,
    Le = 0x23,
    Ge = 0x24,
    Neq = 0x25,
    IsZero = 0x26,

    // Bitwise logic (0x30 - 0x3F)
    And = 0x30,
    Or = 0x31,
    Not = 0x32,

    // Control flow (0x40 - 0x4F)
    Jump = 0x40,
    /// Jump if the popped condition is non-zero
    JumpIf = 0x41,
    Halt = 0x42,
    /// Pop the return value and stop
    Return = 0x43,
    Revert = 0x44,

    // Storage (0x50 - 0x5F)
    /// key, value -> ()
    SStore = 0x50,
    /// key -> value
    SLoad = 0x51,

    // Environment (0x60 - 0x6F)
    Caller = 0x62,
    Timestamp = 0x64,
    BlockNumber = 0x65,

    // Call data (0x70 - 0x7F)
    Arg = 0x70,
    ArgCount = 0x71,

    Nop = 0xFF,
}

impl OpCode {
    /// Every opcode, in byte order
    pub const ALL: [OpCode; 31] = [
        OpCode::Push,
        OpCode::Pop,
        OpCode::Dup,
        OpCode::Swap,
        OpCode::Add,
        OpCode::Sub,
        OpCode::Mul,
        OpCode::Div,
        OpCode::Mod,
        OpCode::Eq,
        OpCode::Lt,
        OpCode::Gt,
        OpCode::Le,
        OpCode::Ge,
        OpCode::Neq,
        OpCode::IsZero,
        OpCode::And,
        OpCode::Or,
        OpCode::Not,
        OpCode::Jump,
        OpCode::JumpIf,
        OpCode::Halt,
        OpCode::Return,
        OpCode::Revert,
        OpCode::SStore,
        OpCode::SLoad,
        OpCode::Caller,
        OpCode::Timestamp,
        OpCode::BlockNumber,
        OpCode::Arg,
        OpCode::ArgCount,
    ];

    /// Decode a byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        if byte == OpCode::Nop as u8 {
            return Some(OpCode::Nop);
        }
        Self::ALL.iter().copied().find(|op| *op as u8 == byte)
    }

    /// Look up an assembler mnemonic (case-insensitive)
    pub fn from_mnemonic(mnemonic: &str) -> Option<Self> {
        let upper = mnemonic.to_ascii_uppercase();
        if upper == "NOP" {
            return Some(OpCode::Nop);
        }
        Self::ALL.iter().copied().find(|op| op.name() == upper)
    }

    /// Number of immediate bytes following the opcode
    pub fn arg_bytes(&self) -> usize {
        match self {
            OpCode::Push => 8,
            OpCode::Jump | OpCode::JumpIf => 4,
            OpCode::Arg => 1,
            _ => 0,
        }
    }

    /// Assembler mnemonic
    pub fn name(&self) -> &'static str {
        match self {
            OpCode::Push => "PUSH",
            OpCode::Pop => "POP",
            OpCode::Dup => "DUP",
            OpCode::Swap => "SWAP",
            OpCode::Add => "ADD",
            OpCode::Sub => "SUB",
            OpCode::Mul => "MUL",
            OpCode::Div => "DIV",
            OpCode::Mod => "MOD",
            OpCode::Eq => "EQ",
            OpCode::Lt => "LT",
            OpCode::Gt => "GT",
            OpCode::Le => "LE",
            OpCode::Ge => "GE",
            OpCode::Neq => "NEQ",
            OpCode::IsZero => "ISZERO",
            OpCode::And => "AND",
            OpCode::Or => "OR",
            OpCode::Not => "NOT",
            OpCode::Jump => "JUMP",
            OpCode::JumpIf => "JUMPI",
            OpCode::Halt => "HALT",
            OpCode::Return => "RETURN",
            OpCode::Revert => "REVERT",
            OpCode::SStore => "SSTORE",
            OpCode::SLoad => "SLOAD",
            OpCode::Caller => "CALLER",
            OpCode::Timestamp => "TIMESTAMP",
            OpCode::BlockNumber => "BLOCKNUMBER",
            OpCode::Arg => "ARG",
            OpCode::ArgCount => "ARGCOUNT",
            OpCode::Nop => "NOP",
        }
    }

    /// Base gas cost charged before the instruction runs
    pub fn gas_cost(&self) -> u64 {
        match self {
            OpCode::Push | OpCode::Pop | OpCode::Dup | OpCode::Swap => 2,
            OpCode::Add | OpCode::Sub | OpCode::Mul => 3,
            OpCode::Div | OpCode::Mod => 5,
            OpCode::Eq | OpCode::Lt | OpCode::Gt | OpCode::Le | OpCode::Ge | OpCode::Neq => 3,
            OpCode::And | OpCode::Or | OpCode::Not | OpCode::IsZero => 3,
            OpCode::Jump | OpCode::JumpIf => 8,
            OpCode::SStore => 20,
            OpCode::SLoad => 5,
            OpCode::Caller | OpCode::Timestamp | OpCode::BlockNumber => 2,
            OpCode::Arg | OpCode::ArgCount => 2,
            OpCode::Halt | OpCode::Return | OpCode::Revert => 0,
            OpCode::Nop => 1,
        }
    }
}
