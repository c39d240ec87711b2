//! Syntax tree for the contract language

use super::lexer::Pos;

/// Value types. Every value occupies one VM word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Uint,
    Bool,
}

impl Type {
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "uint" | "uint256" => Some(Type::Uint),
            "bool" => Some(Type::Bool),
            _ => None,
        }
    }

    /// Canonical ABI type name
    pub fn abi_name(&self) -> &'static str {
        match self {
            Type::Uint => "uint256",
            Type::Bool => "bool",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDef {
    pub name: String,
    pub ty: Type,
    pub indexed: bool,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateVar {
    pub name: String,
    pub ty: Type,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDef {
    pub name: String,
    pub params: Vec<ParamDef>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<ParamDef>,
    pub returns: Option<Type>,
    pub constant: bool,
    pub body: Vec<Stmt>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractDef {
    pub name: String,
    pub state_vars: Vec<StateVar>,
    pub events: Vec<EventDef>,
    pub functions: Vec<FunctionDef>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Return(Option<Expr>, Pos),
    Assign {
        target: String,
        value: Expr,
        pos: Pos,
    },
    If {
        cond: Expr,
        then: Vec<Stmt>,
        otherwise: Vec<Stmt>,
    },
    Require(Expr),
}

/// Built-in environment values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvVar {
    Sender,
    BlockNumber,
    Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Neq,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
}

impl BinOp {
    /// Evaluate on literal operands; `None` when the result must be left
    /// to runtime (division by zero)
    pub fn fold(self, a: u64, b: u64) -> Option<u64> {
        let value = match self {
            BinOp::Add => a.wrapping_add(b),
            BinOp::Sub => a.wrapping_sub(b),
            BinOp::Mul => a.wrapping_mul(b),
            BinOp::Div => a.checked_div(b)?,
            BinOp::Mod => a.checked_rem(b)?,
            BinOp::Eq => (a == b) as u64,
            BinOp::Neq => (a != b) as u64,
            BinOp::Lt => (a < b) as u64,
            BinOp::Gt => (a > b) as u64,
            BinOp::Le => (a <= b) as u64,
            BinOp::Ge => (a >= b) as u64,
            BinOp::And => (a != 0 && b != 0) as u64,
            BinOp::Or => (a != 0 || b != 0) as u64,
        };
        Some(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Number(u64),
    Ident(String, Pos),
    Env(EnvVar),
    Not(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Fold literal sub-expressions
    pub fn fold_constants(self) -> Expr {
        match self {
            Expr::Not(inner) => match inner.fold_constants() {
                Expr::Number(value) => Expr::Number((value == 0) as u64),
                other => Expr::Not(Box::new(other)),
            },
            Expr::Binary(op, lhs, rhs) => {
                let lhs = lhs.fold_constants();
                let rhs = rhs.fold_constants();
                if let (Expr::Number(a), Expr::Number(b)) = (&lhs, &rhs) {
                    if let Some(value) = op.fold(*a, *b) {
                        return Expr::Number(value);
                    }
                }
                Expr::Binary(op, Box::new(lhs), Box::new(rhs))
            }
            other => other,
        }
    }
}
