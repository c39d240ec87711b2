//! Recursive-descent parser for the contract language
//!
//! The first syntax error aborts the parse.

use super::ast::{BinOp, ContractDef, EnvVar, EventDef, Expr, FunctionDef, ParamDef, StateVar, Stmt, Type};
use super::lexer::{Pos, Token, TokenKind};
use super::Diagnostic;

type ParseResult<T> = Result<T, Diagnostic>;

/// Visibility keywords accepted (and ignored) on state variables
const VISIBILITY: &[&str] = &["public", "private", "internal"];

const TIGHTEST_LEVEL: usize = 5;

/// Deepest nesting of parentheses, `!` and `if` the parser accepts
pub const MAX_NESTING: usize = 256;

/// Binding level (0 = loosest) and operator for a token
fn binary_op(kind: &TokenKind) -> Option<(usize, BinOp)> {
    let entry = match kind {
        TokenKind::OrOr => (0, BinOp::Or),
        TokenKind::AndAnd => (1, BinOp::And),
        TokenKind::EqEq => (2, BinOp::Eq),
        TokenKind::NotEq => (2, BinOp::Neq),
        TokenKind::Lt => (3, BinOp::Lt),
        TokenKind::Gt => (3, BinOp::Gt),
        TokenKind::Le => (3, BinOp::Le),
        TokenKind::Ge => (3, BinOp::Ge),
        TokenKind::Plus => (4, BinOp::Add),
        TokenKind::Minus => (4, BinOp::Sub),
        TokenKind::Star => (5, BinOp::Mul),
        TokenKind::Slash => (5, BinOp::Div),
        TokenKind::Percent => (5, BinOp::Mod),
        _ => return None,
    };
    Some(entry)
}

pub struct Parser {
    tokens: Vec<Token>,
    cursor: usize,
    depth: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            cursor: 0,
            depth: 0,
        }
    }

    /// Parse every contract in the source unit
    pub fn parse_unit(mut self) -> ParseResult<Vec<ContractDef>> {
        let mut contracts = Vec::new();
        while !self.check(&TokenKind::Eof) {
            contracts.push(self.contract()?);
        }
        Ok(contracts)
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.cursor.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.cursor += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn check_keyword(&self, word: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Ident(name) if name == word)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, word: &str) -> bool {
        if self.check_keyword(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn unexpected(&self, expected: &str) -> Diagnostic {
        let token = self.peek();
        Diagnostic::error(
            token.pos,
            format!("expected {} but found {}", expected, token.kind.describe()),
        )
    }

    fn expect(&mut self, kind: TokenKind) -> ParseResult<Pos> {
        if self.check(&kind) {
            Ok(self.advance().pos)
        } else {
            Err(self.unexpected(&kind.describe()))
        }
    }

    fn expect_keyword(&mut self, word: &str) -> ParseResult<Pos> {
        if self.check_keyword(word) {
            Ok(self.advance().pos)
        } else {
            Err(self.unexpected(&format!("'{}'", word)))
        }
    }

    fn ident(&mut self, what: &str) -> ParseResult<(String, Pos)> {
        match &self.peek().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                Ok((name, self.advance().pos))
            }
            _ => Err(self.unexpected(what)),
        }
    }

    fn peek_type(&self) -> Option<Type> {
        match &self.peek().kind {
            TokenKind::Ident(word) => Type::from_keyword(word),
            _ => None,
        }
    }

    fn ty(&mut self) -> ParseResult<Type> {
        match self.peek_type() {
            Some(ty) => {
                self.advance();
                Ok(ty)
            }
            None => Err(self.unexpected("a type")),
        }
    }

    fn contract(&mut self) -> ParseResult<ContractDef> {
        let pos = self.expect_keyword("contract")?;
        let (name, _) = self.ident("contract name")?;
        self.expect(TokenKind::LBrace)?;

        let mut contract = ContractDef {
            name,
            state_vars: Vec::new(),
            events: Vec::new(),
            functions: Vec::new(),
            pos,
        };

        while !self.eat(&TokenKind::RBrace) {
            if self.check_keyword("function") {
                contract.functions.push(self.function()?);
            } else if self.check_keyword("event") {
                contract.events.push(self.event()?);
            } else if self.peek_type().is_some() {
                contract.state_vars.push(self.state_var()?);
            } else {
                return Err(self.unexpected("'}'"));
            }
        }

        Ok(contract)
    }

    fn state_var(&mut self) -> ParseResult<StateVar> {
        let ty = self.ty()?;
        while VISIBILITY.iter().any(|word| self.check_keyword(word)) {
            self.advance();
        }
        let (name, pos) = self.ident("variable name")?;
        if self.check(&TokenKind::Assign) {
            return Err(Diagnostic::error(
                self.peek().pos,
                "state variable initializers are not supported",
            ));
        }
        self.expect(TokenKind::Semi)?;
        Ok(StateVar { name, ty, pos })
    }

    fn event(&mut self) -> ParseResult<EventDef> {
        self.expect_keyword("event")?;
        let (name, pos) = self.ident("event name")?;
        let params = self.params(true)?;
        self.expect(TokenKind::Semi)?;
        Ok(EventDef { name, params, pos })
    }

    fn params(&mut self, allow_indexed: bool) -> ParseResult<Vec<ParamDef>> {
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        if self.eat(&TokenKind::RParen) {
            return Ok(params);
        }

        loop {
            let ty = self.ty()?;
            let indexed = allow_indexed && self.eat_keyword("indexed");
            let (name, pos) = self.ident("parameter name")?;
            params.push(ParamDef {
                name,
                ty,
                indexed,
                pos,
            });
            if self.eat(&TokenKind::RParen) {
                return Ok(params);
            }
            self.expect(TokenKind::Comma)?;
        }
    }

    fn function(&mut self) -> ParseResult<FunctionDef> {
        self.expect_keyword("function")?;
        let (name, pos) = self.ident("function name")?;
        let params = self.params(false)?;

        let mut constant = false;
        loop {
            if self.eat_keyword("constant") || self.eat_keyword("view") || self.eat_keyword("pure") {
                constant = true;
            } else if !(self.eat_keyword("public") || self.eat_keyword("external")) {
                break;
            }
        }

        let returns = if self.eat_keyword("returns") {
            self.expect(TokenKind::LParen)?;
            let ty = self.ty()?;
            // Named return values are accepted and ignored
            if let TokenKind::Ident(_) = self.peek().kind {
                self.advance();
            }
            self.expect(TokenKind::RParen)?;
            Some(ty)
        } else {
            None
        };

        let body = self.block()?;
        Ok(FunctionDef {
            name,
            params,
            returns,
            constant,
            body,
            pos,
        })
    }

    fn block(&mut self) -> ParseResult<Vec<Stmt>> {
        self.expect(TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.eat(&TokenKind::RBrace) {
            stmts.push(self.statement()?);
        }
        Ok(stmts)
    }

    fn statement(&mut self) -> ParseResult<Stmt> {
        if self.check_keyword("return") {
            let pos = self.advance().pos;
            let value = if self.check(&TokenKind::Semi) {
                None
            } else {
                Some(self.expr()?)
            };
            self.expect(TokenKind::Semi)?;
            return Ok(Stmt::Return(value, pos));
        }

        if self.eat_keyword("if") {
            return self.if_statement();
        }

        if self.eat_keyword("require") {
            self.expect(TokenKind::LParen)?;
            let cond = self.expr()?;
            self.expect(TokenKind::RParen)?;
            self.expect(TokenKind::Semi)?;
            return Ok(Stmt::Require(cond));
        }

        if self.peek_type().is_some() {
            return Err(Diagnostic::error(
                self.peek().pos,
                "local variables are not supported",
            ));
        }

        let (target, pos) = self.ident("a statement")?;
        self.expect(TokenKind::Assign)?;
        let value = self.expr()?;
        self.expect(TokenKind::Semi)?;
        Ok(Stmt::Assign { target, value, pos })
    }

    fn if_statement(&mut self) -> ParseResult<Stmt> {
        self.nested("statement", Self::if_body)
    }

    fn if_body(&mut self) -> ParseResult<Stmt> {
        self.expect(TokenKind::LParen)?;
        let cond = self.expr()?;
        self.expect(TokenKind::RParen)?;
        let then = self.block()?;

        let otherwise = if self.eat_keyword("else") {
            if self.eat_keyword("if") {
                vec![self.if_statement()?]
            } else {
                self.block()?
            }
        } else {
            Vec::new()
        };

        Ok(Stmt::If {
            cond,
            then,
            otherwise,
        })
    }

    fn expr(&mut self) -> ParseResult<Expr> {
        self.binary(0)
    }

    /// Precedence climbing, loosest level first
    fn binary(&mut self, level: usize) -> ParseResult<Expr> {
        if level > TIGHTEST_LEVEL {
            return self.unary();
        }

        let mut lhs = self.binary(level + 1)?;
        while let Some((op_level, op)) = binary_op(&self.peek().kind) {
            if op_level != level {
                break;
            }
            self.advance();
            let rhs = self.binary(level + 1)?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        if self.eat(&TokenKind::Bang) {
            let inner = self.nested("expression", Self::unary)?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.primary()
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Number(value) => {
                self.advance();
                Ok(Expr::Number(value))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.nested("expression", Self::expr)?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::Ident(name) => {
                self.advance();
                match name.as_str() {
                    "true" => Ok(Expr::Number(1)),
                    "false" => Ok(Expr::Number(0)),
                    "now" => Ok(Expr::Env(EnvVar::Timestamp)),
                    "msg" | "block" => self.member(&name, token.pos),
                    _ => Ok(Expr::Ident(name, token.pos)),
                }
            }
            _ => Err(self.unexpected("an expression")),
        }
    }

    /// Run `parse` one nesting level deeper, failing past [`MAX_NESTING`]
    fn nested<T>(
        &mut self,
        what: &str,
        parse: impl FnOnce(&mut Self) -> ParseResult<T>,
    ) -> ParseResult<T> {
        if self.depth >= MAX_NESTING {
            return Err(Diagnostic::error(
                self.peek().pos,
                format!("{} nested too deeply", what),
            ));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn member(&mut self, object: &str, pos: Pos) -> ParseResult<Expr> {
        self.expect(TokenKind::Dot)?;
        let (field, _) = self.ident("member name")?;
        match (object, field.as_str()) {
            ("msg", "sender") => Ok(Expr::Env(EnvVar::Sender)),
            ("block", "number") => Ok(Expr::Env(EnvVar::BlockNumber)),
            ("block", "timestamp") => Ok(Expr::Env(EnvVar::Timestamp)),
            _ => Err(Diagnostic::error(
                pos,
                format!("unknown member {}.{}", object, field),
            )),
        }
    }
}
