//! Recursive descent parser for the script dialect
//!
//! Statements end at `;`, at a line break, before `}` or at end of input.
//! Binary operators are parsed by precedence climbing, lowest first:
//!
//! ```text
//! ??   ||   &&   == != === !==   < <= > >= in   + -   * / %
//! ```
//!
//! Assignment, arrow functions and `?:` sit above that, unary and postfix
//! operators, member access and calls below it.

use std::{mem, sync::Arc};

use crate::{
    error::{CompileError, Result},
    escape::cook,
    script::{
        ast::{BinaryOp, DeclKind, Expr, FunctionExpr, LogicalOp, Stmt, UnaryOp},
        lexer::{Lexeme, RawToken, lex},
        stack::ensure_sufficient_stack,
        value::number_to_string,
    },
};

enum Operator {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

pub(crate) struct Parser<'s> {
    source: &'s str,
    tokens: Vec<Lexeme>,
    pos: usize,
    loop_depth: usize,
    /// Set while parsing the head of a `for` loop, where `in` starts a for-in
    no_in: bool,
    /// `var` names collected for each function being parsed, innermost last
    vars: Vec<Vec<Arc<str>>>,
}

impl<'s> Parser<'s> {
    pub(crate) fn new(source: &'s str) -> Result<Self> {
        Ok(Self {
            source,
            tokens: lex(source)?,
            pos: 0,
            loop_depth: 0,
            no_in: false,
            vars: Vec::new(),
        })
    }

    /// Parses source of the form `function(<param>){...}`
    pub(crate) fn template_function(mut self) -> Result<Arc<FunctionExpr>> {
        self.expect(RawToken::Function, "function")?;
        let function = self.function_rest(None)?;
        if self.peek().is_some() {
            return self.unexpected();
        }
        if function.params.len() != 1 {
            return Err(CompileError::syntax(
                "template function must take exactly one parameter",
                0,
                self.source,
            ));
        }
        Ok(function)
    }

    /// Parses a list of statements up to end of input
    #[cfg(test)]
    pub(crate) fn program(mut self) -> Result<Vec<Stmt>> {
        self.vars.push(Vec::new());
        let mut body = Vec::new();
        while self.peek().is_some() {
            body.push(self.statement()?);
        }
        Ok(body)
    }

    fn peek(&self) -> Option<RawToken> {
        self.peek_at(0)
    }

    fn peek_at(&self, n: usize) -> Option<RawToken> {
        self.tokens.get(self.pos + n).map(|lexeme| lexeme.kind)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map_or(self.source.len(), |lexeme| lexeme.start)
    }

    fn text(&self, lexeme: &Lexeme) -> &'s str {
        &self.source[lexeme.start..lexeme.end]
    }

    fn newline_before(&self) -> bool {
        self.tokens.get(self.pos).is_some_and(|lexeme| lexeme.newline_before)
    }

    fn bump(&mut self) -> Option<Lexeme> {
        let lexeme = self.tokens.get(self.pos).copied();
        if lexeme.is_some() {
            self.pos += 1;
        }
        lexeme
    }

    fn eat(&mut self, kind: RawToken) -> bool {
        if self.peek() == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: RawToken, what: &str) -> Result<Lexeme> {
        match self.tokens.get(self.pos).copied() {
            Some(lexeme) if lexeme.kind == kind => {
                self.pos += 1;
                Ok(lexeme)
            }
            Some(lexeme) => self.error(format!("expected {what} but found {}", self.text(&lexeme))),
            None => self.error(format!("expected {what} but found end of input")),
        }
    }

    fn error<T>(&self, message: impl Into<String>) -> Result<T> {
        Err(CompileError::syntax(message, self.offset(), self.source))
    }

    fn unexpected<T>(&self) -> Result<T> {
        match self.tokens.get(self.pos) {
            Some(lexeme) => self.error(format!("unexpected token {}", self.text(lexeme))),
            None => self.error("unexpected end of input"),
        }
    }

    fn identifier(&mut self) -> Result<Arc<str>> {
        let lexeme = self.expect(RawToken::Ident, "identifier")?;
        Ok(Arc::from(self.text(&lexeme)))
    }

    fn record_var(&mut self, name: &Arc<str>) {
        if let Some(vars) = self.vars.last_mut() {
            if !vars.contains(name) {
                vars.push(name.clone());
            }
        }
    }

    /// Runs `parse` with the `in` operator allowed again, as inside brackets
    fn allow_in<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let saved = mem::replace(&mut self.no_in, false);
        let result = parse(self);
        self.no_in = saved;
        result
    }

    fn semicolon(&mut self) -> Result<()> {
        match self.tokens.get(self.pos) {
            Some(lexeme) if lexeme.kind == RawToken::Semicolon => {
                self.pos += 1;
                Ok(())
            }
            None => Ok(()),
            Some(lexeme) if lexeme.kind == RawToken::RBrace || lexeme.newline_before => Ok(()),
            Some(_) => self.unexpected(),
        }
    }

    // Statements

    fn statement(&mut self) -> Result<Stmt> {
        ensure_sufficient_stack(|| self.statement_inner())
    }

    fn statement_inner(&mut self) -> Result<Stmt> {
        let Some(kind) = self.peek() else {
            return self.unexpected();
        };
        match kind {
            RawToken::LBrace => Ok(Stmt::Block(self.block()?)),
            RawToken::Var | RawToken::Let | RawToken::Const => {
                let declaration = self.declaration()?;
                self.semicolon()?;
                Ok(declaration)
            }
            RawToken::If => {
                self.bump();
                self.expect(RawToken::LParen, "(")?;
                let test = self.allow_in(Self::expression)?;
                self.expect(RawToken::RParen, ")")?;
                let then = Box::new(self.statement()?);
                let otherwise = if self.eat(RawToken::Else) {
                    Some(Box::new(self.statement()?))
                } else {
                    None
                };
                Ok(Stmt::If { test, then, otherwise })
            }
            RawToken::For => self.for_statement(),
            RawToken::While => {
                self.bump();
                self.expect(RawToken::LParen, "(")?;
                let test = self.allow_in(Self::expression)?;
                self.expect(RawToken::RParen, ")")?;
                let body = self.loop_body()?;
                Ok(Stmt::While { test, body })
            }
            RawToken::Do => {
                self.bump();
                let body = self.loop_body()?;
                self.expect(RawToken::While, "while")?;
                self.expect(RawToken::LParen, "(")?;
                let test = self.allow_in(Self::expression)?;
                self.expect(RawToken::RParen, ")")?;
                self.eat(RawToken::Semicolon);
                Ok(Stmt::DoWhile { body, test })
            }
            RawToken::With => {
                self.bump();
                self.expect(RawToken::LParen, "(")?;
                let object = self.allow_in(Self::expression)?;
                self.expect(RawToken::RParen, ")")?;
                let body = Box::new(self.statement()?);
                Ok(Stmt::With { object, body })
            }
            RawToken::Break | RawToken::Continue => {
                if self.loop_depth == 0 {
                    return self.error(format!(
                        "illegal {} statement outside a loop",
                        self.text(&self.tokens[self.pos])
                    ));
                }
                self.bump();
                self.semicolon()?;
                Ok(if kind == RawToken::Break { Stmt::Break } else { Stmt::Continue })
            }
            RawToken::Return => {
                self.bump();
                let value = match self.peek() {
                    None | Some(RawToken::Semicolon | RawToken::RBrace) => None,
                    Some(_) if self.newline_before() => None,
                    Some(_) => Some(self.expression()?),
                };
                self.semicolon()?;
                Ok(Stmt::Return(value))
            }
            RawToken::Throw => {
                self.bump();
                if self.newline_before() {
                    return self.error("illegal newline after throw");
                }
                let value = self.expression()?;
                self.semicolon()?;
                Ok(Stmt::Throw(value))
            }
            RawToken::Function if self.peek_at(1) == Some(RawToken::Ident) => {
                self.bump();
                let name = self.identifier()?;
                self.record_var(&name);
                Ok(Stmt::Function(self.function_rest(Some(name))?))
            }
            RawToken::Semicolon => {
                self.bump();
                Ok(Stmt::Empty)
            }
            _ => {
                let expr = self.expression()?;
                self.semicolon()?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn block(&mut self) -> Result<Vec<Stmt>> {
        self.expect(RawToken::LBrace, "{")?;
        let mut body = Vec::new();
        while !matches!(self.peek(), Some(RawToken::RBrace) | None) {
            body.push(self.statement()?);
        }
        self.expect(RawToken::RBrace, "}")?;
        Ok(body)
    }

    fn loop_body(&mut self) -> Result<Box<Stmt>> {
        self.loop_depth += 1;
        let body = self.statement();
        self.loop_depth -= 1;
        Ok(Box::new(body?))
    }

    fn decl_kind(&self) -> Option<DeclKind> {
        match self.peek() {
            Some(RawToken::Var) => Some(DeclKind::Var),
            Some(RawToken::Let) => Some(DeclKind::Let),
            Some(RawToken::Const) => Some(DeclKind::Const),
            _ => None,
        }
    }

    fn declaration(&mut self) -> Result<Stmt> {
        let Some(kind) = self.decl_kind() else {
            return self.unexpected();
        };
        self.bump();
        let mut decls = Vec::new();
        loop {
            let name = self.identifier()?;
            let init = if self.eat(RawToken::Assign) {
                Some(self.assignment()?)
            } else if kind == DeclKind::Const {
                return self.error("missing initializer in const declaration");
            } else {
                None
            };
            if kind == DeclKind::Var {
                self.record_var(&name);
            }
            decls.push((name, init));
            if !self.eat(RawToken::Comma) {
                break;
            }
        }
        Ok(Stmt::Declare { kind, decls })
    }

    fn for_statement(&mut self) -> Result<Stmt> {
        self.bump();
        self.expect(RawToken::LParen, "(")?;
        let head = self.pos;
        let kind = self.decl_kind();
        if kind.is_some() {
            self.bump();
        }
        if self.peek() == Some(RawToken::Ident) {
            let is_of = self.peek_at(1) == Some(RawToken::Ident)
                && self.text(&self.tokens[self.pos + 1]) == "of";
            let is_in = self.peek_at(1) == Some(RawToken::In);
            if is_of || is_in {
                let name = self.identifier()?;
                if kind == Some(DeclKind::Var) {
                    self.record_var(&name);
                }
                self.bump();
                let subject = self.allow_in(Self::expression)?;
                self.expect(RawToken::RParen, ")")?;
                let body = self.loop_body()?;
                return Ok(if is_of {
                    Stmt::ForOf { kind, name, iterable: subject, body }
                } else {
                    Stmt::ForIn { kind, name, object: subject, body }
                });
            }
        }

        self.pos = head;
        let init = match self.peek() {
            Some(RawToken::Semicolon) => None,
            _ => {
                self.no_in = true;
                let init = if kind.is_some() {
                    self.declaration()
                } else {
                    self.expression().map(Stmt::Expr)
                };
                self.no_in = false;
                Some(Box::new(init?))
            }
        };
        self.expect(RawToken::Semicolon, ";")?;
        let test = match self.peek() {
            Some(RawToken::Semicolon) => None,
            _ => Some(self.expression()?),
        };
        self.expect(RawToken::Semicolon, ";")?;
        let update = match self.peek() {
            Some(RawToken::RParen) => None,
            _ => Some(self.expression()?),
        };
        self.expect(RawToken::RParen, ")")?;
        let body = self.loop_body()?;
        Ok(Stmt::For { init, test, update, body })
    }

    // Functions

    fn params(&mut self) -> Result<Vec<Arc<str>>> {
        self.expect(RawToken::LParen, "(")?;
        let mut params = Vec::new();
        while !self.eat(RawToken::RParen) {
            params.push(self.identifier()?);
            if !self.eat(RawToken::Comma) {
                self.expect(RawToken::RParen, ")")?;
                break;
            }
        }
        Ok(params)
    }

    /// Parses the parameters and body following `function` or its name
    fn function_rest(&mut self, name: Option<Arc<str>>) -> Result<Arc<FunctionExpr>> {
        let params = self.params()?;
        self.function_body(name, params, false)
    }

    fn function_body(
        &mut self,
        name: Option<Arc<str>>,
        params: Vec<Arc<str>>,
        arrow: bool,
    ) -> Result<Arc<FunctionExpr>> {
        let saved_loops = mem::replace(&mut self.loop_depth, 0);
        self.vars.push(Vec::new());
        let body = self.allow_in(Self::block);
        let vars = self.vars.pop().unwrap_or_default();
        self.loop_depth = saved_loops;
        Ok(Arc::new(FunctionExpr {
            name,
            params,
            body: body?,
            vars,
            arrow,
        }))
    }

    /// Looks ahead for `x =>` or `(a, b) =>`
    fn arrow_ahead(&self) -> bool {
        match self.peek() {
            Some(RawToken::Ident) => self.peek_at(1) == Some(RawToken::Arrow),
            Some(RawToken::LParen) => {
                let mut depth = 0usize;
                for (i, lexeme) in self.tokens[self.pos..].iter().enumerate() {
                    match lexeme.kind {
                        RawToken::LParen => depth += 1,
                        RawToken::RParen => {
                            depth -= 1;
                            if depth == 0 {
                                return self.peek_at(i + 1) == Some(RawToken::Arrow);
                            }
                        }
                        _ => {}
                    }
                }
                false
            }
            _ => false,
        }
    }

    fn arrow_function(&mut self) -> Result<Expr> {
        let params = if self.peek() == Some(RawToken::Ident) {
            vec![self.identifier()?]
        } else {
            self.params()?
        };
        self.expect(RawToken::Arrow, "=>")?;
        if self.peek() == Some(RawToken::LBrace) {
            return Ok(Expr::Function(self.function_body(None, params, true)?));
        }
        self.vars.push(Vec::new());
        let value = self.assignment();
        self.vars.pop();
        Ok(Expr::Function(Arc::new(FunctionExpr {
            name: None,
            params,
            body: vec![Stmt::Return(Some(value?))],
            vars: Vec::new(),
            arrow: true,
        })))
    }

    // Expressions

    fn expression(&mut self) -> Result<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr> {
        if self.arrow_ahead() {
            return self.arrow_function();
        }
        let target = self.conditional()?;
        let op = match self.peek() {
            Some(RawToken::Assign) => None,
            Some(RawToken::PlusAssign) => Some(BinaryOp::Add),
            Some(RawToken::MinusAssign) => Some(BinaryOp::Sub),
            Some(RawToken::StarAssign) => Some(BinaryOp::Mul),
            Some(RawToken::SlashAssign) => Some(BinaryOp::Div),
            Some(RawToken::PercentAssign) => Some(BinaryOp::Rem),
            _ => return Ok(target),
        };
        if !target.is_assignable() {
            return self.error("invalid assignment target");
        }
        self.bump();
        let value = self.assignment()?;
        Ok(Expr::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    fn conditional(&mut self) -> Result<Expr> {
        let test = self.binary(1)?;
        if !self.eat(RawToken::Question) {
            return Ok(test);
        }
        let then = self.allow_in(Self::assignment)?;
        self.expect(RawToken::Colon, ":")?;
        let otherwise = self.assignment()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn operator(&self) -> Option<(Operator, u8)> {
        let operator = match self.peek()? {
            RawToken::Nullish => (Operator::Logical(LogicalOp::Nullish), 1),
            RawToken::OrOr => (Operator::Logical(LogicalOp::Or), 2),
            RawToken::AndAnd => (Operator::Logical(LogicalOp::And), 3),
            RawToken::EqEq => (Operator::Binary(BinaryOp::Eq), 4),
            RawToken::NotEq => (Operator::Binary(BinaryOp::NotEq), 4),
            RawToken::EqEqEq => (Operator::Binary(BinaryOp::StrictEq), 4),
            RawToken::NotEqEq => (Operator::Binary(BinaryOp::StrictNotEq), 4),
            RawToken::Lt => (Operator::Binary(BinaryOp::Lt), 5),
            RawToken::LtEq => (Operator::Binary(BinaryOp::LtEq), 5),
            RawToken::Gt => (Operator::Binary(BinaryOp::Gt), 5),
            RawToken::GtEq => (Operator::Binary(BinaryOp::GtEq), 5),
            RawToken::In if !self.no_in => (Operator::Binary(BinaryOp::In), 5),
            RawToken::Plus => (Operator::Binary(BinaryOp::Add), 6),
            RawToken::Minus => (Operator::Binary(BinaryOp::Sub), 6),
            RawToken::Star => (Operator::Binary(BinaryOp::Mul), 7),
            RawToken::Slash => (Operator::Binary(BinaryOp::Div), 7),
            RawToken::Percent => (Operator::Binary(BinaryOp::Rem), 7),
            _ => return None,
        };
        Some(operator)
    }

    fn binary(&mut self, min_precedence: u8) -> Result<Expr> {
        let mut lhs = self.unary()?;
        while let Some((operator, precedence)) = self.operator() {
            if precedence < min_precedence {
                break;
            }
            self.bump();
            let rhs = self.binary(precedence + 1)?;
            lhs = match (operator, lhs) {
                // extending the run keeps long concatenations flat
                (Operator::Binary(op), Expr::Binary { lhs, mut rest }) => {
                    rest.push((op, rhs));
                    Expr::Binary { lhs, rest }
                }
                (Operator::Binary(op), lhs) => Expr::Binary {
                    lhs: Box::new(lhs),
                    rest: vec![(op, rhs)],
                },
                (Operator::Logical(op), lhs) => Expr::Logical {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
            };
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr> {
        ensure_sufficient_stack(|| self.unary_inner())
    }

    fn unary_inner(&mut self) -> Result<Expr> {
        let op = match self.peek() {
            Some(RawToken::Bang) => UnaryOp::Not,
            Some(RawToken::Minus) => UnaryOp::Neg,
            Some(RawToken::Plus) => UnaryOp::Plus,
            Some(RawToken::Typeof) => UnaryOp::TypeOf,
            Some(RawToken::Void) => UnaryOp::Void,
            Some(kind @ (RawToken::PlusPlus | RawToken::MinusMinus)) => {
                self.bump();
                let target = self.unary()?;
                if !target.is_assignable() {
                    return self.error("invalid increment target");
                }
                return Ok(Expr::Update {
                    increment: kind == RawToken::PlusPlus,
                    prefix: true,
                    target: Box::new(target),
                });
            }
            _ => return self.postfix(),
        };
        self.bump();
        Ok(Expr::Unary {
            op,
            expr: Box::new(self.unary()?),
        })
    }

    fn postfix(&mut self) -> Result<Expr> {
        let expr = self.call_member()?;
        match self.tokens.get(self.pos).copied() {
            Some(lexeme)
                if matches!(lexeme.kind, RawToken::PlusPlus | RawToken::MinusMinus)
                    && !lexeme.newline_before =>
            {
                if !expr.is_assignable() {
                    return self.error("invalid increment target");
                }
                self.bump();
                Ok(Expr::Update {
                    increment: lexeme.kind == RawToken::PlusPlus,
                    prefix: false,
                    target: Box::new(expr),
                })
            }
            _ => Ok(expr),
        }
    }

    fn property_name(&mut self) -> Result<Arc<str>> {
        match self.tokens.get(self.pos).copied() {
            Some(lexeme) if lexeme.kind.is_word() => {
                self.pos += 1;
                Ok(Arc::from(self.text(&lexeme)))
            }
            _ => self.error("expected property name"),
        }
    }

    fn index(&mut self) -> Result<Box<Expr>> {
        let index = self.allow_in(Self::expression)?;
        self.expect(RawToken::RBracket, "]")?;
        Ok(Box::new(index))
    }

    fn call_member(&mut self) -> Result<Expr> {
        let mut expr = self.primary()?;
        loop {
            expr = match self.peek() {
                Some(RawToken::Dot) => {
                    self.bump();
                    let property = self.property_name()?;
                    Expr::Member { object: Box::new(expr), property, optional: false }
                }
                Some(RawToken::QuestionDot) => {
                    self.bump();
                    if self.eat(RawToken::LBracket) {
                        let index = self.index()?;
                        Expr::Index { object: Box::new(expr), index, optional: true }
                    } else {
                        let property = self.property_name()?;
                        Expr::Member { object: Box::new(expr), property, optional: true }
                    }
                }
                Some(RawToken::LBracket) => {
                    self.bump();
                    let index = self.index()?;
                    Expr::Index { object: Box::new(expr), index, optional: false }
                }
                Some(RawToken::LParen) => {
                    self.bump();
                    let args = self.allow_in(|parser| parser.list(RawToken::RParen, ")"))?;
                    Expr::Call { callee: Box::new(expr), args }
                }
                _ => return Ok(expr),
            };
        }
    }

    /// Comma separated expressions up to `close`, allowing a trailing comma
    fn list(&mut self, close: RawToken, what: &str) -> Result<Vec<Expr>> {
        let mut items = Vec::new();
        while !self.eat(close) {
            items.push(self.assignment()?);
            if !self.eat(RawToken::Comma) {
                self.expect(close, what)?;
                break;
            }
        }
        Ok(items)
    }

    fn string_literal(&self, lexeme: &Lexeme) -> Result<Arc<str>> {
        let text = self.text(lexeme);
        let raw = &text[1..text.len() - 1];
        cook(raw)
            .map(|cooked| Arc::from(cooked.as_ref()))
            .map_err(|message| CompileError::syntax(message, lexeme.start, self.source))
    }

    fn primary(&mut self) -> Result<Expr> {
        let Some(lexeme) = self.tokens.get(self.pos).copied() else {
            return self.unexpected();
        };
        let expr = match lexeme.kind {
            RawToken::Number(n) => Expr::Number(n),
            RawToken::String => Expr::String(self.string_literal(&lexeme)?),
            RawToken::True => Expr::Bool(true),
            RawToken::False => Expr::Bool(false),
            RawToken::Null => Expr::Null,
            RawToken::This => Expr::This,
            RawToken::Ident => Expr::Ident(Arc::from(self.text(&lexeme))),
            RawToken::LParen => {
                self.bump();
                let expr = self.allow_in(Self::expression)?;
                self.expect(RawToken::RParen, ")")?;
                return Ok(expr);
            }
            RawToken::LBracket => {
                self.bump();
                let items = self.allow_in(|parser| parser.list(RawToken::RBracket, "]"))?;
                return Ok(Expr::Array(items));
            }
            RawToken::LBrace => {
                self.bump();
                return self.allow_in(Self::object_literal);
            }
            RawToken::Function => {
                self.bump();
                let name = if self.peek() == Some(RawToken::Ident) {
                    Some(self.identifier()?)
                } else {
                    None
                };
                return Ok(Expr::Function(self.function_rest(name)?));
            }
            _ => return self.unexpected(),
        };
        self.pos += 1;
        Ok(expr)
    }

    fn object_literal(&mut self) -> Result<Expr> {
        let mut entries = Vec::new();
        while !self.eat(RawToken::RBrace) {
            let Some(lexeme) = self.tokens.get(self.pos).copied() else {
                return self.unexpected();
            };
            let key: Arc<str> = match lexeme.kind {
                RawToken::String => self.string_literal(&lexeme)?,
                RawToken::Number(n) => Arc::from(number_to_string(n)),
                kind if kind.is_word() => Arc::from(self.text(&lexeme)),
                _ => return self.error("expected property name"),
            };
            self.pos += 1;
            let value = if self.eat(RawToken::Colon) {
                self.assignment()?
            } else if lexeme.kind == RawToken::Ident {
                Expr::Ident(key.clone())
            } else {
                return self.error("expected :");
            };
            entries.push((key, value));
            if !self.eat(RawToken::Comma) {
                self.expect(RawToken::RBrace, "}")?;
                break;
            }
        }
        Ok(Expr::Object(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> Vec<Stmt> {
        Parser::new(source).unwrap().program().unwrap()
    }

    fn parse_err(source: &str) -> String {
        match Parser::new(source).and_then(Parser::program) {
            Ok(stmts) => panic!("expected an error, parsed {stmts:?}"),
            Err(err) => err.to_string(),
        }
    }

    fn ident(name: &str) -> Box<Expr> {
        Box::new(Expr::Ident(Arc::from(name)))
    }

    #[test]
    fn precedence() {
        assert_eq!(
            parse("a + b * c;"),
            vec![Stmt::Expr(Expr::Binary {
                lhs: ident("a"),
                rest: vec![(
                    BinaryOp::Add,
                    Expr::Binary {
                        lhs: ident("b"),
                        rest: vec![(BinaryOp::Mul, Expr::Ident(Arc::from("c")))],
                    },
                )],
            })]
        );
        assert_eq!(
            parse("a || b && c"),
            vec![Stmt::Expr(Expr::Logical {
                op: LogicalOp::Or,
                lhs: ident("a"),
                rhs: Box::new(Expr::Logical {
                    op: LogicalOp::And,
                    lhs: ident("b"),
                    rhs: ident("c"),
                }),
            })]
        );
    }

    #[test]
    fn left_associative_runs_stay_flat() {
        assert_eq!(
            parse("a - b + c"),
            vec![Stmt::Expr(Expr::Binary {
                lhs: ident("a"),
                rest: vec![
                    (BinaryOp::Sub, Expr::Ident(Arc::from("b"))),
                    (BinaryOp::Add, Expr::Ident(Arc::from("c"))),
                ],
            })]
        );
        assert_eq!(
            parse("a * b == c"),
            vec![Stmt::Expr(Expr::Binary {
                lhs: ident("a"),
                rest: vec![
                    (BinaryOp::Mul, Expr::Ident(Arc::from("b"))),
                    (BinaryOp::Eq, Expr::Ident(Arc::from("c"))),
                ],
            })]
        );
    }

    #[test]
    fn semicolons_are_inserted_at_line_breaks() {
        assert_eq!(parse("a = 1\nb = 2\n").len(), 2);
        assert_eq!(parse("{ a }").len(), 1);
        assert!(parse_err("a = 1 b = 2").starts_with("unexpected token b"));
    }

    #[test]
    fn return_ends_at_line_break() {
        let function = Parser::new("function(d){ return\n1 }").unwrap().template_function().unwrap();
        assert_eq!(function.body[0], Stmt::Return(None));
    }

    #[test]
    fn parses_generated_template() {
        let source = "function(obj){\n\
                      var __t,__p='',__j=Array.prototype.join,print=function(){__p+=__j.call(arguments,'');};\n\
                      with(obj||{}){\n\
                      __p+='Hi '+\n\
                      ((__t=( name ))==null?'':_.escape(__t))+\n\
                      '!';\n\
                      }\n\
                      return __p;\n\
                      }";
        let function = Parser::new(source).unwrap().template_function().unwrap();
        assert_eq!(function.params, vec![Arc::from("obj")]);
        assert_eq!(function.vars, vec![Arc::from("__t"), Arc::from("__p"), Arc::from("__j"), Arc::from("print")]);
        assert!(matches!(function.body[1], Stmt::With { .. }));
        assert!(matches!(function.body[2], Stmt::Return(Some(_))));
    }

    #[test]
    fn for_loop_forms() {
        assert!(matches!(
            parse("for (var i = 0; i < 3; i++) {}")[0],
            Stmt::For { init: Some(_), test: Some(_), update: Some(_), .. }
        ));
        assert!(matches!(parse("for (;;) { break }")[0], Stmt::For { init: None, .. }));
        assert!(matches!(
            parse("for (const item of items) {}")[0],
            Stmt::ForOf { kind: Some(DeclKind::Const), .. }
        ));
        assert!(matches!(parse("for (key in object) {}")[0], Stmt::ForIn { kind: None, .. }));
        assert!(matches!(
            parse("for (var i = ('a' in o) ? 1 : 0; i < 1; i++) {}")[0],
            Stmt::For { .. }
        ));
    }

    #[test]
    fn arrow_functions() {
        let Stmt::Expr(Expr::Call { args, .. }) = &parse("items.map(x => x * 2)")[0] else {
            panic!("expected a call");
        };
        let Expr::Function(function) = &args[0] else {
            panic!("expected a function");
        };
        assert!(function.arrow);
        assert_eq!(function.params, vec![Arc::from("x")]);
        assert!(matches!(function.body[0], Stmt::Return(Some(_))));

        let Stmt::Expr(Expr::Function(function)) = &parse("((a, b) => { return a })")[0] else {
            panic!("expected a function");
        };
        assert_eq!(function.params.len(), 2);
    }

    #[test]
    fn object_literals() {
        let Stmt::Expr(Expr::Assign { value, .. }) = &parse("o = {a: 1, 'b c': 2, d, if: 3,}")[0] else {
            panic!("expected an assignment");
        };
        let Expr::Object(entries) = value.as_ref() else {
            panic!("expected an object");
        };
        let keys: Vec<&str> = entries.iter().map(|(key, _)| key.as_ref()).collect();
        assert_eq!(keys, vec!["a", "b c", "d", "if"]);
    }

    #[test]
    fn string_escapes_are_decoded() {
        assert_eq!(
            parse(r"'a\'b\n'"),
            vec![Stmt::Expr(Expr::String(Arc::from("a'b\n")))]
        );
    }

    #[test]
    fn var_declarations_are_collected_per_function() {
        let function = Parser::new(
            "function(d){ if (d) { var a = 1 } for (var i in d) {} function f() { var inner } }",
        )
        .unwrap()
        .template_function()
        .unwrap();
        assert_eq!(function.vars, vec![Arc::from("a"), Arc::from("i"), Arc::from("f")]);
    }

    #[test]
    fn rejects_invalid_programs() {
        assert!(parse_err("a +").contains("unexpected end of input"));
        assert!(parse_err("1 = 2").starts_with("invalid assignment target"));
        assert!(parse_err("break").starts_with("illegal break statement"));
        assert!(parse_err("if (a { }").starts_with("expected )"));
        assert!(parse_err("const a;").starts_with("missing initializer"));
        assert!(parse_err("x = {'a' b}").starts_with("expected :"));
    }

    #[test]
    fn template_function_needs_one_parameter() {
        assert!(Parser::new("function(a, b){}").unwrap().template_function().is_err());
        assert!(Parser::new("function(a){} extra").unwrap().template_function().is_err());
    }
}
