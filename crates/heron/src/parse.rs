//! Recursive-descent parser for the Heron surface syntax.
//!
//! The parser produces the expression and statement AST directly; the only
//! parse-time-only shapes are [`ParsedModule`] and [`ParsedClass`], which
//! carry unresolved names (imports, interface lists) for the loader's link
//! pass. Names and string literals are interned as they are read.

use std::sync::Arc;

use logos::Logos as _;

use crate::error::{ErrorKind, EvalResult, HeronError};
use crate::expr::{BinaryOp, Expr, Literal, UnaryOp};
use crate::intern::{known, Interner, StringId};
use crate::lexer::Token;
use crate::program::{EnumDef, FieldDef, FunctionDef, InterfaceDef, ModuleId, Param};
use crate::stmt::Stmt;

/// A parsed module before registration and linking.
#[derive(Debug)]
pub struct ParsedModule {
    pub name: StringId,
    /// Imported module names, loaded recursively by the loader.
    pub imports: Vec<StringId>,
    pub classes: Vec<ParsedClass>,
    pub interfaces: Vec<InterfaceDef>,
    pub enums: Vec<EnumDef>,
    pub fields: Vec<FieldDef>,
    pub functions: Vec<FunctionDef>,
}

/// A parsed class; `implements` still holds names, resolved during linking.
#[derive(Debug)]
pub struct ParsedClass {
    pub name: StringId,
    pub implements: Vec<StringId>,
    pub fields: Vec<FieldDef>,
    pub methods: Vec<FunctionDef>,
}

/// Parses a whole module source file.
pub fn parse_module(
    source: &str,
    interner: &mut Interner,
    module: ModuleId,
) -> EvalResult<ParsedModule> {
    let mut parser = Parser::new(source, interner, module)?;
    let parsed = parser.module()?;
    parser.expect_end()?;
    Ok(parsed)
}

/// Parses a single expression, e.g. for `eval_string`.
pub fn parse_expression(
    source: &str,
    interner: &mut Interner,
    module: ModuleId,
) -> EvalResult<Expr> {
    let mut parser = Parser::new(source, interner, module)?;
    let expr = parser.expression()?;
    parser.expect_end()?;
    Ok(expr)
}

struct Parser<'a, 's> {
    source: &'s str,
    tokens: Vec<(Token, std::ops::Range<usize>)>,
    pos: usize,
    interner: &'a mut Interner,
    module: ModuleId,
}

impl<'a, 's> Parser<'a, 's> {
    fn new(source: &'s str, interner: &'a mut Interner, module: ModuleId) -> EvalResult<Self> {
        let mut tokens = Vec::new();
        for (token, span) in Token::lexer(source).spanned() {
            match token {
                Ok(token) => tokens.push((token, span)),
                Err(()) => {
                    return Err(parse_error(
                        source,
                        span.start,
                        "unrecognized character".to_owned(),
                    ))
                }
            }
        }
        Ok(Self {
            source,
            tokens,
            pos: 0,
            interner,
            module,
        })
    }

    // ---- token plumbing -------------------------------------------------

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> EvalResult<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error_here(format!("expected {token}")))
        }
    }

    fn expect_ident(&mut self) -> EvalResult<StringId> {
        match self.peek() {
            Some(Token::Ident(_)) => {
                let Some(Token::Ident(name)) = self.advance() else {
                    unreachable!("peeked an identifier");
                };
                Ok(self.interner.intern(&name))
            }
            _ => Err(self.error_here("expected an identifier".to_owned())),
        }
    }

    fn expect_end(&mut self) -> EvalResult<()> {
        match self.peek() {
            None => Ok(()),
            Some(_) => Err(self.error_here("expected end of input".to_owned())),
        }
    }

    fn error_here(&self, message: String) -> HeronError {
        let (message, offset) = match self.tokens.get(self.pos) {
            Some((token, span)) => (format!("{message}, found {token}"), span.start),
            None => (format!("{message}, found end of input"), self.source.len()),
        };
        parse_error(self.source, offset, message)
    }

    // ---- declarations ---------------------------------------------------

    fn module(&mut self) -> EvalResult<ParsedModule> {
        self.expect(&Token::Module)?;
        let name = self.expect_ident()?;
        self.expect(&Token::LBrace)?;

        let mut parsed = ParsedModule {
            name,
            imports: Vec::new(),
            classes: Vec::new(),
            interfaces: Vec::new(),
            enums: Vec::new(),
            fields: Vec::new(),
            functions: Vec::new(),
        };
        while !self.eat(&Token::RBrace) {
            match self.peek() {
                Some(Token::Import) => {
                    self.advance();
                    parsed.imports.push(self.expect_ident()?);
                    self.expect(&Token::Semi)?;
                }
                Some(Token::Class) => parsed.classes.push(self.class()?),
                Some(Token::Interface) => parsed.interfaces.push(self.interface()?),
                Some(Token::Enum) => parsed.enums.push(self.enumeration()?),
                Some(Token::Function) => parsed.functions.push(self.function()?),
                Some(Token::Var) => parsed.fields.push(self.field()?),
                _ => return Err(self.error_here("expected a declaration".to_owned())),
            }
        }
        Ok(parsed)
    }

    fn class(&mut self) -> EvalResult<ParsedClass> {
        self.expect(&Token::Class)?;
        let name = self.expect_ident()?;
        let mut implements = Vec::new();
        if self.eat(&Token::Implements) {
            implements.push(self.expect_ident()?);
            while self.eat(&Token::Comma) {
                implements.push(self.expect_ident()?);
            }
        }
        self.expect(&Token::LBrace)?;
        let mut fields = Vec::new();
        let mut methods = Vec::new();
        while !self.eat(&Token::RBrace) {
            match self.peek() {
                Some(Token::Var) => fields.push(self.field()?),
                Some(Token::Function) => methods.push(self.function()?),
                _ => return Err(self.error_here("expected a field or method".to_owned())),
            }
        }
        Ok(ParsedClass {
            name,
            implements,
            fields,
            methods,
        })
    }

    fn interface(&mut self) -> EvalResult<InterfaceDef> {
        self.expect(&Token::Interface)?;
        let name = self.expect_ident()?;
        self.expect(&Token::LBrace)?;
        let mut methods = Vec::new();
        while !self.eat(&Token::RBrace) {
            methods.push(self.expect_ident()?);
            // Parameter names document the signature but are not recorded;
            // arity is checked against the implementing method at call time.
            self.params()?;
            self.expect(&Token::Semi)?;
        }
        Ok(InterfaceDef {
            name,
            module: self.module,
            methods,
        })
    }

    fn enumeration(&mut self) -> EvalResult<EnumDef> {
        self.expect(&Token::Enum)?;
        let name = self.expect_ident()?;
        self.expect(&Token::LBrace)?;
        let mut members = Vec::new();
        while !self.eat(&Token::RBrace) {
            members.push(self.expect_ident()?);
            if !self.eat(&Token::Semi) {
                self.expect(&Token::RBrace)?;
                break;
            }
        }
        Ok(EnumDef {
            name,
            module: self.module,
            members,
        })
    }

    fn function(&mut self) -> EvalResult<FunctionDef> {
        self.expect(&Token::Function)?;
        let name = self.expect_ident()?;
        let params = self.params()?;
        let return_type = self.annotation()?;
        let body = self.block()?;
        Ok(FunctionDef {
            name,
            params,
            return_type,
            body,
            module: self.module,
        })
    }

    fn params(&mut self) -> EvalResult<Vec<Param>> {
        self.expect(&Token::LParen)?;
        let mut params = Vec::new();
        if !self.eat(&Token::RParen) {
            loop {
                let name = self.expect_ident()?;
                let type_name = self.annotation()?;
                params.push(Param { name, type_name });
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
            self.expect(&Token::RParen)?;
        }
        Ok(params)
    }

    fn annotation(&mut self) -> EvalResult<Option<StringId>> {
        if self.eat(&Token::Colon) {
            Ok(Some(self.expect_ident()?))
        } else {
            Ok(None)
        }
    }

    fn field(&mut self) -> EvalResult<FieldDef> {
        self.expect(&Token::Var)?;
        let name = self.expect_ident()?;
        let init = if self.eat(&Token::Assign) {
            Some(self.expression()?)
        } else {
            None
        };
        self.expect(&Token::Semi)?;
        Ok(FieldDef { name, init })
    }

    // ---- statements -----------------------------------------------------

    fn block(&mut self) -> EvalResult<Vec<Stmt>> {
        self.expect(&Token::LBrace)?;
        let mut stmts = Vec::new();
        while !self.eat(&Token::RBrace) {
            stmts.push(self.statement()?);
        }
        Ok(stmts)
    }

    fn statement(&mut self) -> EvalResult<Stmt> {
        match self.peek() {
            Some(Token::Var) => {
                let field = self.field()?;
                Ok(Stmt::VarDecl {
                    name: field.name,
                    init: field.init,
                })
            }
            Some(Token::Return) => {
                self.advance();
                let value = if self.eat(&Token::Semi) {
                    None
                } else {
                    let value = self.expression()?;
                    self.expect(&Token::Semi)?;
                    Some(value)
                };
                Ok(Stmt::Return(value))
            }
            Some(Token::If) => self.if_statement(),
            Some(Token::While) => {
                self.advance();
                self.expect(&Token::LParen)?;
                let cond = self.expression()?;
                self.expect(&Token::RParen)?;
                let body = self.block()?;
                Ok(Stmt::While { cond, body })
            }
            Some(Token::Foreach) => {
                self.advance();
                self.expect(&Token::LParen)?;
                let var = self.expect_ident()?;
                self.expect(&Token::In)?;
                let source = self.expression()?;
                self.expect(&Token::RParen)?;
                let body = self.block()?;
                Ok(Stmt::Foreach { var, source, body })
            }
            Some(Token::LBrace) => Ok(Stmt::Block(self.block()?)),
            _ => {
                let expr = self.expression()?;
                self.expect(&Token::Semi)?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn if_statement(&mut self) -> EvalResult<Stmt> {
        self.expect(&Token::If)?;
        self.expect(&Token::LParen)?;
        let cond = self.expression()?;
        self.expect(&Token::RParen)?;
        let then_body = self.block()?;
        let else_body = if self.eat(&Token::Else) {
            if self.peek() == Some(&Token::If) {
                vec![self.if_statement()?]
            } else {
                self.block()?
            }
        } else {
            Vec::new()
        };
        Ok(Stmt::If {
            cond,
            then_body,
            else_body,
        })
    }

    // ---- expressions ----------------------------------------------------

    fn expression(&mut self) -> EvalResult<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> EvalResult<Expr> {
        let target = self.or_expr()?;
        if self.eat(&Token::Assign) {
            let value = self.assignment()?;
            Ok(Expr::Assign {
                target: Box::new(target),
                value: Box::new(value),
            })
        } else {
            Ok(target)
        }
    }

    fn or_expr(&mut self) -> EvalResult<Expr> {
        let mut left = self.and_expr()?;
        loop {
            let op = match self.peek() {
                Some(Token::OrOr) => BinaryOp::Or,
                Some(Token::CaretCaret) => BinaryOp::Xor,
                _ => break,
            };
            self.advance();
            let right = self.and_expr()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> EvalResult<Expr> {
        let mut left = self.equality()?;
        while self.peek() == Some(&Token::AndAnd) {
            self.advance();
            let right = self.equality()?;
            left = binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn equality(&mut self) -> EvalResult<Expr> {
        let mut left = self.relational()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => BinaryOp::Eq,
                Some(Token::BangEq) => BinaryOp::Ne,
                _ => break,
            };
            self.advance();
            let right = self.relational()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn relational(&mut self) -> EvalResult<Expr> {
        let mut left = self.additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::LtEq) => BinaryOp::Le,
                Some(Token::GtEq) => BinaryOp::Ge,
                Some(Token::Is) => BinaryOp::Is,
                Some(Token::As) => BinaryOp::As,
                _ => break,
            };
            self.advance();
            let right = self.additive()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn additive(&mut self) -> EvalResult<Expr> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.multiplicative()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn multiplicative(&mut self) -> EvalResult<Expr> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Rem,
                _ => break,
            };
            self.advance();
            let right = self.unary()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn unary(&mut self) -> EvalResult<Expr> {
        let op = match self.peek() {
            Some(Token::Minus) => Some(UnaryOp::Neg),
            Some(Token::Bang) => Some(UnaryOp::Not),
            Some(Token::Tilde) => Some(UnaryOp::BitNot),
            _ => None,
        };
        match op {
            Some(op) => {
                self.advance();
                let operand = self.unary()?;
                Ok(Expr::Unary {
                    op,
                    operand: Box::new(operand),
                })
            }
            None => self.postfix(),
        }
    }

    fn postfix(&mut self) -> EvalResult<Expr> {
        let mut expr = self.primary()?;
        loop {
            match self.peek() {
                Some(Token::LParen) => {
                    let args = self.arguments()?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                    };
                }
                Some(Token::LBracket) => {
                    self.advance();
                    let index = self.expression()?;
                    self.expect(&Token::RBracket)?;
                    expr = Expr::Index {
                        collection: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                Some(Token::Dot) => {
                    self.advance();
                    let name = self.expect_ident()?;
                    expr = Expr::Field {
                        receiver: Box::new(expr),
                        name,
                    };
                }
                Some(Token::PlusPlus) => {
                    self.advance();
                    expr = Expr::PostIncrement {
                        target: Box::new(expr),
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn arguments(&mut self) -> EvalResult<Vec<Expr>> {
        self.expect(&Token::LParen)?;
        let mut args = Vec::new();
        if !self.eat(&Token::RParen) {
            loop {
                args.push(self.expression()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
            self.expect(&Token::RParen)?;
        }
        Ok(args)
    }

    fn primary(&mut self) -> EvalResult<Expr> {
        match self.peek() {
            Some(Token::Null) => {
                self.advance();
                Ok(Expr::Null)
            }
            Some(Token::True) => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(true)))
            }
            Some(Token::False) => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(false)))
            }
            Some(Token::Int(v)) => {
                let v = *v;
                self.advance();
                Ok(Expr::Literal(Literal::Int(v)))
            }
            Some(Token::Float(v)) => {
                let v = *v;
                self.advance();
                Ok(Expr::Literal(Literal::Float(v)))
            }
            Some(Token::Char(c)) => {
                let c = *c;
                self.advance();
                Ok(Expr::Literal(Literal::Char(c)))
            }
            Some(Token::Str(_)) => {
                let Some(Token::Str(text)) = self.advance() else {
                    unreachable!("peeked a string literal");
                };
                let id = self.interner.intern(&text);
                Ok(Expr::Literal(Literal::Str(id)))
            }
            Some(Token::Ident(_)) => {
                let name = self.expect_ident()?;
                Ok(Expr::Name(name))
            }
            Some(Token::LParen) => {
                self.advance();
                let expr = self.expression()?;
                self.expect(&Token::RParen)?;
                Ok(expr)
            }
            Some(Token::LBracket) => {
                self.advance();
                let mut items = Vec::new();
                if !self.eat(&Token::RBracket) {
                    loop {
                        items.push(self.expression()?);
                        if !self.eat(&Token::Comma) {
                            break;
                        }
                    }
                    self.expect(&Token::RBracket)?;
                }
                Ok(Expr::Tuple(items))
            }
            Some(Token::New) => {
                self.advance();
                let type_name = self.expect_ident()?;
                let args = self.arguments()?;
                Ok(Expr::New { type_name, args })
            }
            Some(Token::Function) => {
                self.advance();
                let params = self.params()?;
                let return_type = self.annotation()?;
                let body = self.block()?;
                Ok(Expr::Function(Arc::new(FunctionDef {
                    name: known::ANONYMOUS,
                    params,
                    return_type,
                    body,
                    module: self.module,
                })))
            }
            Some(Token::Select) => {
                self.advance();
                self.expect(&Token::LParen)?;
                let var = self.expect_ident()?;
                self.expect(&Token::From)?;
                let source = self.expression()?;
                self.expect(&Token::RParen)?;
                self.expect(&Token::Where)?;
                let predicate = self.expression()?;
                Ok(Expr::Select {
                    var,
                    source: Box::new(source),
                    predicate: Box::new(predicate),
                })
            }
            Some(Token::MapEach) => {
                self.advance();
                self.expect(&Token::LParen)?;
                let var = self.expect_ident()?;
                self.expect(&Token::In)?;
                let source = self.expression()?;
                self.expect(&Token::RParen)?;
                let yield_expr = self.expression()?;
                Ok(Expr::MapEach {
                    var,
                    source: Box::new(source),
                    yield_expr: Box::new(yield_expr),
                })
            }
            Some(Token::Accumulate) => {
                self.advance();
                self.expect(&Token::LParen)?;
                let acc = self.expect_ident()?;
                self.expect(&Token::Assign)?;
                let init = self.expression()?;
                self.expect(&Token::Forall)?;
                let each = self.expect_ident()?;
                self.expect(&Token::In)?;
                let source = self.expression()?;
                self.expect(&Token::RParen)?;
                let step = self.expression()?;
                Ok(Expr::Accumulate {
                    acc,
                    init: Box::new(init),
                    each,
                    source: Box::new(source),
                    step: Box::new(step),
                })
            }
            Some(Token::Reduce) => {
                self.advance();
                self.expect(&Token::LParen)?;
                let left = self.expect_ident()?;
                self.expect(&Token::Comma)?;
                let right = self.expect_ident()?;
                self.expect(&Token::In)?;
                let source = self.expression()?;
                self.expect(&Token::RParen)?;
                let combine = self.expression()?;
                Ok(Expr::Reduce {
                    left,
                    right,
                    source: Box::new(source),
                    combine: Box::new(combine),
                })
            }
            _ => Err(self.error_here("expected an expression".to_owned())),
        }
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn parse_error(source: &str, offset: usize, message: String) -> HeronError {
    let (line, column) = line_col(source, offset);
    HeronError::new(
        ErrorKind::ParseError,
        format!("{message} at line {line}, column {column}"),
    )
}

fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let prefix = &source[..offset.min(source.len())];
    let line = prefix.bytes().filter(|&b| b == b'\n').count() + 1;
    let column = prefix
        .rfind('\n')
        .map_or(offset + 1, |last| offset - last);
    (line, column)
}
