//! Parser for the Go subset accepted at the prompt
//!
//! Transforms a stream of tokens into an Abstract Syntax Tree. REPL input may
//! freely mix top-level declarations with statements; statements outside a
//! function become [`Decl::Stmt`] entries.

use std::rc::Rc;

use crate::ast::*;
use crate::error::{GiltError, Result};
use crate::lexer::{Lexer, Token, TokenKind};

/// Lexes and parses one source file or REPL submission
pub fn parse_source(source: &str) -> Result<File> {
    let tokens: Vec<Token> = Lexer::new(source).collect();
    if let Some(bad) = tokens.iter().find(|t| matches!(t.kind, TokenKind::Illegal(_))) {
        let message = match bad.kind {
            TokenKind::Illegal('"') | TokenKind::Illegal('`') => "string literal not terminated".to_string(),
            TokenKind::Illegal('\'') => "rune literal not terminated".to_string(),
            TokenKind::Illegal('0') => format!("invalid numeric literal '{}'", bad.lexeme),
            TokenKind::Illegal('e') => "exponent has no digits".to_string(),
            _ => format!("invalid character '{}'", bad.lexeme),
        };
        return Err(GiltError::ParserError {
            line: bad.line,
            column: bad.column,
            message,
        });
    }
    Parser::new(tokens).parse()
}

/// Parser for Go source code
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    /// Below zero inside control clause headers, where `T {` opens a block
    expr_lev: i32,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            current: 0,
            expr_lev: 0,
        }
    }

    /// Parse a complete file
    pub fn parse(&mut self) -> Result<File> {
        self.skip_semicolons();

        let package = if self.match_token(&[TokenKind::Package]) {
            let name = self.consume_ident("Expected package name")?;
            self.expect_terminator("package clause")?;
            Some(name)
        } else {
            None
        };

        let mut imports = Vec::new();
        let mut decls = Vec::new();

        loop {
            self.skip_semicolons();
            if self.is_at_end() {
                break;
            }
            if self.match_token(&[TokenKind::Import]) {
                self.import_decl(&mut imports)?;
            } else {
                decls.push(self.top_level_decl()?);
            }
            self.expect_terminator("declaration")?;
        }

        Ok(File {
            package,
            imports,
            decls,
        })
    }

    // Helper methods

    fn is_at_end(&self) -> bool {
        self.current >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.current)
    }

    fn peek_at(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.current + offset).map(|t| &t.kind)
    }

    fn previous(&self) -> Option<&Token> {
        if self.current > 0 {
            self.tokens.get(self.current - 1)
        } else {
            None
        }
    }

    fn advance(&mut self) -> Option<&Token> {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn check(&self, kind: &TokenKind) -> bool {
        if let Some(token) = self.peek() {
            std::mem::discriminant(&token.kind) == std::mem::discriminant(kind)
        } else {
            false
        }
    }

    fn check_identifier(&self) -> bool {
        matches!(self.peek().map(|t| &t.kind), Some(TokenKind::Identifier(_)))
    }

    fn match_token(&mut self, kinds: &[TokenKind]) -> bool {
        for kind in kinds {
            if self.check(kind) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn consume(&mut self, kind: &TokenKind, message: &str) -> Result<Token> {
        if self.check(kind) {
            let token = self.advance().cloned();
            token.ok_or_else(|| self.error(message))
        } else {
            Err(self.error(message))
        }
    }

    fn consume_ident(&mut self, message: &str) -> Result<Ident> {
        if let Some(token) = self.peek() {
            if let TokenKind::Identifier(ref name) = token.kind {
                let ident = Ident::new(name.clone(), Pos::new(token.line, token.column));
                self.advance();
                return Ok(ident);
            }
        }
        Err(self.error(message))
    }

    fn pos(&self) -> Pos {
        self.peek()
            .or_else(|| self.previous())
            .map(|t| Pos::new(t.line, t.column))
            .unwrap_or_default()
    }

    fn error(&self, message: impl Into<String>) -> GiltError {
        let pos = self.pos();
        let found = match self.peek() {
            Some(token) if token.lexeme == "\n" => "newline".to_string(),
            Some(token) => format!("'{}'", token.lexeme),
            None => "end of input".to_string(),
        };
        GiltError::ParserError {
            line: pos.line,
            column: pos.column,
            message: format!("{}, found {}", message.into(), found),
        }
    }

    fn skip_semicolons(&mut self) {
        while self.match_token(&[TokenKind::Semicolon]) {}
    }

    /// A declaration or statement ends at `;`, a newline, the end of input, or
    /// just before a closing `)` or `}`.
    fn expect_terminator(&mut self, what: &str) -> Result<()> {
        if self.match_token(&[TokenKind::Semicolon])
            || self.is_at_end()
            || self.check(&TokenKind::RightBrace)
            || self.check(&TokenKind::RightParen)
        {
            Ok(())
        } else {
            Err(self.error(format!("Expected ';' or newline after {}", what)))
        }
    }

    // Declarations

    fn import_decl(&mut self, imports: &mut Vec<ImportSpec>) -> Result<()> {
        if self.match_token(&[TokenKind::LeftParen]) {
            loop {
                self.skip_semicolons();
                if self.match_token(&[TokenKind::RightParen]) {
                    break;
                }
                imports.push(self.import_spec()?);
                self.expect_terminator("import spec")?;
            }
        } else {
            imports.push(self.import_spec()?);
        }
        Ok(())
    }

    fn import_spec(&mut self) -> Result<ImportSpec> {
        let pos = self.pos();
        let name = if self.check_identifier() {
            Some(self.consume_ident("Expected import name")?)
        } else if self.check(&TokenKind::Dot) {
            self.advance();
            Some(Ident::new(".", pos))
        } else {
            None
        };

        match self.peek().map(|t| t.kind.clone()) {
            Some(TokenKind::String(path)) => {
                self.advance();
                if path.is_empty() {
                    return Err(GiltError::ParserError {
                        line: pos.line,
                        column: pos.column,
                        message: "invalid import path: empty string".to_string(),
                    });
                }
                Ok(ImportSpec {
                    id: fresh_node_id(),
                    pos,
                    name,
                    path,
                })
            }
            _ => Err(self.error("Expected import path string")),
        }
    }

    fn top_level_decl(&mut self) -> Result<Decl> {
        match self.peek().map(|t| &t.kind) {
            Some(TokenKind::Var) | Some(TokenKind::Const) | Some(TokenKind::Type) => self.gen_decl(),
            Some(TokenKind::Func) if self.is_func_decl() => Ok(Decl::Func(Rc::new(self.func_decl()?))),
            _ => Ok(Decl::Stmt(Rc::new(self.statement()?))),
        }
    }

    /// Distinguishes `func name(` and `func (r T) name(` from a function
    /// literal used as a statement.
    fn is_func_decl(&self) -> bool {
        match self.peek_at(1) {
            Some(TokenKind::Identifier(_)) => true,
            Some(TokenKind::LeftParen) => {
                let mut depth = 0usize;
                let mut i = self.current + 1;
                while let Some(token) = self.tokens.get(i) {
                    match token.kind {
                        TokenKind::LeftParen => depth += 1,
                        TokenKind::RightParen => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    i += 1;
                }
                matches!(
                    (
                        self.tokens.get(i + 1).map(|t| &t.kind),
                        self.tokens.get(i + 2).map(|t| &t.kind)
                    ),
                    (Some(TokenKind::Identifier(_)), Some(TokenKind::LeftParen))
                )
            }
            _ => false,
        }
    }

    fn gen_decl(&mut self) -> Result<Decl> {
        let keyword = self
            .advance()
            .map(|t| t.kind.clone())
            .ok_or_else(|| self.error("Expected declaration"))?;

        match keyword {
            TokenKind::Type => {
                let specs = self.grouped(|p| p.type_spec())?;
                Ok(Decl::Type(specs.into_iter().map(Rc::new).collect()))
            }
            TokenKind::Const => {
                let specs = self.grouped(|p| p.value_spec(true))?;
                Ok(Decl::Const(specs.into_iter().map(Rc::new).collect()))
            }
            _ => {
                let specs = self.grouped(|p| p.value_spec(false))?;
                Ok(Decl::Var(specs.into_iter().map(Rc::new).collect()))
            }
        }
    }

    fn grouped<T>(&mut self, mut spec: impl FnMut(&mut Self) -> Result<T>) -> Result<Vec<T>> {
        let mut specs = Vec::new();
        if self.match_token(&[TokenKind::LeftParen]) {
            loop {
                self.skip_semicolons();
                if self.match_token(&[TokenKind::RightParen]) {
                    break;
                }
                specs.push(spec(self)?);
                self.expect_terminator("declaration")?;
            }
        } else {
            specs.push(spec(self)?);
        }
        Ok(specs)
    }

    fn value_spec(&mut self, is_const: bool) -> Result<ValueSpec> {
        let pos = self.pos();
        let names = self.ident_list()?;

        let typ = if !self.check(&TokenKind::Assign)
            && !self.check(&TokenKind::Semicolon)
            && !self.check(&TokenKind::RightParen)
            && !self.is_at_end()
        {
            Some(self.parse_type()?)
        } else {
            None
        };

        let values = if self.match_token(&[TokenKind::Assign]) {
            self.expr_list()?
        } else {
            Vec::new()
        };

        if !is_const && typ.is_none() && values.is_empty() {
            return Err(self.error("Expected type or initializer in variable declaration"));
        }
        if is_const && typ.is_some() && values.is_empty() {
            return Err(self.error("Expected '=' in constant declaration"));
        }

        Ok(ValueSpec {
            id: fresh_node_id(),
            pos,
            names,
            typ,
            values,
        })
    }

    fn type_spec(&mut self) -> Result<TypeSpec> {
        let pos = self.pos();
        let name = self.consume_ident("Expected type name")?;
        let alias = self.match_token(&[TokenKind::Assign]);
        let typ = self.parse_type()?;
        Ok(TypeSpec {
            id: fresh_node_id(),
            pos,
            name,
            alias,
            typ,
        })
    }

    fn func_decl(&mut self) -> Result<FuncDecl> {
        let pos = self.pos();
        self.consume(&TokenKind::Func, "Expected 'func'")?;

        let recv = if self.check(&TokenKind::LeftParen) {
            let mut fields = self.parameters()?;
            if fields.len() != 1 || fields[0].names.len() > 1 {
                return Err(GiltError::ParserError {
                    line: pos.line,
                    column: pos.column,
                    message: "method has multiple receivers".to_string(),
                });
            }
            fields.pop()
        } else {
            None
        };

        let name = self.consume_ident("Expected function name")?;
        let typ = self.signature(name.pos)?;
        let body = if self.check(&TokenKind::LeftBrace) {
            Some(self.block()?)
        } else {
            None
        };

        Ok(FuncDecl {
            id: fresh_node_id(),
            pos,
            recv,
            name,
            typ,
            body,
        })
    }

    fn signature(&mut self, pos: Pos) -> Result<FuncType> {
        let params = self.parameters()?;
        let results = if self.check(&TokenKind::LeftParen) {
            self.parameters()?
        } else if self.type_start() {
            vec![Field {
                names: Vec::new(),
                typ: self.parse_type()?,
            }]
        } else {
            Vec::new()
        };
        Ok(FuncType {
            pos,
            params,
            results,
        })
    }

    /// `(a, b int, c ...string)` or `(int, string)`
    fn parameters(&mut self) -> Result<Vec<Field>> {
        enum Entry {
            Bare(Ident),
            Named(Ident, Expr),
            Type(Expr),
        }

        self.consume(&TokenKind::LeftParen, "Expected '('")?;
        let outer = self.expr_lev;
        self.expr_lev = 0;

        let mut entries = Vec::new();
        while !self.check(&TokenKind::RightParen) {
            if self.check_identifier() {
                let ident = self.consume_ident("Expected parameter")?;
                if self.check(&TokenKind::Dot) {
                    self.advance();
                    let sel = self.consume_ident("Expected name after '.'")?;
                    let pos = ident.pos;
                    let x = Expr::new(ExprKind::Ident(ident.name), pos);
                    entries.push(Entry::Type(Expr::new(
                        ExprKind::Selector {
                            x: Box::new(x),
                            sel,
                        },
                        pos,
                    )));
                } else if self.check(&TokenKind::Comma) || self.check(&TokenKind::RightParen) {
                    entries.push(Entry::Bare(ident));
                } else {
                    let typ = self.param_type()?;
                    entries.push(Entry::Named(ident, typ));
                }
            } else {
                entries.push(Entry::Type(self.param_type()?));
            }
            if !self.match_token(&[TokenKind::Comma]) {
                break;
            }
        }
        self.expr_lev = outer;
        self.consume(&TokenKind::RightParen, "Expected ')' after parameters")?;

        let named = entries.iter().any(|e| matches!(e, Entry::Named(..)));
        let mut fields = Vec::new();
        if named {
            let mut pending = Vec::new();
            for entry in entries {
                match entry {
                    Entry::Bare(ident) => pending.push(ident),
                    Entry::Named(ident, typ) => {
                        pending.push(ident);
                        fields.push(Field {
                            names: std::mem::take(&mut pending),
                            typ,
                        });
                    }
                    Entry::Type(_) => return Err(self.error("mixed named and unnamed parameters")),
                }
            }
            if !pending.is_empty() {
                return Err(self.error("mixed named and unnamed parameters"));
            }
        } else {
            for entry in entries {
                let typ = match entry {
                    Entry::Bare(ident) => Expr::new(ExprKind::Ident(ident.name), ident.pos),
                    Entry::Type(typ) | Entry::Named(_, typ) => typ,
                };
                fields.push(Field {
                    names: Vec::new(),
                    typ,
                });
            }
        }
        Ok(fields)
    }

    fn param_type(&mut self) -> Result<Expr> {
        if self.check(&TokenKind::Ellipsis) {
            let pos = self.pos();
            self.advance();
            let elem = self.parse_type()?;
            Ok(Expr::new(ExprKind::Ellipsis(Some(Box::new(elem))), pos))
        } else {
            self.parse_type()
        }
    }

    fn type_start(&self) -> bool {
        matches!(
            self.peek().map(|t| &t.kind),
            Some(TokenKind::Identifier(_))
                | Some(TokenKind::Star)
                | Some(TokenKind::LeftBracket)
                | Some(TokenKind::Map)
                | Some(TokenKind::Chan)
                | Some(TokenKind::Func)
                | Some(TokenKind::Struct)
                | Some(TokenKind::Interface)
                | Some(TokenKind::Arrow)
                | Some(TokenKind::LeftParen)
        )
    }

    // Types

    fn parse_type(&mut self) -> Result<Expr> {
        let pos = self.pos();
        let kind = self
            .peek()
            .map(|t| t.kind.clone())
            .ok_or_else(|| self.error("Expected type"))?;

        match kind {
            TokenKind::Identifier(name) => {
                self.advance();
                let ident = Expr::new(ExprKind::Ident(name), pos);
                if self.match_token(&[TokenKind::Dot]) {
                    let sel = self.consume_ident("Expected type name after '.'")?;
                    Ok(Expr::new(
                        ExprKind::Selector {
                            x: Box::new(ident),
                            sel,
                        },
                        pos,
                    ))
                } else {
                    Ok(ident)
                }
            }
            TokenKind::Star => {
                self.advance();
                let elem = self.parse_type()?;
                Ok(Expr::new(ExprKind::Star(Box::new(elem)), pos))
            }
            TokenKind::LeftBracket => self.array_type(),
            TokenKind::Map => self.map_type(),
            TokenKind::Chan | TokenKind::Arrow => self.chan_type(),
            TokenKind::Func => {
                self.advance();
                let sig = self.signature(pos)?;
                Ok(Expr::new(ExprKind::FuncType(sig), pos))
            }
            TokenKind::Struct => self.struct_type(),
            TokenKind::Interface => self.interface_type(),
            TokenKind::LeftParen => {
                self.advance();
                let inner = self.parse_type()?;
                self.consume(&TokenKind::RightParen, "Expected ')' after type")?;
                Ok(Expr::new(ExprKind::Paren(Box::new(inner)), pos))
            }
            _ => Err(self.error("Expected type")),
        }
    }

    fn array_type(&mut self) -> Result<Expr> {
        let pos = self.pos();
        self.consume(&TokenKind::LeftBracket, "Expected '['")?;
        let len = if self.check(&TokenKind::RightBracket) {
            None
        } else if self.check(&TokenKind::Ellipsis) && self.peek_at(1) == Some(&TokenKind::RightBracket) {
            let dots = self.pos();
            self.advance();
            Some(Box::new(Expr::new(ExprKind::Ellipsis(None), dots)))
        } else {
            let outer = self.expr_lev;
            self.expr_lev += 1;
            let len = self.expression();
            self.expr_lev = outer;
            Some(Box::new(len?))
        };
        self.consume(&TokenKind::RightBracket, "Expected ']' in array type")?;
        let elem = self.parse_type()?;
        Ok(Expr::new(
            ExprKind::ArrayType {
                len,
                elem: Box::new(elem),
            },
            pos,
        ))
    }

    fn map_type(&mut self) -> Result<Expr> {
        let pos = self.pos();
        self.consume(&TokenKind::Map, "Expected 'map'")?;
        self.consume(&TokenKind::LeftBracket, "Expected '[' after 'map'")?;
        let key = self.parse_type()?;
        self.consume(&TokenKind::RightBracket, "Expected ']' after map key type")?;
        let value = self.parse_type()?;
        Ok(Expr::new(
            ExprKind::MapType {
                key: Box::new(key),
                value: Box::new(value),
            },
            pos,
        ))
    }

    fn chan_type(&mut self) -> Result<Expr> {
        let pos = self.pos();
        let dir = if self.match_token(&[TokenKind::Arrow]) {
            self.consume(&TokenKind::Chan, "Expected 'chan' after '<-'")?;
            ChanDir::Recv
        } else {
            self.consume(&TokenKind::Chan, "Expected 'chan'")?;
            if self.match_token(&[TokenKind::Arrow]) {
                ChanDir::Send
            } else {
                ChanDir::Both
            }
        };
        let value = self.parse_type()?;
        Ok(Expr::new(
            ExprKind::ChanType {
                dir,
                value: Box::new(value),
            },
            pos,
        ))
    }

    fn struct_type(&mut self) -> Result<Expr> {
        let pos = self.pos();
        self.consume(&TokenKind::Struct, "Expected 'struct'")?;
        self.consume(&TokenKind::LeftBrace, "Expected '{' after 'struct'")?;

        let mut fields = Vec::new();
        loop {
            self.skip_semicolons();
            if self.match_token(&[TokenKind::RightBrace]) {
                break;
            }
            let embedded = self.check(&TokenKind::Star)
                || (self.check_identifier()
                    && matches!(
                        self.peek_at(1),
                        Some(TokenKind::Dot)
                            | Some(TokenKind::Semicolon)
                            | Some(TokenKind::RightBrace)
                            | Some(TokenKind::String(_))
                            | None
                    ));
            let field = if embedded {
                Field {
                    names: Vec::new(),
                    typ: self.parse_type()?,
                }
            } else {
                let names = self.ident_list()?;
                Field {
                    names,
                    typ: self.parse_type()?,
                }
            };
            fields.push(field);
            // struct tags carry no meaning here
            if let Some(TokenKind::String(_)) = self.peek().map(|t| &t.kind) {
                self.advance();
            }
            self.expect_terminator("struct field")?;
        }

        Ok(Expr::new(ExprKind::StructType(fields), pos))
    }

    fn interface_type(&mut self) -> Result<Expr> {
        let pos = self.pos();
        self.consume(&TokenKind::Interface, "Expected 'interface'")?;
        self.consume(&TokenKind::LeftBrace, "Expected '{' after 'interface'")?;

        let mut entries = Vec::new();
        loop {
            self.skip_semicolons();
            if self.match_token(&[TokenKind::RightBrace]) {
                break;
            }
            if self.check_identifier() && self.peek_at(1) == Some(&TokenKind::LeftParen) {
                let name = self.consume_ident("Expected method name")?;
                let sig = self.signature(name.pos)?;
                let sig_pos = name.pos;
                entries.push(Field {
                    names: vec![name],
                    typ: Expr::new(ExprKind::FuncType(sig), sig_pos),
                });
            } else {
                entries.push(Field {
                    names: Vec::new(),
                    typ: self.parse_type()?,
                });
            }
            self.expect_terminator("interface method")?;
        }

        Ok(Expr::new(ExprKind::InterfaceType(entries), pos))
    }

    // Statements

    fn statement(&mut self) -> Result<Stmt> {
        let pos = self.pos();
        let kind = self
            .peek()
            .map(|t| t.kind.clone())
            .ok_or_else(|| self.error("Expected statement"))?;

        match kind {
            TokenKind::Var | TokenKind::Const | TokenKind::Type => {
                let decl = self.gen_decl()?;
                Ok(Stmt::new(StmtKind::Decl(decl), pos))
            }
            TokenKind::LeftBrace => {
                let block = self.block()?;
                Ok(Stmt::new(StmtKind::Block(block), pos))
            }
            TokenKind::If => self.if_statement(),
            TokenKind::For => self.for_statement(),
            TokenKind::Switch => self.switch_statement(),
            TokenKind::Select => self.select_statement(),
            TokenKind::Return => {
                self.advance();
                let results = if self.check(&TokenKind::Semicolon)
                    || self.check(&TokenKind::RightBrace)
                    || self.is_at_end()
                {
                    Vec::new()
                } else {
                    self.expr_list()?
                };
                Ok(Stmt::new(StmtKind::Return(results), pos))
            }
            TokenKind::Break | TokenKind::Continue | TokenKind::Fallthrough => {
                self.advance();
                let branch = match kind {
                    TokenKind::Break => BranchKind::Break,
                    TokenKind::Continue => BranchKind::Continue,
                    _ => BranchKind::Fallthrough,
                };
                if self.check_identifier() {
                    return Err(self.error("labels are not supported"));
                }
                Ok(Stmt::new(StmtKind::Branch(branch), pos))
            }
            TokenKind::Go | TokenKind::Defer => {
                self.advance();
                let call = self.expression()?;
                let kind = if kind == TokenKind::Go {
                    StmtKind::Go(call)
                } else {
                    StmtKind::Defer(call)
                };
                Ok(Stmt::new(kind, pos))
            }
            TokenKind::Semicolon => Ok(Stmt::new(StmtKind::Empty, pos)),
            _ => self.simple_statement(false),
        }
    }

    fn simple_statement(&mut self, range_ok: bool) -> Result<Stmt> {
        let pos = self.pos();

        if range_ok && self.match_token(&[TokenKind::Range]) {
            let x = self.expression()?;
            return Ok(Stmt::new(
                StmtKind::Range {
                    key: None,
                    value: None,
                    define: false,
                    x,
                    body: self.empty_block(pos),
                },
                pos,
            ));
        }

        let mut lhs = self.expr_list()?;
        let kind = self.peek().map(|t| t.kind.clone());

        match kind {
            Some(TokenKind::Define) | Some(TokenKind::Assign) | Some(TokenKind::OpAssign(_)) => {
                self.advance();
                let assign = match kind {
                    Some(TokenKind::Define) => AssignKind::Define,
                    Some(TokenKind::OpAssign(op)) => AssignKind::Op(BinaryOp::from_assign(op)),
                    _ => AssignKind::Assign,
                };

                if range_ok && assign != AssignKind::Define && assign != AssignKind::Assign {
                    // fall through to a plain assignment
                } else if range_ok && self.match_token(&[TokenKind::Range]) {
                    if lhs.len() > 2 {
                        return Err(self.error("range clause permits at most two iteration variables"));
                    }
                    let x = self.expression()?;
                    let value = if lhs.len() == 2 { lhs.pop() } else { None };
                    let key = lhs.pop();
                    return Ok(Stmt::new(
                        StmtKind::Range {
                            key,
                            value,
                            define: assign == AssignKind::Define,
                            x,
                            body: self.empty_block(pos),
                        },
                        pos,
                    ));
                }

                let rhs = self.expr_list()?;
                if matches!(assign, AssignKind::Op(_)) && (lhs.len() != 1 || rhs.len() != 1) {
                    return Err(self.error("assignment operation requires single-valued expressions"));
                }
                Ok(Stmt::new(StmtKind::Assign { lhs, kind: assign, rhs }, pos))
            }
            Some(TokenKind::Arrow) => {
                if lhs.len() > 1 {
                    return Err(self.error("Expected 1 expression before '<-'"));
                }
                self.advance();
                let value = self.expression()?;
                let chan = lhs.remove(0);
                Ok(Stmt::new(StmtKind::Send { chan, value }, pos))
            }
            Some(TokenKind::Inc) | Some(TokenKind::Dec) => {
                if lhs.len() > 1 {
                    return Err(self.error("Expected 1 expression before '++' or '--'"));
                }
                self.advance();
                let inc = kind == Some(TokenKind::Inc);
                let x = lhs.remove(0);
                Ok(Stmt::new(StmtKind::IncDec { x, inc }, pos))
            }
            Some(TokenKind::Colon) if lhs.len() == 1 && lhs[0].as_ident().is_some() => {
                Err(self.error("labels are not supported"))
            }
            _ => {
                if lhs.len() > 1 {
                    return Err(self.error("Expected 1 expression"));
                }
                Ok(Stmt::new(StmtKind::Expr(lhs.remove(0)), pos))
            }
        }
    }

    fn empty_block(&self, pos: Pos) -> Block {
        Block {
            id: fresh_node_id(),
            pos,
            stmts: Vec::new(),
            end: pos,
        }
    }

    fn if_statement(&mut self) -> Result<Stmt> {
        let pos = self.pos();
        self.consume(&TokenKind::If, "Expected 'if'")?;

        if self.check(&TokenKind::LeftBrace) {
            return Err(self.error("missing condition in if statement"));
        }

        let outer = self.expr_lev;
        self.expr_lev = -1;
        let header = self.control_header();
        self.expr_lev = outer;
        let (init, cond) = header?;

        let cond = match cond {
            Some(Stmt {
                kind: StmtKind::Expr(cond),
                ..
            }) => cond,
            _ => return Err(self.error("missing condition in if statement")),
        };

        let then = self.block()?;
        let els = if self.match_token(&[TokenKind::Else]) {
            if self.check(&TokenKind::If) {
                Some(Box::new(self.if_statement()?))
            } else if self.check(&TokenKind::LeftBrace) {
                let else_pos = self.pos();
                let block = self.block()?;
                Some(Box::new(Stmt::new(StmtKind::Block(block), else_pos)))
            } else {
                return Err(self.error("else must be followed by if or statement block"));
            }
        } else {
            None
        };

        Ok(Stmt::new(
            StmtKind::If {
                init,
                cond,
                then,
                els,
            },
            pos,
        ))
    }

    /// `[init ;] stmt` as found in `if` and `switch` headers
    fn control_header(&mut self) -> Result<(Option<Box<Stmt>>, Option<Stmt>)> {
        let first = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.simple_statement(false)?)
        };

        if self.check(&TokenKind::Semicolon) && self.tokens[self.current].lexeme == ";" {
            self.advance();
            let second = if self.check(&TokenKind::LeftBrace) {
                None
            } else {
                Some(self.simple_statement(false)?)
            };
            Ok((first.map(Box::new), second))
        } else {
            Ok((None, first))
        }
    }

    fn for_statement(&mut self) -> Result<Stmt> {
        let pos = self.pos();
        self.consume(&TokenKind::For, "Expected 'for'")?;

        let outer = self.expr_lev;
        self.expr_lev = -1;
        let header = self.for_header();
        self.expr_lev = outer;
        let (init, cond, post) = header?;

        let body = self.block()?;

        if let Some(Stmt {
            kind: StmtKind::Range { key, value, define, x, .. },
            ..
        }) = init.as_deref().cloned()
        {
            return Ok(Stmt::new(
                StmtKind::Range {
                    key,
                    value,
                    define,
                    x,
                    body,
                },
                pos,
            ));
        }

        Ok(Stmt::new(StmtKind::For { init, cond, post, body }, pos))
    }

    #[allow(clippy::type_complexity)]
    fn for_header(&mut self) -> Result<(Option<Box<Stmt>>, Option<Expr>, Option<Box<Stmt>>)> {
        if self.check(&TokenKind::LeftBrace) {
            return Ok((None, None, None));
        }

        let first = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.simple_statement(true)?)
        };

        if let Some(stmt @ Stmt {
            kind: StmtKind::Range { .. },
            ..
        }) = first
        {
            return Ok((Some(Box::new(stmt)), None, None));
        }

        if self.match_token(&[TokenKind::Semicolon]) {
            let cond = if self.check(&TokenKind::Semicolon) {
                None
            } else {
                Some(self.expression()?)
            };
            self.consume(&TokenKind::Semicolon, "Expected ';' in for clause")?;
            let post = if self.check(&TokenKind::LeftBrace) {
                None
            } else {
                let post = self.simple_statement(false)?;
                if let StmtKind::Assign {
                    kind: AssignKind::Define,
                    ..
                } = post.kind
                {
                    return Err(self.error("cannot declare in post statement of for loop"));
                }
                Some(Box::new(post))
            };
            Ok((first.map(Box::new), cond, post))
        } else {
            match first {
                Some(Stmt {
                    kind: StmtKind::Expr(cond),
                    ..
                }) => Ok((None, Some(cond), None)),
                _ => Err(self.error("Expected for loop condition")),
            }
        }
    }

    fn switch_statement(&mut self) -> Result<Stmt> {
        let pos = self.pos();
        self.consume(&TokenKind::Switch, "Expected 'switch'")?;

        let (init, tag) = if self.check(&TokenKind::LeftBrace) {
            (None, None)
        } else {
            let outer = self.expr_lev;
            self.expr_lev = -1;
            let header = self.control_header();
            self.expr_lev = outer;
            header?
        };

        self.consume(&TokenKind::LeftBrace, "Expected '{' after switch header")?;
        let mut body = Vec::new();
        loop {
            self.skip_semicolons();
            if self.check(&TokenKind::RightBrace) {
                break;
            }
            let clause_pos = self.pos();
            let list = if self.match_token(&[TokenKind::Case]) {
                Some(self.expr_list()?)
            } else if self.match_token(&[TokenKind::Default]) {
                None
            } else {
                return Err(self.error("Expected 'case' or 'default'"));
            };
            self.consume(&TokenKind::Colon, "Expected ':' after case")?;
            let stmts = self.statement_list()?;
            body.push(CaseClause {
                id: fresh_node_id(),
                pos: clause_pos,
                list,
                body: stmts,
            });
        }
        let end = self.pos();
        self.consume(&TokenKind::RightBrace, "Expected '}' after switch body")?;

        let kind = match tag.map(|s| s.kind) {
            None => StmtKind::Switch {
                init,
                tag: None,
                body,
                end,
            },
            Some(StmtKind::Expr(Expr {
                kind: ExprKind::TypeAssert { x, typ: None },
                ..
            })) => StmtKind::TypeSwitch {
                init,
                bind: None,
                x: *x,
                body,
                end,
            },
            Some(StmtKind::Assign {
                mut lhs,
                kind: AssignKind::Define,
                mut rhs,
            }) if lhs.len() == 1
                && rhs.len() == 1
                && matches!(rhs[0].kind, ExprKind::TypeAssert { typ: None, .. }) =>
            {
                let bind_expr = lhs.remove(0);
                let name = bind_expr
                    .as_ident()
                    .ok_or_else(|| self.error("Expected identifier in type switch guard"))?
                    .to_string();
                let x = match rhs.remove(0).kind {
                    ExprKind::TypeAssert { x, .. } => *x,
                    _ => unreachable!("guarded by the match arm"),
                };
                StmtKind::TypeSwitch {
                    init,
                    bind: Some(Ident {
                        id: bind_expr.id,
                        name,
                        pos: bind_expr.pos,
                    }),
                    x,
                    body,
                    end,
                }
            }
            Some(StmtKind::Expr(tag)) => StmtKind::Switch {
                init,
                tag: Some(tag),
                body,
                end,
            },
            Some(_) => return Err(self.error("switch expression must be an expression")),
        };

        Ok(Stmt::new(kind, pos))
    }

    fn select_statement(&mut self) -> Result<Stmt> {
        let pos = self.pos();
        self.consume(&TokenKind::Select, "Expected 'select'")?;
        self.consume(&TokenKind::LeftBrace, "Expected '{' after 'select'")?;

        let mut body = Vec::new();
        loop {
            self.skip_semicolons();
            if self.match_token(&[TokenKind::RightBrace]) {
                break;
            }
            let clause_pos = self.pos();
            let comm = if self.match_token(&[TokenKind::Case]) {
                Some(Box::new(self.simple_statement(false)?))
            } else if self.match_token(&[TokenKind::Default]) {
                None
            } else {
                return Err(self.error("Expected 'case' or 'default'"));
            };
            self.consume(&TokenKind::Colon, "Expected ':' after case")?;
            let stmts = self.statement_list()?;
            body.push(CommClause {
                id: fresh_node_id(),
                pos: clause_pos,
                comm,
                body: stmts,
            });
        }

        Ok(Stmt::new(StmtKind::Select { body }, pos))
    }

    fn statement_list(&mut self) -> Result<Vec<Stmt>> {
        let mut stmts = Vec::new();
        loop {
            self.skip_semicolons();
            if self.is_at_end()
                || self.check(&TokenKind::Case)
                || self.check(&TokenKind::Default)
                || self.check(&TokenKind::RightBrace)
            {
                break;
            }
            stmts.push(self.statement()?);
            self.expect_terminator("statement")?;
        }
        Ok(stmts)
    }

    fn block(&mut self) -> Result<Block> {
        let pos = self.pos();
        self.consume(&TokenKind::LeftBrace, "Expected '{'")?;

        let outer = self.expr_lev;
        self.expr_lev = 0;
        let mut stmts = Vec::new();
        loop {
            self.skip_semicolons();
            if self.check(&TokenKind::RightBrace) {
                break;
            }
            if self.is_at_end() {
                self.expr_lev = outer;
                return Err(self.error("Expected '}' to close block"));
            }
            match self.statement() {
                Ok(stmt) => stmts.push(stmt),
                Err(err) => {
                    self.expr_lev = outer;
                    return Err(err);
                }
            }
            if let Err(err) = self.expect_terminator("statement") {
                self.expr_lev = outer;
                return Err(err);
            }
        }
        self.expr_lev = outer;

        let end = self.pos();
        self.consume(&TokenKind::RightBrace, "Expected '}'")?;
        Ok(Block {
            id: fresh_node_id(),
            pos,
            stmts,
            end,
        })
    }

    // Expressions

    fn ident_list(&mut self) -> Result<Vec<Ident>> {
        let mut names = vec![self.consume_ident("Expected identifier")?];
        while self.match_token(&[TokenKind::Comma]) {
            names.push(self.consume_ident("Expected identifier after ','")?);
        }
        Ok(names)
    }

    fn expr_list(&mut self) -> Result<Vec<Expr>> {
        let mut list = vec![self.expression()?];
        while self.match_token(&[TokenKind::Comma]) {
            list.push(self.expression()?);
        }
        Ok(list)
    }

    pub fn expression(&mut self) -> Result<Expr> {
        self.binary_expr(1)
    }

    fn binary_op(&self) -> Option<BinaryOp> {
        let op = match self.peek()?.kind {
            TokenKind::OrOr => BinaryOp::LogOr,
            TokenKind::AndAnd => BinaryOp::LogAnd,
            TokenKind::Equal => BinaryOp::Eq,
            TokenKind::NotEqual => BinaryOp::Ne,
            TokenKind::Less => BinaryOp::Lt,
            TokenKind::LessEqual => BinaryOp::Le,
            TokenKind::Greater => BinaryOp::Gt,
            TokenKind::GreaterEqual => BinaryOp::Ge,
            TokenKind::Plus => BinaryOp::Add,
            TokenKind::Minus => BinaryOp::Sub,
            TokenKind::Pipe => BinaryOp::Or,
            TokenKind::Caret => BinaryOp::Xor,
            TokenKind::Star => BinaryOp::Mul,
            TokenKind::Slash => BinaryOp::Div,
            TokenKind::Percent => BinaryOp::Rem,
            TokenKind::Shl => BinaryOp::Shl,
            TokenKind::Shr => BinaryOp::Shr,
            TokenKind::Amp => BinaryOp::And,
            TokenKind::AndNot => BinaryOp::AndNot,
            _ => return None,
        };
        Some(op)
    }

    fn binary_expr(&mut self, min_prec: u8) -> Result<Expr> {
        let mut x = self.unary_expr()?;
        while let Some(op) = self.binary_op() {
            let prec = op.precedence();
            if prec < min_prec {
                break;
            }
            self.advance();
            let y = self.binary_expr(prec + 1)?;
            let pos = x.pos;
            x = Expr::new(
                ExprKind::Binary {
                    op,
                    x: Box::new(x),
                    y: Box::new(y),
                },
                pos,
            );
        }
        Ok(x)
    }

    fn unary_expr(&mut self) -> Result<Expr> {
        let pos = self.pos();
        let op = match self.peek().map(|t| &t.kind) {
            Some(TokenKind::Plus) => Some(UnaryOp::Plus),
            Some(TokenKind::Minus) => Some(UnaryOp::Neg),
            Some(TokenKind::Not) => Some(UnaryOp::Not),
            Some(TokenKind::Caret) => Some(UnaryOp::Xor),
            Some(TokenKind::Amp) => Some(UnaryOp::Addr),
            Some(TokenKind::Arrow) => {
                if self.peek_at(1) == Some(&TokenKind::Chan) {
                    return self.chan_type();
                }
                Some(UnaryOp::Recv)
            }
            Some(TokenKind::Star) => {
                self.advance();
                let x = self.unary_expr()?;
                return Ok(Expr::new(ExprKind::Star(Box::new(x)), pos));
            }
            _ => None,
        };

        match op {
            Some(op) => {
                self.advance();
                let x = self.unary_expr()?;
                Ok(Expr::new(ExprKind::Unary { op, x: Box::new(x) }, pos))
            }
            None => self.primary_expr(),
        }
    }

    fn primary_expr(&mut self) -> Result<Expr> {
        let mut x = self.operand()?;

        loop {
            let pos = x.pos;
            if self.match_token(&[TokenKind::Dot]) {
                if self.check_identifier() {
                    let sel = self.consume_ident("Expected selector")?;
                    x = Expr::new(ExprKind::Selector { x: Box::new(x), sel }, pos);
                } else if self.match_token(&[TokenKind::LeftParen]) {
                    let typ = if self.match_token(&[TokenKind::Type]) {
                        None
                    } else {
                        Some(Box::new(self.parse_type()?))
                    };
                    self.consume(&TokenKind::RightParen, "Expected ')' after type assertion")?;
                    x = Expr::new(ExprKind::TypeAssert { x: Box::new(x), typ }, pos);
                } else {
                    return Err(self.error("Expected selector or type assertion"));
                }
            } else if self.check(&TokenKind::LeftBracket) {
                self.advance();
                let outer = self.expr_lev;
                self.expr_lev += 1;
                let result = self.index_or_slice(x);
                self.expr_lev = outer;
                x = result?;
            } else if self.check(&TokenKind::LeftParen) {
                self.advance();
                let outer = self.expr_lev;
                self.expr_lev += 1;
                let result = self.call_args();
                self.expr_lev = outer;
                let (args, ellipsis) = result?;
                self.consume(&TokenKind::RightParen, "Expected ')' after arguments")?;
                x = Expr::new(
                    ExprKind::Call {
                        fun: Box::new(x),
                        args,
                        ellipsis,
                    },
                    pos,
                );
            } else if self.check(&TokenKind::LeftBrace) && self.composite_allowed(&x) {
                let elts = self.literal_body()?;
                x = Expr::new(
                    ExprKind::CompositeLit {
                        typ: Some(Box::new(x)),
                        elts,
                    },
                    pos,
                );
            } else {
                break;
            }
        }

        Ok(x)
    }

    fn composite_allowed(&self, x: &Expr) -> bool {
        match &x.kind {
            ExprKind::Ident(_) => self.expr_lev >= 0,
            ExprKind::Selector { x: inner, .. } => self.expr_lev >= 0 && inner.as_ident().is_some(),
            ExprKind::ArrayType { .. } | ExprKind::StructType(_) | ExprKind::MapType { .. } => true,
            _ => false,
        }
    }

    fn index_or_slice(&mut self, x: Expr) -> Result<Expr> {
        let pos = x.pos;
        let low = if self.check(&TokenKind::Colon) {
            None
        } else {
            Some(Box::new(self.expression()?))
        };

        if !self.match_token(&[TokenKind::Colon]) {
            self.consume(&TokenKind::RightBracket, "Expected ']' after index")?;
            let index = low.ok_or_else(|| self.error("Expected operand"))?;
            return Ok(Expr::new(ExprKind::Index { x: Box::new(x), index }, pos));
        }

        let high = if self.check(&TokenKind::Colon) || self.check(&TokenKind::RightBracket) {
            None
        } else {
            Some(Box::new(self.expression()?))
        };
        let max = if self.match_token(&[TokenKind::Colon]) {
            if high.is_none() {
                return Err(self.error("middle index required in 3-index slice"));
            }
            Some(Box::new(self.expression()?))
        } else {
            None
        };
        self.consume(&TokenKind::RightBracket, "Expected ']' after slice")?;
        Ok(Expr::new(
            ExprKind::Slice {
                x: Box::new(x),
                low,
                high,
                max,
            },
            pos,
        ))
    }

    fn call_args(&mut self) -> Result<(Vec<Expr>, bool)> {
        let mut args = Vec::new();
        let mut ellipsis = false;
        while !self.check(&TokenKind::RightParen) {
            args.push(self.expression()?);
            if self.match_token(&[TokenKind::Ellipsis]) {
                ellipsis = true;
            }
            if !self.match_token(&[TokenKind::Comma]) {
                break;
            }
        }
        Ok((args, ellipsis))
    }

    fn literal_body(&mut self) -> Result<Vec<Expr>> {
        self.consume(&TokenKind::LeftBrace, "Expected '{'")?;
        let outer = self.expr_lev;
        self.expr_lev += 1;
        let result = self.literal_elements();
        self.expr_lev = outer;
        let elts = result?;
        self.consume(&TokenKind::RightBrace, "Expected '}' after composite literal")?;
        Ok(elts)
    }

    fn literal_elements(&mut self) -> Result<Vec<Expr>> {
        let mut elts = Vec::new();
        while !self.check(&TokenKind::RightBrace) {
            let element = self.literal_element()?;
            let elt = if self.match_token(&[TokenKind::Colon]) {
                let value = self.literal_element()?;
                let pos = element.pos;
                Expr::new(
                    ExprKind::KeyValue {
                        key: Box::new(element),
                        value: Box::new(value),
                    },
                    pos,
                )
            } else {
                element
            };
            elts.push(elt);
            if !self.match_token(&[TokenKind::Comma]) {
                break;
            }
            // a trailing comma lets the closing brace sit on its own line
            self.skip_semicolons();
        }
        Ok(elts)
    }

    fn literal_element(&mut self) -> Result<Expr> {
        if self.check(&TokenKind::LeftBrace) {
            let pos = self.pos();
            let elts = self.literal_body()?;
            Ok(Expr::new(ExprKind::CompositeLit { typ: None, elts }, pos))
        } else {
            self.expression()
        }
    }

    fn operand(&mut self) -> Result<Expr> {
        let pos = self.pos();
        let kind = self
            .peek()
            .map(|t| t.kind.clone())
            .ok_or_else(|| self.error("Expected expression"))?;

        match kind {
            TokenKind::Integer(n) => {
                self.advance();
                Ok(Expr::new(ExprKind::BasicLit(Literal::Int(n)), pos))
            }
            TokenKind::Float(f) => {
                self.advance();
                Ok(Expr::new(ExprKind::BasicLit(Literal::Float(f)), pos))
            }
            TokenKind::String(s) => {
                self.advance();
                Ok(Expr::new(ExprKind::BasicLit(Literal::String(s)), pos))
            }
            TokenKind::Char(c) => {
                self.advance();
                Ok(Expr::new(ExprKind::BasicLit(Literal::Char(c)), pos))
            }
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(Expr::new(ExprKind::Ident(name), pos))
            }
            TokenKind::LeftParen => {
                self.advance();
                let outer = self.expr_lev;
                self.expr_lev += 1;
                let inner = self.expression();
                self.expr_lev = outer;
                let inner = inner?;
                self.consume(&TokenKind::RightParen, "Expected ')' after expression")?;
                Ok(Expr::new(ExprKind::Paren(Box::new(inner)), pos))
            }
            TokenKind::Func => {
                self.advance();
                let typ = self.signature(pos)?;
                if self.check(&TokenKind::LeftBrace) {
                    let outer = self.expr_lev;
                    self.expr_lev += 1;
                    let body = self.block();
                    self.expr_lev = outer;
                    Ok(Expr::new(
                        ExprKind::FuncLit {
                            typ,
                            body: Rc::new(body?),
                        },
                        pos,
                    ))
                } else {
                    Ok(Expr::new(ExprKind::FuncType(typ), pos))
                }
            }
            TokenKind::LeftBracket
            | TokenKind::Map
            | TokenKind::Chan
            | TokenKind::Struct
            | TokenKind::Interface => self.parse_type(),
            _ => Err(self.error("Expected expression")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Result<File> {
        parse_source(source)
    }

    #[test]
    fn test_short_var_decl_is_statement() {
        let file = parse("x := 42").unwrap();
        assert_eq!(file.decls.len(), 1);
        assert!(matches!(&file.decls[0], Decl::Stmt(stmt) if matches!(stmt.kind, StmtKind::Assign { kind: AssignKind::Define, .. })));
    }

    #[test]
    fn test_function() {
        let file = parse("func add(a, b int) int { return a + b }").unwrap();
        match &file.decls[0] {
            Decl::Func(decl) => {
                assert_eq!(decl.name.name, "add");
                assert_eq!(decl.typ.params.len(), 1);
                assert_eq!(decl.typ.params[0].names.len(), 2);
                assert_eq!(decl.typ.results.len(), 1);
            }
            other => panic!("expected func decl, got {:?}", other),
        }
    }

    #[test]
    fn test_method_decl_and_func_literal_statement() {
        let file = parse("func (p *Point) Norm() int { return 0 }\nfunc() { println(1) }()").unwrap();
        assert!(matches!(&file.decls[0], Decl::Func(decl) if decl.recv.is_some()));
        assert!(matches!(&file.decls[1], Decl::Stmt(_)));
    }

    #[test]
    fn test_imports_and_package_clause() {
        let file = parse("package fish\nimport (\n\t\"fmt\"\n\t. \"gitesting\"\n)\n").unwrap();
        assert_eq!(file.package.as_ref().map(|p| p.name.as_str()), Some("fish"));
        assert_eq!(file.imports.len(), 2);
        assert_eq!(file.imports[1].name.as_ref().map(|n| n.name.as_str()), Some("."));
    }

    #[test]
    fn test_composite_literal_not_in_if_header() {
        let file = parse("if x == y { z := T{1, 2}; _ = z }").unwrap();
        match &file.decls[0] {
            Decl::Stmt(stmt) => assert!(matches!(stmt.kind, StmtKind::If { .. })),
            other => panic!("expected if statement, got {:?}", other),
        }
    }

    #[test]
    fn test_type_switch() {
        let file = parse("switch v := x.(type) {\ncase int:\n\t_ = v\ndefault:\n}").unwrap();
        match &file.decls[0] {
            Decl::Stmt(stmt) => match &stmt.kind {
                StmtKind::TypeSwitch { bind, body, .. } => {
                    assert_eq!(bind.as_ref().map(|b| b.name.as_str()), Some("v"));
                    assert_eq!(body.len(), 2);
                }
                other => panic!("expected type switch, got {:?}", other),
            },
            other => panic!("expected statement, got {:?}", other),
        }
    }

    #[test]
    fn test_for_range_and_three_clause() {
        let file = parse("for i, v := range xs { _ = i + v }\nfor i := 0; i < 3; i++ {}").unwrap();
        assert!(matches!(&file.decls[0], Decl::Stmt(s) if matches!(s.kind, StmtKind::Range { define: true, .. })));
        assert!(matches!(&file.decls[1], Decl::Stmt(s) if matches!(s.kind, StmtKind::For { .. })));
    }

    #[test]
    fn test_grouped_const_with_iota() {
        let file = parse("const (\n\tA = iota\n\tB\n\tC\n)").unwrap();
        match &file.decls[0] {
            Decl::Const(specs) => {
                assert_eq!(specs.len(), 3);
                assert!(specs[1].values.is_empty());
            }
            other => panic!("expected const decl, got {:?}", other),
        }
    }

    #[test]
    fn test_struct_and_interface_types() {
        let file = parse("type S struct {\n\tA, B int\n\t*T\n\tname string `json:\"n\"`\n}\ntype I interface {\n\tM(x int) error\n\tfmt.Stringer\n}").unwrap();
        match &file.decls[0] {
            Decl::Type(specs) => match &specs[0].typ.kind {
                ExprKind::StructType(fields) => assert_eq!(fields.len(), 3),
                other => panic!("expected struct type, got {:?}", other),
            },
            other => panic!("expected type decl, got {:?}", other),
        }
        match &file.decls[1] {
            Decl::Type(specs) => match &specs[0].typ.kind {
                ExprKind::InterfaceType(entries) => assert_eq!(entries.len(), 2),
                other => panic!("expected interface type, got {:?}", other),
            },
            other => panic!("expected type decl, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_error_position() {
        let err = parse("x := (1 + ").unwrap_err();
        assert!(matches!(err, GiltError::ParserError { line: 1, .. }));
    }

    #[test]
    fn test_malformed_float() {
        let err = parse("f := 1e").unwrap_err();
        assert!(err.to_string().contains("exponent has no digits"), "{}", err);
    }

    #[test]
    fn test_unterminated_string() {
        let err = parse("s := \"abc").unwrap_err();
        assert!(err.to_string().contains("not terminated"));
    }
}
