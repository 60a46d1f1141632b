use std::rc::Rc;

use tracing::trace;

use crate::{
    ast::{
        BinaryOp, Expr, ExprKind, FunctionDecl, Literal, Program, StaticType, Stmt, StmtKind,
        UnaryOp,
    },
    diagnostics::{Diagnostic, DiagnosticKind, SourceSpan},
    lexer::{unquote, Lexer, Token, TokenKind},
    stack::ensure_sufficient_stack,
};

const PRIMARY_START: &[TokenKind] = &[
    TokenKind::LParen,
    TokenKind::Identifier,
    TokenKind::Number,
    TokenKind::String,
    TokenKind::True,
    TokenKind::False,
    TokenKind::Null,
    TokenKind::Minus,
    TokenKind::Not,
];

pub fn parse_program(source: &str) -> Result<Program, Diagnostic> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser::new(source, tokens).parse_program()
}

/// Statements of a function body plus whether a `return` occurs anywhere in
/// them (nested declarations excluded).
struct FunctionBody {
    statements: Vec<Stmt>,
    has_return: bool,
}

impl FunctionBody {
    fn new(statements: Vec<Stmt>) -> Self {
        let has_return = contains_return(&statements);
        Self {
            statements,
            has_return,
        }
    }
}

fn contains_return(statements: &[Stmt]) -> bool {
    statements.iter().any(|stmt| match &stmt.kind {
        StmtKind::Return(_) => true,
        StmtKind::If {
            then_branch,
            else_branch,
            ..
        } => {
            contains_return(then_branch)
                || else_branch.as_deref().map(contains_return).unwrap_or(false)
        }
        StmtKind::While { body, .. } => contains_return(body),
        _ => false,
    })
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    current: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str, tokens: Vec<Token>) -> Self {
        Self {
            source,
            tokens,
            current: 0,
        }
    }

    fn parse_program(&mut self) -> Result<Program, Diagnostic> {
        let mut items = Vec::new();
        while !self.check(TokenKind::Eof) {
            items.push(self.parse_statement()?);
        }
        Ok(Program { items })
    }

    fn parse_statement(&mut self) -> Result<Stmt, Diagnostic> {
        let stmt = match self.peek_kind() {
            TokenKind::Var => self.parse_var_decl()?,
            TokenKind::Identifier if self.peek_next().kind == TokenKind::Equals => {
                self.parse_assignment()?
            }
            TokenKind::If => self.parse_if()?,
            TokenKind::While => self.parse_while()?,
            TokenKind::Return => self.parse_return()?,
            TokenKind::Break => Stmt {
                span: self.advance().span,
                kind: StmtKind::Break,
            },
            TokenKind::Continue => Stmt {
                span: self.advance().span,
                kind: StmtKind::Continue,
            },
            _ => {
                let expr = self.parse_expression()?;
                Stmt {
                    span: expr.span,
                    kind: StmtKind::Expr(expr),
                }
            }
        };
        self.consume_optional_semicolon();
        Ok(stmt)
    }

    fn parse_var_decl(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume(TokenKind::Var, "expected `var`")?.span;
        let name = self.consume(TokenKind::Identifier, "expected variable name after `var`")?;
        self.consume(TokenKind::Equals, "expected `=` in variable declaration")?;
        let value = self.parse_expression()?;
        Ok(Stmt {
            span: start.to(value.span),
            kind: StmtKind::VarDecl {
                name: name.lexeme,
                value,
            },
        })
    }

    fn parse_assignment(&mut self) -> Result<Stmt, Diagnostic> {
        let name = self.advance();
        self.consume(TokenKind::Equals, "expected `=` in assignment")?;
        let value = self.parse_expression()?;
        Ok(Stmt {
            span: name.span.to(value.span),
            kind: StmtKind::Assign {
                name: name.lexeme,
                value,
            },
        })
    }

    /// A brace-delimited statement list, or a single statement.
    fn parse_block(&mut self) -> Result<(Vec<Stmt>, SourceSpan), Diagnostic> {
        if self.check(TokenKind::LBrace) {
            return self.parse_brace_block();
        }
        let stmt = self.parse_statement()?;
        let span = stmt.span;
        Ok((vec![stmt], span))
    }

    fn parse_brace_block(&mut self) -> Result<(Vec<Stmt>, SourceSpan), Diagnostic> {
        let lbrace = self.consume(TokenKind::LBrace, "expected `{` to start block")?;
        let mut items = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
            items.push(self.parse_statement()?);
        }
        let rbrace = self.consume(TokenKind::RBrace, "expected `}` to close block")?;
        Ok((items, lbrace.span.to(rbrace.span)))
    }

    fn parse_if(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume(TokenKind::If, "expected `if`")?.span;
        self.consume(TokenKind::LParen, "expected `(` after `if`")?;
        let condition = self.parse_expression()?;
        self.consume(TokenKind::RParen, "expected `)` after condition")?;
        let (then_branch, mut end) = self.parse_block()?;
        let else_branch = if self.matches(TokenKind::Else) {
            let (branch, span) = self.parse_block()?;
            end = span;
            Some(branch)
        } else {
            None
        };
        Ok(Stmt {
            span: start.to(end),
            kind: StmtKind::If {
                condition,
                then_branch,
                else_branch,
            },
        })
    }

    fn parse_while(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume(TokenKind::While, "expected `while`")?.span;
        self.consume(TokenKind::LParen, "expected `(` after `while`")?;
        let condition = self.parse_expression()?;
        self.consume(TokenKind::RParen, "expected `)` after condition")?;
        let (body, end) = self.parse_block()?;
        Ok(Stmt {
            span: start.to(end),
            kind: StmtKind::While { condition, body },
        })
    }

    fn parse_return(&mut self) -> Result<Stmt, Diagnostic> {
        let token = self.consume(TokenKind::Return, "expected `return`")?;
        let expr = if self.check(TokenKind::Semicolon)
            || self.check(TokenKind::RBrace)
            || self.check(TokenKind::Eof)
        {
            None
        } else {
            Some(self.parse_expression()?)
        };
        let end = expr.as_ref().map(|e| e.span).unwrap_or(token.span);
        Ok(Stmt {
            span: token.span.to(end),
            kind: StmtKind::Return(expr),
        })
    }

    fn parse_expression(&mut self) -> Result<Expr, Diagnostic> {
        ensure_sufficient_stack(|| self.parse_or())
    }

    fn parse_or(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_and()?;
        while self.matches(TokenKind::Or) {
            let right = self.parse_and()?;
            expr = binary(BinaryOp::Or, expr, right);
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_comparison()?;
        while self.matches(TokenKind::And) {
            let right = self.parse_comparison()?;
            expr = binary(BinaryOp::And, expr, right);
        }
        Ok(expr)
    }

    fn parse_comparison(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_term()?;
        while let Some(op) = self.match_comparison() {
            let right = self.parse_term()?;
            if matches!(op, BinaryOp::Equal | BinaryOp::NotEqual) {
                self.check_equality_types(op, &expr, &right)?;
            }
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    fn match_comparison(&mut self) -> Option<BinaryOp> {
        let op = match self.peek_kind() {
            TokenKind::Greater => BinaryOp::Greater,
            TokenKind::Less => BinaryOp::Less,
            TokenKind::GreaterEqual => BinaryOp::GreaterEqual,
            TokenKind::LessEqual => BinaryOp::LessEqual,
            TokenKind::EqualEqual => BinaryOp::Equal,
            TokenKind::NotEqual => BinaryOp::NotEqual,
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    /// `==`/`!=` between two operands whose types are both known up front
    /// must agree; dynamic operands are checked when evaluated.
    fn check_equality_types(
        &self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
    ) -> Result<(), Diagnostic> {
        let (lhs, rhs) = (left.static_type(), right.static_type());
        if lhs == StaticType::Dynamic || rhs == StaticType::Dynamic || lhs == rhs {
            return Ok(());
        }
        Err(Diagnostic::new(
            DiagnosticKind::TypeMismatch,
            format!(
                "Type mismatch: cannot compare {} with {} using `{}`",
                lhs.label(),
                rhs.label(),
                op.symbol()
            ),
        )
        .with_span(left.span.to(right.span))
        .with_note("`==` and `!=` require both operands to have the same type")
        .located_in(self.source))
    }

    fn parse_term(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_factor()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_factor()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_factor(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_unary()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Times => BinaryOp::Mul,
                TokenKind::Divide => BinaryOp::Div,
                TokenKind::Modulo => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<Expr, Diagnostic> {
        let op = match self.peek_kind() {
            TokenKind::Minus => UnaryOp::Negate,
            TokenKind::Not => UnaryOp::Not,
            _ => return self.parse_primary(),
        };
        let operator = self.advance().span;
        let operand = self.parse_unary()?;
        Ok(Expr {
            span: operator.to(operand.span),
            kind: ExprKind::Unary {
                op,
                expr: Box::new(operand),
            },
        })
    }

    fn parse_primary(&mut self) -> Result<Expr, Diagnostic> {
        let token = self.peek().clone();
        let literal = match token.kind {
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.consume(TokenKind::RParen, "expected `)` after expression")?;
                return Ok(inner);
            }
            TokenKind::Identifier => {
                if let Some(decl) = self.try_function_decl()? {
                    return Ok(decl);
                }
                if let Some(call) = self.try_call()? {
                    return Ok(call);
                }
                self.advance();
                return Ok(Expr {
                    span: token.span,
                    kind: ExprKind::Variable(token.lexeme),
                });
            }
            TokenKind::Number => match token.lexeme.parse::<f32>() {
                Ok(n) => Literal::Number(n),
                Err(_) => {
                    return Err(self.error(&token, "invalid number literal", &[TokenKind::Number]))
                }
            },
            TokenKind::String => Literal::String(unquote(&token.lexeme)),
            TokenKind::True => Literal::Bool(true),
            TokenKind::False => Literal::Bool(false),
            TokenKind::Null => Literal::Null,
            _ => return Err(self.error(&token, "unexpected token in expression", PRIMARY_START)),
        };
        self.advance();
        Ok(Expr {
            span: token.span,
            kind: ExprKind::Literal(literal),
        })
    }

    /// `name ( params ) { body }`. Backtracks without consuming anything
    /// unless a brace block follows the parameter list.
    fn try_function_decl(&mut self) -> Result<Option<Expr>, Diagnostic> {
        let checkpoint = self.current;
        let name = self.advance();
        let params = match self.parameter_list() {
            Some(params) if self.check(TokenKind::LBrace) => params,
            _ => {
                self.current = checkpoint;
                return Ok(None);
            }
        };
        trace!(name = %name.lexeme, arity = params.len(), "parse function declaration");
        let (statements, body_span) = self.parse_brace_block()?;
        let body = FunctionBody::new(statements);
        let span = name.span.to(body_span);
        Ok(Some(Expr {
            span,
            kind: ExprKind::Function(Rc::new(FunctionDecl {
                name: name.lexeme,
                params,
                body: body.statements,
                has_return: body.has_return,
                span,
            })),
        }))
    }

    fn parameter_list(&mut self) -> Option<Vec<String>> {
        if !self.matches(TokenKind::LParen) {
            return None;
        }
        let mut params = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                if !self.check(TokenKind::Identifier) {
                    return None;
                }
                params.push(self.advance().lexeme);
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.matches(TokenKind::RParen).then_some(params)
    }

    fn try_call(&mut self) -> Result<Option<Expr>, Diagnostic> {
        if self.peek_next().kind != TokenKind::LParen {
            return Ok(None);
        }
        let name = self.advance();
        self.advance();
        let mut args = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                args.push(self.parse_expression()?);
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        let rparen = self.consume_any(
            &[TokenKind::RParen, TokenKind::Comma],
            "expected `)` after arguments",
        )?;
        Ok(Some(Expr {
            span: name.span.to(rparen.span),
            kind: ExprKind::Call {
                name: name.lexeme,
                args,
            },
        }))
    }

    fn consume_optional_semicolon(&mut self) {
        let _ = self.matches(TokenKind::Semicolon);
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Result<Token, Diagnostic> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(self.peek(), message, &[kind]))
        }
    }

    /// Consumes `accepted[0]`; the rest only widen the reported expected set.
    fn consume_any(&mut self, accepted: &[TokenKind], message: &str) -> Result<Token, Diagnostic> {
        if self.check(accepted[0]) {
            Ok(self.advance())
        } else {
            Err(self.error(self.peek(), message, accepted))
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.current += 1;
        }
        token
    }

    fn peek(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[self.current.min(last)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn peek_next(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.current + 1).min(last)]
    }

    fn error(&self, token: &Token, message: &str, expected: &[TokenKind]) -> Diagnostic {
        let found = if token.kind == TokenKind::Eof {
            "end of input".to_string()
        } else {
            format!("`{}`", token.lexeme)
        };
        Diagnostic::new(DiagnosticKind::Parser, format!("{message}, found {found}"))
            .with_span(token.span)
            .with_expected(expected.iter().map(|kind| kind.describe()))
            .located_in(self.source)
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr {
        span: left.span.to(right.span),
        kind: ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
    }
}
