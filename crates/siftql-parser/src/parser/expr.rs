//! Expression grammar, shared between `eval`/`calculate` assignments parsed
//! inline and the `filter`/`where` raw expression string, which is
//! re-tokenized and re-parsed through the same entry point later (see
//! [`crate::parse_expression`]).
//!
//! ```text
//! expression := or_expr
//! or_expr     := and_expr ('OR' and_expr)*
//! and_expr    := not_expr ('AND' not_expr)*
//! not_expr    := 'NOT'? cmp_expr
//! cmp_expr    := add_expr ((>|<|>=|<=|==|!=|=) add_expr)*
//! add_expr    := mul_expr ((+|-) mul_expr)*
//! mul_expr    := unary ((*|/) unary)*
//! unary       := '-'? primary
//! primary     := STRING | NUMBER | '(' expression ')' | IDENT ('(' arglist? ')')?
//! ```
//!
//! `NOT` sits between `AND` and comparison, matching the precedence spelled
//! out for the filter evaluator (`OR < AND < NOT < comparison < additive <
//! multiplicative < primary`); the bare grammar outline doesn't show it
//! explicitly, so this is the parser's own resolution of that gap.

use siftql_ast::error::{Error, Result};
use siftql_ast::{BinOp, Expr, ExprKind, FuncCall, Literal, TokenKind, UnOp};

use super::Parser;

impl Parser {
    pub fn parse_expression(&mut self) -> Result<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        while self.is_ident_word("or") || self.check(TokenKind::Or) {
            self.advance();
            let right = self.parse_and()?;
            left = binary(BinOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_not()?;
        while self.is_ident_word("and") || self.check(TokenKind::And) {
            self.advance();
            let right = self.parse_not()?;
            left = binary(BinOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr> {
        if self.is_ident_word("not") {
            self.advance();
            let inner = self.parse_not()?;
            return Ok(Expr::new(ExprKind::Unary(siftql_ast::expr::UnaryExpr {
                op: UnOp::Not,
                expr: Box::new(inner),
            })));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let left = self.parse_additive()?;

        let negated = self.is_ident_word("not") && self.peek_at(1).kind == TokenKind::In;
        if negated {
            self.advance();
        }
        if negated || self.check(TokenKind::In) {
            self.advance();
            let membership = self.parse_in_list(left)?;
            return Ok(if negated {
                Expr::new(ExprKind::Unary(siftql_ast::expr::UnaryExpr {
                    op: UnOp::Not,
                    expr: Box::new(membership),
                }))
            } else {
                membership
            });
        }

        if self.is_ident_word("like") {
            self.advance();
            let pattern = self.parse_additive()?;
            return Ok(Expr::new(ExprKind::FuncCall(FuncCall {
                name: "like".to_string(),
                args: vec![left, pattern],
            })));
        }

        let op = match self.peek().kind {
            TokenKind::Eq | TokenKind::Equals => Some(BinOp::Eq),
            TokenKind::Ne => Some(BinOp::Ne),
            TokenKind::Gt => Some(BinOp::Gt),
            TokenKind::Lt => Some(BinOp::Lt),
            TokenKind::Ge => Some(BinOp::Ge),
            TokenKind::Le => Some(BinOp::Le),
            _ => None,
        };
        let Some(op) = op else { return Ok(left) };
        self.advance();
        let right = self.parse_additive()?;
        Ok(binary(op, left, right))
    }

    /// `'(' expression (',' expression)* ')'`, following a consumed `IN`.
    /// Represented as a call to the `in` function, since membership isn't a
    /// binary operator: `field in (a, b, c)` becomes `in(field, a, b, c)`.
    fn parse_in_list(&mut self, left: Expr) -> Result<Expr> {
        self.expect(TokenKind::LParen)?;
        let mut args = vec![left];
        if !self.check(TokenKind::RParen) {
            loop {
                args.push(self.parse_expression()?);
                if self.check(TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(Expr::new(ExprKind::FuncCall(FuncCall { name: "in".to_string(), args })))
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if self.check(TokenKind::Minus) {
            self.advance();
            let inner = self.parse_unary()?;
            return Ok(Expr::new(ExprKind::Unary(siftql_ast::expr::UnaryExpr {
                op: UnOp::Neg,
                expr: Box::new(inner),
            })));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::String => {
                self.advance();
                Ok(Expr::new(ExprKind::Literal(Literal::String(tok.literal))))
            }
            TokenKind::Number => {
                self.advance();
                let n: f64 = tok.literal.parse().map_err(|_| {
                    Error::syntax(format!("invalid number literal `{}`", tok.literal))
                        .with_span(tok.span)
                })?;
                Ok(Expr::new(ExprKind::Literal(Literal::Number(n))))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::Ident => {
                self.advance();
                let lower = tok.literal.to_ascii_lowercase();
                if lower == "true" {
                    return Ok(Expr::new(ExprKind::Literal(Literal::Bool(true))));
                }
                if lower == "false" {
                    return Ok(Expr::new(ExprKind::Literal(Literal::Bool(false))));
                }
                if self.check(TokenKind::LParen) {
                    self.advance();
                    let mut args = Vec::new();
                    if !self.check(TokenKind::RParen) {
                        loop {
                            args.push(self.parse_expression()?);
                            if self.check(TokenKind::Comma) {
                                self.advance();
                            } else {
                                break;
                            }
                        }
                    }
                    self.expect(TokenKind::RParen)?;
                    return Ok(Expr::new(ExprKind::FuncCall(FuncCall { name: lower, args })));
                }
                Ok(Expr::new(ExprKind::Ident(tok.literal)))
            }
            _ => Err(Error::syntax(format!("expected an expression, found `{tok}`"))
                .with_span(tok.span)
                .with_token(tok.literal)),
        }
    }
}

fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
    Expr::new(ExprKind::Binary(siftql_ast::expr::BinaryExpr {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }))
}
