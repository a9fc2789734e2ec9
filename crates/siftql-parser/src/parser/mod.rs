//! Recursive-descent parser with a single token of lookahead.
//!
//! The state machine lives in the call graph: each per-command grammar
//! function (`parse_stats_args`, `parse_sort_args`, ...) is entered by
//! [`Parser::parse_pipe_command`] dispatching on the command's lowercased
//! name, and a token class determines which production a function takes
//! next. There is no error recovery: the first mismatched token aborts the
//! whole parse.

mod commands;
mod expr;
#[cfg(test)]
mod tests;

use std::collections::HashMap;

use siftql_ast::error::{Error, Result};
use siftql_ast::{
    Argument, CommandAst, Expr, ExprKind, Literal, PipeCommandNode, SourceNode, SourceType, Token,
    TokenKind,
};

use crate::lexer;

/// Parses a full command: one source followed by zero or more pipe commands.
pub fn parse(source: &str) -> Result<CommandAst> {
    let tokens = lexer::tokenize(source)?;
    log::trace!("parsing {} tokens", tokens.len());
    let mut parser = Parser::new(tokens);
    let ast = parser.parse_command()?;
    parser.expect(TokenKind::Eof)?;
    log::debug!("parsed command with {} pipe stage(s)", ast.pipeline.len());
    Ok(ast)
}

/// Re-parses a standalone expression (used to re-interpret the raw string
/// captured by `filter`/`where` at operator-execution time, with the exact
/// same grammar used for `eval` assignments).
pub fn parse_expression(source: &str) -> Result<Expr> {
    let tokens = lexer::tokenize(source)?;
    let mut parser = Parser::new(tokens);
    let expr = parser.parse_expression()?;
    parser.expect(TokenKind::Eof)?;
    Ok(expr)
}

pub(crate) struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_at(&self, ahead: usize) -> &Token {
        let idx = (self.pos + ahead).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            let found = self.peek().clone();
            Err(Error::syntax(format!("expected {:?}, found `{}`", kind, found))
                .with_span(found.span)
                .with_position(found.line, found.column)
                .with_token(found.literal))
        }
    }

    fn expect_ident(&mut self) -> Result<Token> {
        self.expect(TokenKind::Ident)
    }

    fn at_command_boundary(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Pipe | TokenKind::Eof | TokenKind::RBracket)
    }

    fn parse_command(&mut self) -> Result<CommandAst> {
        let source = self.parse_source()?;
        let mut pipeline = Vec::new();
        while self.check(TokenKind::Pipe) {
            self.advance();
            pipeline.push(self.parse_pipe_command()?);
        }
        Ok(CommandAst { source, pipeline })
    }

    /// ```text
    /// source := '(' source (OR source)+ ')'
    ///         | IDENT '=' value
    ///         | 'search' search_args
    ///         | IDENT
    /// ```
    fn parse_source(&mut self) -> Result<SourceNode> {
        if self.check(TokenKind::LParen) {
            let start = self.peek().span;
            self.advance();
            let mut sub_sources = vec![self.parse_source()?];
            while self.is_ident_word("or") || self.check(TokenKind::Or) {
                self.advance();
                sub_sources.push(self.parse_source()?);
            }
            let end = self.expect(TokenKind::RParen)?.span;
            return Ok(SourceNode {
                source_type: SourceType::Multi,
                name: String::new(),
                params: HashMap::new(),
                sub_sources,
                span: Some(start.to(end)),
            });
        }

        let name_tok = self.expect_ident()?;
        let lower = name_tok.literal.to_ascii_lowercase();

        if lower == "search" {
            let params = self.parse_keyword_params()?;
            let name = params
                .get("index")
                .and_then(expr_as_text)
                .unwrap_or_default();
            return Ok(SourceNode {
                source_type: SourceType::Search,
                name,
                params,
                sub_sources: Vec::new(),
                span: Some(name_tok.span),
            });
        }

        if self.check(TokenKind::Equals) {
            self.advance();
            let value = self.parse_source_value()?;
            let source_type = if lower == "cache" {
                SourceType::Cache
            } else {
                SourceType::Default
            };
            let name = expr_as_text(&value).unwrap_or_default();
            let mut params = HashMap::new();
            params.insert(lower, value);
            // A source assignment may be followed directly by trailing
            // keyword params (`cache=events latest=-5m earliest=-1h`), not
            // just inside an explicit `search ...` clause.
            params.extend(self.parse_keyword_params()?);
            return Ok(SourceNode {
                source_type,
                name,
                params,
                sub_sources: Vec::new(),
                span: Some(name_tok.span),
            });
        }

        Ok(SourceNode {
            source_type: SourceType::Default,
            name: name_tok.literal.clone(),
            params: HashMap::new(),
            sub_sources: Vec::new(),
            span: Some(name_tok.span),
        })
    }

    /// A bare identifier or quoted-string value appearing after `key=`.
    fn parse_source_value(&mut self) -> Result<Expr> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::String => {
                self.advance();
                Ok(Expr::new(ExprKind::Literal(Literal::String(tok.literal))))
            }
            TokenKind::Ident | TokenKind::Number => {
                self.advance();
                Ok(Expr::new(ExprKind::Ident(tok.literal)))
            }
            _ => Err(Error::syntax(format!("expected a source name, found `{tok}`")).with_span(tok.span)),
        }
    }

    /// `key="value"` / `key=value` pairs used by `search` as a source.
    fn parse_keyword_params(&mut self) -> Result<HashMap<String, Expr>> {
        let mut params = HashMap::new();
        while self.check(TokenKind::Ident) && self.peek_at(1).kind == TokenKind::Equals {
            let key = self.advance().literal.to_ascii_lowercase();
            self.advance(); // '='
            let value = self.parse_relative_or_value(&key)?;
            params.insert(key, value);
        }
        Ok(params)
    }

    /// `latest=`/`earliest=` accept `[+-]N<unit>` reassembled from separate
    /// NUMBER/IDENT tokens, or a quoted absolute timestamp.
    fn parse_relative_or_value(&mut self, key: &str) -> Result<Expr> {
        if (key == "latest" || key == "earliest") && self.check(TokenKind::Number) {
            let sign_tok = self.advance();
            let unit = if self.check(TokenKind::Ident) {
                self.advance().literal
            } else {
                String::new()
            };
            return Ok(Expr::new(ExprKind::Literal(Literal::String(format!(
                "{}{}",
                sign_tok.literal, unit
            )))));
        }
        self.parse_source_value()
    }

    fn is_ident_word(&self, word: &str) -> bool {
        let tok = self.peek();
        tok.kind == TokenKind::Ident && tok.literal.to_ascii_lowercase() == word
    }
}

fn expr_as_text(expr: &Expr) -> Option<String> {
    match &expr.kind {
        ExprKind::Literal(Literal::String(s)) => Some(s.clone()),
        ExprKind::Ident(s) => Some(s.clone()),
        _ => None,
    }
}
