//! Per-command argument grammars, dispatched by [`Parser::parse_pipe_command`]
//! on the (lowercased) command keyword. Each function consumes exactly the
//! tokens belonging to its command and stops at the next `|`, `]`, or EOF.

use siftql_ast::error::{Error, Result};
use siftql_ast::{AggregationNode, Argument, Expr, ExprKind, Literal, PipeCommandNode, Token, TokenKind};

use super::Parser;

impl Parser {
    pub(crate) fn parse_pipe_command(&mut self) -> Result<PipeCommandNode> {
        let name_tok = self.expect_ident()?;
        let name = name_tok.literal.to_ascii_lowercase();
        let mut node = PipeCommandNode::new(name_tok.literal.clone(), Some(name_tok.span));

        match name.as_str() {
            "stats" | "eventstats" => self.parse_stats_args(&mut node)?,
            "sort" => self.parse_sort_args(&mut node)?,
            "head" | "tail" | "limit" => self.parse_limit_args(&mut node)?,
            "filter" | "where" => self.parse_filter_args(&mut node)?,
            "eval" | "calculate" | "compute" => self.parse_eval_args(&mut node)?,
            "join" => self.parse_join_args(&mut node)?,
            "append" | "union" => self.parse_subquery_only_args(&mut node)?,
            "bucket" | "bin" => self.parse_span_field_args(&mut node, "span")?,
            "transaction" => self.parse_span_field_args(&mut node, "maxspan")?,
            "rename" => self.parse_rename_args(&mut node)?,
            "replace" => self.parse_replace_args(&mut node)?,
            "rex" | "regex" | "extract" => self.parse_rex_args(&mut node)?,
            _ => self.parse_generic_args(&mut node)?,
        }

        Ok(node)
    }

    /// `aggregation (',' aggregation)* ('by' field (',' field)*)?`
    /// where `aggregation := IDENT '(' IDENT? ')' ('as' IDENT)? | IDENT ('as' IDENT)?`
    fn parse_stats_args(&mut self, node: &mut PipeCommandNode) -> Result<()> {
        loop {
            if self.is_by_keyword() || self.at_command_boundary() {
                break;
            }
            let func_tok = self.expect_ident()?;
            let function = func_tok.literal.to_ascii_lowercase();
            let field = if self.check(TokenKind::LParen) {
                self.advance();
                let field = if self.check(TokenKind::RParen) {
                    None
                } else {
                    Some(self.expect_ident()?.literal)
                };
                self.expect(TokenKind::RParen)?;
                field
            } else {
                None
            };
            let alias = if self.is_as_keyword() {
                self.advance();
                Some(self.expect_ident()?.literal)
            } else {
                None
            };
            node.aggregations.push(AggregationNode {
                function,
                field,
                alias,
                span: Some(func_tok.span),
            });
            if self.check(TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        self.parse_optional_by(node)?;
        Ok(())
    }

    /// `('-'? field) (',' '-'? field)*`
    fn parse_sort_args(&mut self, node: &mut PipeCommandNode) -> Result<()> {
        loop {
            if self.at_command_boundary() {
                break;
            }
            let descending = self.check(TokenKind::Minus);
            if descending {
                self.advance();
            }
            let field_tok = self.expect_ident()?;
            let name = if descending {
                format!("-{}", field_tok.literal)
            } else {
                field_tok.literal
            };
            node.arguments.push(Argument::Positional(Expr::new(ExprKind::Ident(name))));
            if self.check(TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        Ok(())
    }

    /// One non-negative integer, defaulting to 10 when absent.
    fn parse_limit_args(&mut self, node: &mut PipeCommandNode) -> Result<()> {
        if self.check(TokenKind::Number) {
            let tok = self.advance();
            node.arguments.push(Argument::Positional(Expr::new(ExprKind::Literal(
                Literal::Number(tok.literal.parse().unwrap_or(10.0)),
            ))));
        } else {
            node.arguments
                .push(Argument::Positional(Expr::new(ExprKind::Literal(Literal::Number(10.0)))));
        }
        Ok(())
    }

    /// Captures the remainder of the command as a single raw string, to be
    /// re-parsed with [`crate::parse_expression`] once the operator runs
    /// (filter/where are the only commands whose body isn't parsed eagerly,
    /// since the language doesn't otherwise need a dedicated boolean-only
    /// production).
    fn parse_filter_args(&mut self, node: &mut PipeCommandNode) -> Result<()> {
        let raw = self.capture_filter_expression();
        node.arguments
            .push(Argument::Positional(Expr::new(ExprKind::Literal(Literal::String(raw)))));
        Ok(())
    }

    fn capture_filter_expression(&mut self) -> String {
        let mut parts: Vec<String> = Vec::new();
        while !self.at_command_boundary() {
            if self.is_ident_word("like") {
                self.advance();
                let pattern = self.capture_glob();
                parts.push("LIKE".to_string());
                parts.push(format!("\"{}\"", pattern.replace('\\', "\\\\").replace('"', "\\\"")));
                continue;
            }
            let tok = self.advance();
            parts.push(render_token(&tok));
        }
        parts.join(" ")
    }

    /// Consumes a maximal run of bare identifiers, `*`, `%`, `.`, and numbers
    /// into one glob pattern — used after a `LIKE` keyword that wasn't
    /// already followed by a quoted string.
    fn capture_glob(&mut self) -> String {
        if self.check(TokenKind::String) {
            return self.advance().literal;
        }
        let mut pattern = String::new();
        loop {
            match self.peek().kind {
                TokenKind::Ident | TokenKind::Number => pattern.push_str(&self.advance().literal),
                TokenKind::Star => {
                    self.advance();
                    pattern.push('%');
                }
                TokenKind::Percent => {
                    self.advance();
                    pattern.push('%');
                }
                TokenKind::Dot => {
                    self.advance();
                    pattern.push('.');
                }
                _ => break,
            }
        }
        pattern
    }

    /// `field '=' expression (',' field '=' expression)*`
    fn parse_eval_args(&mut self, node: &mut PipeCommandNode) -> Result<()> {
        loop {
            if self.at_command_boundary() {
                break;
            }
            let field = self.expect_ident()?.literal;
            self.expect(TokenKind::Equals)?;
            let value = self.parse_expression()?;
            node.arguments.push(Argument::Keyword(field, value));
            if self.check(TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        Ok(())
    }

    /// `IDENT '[' command ']'`
    fn parse_join_args(&mut self, node: &mut PipeCommandNode) -> Result<()> {
        let field = self.expect_ident()?.literal;
        node.arguments.push(Argument::Positional(Expr::new(ExprKind::Ident(field))));
        self.parse_required_subquery(node)?;
        Ok(())
    }

    /// `'[' command ']'` only (used by `append`/`union`).
    fn parse_subquery_only_args(&mut self, node: &mut PipeCommandNode) -> Result<()> {
        self.parse_required_subquery(node)
    }

    fn parse_required_subquery(&mut self, node: &mut PipeCommandNode) -> Result<()> {
        let open = self.expect(TokenKind::LBracket)?;
        let inner = self.parse_command()?;
        self.expect(TokenKind::RBracket).map_err(|_| {
            Error::syntax("unterminated subquery, expected `]`").with_span(open.span)
        })?;
        node.subqueries.push(inner);
        Ok(())
    }

    /// `field (keyword '=' value)*`, where the named keyword assembles a
    /// `<N><unit>` span from adjacent NUMBER/IDENT tokens (`bucket`/`bin` use
    /// `span=`; `transaction` uses `maxspan=`).
    fn parse_span_field_args(&mut self, node: &mut PipeCommandNode, span_keyword: &str) -> Result<()> {
        let field = self.expect_ident()?.literal;
        node.arguments.push(Argument::Positional(Expr::new(ExprKind::Ident(field))));
        while self.check(TokenKind::Ident) && self.peek_at(1).kind == TokenKind::Equals {
            let key = self.advance().literal.to_ascii_lowercase();
            self.advance(); // '='
            let value = if key == span_keyword {
                self.parse_span_value()?
            } else {
                self.parse_keyword_value()?
            };
            node.arguments.push(Argument::Keyword(key, value));
        }
        Ok(())
    }

    /// `<N><unit>`, where NUMBER and IDENT are adjacent tokens (`5m`, `30s`).
    fn parse_span_value(&mut self) -> Result<Expr> {
        if self.check(TokenKind::String) {
            return Ok(Expr::new(ExprKind::Literal(Literal::String(self.advance().literal))));
        }
        let n = self.expect(TokenKind::Number)?.literal;
        let unit = if self.check(TokenKind::Ident) {
            self.advance().literal
        } else {
            String::new()
        };
        Ok(Expr::new(ExprKind::Literal(Literal::String(format!("{n}{unit}")))))
    }

    /// `old ('as' | '=') new (',' old ('as'|'=') new)*`
    fn parse_rename_args(&mut self, node: &mut PipeCommandNode) -> Result<()> {
        loop {
            if self.at_command_boundary() {
                break;
            }
            let old = self.expect_ident()?.literal;
            if self.is_as_keyword() {
                self.advance();
            } else {
                self.expect(TokenKind::Equals)?;
            }
            let new = self.expect_ident()?.literal;
            node.arguments
                .push(Argument::Keyword(old, Expr::new(ExprKind::Ident(new))));
            if self.check(TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        Ok(())
    }

    /// `field (old_value 'with' new_value | 'regex' '=' STRING 'with' STRING)`
    fn parse_replace_args(&mut self, node: &mut PipeCommandNode) -> Result<()> {
        let field = self.expect_ident()?.literal;
        node.arguments.push(Argument::Positional(Expr::new(ExprKind::Ident(field))));

        if self.check(TokenKind::Ident) && self.peek().literal.eq_ignore_ascii_case("regex") && self.peek_at(1).kind == TokenKind::Equals {
            self.advance(); // regex
            self.advance(); // '='
            let pattern = self.expect(TokenKind::String)?.literal;
            node.arguments
                .push(Argument::Keyword("regex".into(), Expr::new(ExprKind::Literal(Literal::String(pattern)))));
        } else {
            let old = self.parse_expression()?;
            node.arguments.push(Argument::Keyword("old".into(), old));
        }

        if !self.check(TokenKind::With) {
            return Err(Error::syntax("expected `with` in `replace` command").with_span(self.peek().span));
        }
        self.advance();
        let new = self.parse_expression()?;
        node.arguments.push(Argument::Keyword("new".into(), new));
        Ok(())
    }

    /// `'field' '=' IDENT STRING ('mode' '=' 'sed')?` (or a leading
    /// `s/PATTERN/REPLACEMENT/` literal captured as a single string token).
    fn parse_rex_args(&mut self, node: &mut PipeCommandNode) -> Result<()> {
        while self.check(TokenKind::Ident) && self.peek_at(1).kind == TokenKind::Equals {
            let key = self.advance().literal.to_ascii_lowercase();
            self.advance();
            let value = self.parse_keyword_value()?;
            node.arguments.push(Argument::Keyword(key, value));
        }
        if self.check(TokenKind::String) {
            let pattern = self.advance().literal;
            node.arguments
                .push(Argument::Positional(Expr::new(ExprKind::Literal(Literal::String(pattern)))));
        }
        Ok(())
    }

    /// Any combination of `key=value` pairs, positional values, `by`
    /// clauses, and subqueries — covers `select`, `cache`/`new_cache`,
    /// `lookup`, `sample`, `dedup`, `dropnull`, `top`/`rare`, `reverse`,
    /// `transpose`, `fillnull`, `mvexpand`, and any future keyword that
    /// doesn't need a dedicated grammar.
    fn parse_generic_args(&mut self, node: &mut PipeCommandNode) -> Result<()> {
        loop {
            if self.at_command_boundary() {
                break;
            }
            if self.is_by_keyword() {
                self.parse_optional_by(node)?;
                continue;
            }
            if self.check(TokenKind::LBracket) {
                self.parse_required_subquery(node)?;
                continue;
            }
            if self.check(TokenKind::Ident) && self.peek_at(1).kind == TokenKind::Equals {
                let key = self.advance().literal.to_ascii_lowercase();
                self.advance();
                let mut value = self.parse_keyword_value()?;
                // Merge a comma-separated bare field list into one value
                // (`output=a,b,c`, `sortby=-time,name`), the same way
                // `parse_span_value` merges adjacent tokens for a single
                // value — otherwise only the first field would attach to
                // this keyword and the rest would become stray positionals.
                if let ExprKind::Ident(first) = &value.kind {
                    let mut combined = first.clone();
                    let mut merged = false;
                    while let Some(next_field) = self.try_take_comma_field() {
                        combined.push(',');
                        combined.push_str(&next_field);
                        merged = true;
                    }
                    if merged {
                        value = Expr::new(ExprKind::Literal(Literal::String(combined)));
                    }
                }
                node.arguments.push(Argument::Keyword(key, value));
            } else {
                let value = self.parse_generic_positional()?;
                node.arguments.push(Argument::Positional(value));
            }
            if self.check(TokenKind::Comma) {
                self.advance();
            }
        }
        Ok(())
    }

    /// Consumes `, [-]IDENT` when the identifier isn't itself the start of a
    /// new `key=value` pair. Used by [`Self::parse_generic_args`] to fold a
    /// comma-separated field list following a keyword into that keyword's
    /// value instead of spilling the tail fields out as stray positionals.
    fn try_take_comma_field(&mut self) -> Option<String> {
        if !self.check(TokenKind::Comma) {
            return None;
        }
        let signed = self.peek_at(1).kind == TokenKind::Minus;
        let ident_ahead = if signed { 2 } else { 1 };
        if self.peek_at(ident_ahead).kind != TokenKind::Ident {
            return None;
        }
        if self.peek_at(ident_ahead + 1).kind == TokenKind::Equals {
            return None;
        }
        self.advance(); // comma
        let sign = if signed {
            self.advance();
            "-"
        } else {
            ""
        };
        Some(format!("{sign}{}", self.advance().literal))
    }

    /// A positional value in a generic argument list: a plain identifier, a
    /// number, a string, a `-field` exclusion (`select`), or a glob formed by
    /// merging `*`/`%` with an adjacent identifier.
    fn parse_generic_positional(&mut self) -> Result<Expr> {
        if self.check(TokenKind::Minus) && self.peek_at(1).kind == TokenKind::Ident {
            self.advance();
            let field = self.expect_ident()?.literal;
            return Ok(Expr::new(ExprKind::Ident(format!("-{field}"))));
        }
        if matches!(self.peek().kind, TokenKind::Star | TokenKind::Percent) {
            let glob = self.capture_glob();
            return Ok(Expr::new(ExprKind::Literal(Literal::String(glob))));
        }
        match self.peek().kind {
            TokenKind::String => Ok(Expr::new(ExprKind::Literal(Literal::String(self.advance().literal)))),
            TokenKind::Number => {
                let n = self.advance().literal.parse().unwrap_or(0.0);
                Ok(Expr::new(ExprKind::Literal(Literal::Number(n))))
            }
            TokenKind::Ident => {
                let ident = self.advance().literal;
                if matches!(self.peek().kind, TokenKind::Star | TokenKind::Percent) {
                    let mut glob = ident;
                    glob.push_str(&self.capture_glob());
                    Ok(Expr::new(ExprKind::Literal(Literal::String(glob))))
                } else {
                    Ok(Expr::new(ExprKind::Ident(ident)))
                }
            }
            _ => {
                let tok = self.peek().clone();
                Err(Error::syntax(format!("unexpected token `{tok}` in argument list")).with_span(tok.span))
            }
        }
    }

    /// A value on the right of `key=` in a keyword argument: a field list
    /// (`fields=a,b,c`), a relative time, a glob, or a plain literal.
    fn parse_keyword_value(&mut self) -> Result<Expr> {
        if (self.check(TokenKind::Minus) || self.check(TokenKind::Plus)) && self.peek_at(1).kind == TokenKind::Number {
            let sign = self.advance().literal;
            let n = self.advance().literal;
            let unit = if self.check(TokenKind::Ident) {
                self.advance().literal
            } else {
                String::new()
            };
            let text = if sign == "-" {
                format!("{n}{unit}")
            } else {
                format!("{sign}{n}{unit}")
            };
            return Ok(Expr::new(ExprKind::Literal(Literal::String(text))));
        }
        if self.check(TokenKind::Number) && self.peek_at(1).kind == TokenKind::Ident {
            // `<N><unit>` keyword value, e.g. `span=5m`, without an explicit sign.
            let n = self.advance().literal;
            let unit = self.advance().literal;
            return Ok(Expr::new(ExprKind::Literal(Literal::String(format!("{n}{unit}")))));
        }
        self.parse_generic_positional()
    }

    fn parse_optional_by(&mut self, node: &mut PipeCommandNode) -> Result<()> {
        if !self.is_by_keyword() {
            return Ok(());
        }
        self.advance();
        loop {
            node.by_fields.push(self.expect_ident()?.literal);
            if self.check(TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        Ok(())
    }

    fn is_by_keyword(&self) -> bool {
        self.check(TokenKind::By)
    }

    fn is_as_keyword(&self) -> bool {
        self.check(TokenKind::As)
    }
}

fn render_token(tok: &Token) -> String {
    match tok.kind {
        TokenKind::String => format!("\"{}\"", tok.literal.replace('\\', "\\\\").replace('"', "\\\"")),
        _ => tok.literal.clone(),
    }
}
