//! Hand-rolled state-machine lexer.
//!
//! States: top-level ↔ in-string(quote char) ↔ reading-number ↔
//! reading-identifier. Every state starts from "top" and an unmatched quote
//! or unrecognized character is fatal — there is no recovery, matching the
//! parser's own fail-fast behavior.

use siftql_ast::error::{Error, Result};
use siftql_ast::{Span, Token, TokenKind};

pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    Lexer::new(source).run()
}

/// Splits a command string on top-level `|` boundaries, respecting
/// `(...)`/`[...]` nesting and quoted strings. Used by callers that want to
/// pre-split a pipeline without invoking the full parser (e.g. REPL history,
/// `FilterOptimizer`-style passes that reason over raw command segments).
pub fn split_by_pipe(source: &str) -> Vec<String> {
    let chars: Vec<char> = source.chars().collect();
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth: i32 = 0;
    let mut quote: Option<char> = None;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if let Some(q) = quote {
            current.push(c);
            if c == '\\' && i + 1 < chars.len() {
                i += 1;
                current.push(chars[i]);
            } else if c == q {
                quote = None;
            }
        } else {
            match c {
                '"' | '\'' => {
                    quote = Some(c);
                    current.push(c);
                }
                '(' | '[' => {
                    depth += 1;
                    current.push(c);
                }
                ')' | ']' => {
                    depth -= 1;
                    current.push(c);
                }
                '|' if depth == 0 => {
                    parts.push(current.trim().to_string());
                    current = String::new();
                }
                _ => current.push(c),
            }
        }
        i += 1;
    }
    if !current.trim().is_empty() || parts.is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Lexer {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn run(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            let start_line = self.line;
            let start_col = self.column;
            let start = self.pos;
            let Some(c) = self.peek() else {
                tokens.push(Token::new(TokenKind::Eof, "", Span::new(start, start), start_line, start_col));
                break;
            };

            let token = if c == '"' || c == '\'' {
                self.read_string(start, start_line, start_col)?
            } else if c.is_ascii_digit() || (c == '-' && self.peek_at(1).is_some_and(|n| n.is_ascii_digit())) {
                self.read_number(start, start_line, start_col)
            } else if c.is_ascii_alphabetic() || c == '_' {
                self.read_ident(start, start_line, start_col)
            } else {
                self.read_operator(start, start_line, start_col)?
            };
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_string(&mut self, start: usize, line: usize, col: usize) -> Result<Token> {
        let quote = self.advance().unwrap();
        let mut value = String::new();
        loop {
            match self.advance() {
                None => {
                    return Err(Error::lexical("unterminated string literal")
                        .with_span(Span::new(start, self.pos))
                        .with_position(line, col));
                }
                Some(c) if c == quote => break,
                Some('\\') => match self.advance() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('r') => value.push('\r'),
                    Some('\\') => value.push('\\'),
                    Some(c) if c == quote => value.push(c),
                    // Unknown escapes (e.g. `\d`, `\w`) keep the backslash so
                    // regex patterns passed to `rex`/`LIKE` survive lexing.
                    Some(c) => {
                        value.push('\\');
                        value.push(c);
                    }
                    None => {
                        return Err(Error::lexical("unterminated string literal")
                            .with_span(Span::new(start, self.pos))
                            .with_position(line, col));
                    }
                },
                Some(c) => value.push(c),
            }
        }
        Ok(Token::new(TokenKind::String, value, Span::new(start, self.pos), line, col))
    }

    fn read_number(&mut self, start: usize, line: usize, col: usize) -> Token {
        let mut lexeme = String::new();
        if self.peek() == Some('-') {
            lexeme.push(self.advance().unwrap());
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                lexeme.push(self.advance().unwrap());
            } else {
                break;
            }
        }
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            lexeme.push(self.advance().unwrap());
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    lexeme.push(self.advance().unwrap());
                } else {
                    break;
                }
            }
        }
        Token::new(TokenKind::Number, lexeme, Span::new(start, self.pos), line, col)
    }

    fn read_ident(&mut self, start: usize, line: usize, col: usize) -> Token {
        let mut lexeme = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                lexeme.push(self.advance().unwrap());
            } else {
                break;
            }
        }
        let span = Span::new(start, self.pos);
        if let Some(kind) = TokenKind::keyword_from_str(&lexeme.to_ascii_lowercase()) {
            Token::new(kind, lexeme, span, line, col)
        } else {
            Token::new(TokenKind::Ident, lexeme, span, line, col)
        }
    }

    fn read_operator(&mut self, start: usize, line: usize, col: usize) -> Result<Token> {
        let c = self.advance().unwrap();
        let (kind, lexeme): (TokenKind, String) = match c {
            '|' => (TokenKind::Pipe, "|".into()),
            ',' => (TokenKind::Comma, ",".into()),
            '.' => (TokenKind::Dot, ".".into()),
            '(' => (TokenKind::LParen, "(".into()),
            ')' => (TokenKind::RParen, ")".into()),
            '[' => (TokenKind::LBracket, "[".into()),
            ']' => (TokenKind::RBracket, "]".into()),
            '+' => (TokenKind::Plus, "+".into()),
            '-' => (TokenKind::Minus, "-".into()),
            '*' => (TokenKind::Star, "*".into()),
            '/' => (TokenKind::Slash, "/".into()),
            '%' => (TokenKind::Percent, "%".into()),
            '=' => {
                if self.peek() == Some('=') {
                    self.advance();
                    (TokenKind::Eq, "==".into())
                } else {
                    (TokenKind::Equals, "=".into())
                }
            }
            '!' => {
                if self.peek() == Some('=') {
                    self.advance();
                    (TokenKind::Ne, "!=".into())
                } else {
                    return Err(Error::lexical(format!("unexpected character `{c}`"))
                        .with_span(Span::new(start, self.pos))
                        .with_position(line, col));
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.advance();
                    (TokenKind::Ge, ">=".into())
                } else {
                    (TokenKind::Gt, ">".into())
                }
            }
            '<' => {
                if self.peek() == Some('=') {
                    self.advance();
                    (TokenKind::Le, "<=".into())
                } else {
                    (TokenKind::Lt, "<".into())
                }
            }
            other => {
                return Err(Error::lexical(format!("unexpected character `{other}`"))
                    .with_span(Span::new(start, self.pos))
                    .with_position(line, col));
            }
        };
        Ok(Token::new(kind, lexeme, Span::new(start, self.pos), line, col))
    }
}
