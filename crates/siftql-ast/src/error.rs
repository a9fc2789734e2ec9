//! Shared error shape used by the lexer and parser.
//!
//! The engine crate defines its own [resolution/semantic error
//! kinds](https://docs.rs/siftql) on top of this one; this type only needs to
//! describe failures that can happen while turning source text into a
//! [`crate::command::CommandAst`].

use std::fmt::{self, Debug, Display, Formatter};

use crate::Span;

#[derive(Debug, Clone)]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
    pub span: Option<Span>,
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Lexical,
    Syntax,
}

impl Error {
    pub fn lexical(message: impl Into<String>) -> Self {
        Error {
            kind: ErrorKind::Lexical,
            message: message.into(),
            span: None,
            line: None,
            column: None,
            token: None,
        }
    }

    pub fn syntax(message: impl Into<String>) -> Self {
        Error {
            kind: ErrorKind::Syntax,
            message: message.into(),
            span: None,
            line: None,
            column: None,
            token: None,
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_position(mut self, line: usize, column: usize) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.kind {
            ErrorKind::Lexical => write!(f, "lexical error: {}", self.message)?,
            ErrorKind::Syntax => write!(f, "syntax error: {}", self.message)?,
        }
        if let (Some(line), Some(column)) = (self.line, self.column) {
            write!(f, " (line {line}, column {column})")?;
        }
        if let Some(token) = &self.token {
            write!(f, " near `{token}`")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
