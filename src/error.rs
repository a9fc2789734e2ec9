//! Engine-level error type.
//!
//! Extends the lexer/parser's [`siftql_ast::error::Error`] with the two
//! failure kinds that only make sense once a syntax tree is being resolved
//! and executed: unknown commands/sources/columns, and semantically invalid
//! operator arguments. All four kinds share one shape so a caller of
//! [`crate::execute`] only has to handle one error type.

use std::fmt::{self, Display, Formatter};

use siftql_ast::error::{Error as AstError, ErrorKind as AstErrorKind};

#[derive(Debug, Clone)]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
    pub command: Option<String>,
    pub field: Option<String>,
    pub token: Option<String>,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Lexical,
    Syntax,
    Resolution,
    Semantic,
}

impl Error {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Error {
            kind,
            message: message.into(),
            command: None,
            field: None,
            token: None,
            line: None,
            column: None,
        }
    }

    pub fn resolution(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::Resolution, message)
    }

    pub fn semantic(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::Semantic, message)
    }

    pub fn unknown_command(name: &str) -> Self {
        Error::resolution(format!("unknown command `{name}`")).with_command(name)
    }

    pub fn unknown_source(name: &str) -> Self {
        Error::resolution(format!("unknown source `{name}`"))
    }

    pub fn missing_column(command: &str, field: &str) -> Self {
        Error::resolution(format!("column `{field}` does not exist"))
            .with_command(command)
            .with_field(field)
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

impl From<AstError> for Error {
    fn from(err: AstError) -> Self {
        let kind = match err.kind {
            AstErrorKind::Lexical => ErrorKind::Lexical,
            AstErrorKind::Syntax => ErrorKind::Syntax,
        };
        Error {
            kind,
            message: err.message,
            command: None,
            field: None,
            token: err.token,
            line: err.line,
            column: err.column,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let label = match self.kind {
            ErrorKind::Lexical => "lexical error",
            ErrorKind::Syntax => "syntax error",
            ErrorKind::Resolution => "resolution error",
            ErrorKind::Semantic => "semantic error",
        };
        write!(f, "{label}: {}", self.message)?;
        if let Some(command) = &self.command {
            write!(f, " (in `{command}`)")?;
        }
        if let Some(field) = &self.field {
            write!(f, " (field `{field}`)")?;
        }
        if let (Some(line), Some(column)) = (self.line, self.column) {
            write!(f, " at line {line}, column {column}")?;
        }
        if let Some(token) = &self.token {
            write!(f, " near `{token}`")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

pub trait WithErrorInfo: Sized {
    fn with_command(self, command: impl Into<String>) -> Self;
    fn with_field(self, field: impl Into<String>) -> Self;
}

impl<T> WithErrorInfo for Result<T> {
    fn with_command(self, command: impl Into<String>) -> Self {
        self.map_err(|e| e.with_command(command))
    }

    fn with_field(self, field: impl Into<String>) -> Self {
        self.map_err(|e| e.with_field(field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_command_and_field_when_present() {
        let err = Error::missing_column("stats", "revenue");
        let text = err.to_string();
        assert!(text.contains("resolution error"));
        assert!(text.contains("in `stats`"));
        assert!(text.contains("field `revenue`"));
    }

    #[test]
    fn with_command_chains_onto_an_existing_result_error() {
        let result: Result<()> = Err(Error::semantic("bad arg")).with_command("eval");
        let err = result.unwrap_err();
        assert_eq!(err.command.as_deref(), Some("eval"));
    }

    #[test]
    fn ast_lexical_errors_convert_into_engine_errors() {
        let ast_err = AstError::lexical("unterminated string");
        let err: Error = ast_err.into();
        assert_eq!(err.kind, ErrorKind::Lexical);
    }
}
