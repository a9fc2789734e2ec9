//! Lexer and recursive-descent parser for the SiftQL pipeline query language.
//!
//! Turns source text into the syntax tree defined in `siftql-ast`. Nothing in
//! this crate looks at a [`siftql_ast::command::CommandAst`] once it's built —
//! planning and execution are the engine crate's job.

pub mod lexer;
mod parser;

pub use lexer::{split_by_pipe, tokenize};
pub use parser::{parse, parse_expression};
