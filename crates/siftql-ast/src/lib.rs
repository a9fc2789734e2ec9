//! Token and syntax-tree types shared by the lexer and parser.
//!
//! This crate has no behavior of its own — it's the vocabulary that
//! `siftql-parser` builds and that the planner in `siftql` consumes.

pub mod command;
pub mod error;
pub mod expr;
mod span;
pub mod token;

pub use command::{AggregationNode, Argument, CommandAst, PipeCommandNode, SourceNode, SourceType};
pub use expr::{BinOp, Expr, ExprKind, FuncCall, Literal, UnOp};
pub use span::Span;
pub use token::{Token, TokenKind};
