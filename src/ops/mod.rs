//! Operator objects: one per pipe-command keyword, dispatched through a
//! command registry populated at startup (§4.3) rather than a class
//! hierarchy (§9). `Operator` is a tagged variant where each arm owns its
//! already-parsed arguments and exposes a single `execute`.

mod aggregate;
mod columns;
mod join;
mod retrieval;
mod selection;
mod time_ops;
mod transform;

use std::collections::HashMap;
use std::sync::OnceLock;

use siftql_ast::{Argument, Expr, ExprKind, Literal, PipeCommandNode};

use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::table::Table;

pub enum Operator {
    Cache(retrieval::CacheOp),
    NewCache(retrieval::NewCacheOp),
    SearchFilter(retrieval::SearchFilterOp),
    Lookup(retrieval::LookupOp),

    Filter(selection::FilterOp),
    HeadTail(selection::HeadTailOp),
    Sample(selection::SampleOp),
    Dedup(selection::DedupOp),
    DropNull(selection::DropNullOp),

    Select(columns::SelectOp),
    Rename(columns::RenameOp),
    Eval(columns::EvalOp),
    Replace(columns::ReplaceOp),
    Rex(columns::RexOp),
    MvExpand(columns::MvExpandOp),

    Stats(aggregate::StatsOp),
    TopRare(aggregate::TopRareOp),

    Sort(transform::SortOp),
    Reverse(transform::ReverseOp),
    Transpose(transform::TransposeOp),
    FillNull(transform::FillNullOp),

    Join(join::JoinOp),
    Append(join::AppendOp),

    Bucket(time_ops::BucketOp),
    Transaction(time_ops::TransactionOp),
}

impl Operator {
    pub fn execute(&self, table: Table, exec: &Executor) -> Result<Table> {
        match self {
            Operator::Cache(op) => op.execute(table, exec),
            Operator::NewCache(op) => op.execute(table, exec),
            Operator::SearchFilter(op) => op.execute(table, exec),
            Operator::Lookup(op) => op.execute(table, exec),
            Operator::Filter(op) => op.execute(table, exec),
            Operator::HeadTail(op) => op.execute(table, exec),
            Operator::Sample(op) => op.execute(table, exec),
            Operator::Dedup(op) => op.execute(table, exec),
            Operator::DropNull(op) => op.execute(table, exec),
            Operator::Select(op) => op.execute(table, exec),
            Operator::Rename(op) => op.execute(table, exec),
            Operator::Eval(op) => op.execute(table, exec),
            Operator::Replace(op) => op.execute(table, exec),
            Operator::Rex(op) => op.execute(table, exec),
            Operator::MvExpand(op) => op.execute(table, exec),
            Operator::Stats(op) => op.execute(table, exec),
            Operator::TopRare(op) => op.execute(table, exec),
            Operator::Sort(op) => op.execute(table, exec),
            Operator::Reverse(op) => op.execute(table, exec),
            Operator::Transpose(op) => op.execute(table, exec),
            Operator::FillNull(op) => op.execute(table, exec),
            Operator::Join(op) => op.execute(table, exec),
            Operator::Append(op) => op.execute(table, exec),
            Operator::Bucket(op) => op.execute(table, exec),
            Operator::Transaction(op) => op.execute(table, exec),
        }
    }
}

type Constructor = fn(&PipeCommandNode) -> Result<Operator>;

fn registry() -> &'static HashMap<&'static str, Constructor> {
    static REGISTRY: OnceLock<HashMap<&'static str, Constructor>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut map: HashMap<&'static str, Constructor> = HashMap::new();
        let mut register = |keywords: &[&'static str], ctor: Constructor| {
            for keyword in keywords {
                map.insert(keyword, ctor);
            }
        };

        register(&["cache"], retrieval::CacheOp::build);
        register(&["new_cache"], retrieval::NewCacheOp::build);
        register(&["search"], retrieval::SearchFilterOp::build);
        register(&["lookup"], retrieval::LookupOp::build);

        register(&["filter", "where"], selection::FilterOp::build);
        register(&["head", "tail", "limit"], selection::HeadTailOp::build);
        register(&["sample"], selection::SampleOp::build);
        register(&["dedup", "distinct", "unique"], selection::DedupOp::build);
        register(&["dropnull", "dropna"], selection::DropNullOp::build);

        register(&["select", "fields", "table", "project"], columns::SelectOp::build);
        register(&["rename"], columns::RenameOp::build);
        register(&["eval", "calculate", "compute"], columns::EvalOp::build);
        register(&["replace"], columns::ReplaceOp::build);
        register(&["rex", "regex", "extract"], columns::RexOp::build);
        register(&["mvexpand", "expand", "explode"], columns::MvExpandOp::build);

        register(&["stats", "eventstats"], aggregate::StatsOp::build);
        register(&["top", "rare"], aggregate::TopRareOp::build);

        register(&["sort"], transform::SortOp::build);
        register(&["reverse"], transform::ReverseOp::build);
        register(&["transpose", "pivot"], transform::TransposeOp::build);
        register(&["fillnull", "fillna", "fill"], transform::FillNullOp::build);

        register(&["join"], join::JoinOp::build);
        register(&["append", "union"], join::AppendOp::build);

        register(&["bucket", "bin"], time_ops::BucketOp::build);
        register(&["transaction"], time_ops::TransactionOp::build);

        map
    })
}

/// Builds the operator for one pipe-command node. Command-name lookup is
/// case-insensitive per the data-model invariant; an unmapped keyword is a
/// resolution error, not a panic.
pub fn build(node: &PipeCommandNode) -> Result<Operator> {
    let name = node.name.to_ascii_lowercase();
    match registry().get(name.as_str()) {
        Some(ctor) => ctor(node),
        None => Err(Error::unknown_command(&node.name)),
    }
}

// --- argument helpers shared by every operator's `build` -------------------

pub(crate) fn expr_text(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Ident(s) => s.clone(),
        ExprKind::Literal(Literal::String(s)) => s.clone(),
        ExprKind::Literal(Literal::Number(n)) => crate::table::Value::Number(*n).as_str_repr(),
        ExprKind::Literal(Literal::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

pub(crate) fn keyword_text(node: &PipeCommandNode, key: &str) -> Option<String> {
    node.keyword(key).map(expr_text)
}

pub(crate) fn keyword_number(node: &PipeCommandNode, key: &str) -> Option<f64> {
    node.keyword(key).and_then(|e| match &e.kind {
        ExprKind::Literal(Literal::Number(n)) => Some(*n),
        ExprKind::Literal(Literal::String(s)) => s.parse().ok(),
        _ => None,
    })
}

pub(crate) fn keyword_bool(node: &PipeCommandNode, key: &str) -> Option<bool> {
    node.keyword(key).map(|e| match &e.kind {
        ExprKind::Literal(Literal::Bool(b)) => *b,
        ExprKind::Literal(Literal::String(s)) => s.eq_ignore_ascii_case("true"),
        ExprKind::Ident(s) => s.eq_ignore_ascii_case("true"),
        _ => false,
    })
}

pub(crate) fn positional_texts(node: &PipeCommandNode) -> Vec<String> {
    node.positionals().map(expr_text).collect()
}

/// Splits a comma-flavored positional/keyword value (`fields=a,b,c`) that the
/// parser captured as one glob-merged string back into separate names.
pub(crate) fn split_field_list(text: &str) -> Vec<String> {
    text.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
}

pub(crate) fn single_subquery<'a>(node: &'a PipeCommandNode, command: &str) -> Result<&'a siftql_ast::CommandAst> {
    node.subqueries
        .first()
        .ok_or_else(|| Error::semantic(format!("`{command}` requires exactly one subquery")))
}
