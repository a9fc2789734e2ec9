//! Walks a [`CommandAst`] to completion: resolve the source, build and run
//! the operator chain, recursing into subqueries.
//!
//! The `SubqueryExecutor` mentioned in the design is this same executor
//! re-entered on a subquery's `CommandAst` (§4.4) — there's no separate type,
//! just a depth-checked recursive call that shares the same registry and
//! retains no state across invocations.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use siftql_ast::{CommandAst, SourceNode, SourceType};

use crate::error::{Error, Result};
use crate::eval::time;
use crate::plan;
use crate::registry::Registry;
use crate::table::Table;

/// Recursion is bounded only by available stack per the design notes, but an
/// explicit guard catches runaway or accidentally-self-referential subqueries
/// with a clean error instead of a stack overflow.
pub const MAX_SUBQUERY_DEPTH: usize = 32;

pub struct Executor<'a> {
    pub registry: &'a Registry,
    pub anchor_time: NaiveDateTime,
    depth: usize,
}

impl<'a> Executor<'a> {
    pub fn new(registry: &'a Registry, anchor_time: NaiveDateTime) -> Self {
        Executor { registry, anchor_time, depth: 0 }
    }

    pub fn execute(&self, ast: &CommandAst) -> Result<Table> {
        log::debug!("executing pipeline at depth {}: source={:?}", self.depth, ast.source.name);
        let mut table = self.resolve_source(&ast.source)?;
        let plan = plan::create_plan(ast);
        let plan = plan::optimize(plan);
        let operators = plan::create_commands(&plan)?;
        for (i, operator) in operators.iter().enumerate() {
            table = operator.execute(table, self)?;
            log::trace!("step {i}: {} rows, {} columns", table.row_count(), table.columns().len());
        }
        Ok(table)
    }

    /// Re-enters the executor for a `join`/`append` subquery, sharing the
    /// registry and the current depth counter.
    pub fn execute_subquery(&self, ast: &CommandAst) -> Result<Table> {
        if self.depth + 1 >= MAX_SUBQUERY_DEPTH {
            return Err(Error::semantic(format!(
                "subquery recursion exceeded the maximum depth of {MAX_SUBQUERY_DEPTH}"
            )));
        }
        log::debug!("entering subquery at depth {}", self.depth + 1);
        let nested = Executor { registry: self.registry, anchor_time: self.anchor_time, depth: self.depth + 1 };
        nested.execute(ast)
    }

    fn resolve_source(&self, source: &SourceNode) -> Result<Table> {
        match source.source_type {
            SourceType::Cache | SourceType::Search | SourceType::Default => self.registry.require(&source.name),
            SourceType::Multi => {
                let mut tables = source.sub_sources.iter().map(|s| self.resolve_source(s));
                let Some(first) = tables.next() else {
                    return Ok(Table::empty());
                };
                tables.try_fold(first?, |acc, next| Ok(acc.union(&next?)))
            }
        }
    }

    pub fn resolve_time(&self, text: &str) -> Result<NaiveDateTime> {
        time::parse_relative_or_absolute(text, self.anchor_time)
    }
}

/// Advisory execution context passed alongside the command text — only
/// `now` is defined today, used to anchor relative-time resolution in
/// `search`/`bucket`/`transaction` so tests don't depend on the wall clock.
#[derive(Debug, Clone, Default)]
pub struct Context {
    pub now: Option<NaiveDateTime>,
    pub extra: HashMap<String, String>,
}

impl Context {
    pub fn anchor_time(&self) -> NaiveDateTime {
        self.now.unwrap_or_else(time::now)
    }
}

#[cfg(test)]
mod tests {
    use crate::registry::Registry;
    use crate::table::{Column, DType, Table, Value};
    use crate::{execute_with_registry, Context};

    #[test]
    fn multi_source_union_combines_every_named_table() {
        let registry = Registry::new();
        registry.set("a", Table::new(vec![Column::new("x", DType::Number, vec![Value::Number(1.0)])]));
        registry.set("b", Table::new(vec![Column::new("x", DType::Number, vec![Value::Number(2.0)])]));
        let result = execute_with_registry("(a OR b)", &Context::default(), &registry).unwrap();
        assert_eq!(result.row_count(), 2);
    }

    #[test]
    fn a_single_level_subquery_executes_without_tripping_the_depth_guard() {
        let registry = Registry::new();
        registry.set("t", Table::new(vec![Column::new("x", DType::Number, vec![Value::Number(1.0)])]));
        let result = execute_with_registry(
            "cache=t | join x [search index=\"t\"]",
            &Context::default(),
            &registry,
        )
        .unwrap();
        assert_eq!(result.row_count(), 1);
    }
}
