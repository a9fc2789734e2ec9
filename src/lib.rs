//! SiftQL: a Splunk-like pipeline query engine over in-memory, columnar
//! tables.
//!
//! A query is one source (`cache=name`, `search ...`, or a bare identifier)
//! followed by zero or more `| command` stages. [`execute`] parses, plans,
//! and runs one query end to end against a [`Registry`] of named tables;
//! [`register`]/[`unregister`] manage that registry so a query's `cache=`/
//! `lookup`/`join`/`append` sources have somewhere to resolve from.
//!
//! ```
//! use siftql::{register, execute, Context};
//! use siftql::table::{Column, DType, Table, Value};
//!
//! register("events", Table::new(vec![
//!     Column::new("user", DType::String, vec![Value::String("ada".into())]),
//!     Column::new("amount", DType::Number, vec![Value::Number(42.0)]),
//! ]));
//!
//! let result = execute("cache=events | stats sum(amount) as total by user", &Context::default()).unwrap();
//! assert_eq!(result.row_count(), 1);
//! ```

pub mod error;
pub mod eval;
pub mod executor;
pub mod ops;
pub mod plan;
pub mod registry;
pub mod table;

pub use error::{Error, ErrorKind, Result};
pub use executor::{Context, Executor};
pub use registry::Registry;
pub use table::{Column, DType, Table, Value};

/// Parses and runs one query against the process-wide default registry.
///
/// `ctx` supplies the anchor time `search`/`bucket`/`transaction` resolve
/// relative times against; pass [`Context::default`] to anchor on the wall
/// clock.
pub fn execute(source: &str, ctx: &Context) -> Result<Table> {
    execute_with_registry(source, ctx, registry::global())
}

/// Like [`execute`], against an explicit [`Registry`] instead of the
/// process-wide default — for callers that want isolated state, e.g.
/// concurrent test cases.
pub fn execute_with_registry(source: &str, ctx: &Context, registry: &Registry) -> Result<Table> {
    let ast = siftql_parser::parse(source)?;
    let executor = Executor::new(registry, ctx.anchor_time());
    executor.execute(&ast)
}

/// Registers (or replaces) a named table in the default registry, making it
/// resolvable from `cache=NAME`, a bare source name, `lookup table=NAME`, and
/// `join`/`append` subqueries.
pub fn register(name: impl Into<String>, table: Table) {
    registry::global().set(name, table);
}

/// Removes a named table from the default registry. Returns whether a table
/// with that name existed.
pub fn unregister(name: &str) -> bool {
    registry::global().delete(name)
}

/// Lists every table name currently in the default registry.
pub fn list_sources() -> Vec<String> {
    registry::global().list()
}

/// Empties the default registry. Mainly useful for test isolation when tests
/// share the process-wide default registry instead of their own.
pub fn clear_sources() {
    registry::global().clear()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Column, DType};

    fn sample_table() -> Table {
        Table::new(vec![
            Column::new("user", DType::String, vec![Value::String("ada".into()), Value::String("lin".into())]),
            Column::new("amount", DType::Number, vec![Value::Number(10.0), Value::Number(20.0)]),
        ])
    }

    #[test]
    fn executes_a_simple_pipeline_against_an_explicit_registry() {
        let registry = Registry::new();
        registry.set("events", sample_table());
        let ctx = Context::default();

        let result = execute_with_registry("cache=events | stats sum(amount) as total", &ctx, &registry).unwrap();
        assert_eq!(result.row_count(), 1);
        assert_eq!(result.column("total").unwrap().values[0], Value::Number(30.0));
    }

    #[test]
    fn unknown_source_is_a_resolution_error() {
        let registry = Registry::new();
        let ctx = Context::default();
        let err = execute_with_registry("cache=missing | head 1", &ctx, &registry).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Resolution);
    }

    #[test]
    fn register_and_unregister_round_trip_through_the_default_registry() {
        clear_sources();
        register("roundtrip", sample_table());
        assert!(list_sources().contains(&"roundtrip".to_string()));
        assert!(unregister("roundtrip"));
        assert!(!list_sources().contains(&"roundtrip".to_string()));
    }
}
