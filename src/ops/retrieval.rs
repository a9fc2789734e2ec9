//! Data-retrieval operators: `cache`/`new_cache`, `search` as a mid-pipeline
//! filter, and `lookup`.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use siftql_ast::PipeCommandNode;

use super::{expr_text, keyword_text, Operator};
use crate::error::{Error, Result};
use crate::eval::time::{self, Bound};
use crate::executor::Executor;
use crate::table::{Column, Table, Value};

/// The conventional event-time column name used by `search`'s `latest=`/
/// `earliest=` and by `bucket`/`transaction`, mirroring the source's `_time`
/// convention (see `tests/commands/search/test_time_range.py`).
pub const TIME_FIELD: &str = "_time";

/// `cache` as a mid-pipeline command (as opposed to `cache=NAME` as a
/// source) is a pass-through; the source resolves the name earlier.
pub struct CacheOp;

impl CacheOp {
    pub fn build(_node: &PipeCommandNode) -> Result<Operator> {
        Ok(Operator::Cache(CacheOp))
    }

    pub fn execute(&self, table: Table, _exec: &Executor) -> Result<Table> {
        Ok(table)
    }
}

/// `new_cache name=NAME` stores the incoming table into the registry and
/// passes it through unchanged.
pub struct NewCacheOp {
    name: String,
}

impl NewCacheOp {
    pub fn build(node: &PipeCommandNode) -> Result<Operator> {
        let name = keyword_text(node, "name")
            .or_else(|| super::positional_texts(node).into_iter().next())
            .ok_or_else(|| Error::semantic("`new_cache` requires `name=`"))?;
        Ok(Operator::NewCache(NewCacheOp { name }))
    }

    pub fn execute(&self, table: Table, exec: &Executor) -> Result<Table> {
        exec.registry.set(self.name.clone(), table.clone());
        Ok(table)
    }
}

/// `search` used mid-pipeline as a time filter, e.g. `| search latest=-5m`.
pub struct SearchFilterOp {
    earliest: Option<String>,
    latest: Option<String>,
}

impl SearchFilterOp {
    pub fn build(node: &PipeCommandNode) -> Result<Operator> {
        Ok(Operator::SearchFilter(SearchFilterOp {
            earliest: keyword_text(node, "earliest"),
            latest: keyword_text(node, "latest"),
        }))
    }

    pub fn execute(&self, table: Table, exec: &Executor) -> Result<Table> {
        apply_time_bounds(table, self.earliest.as_deref(), self.latest.as_deref(), exec)
    }
}

/// Filters `table` by `_time` according to `earliest`/`latest`, silently
/// skipping the filter when the time field is absent (§4.5).
pub(crate) fn apply_time_bounds(
    table: Table,
    earliest: Option<&str>,
    latest: Option<&str>,
    exec: &Executor,
) -> Result<Table> {
    if earliest.is_none() && latest.is_none() {
        return Ok(table);
    }
    let Some(time_col) = table.column(TIME_FIELD) else {
        return Ok(table);
    };

    let earliest_bound = match earliest {
        Some(text) => Some(time::resolve_earliest(text, exec.anchor_time)?),
        None => None,
    };
    let latest_bound = match latest {
        Some(text) => Some(time::resolve_latest(text, exec.anchor_time)?),
        None => None,
    };

    let mut keep = Vec::with_capacity(table.row_count());
    for value in &time_col.values {
        let Some(dt) = value.as_datetime() else {
            keep.push(true);
            continue;
        };
        keep.push(passes_bounds(dt, earliest_bound, latest_bound));
    }
    let indices: Vec<usize> = keep.iter().enumerate().filter(|(_, &k)| k).map(|(i, _)| i).collect();
    Ok(table.select_rows(&indices))
}

fn passes_bounds(dt: NaiveDateTime, earliest: Option<NaiveDateTime>, latest: Option<Bound>) -> bool {
    if let Some(earliest) = earliest {
        if dt < earliest {
            return false;
        }
    }
    match latest {
        Some(Bound::Lower(bound)) => dt >= bound,
        Some(Bound::Upper(bound)) => dt <= bound,
        None => true,
    }
}

/// Left-join-like enrichment from a named registry table.
pub struct LookupOp {
    table_name: String,
    field: String,
    lookup_field: String,
    output: Option<Vec<String>>,
    default: Option<Value>,
}

impl LookupOp {
    pub fn build(node: &PipeCommandNode) -> Result<Operator> {
        let table_name = keyword_text(node, "table").ok_or_else(|| Error::semantic("`lookup` requires `table=`"))?;
        let field = keyword_text(node, "field").ok_or_else(|| Error::semantic("`lookup` requires `field=`"))?;
        let lookup_field = keyword_text(node, "lookup_field").unwrap_or_else(|| field.clone());
        let output = keyword_text(node, "output").map(|s| super::split_field_list(&s));
        let default = keyword_text(node, "default").map(Value::String);
        Ok(Operator::Lookup(LookupOp { table_name, field, lookup_field, output, default }))
    }

    pub fn execute(&self, table: Table, exec: &Executor) -> Result<Table> {
        let lookup_table = exec.registry.require(&self.table_name).map_err(|_| {
            Error::resolution(format!("lookup table `{}` is not registered", self.table_name)).with_command("lookup")
        })?;
        let source_col = table.require_column("lookup", &self.field)?;
        let key_col = lookup_table.require_column("lookup", &self.lookup_field)?;

        // Deduplicate the lookup table on the lookup field, keeping the first
        // occurrence of each key.
        let mut seen: HashMap<String, usize> = HashMap::new();
        for (i, value) in key_col.values.iter().enumerate() {
            seen.entry(value.as_str_repr()).or_insert(i);
        }

        let output_names: Vec<String> = match &self.output {
            Some(names) => names.clone(),
            None => lookup_table
                .column_names()
                .into_iter()
                .filter(|n| *n != self.lookup_field)
                .map(String::from)
                .collect(),
        };

        let mut result = table.clone();
        for name in &output_names {
            let lookup_col = lookup_table.column(name);
            let mut values = Vec::with_capacity(source_col.values.len());
            for source_value in &source_col.values {
                let key = source_value.as_str_repr();
                let resolved = seen
                    .get(&key)
                    .and_then(|&row| lookup_col.map(|c| c.values[row].clone()))
                    .filter(|v| !v.is_null())
                    .or_else(|| self.default.clone())
                    .unwrap_or(Value::Null);
                values.push(resolved);
            }
            let dtype = lookup_col.map(|c| c.dtype).unwrap_or(crate::table::DType::String);
            result.set_column(Column::new(name.clone(), dtype, values));
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use crate::registry::Registry;
    use crate::table::{Column, DType, Table, Value};
    use crate::{execute_with_registry, Context};

    fn run(registry: &Registry, query: &str) -> Table {
        execute_with_registry(query, &Context::default(), registry).unwrap()
    }

    #[test]
    fn new_cache_registers_and_passes_through() {
        let registry = Registry::new();
        registry.set(
            "events",
            Table::new(vec![Column::new("x", DType::Number, vec![Value::Number(1.0)])]),
        );

        let result = run(&registry, "cache=events | new_cache name=snapshot");
        assert_eq!(result.row_count(), 1);
        assert!(registry.has("snapshot"));
        assert_eq!(registry.get("snapshot").unwrap().row_count(), 1);
    }

    #[test]
    fn lookup_enriches_by_key_and_falls_back_to_default() {
        let registry = Registry::new();
        registry.set(
            "orders",
            Table::new(vec![Column::new(
                "customer_id",
                DType::Number,
                vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)],
            )]),
        );
        registry.set(
            "customers",
            Table::new(vec![
                Column::new("customer_id", DType::Number, vec![Value::Number(1.0), Value::Number(2.0)]),
                Column::new("segment", DType::String, vec![Value::String("gold".into()), Value::String("silver".into())]),
            ]),
        );

        let result = run(
            &registry,
            "cache=orders | lookup table=customers field=customer_id default=unknown",
        );
        assert_eq!(
            result.column("segment").unwrap().values,
            vec![Value::String("gold".into()), Value::String("silver".into()), Value::String("unknown".into())]
        );
    }

    #[test]
    fn lookup_against_a_missing_table_is_a_resolution_error() {
        let registry = Registry::new();
        registry.set("orders", Table::new(vec![Column::new("customer_id", DType::Number, vec![Value::Number(1.0)])]));
        let err = execute_with_registry(
            "cache=orders | lookup table=missing field=customer_id",
            &Context::default(),
            &registry,
        )
        .unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Resolution);
    }

    #[test]
    fn search_filter_skips_silently_without_a_time_field() {
        let registry = Registry::new();
        registry.set("events", Table::new(vec![Column::new("x", DType::Number, vec![Value::Number(1.0), Value::Number(2.0)])]));
        let result = run(&registry, "cache=events | search latest=-5m");
        assert_eq!(result.row_count(), 2);
    }
}
