//! Combining operators: `join`, `append`/`union`.

use std::collections::HashMap;

use siftql_ast::PipeCommandNode;

use super::{single_subquery, Operator};
use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::table::{Column, Table, Value};

/// `join field [subquery]`: left join, keyed on `field` in both tables.
/// Right-side columns that collide with a left-side name (other than the
/// join key itself) are suffixed `_right`.
pub struct JoinOp {
    field: String,
    subquery: siftql_ast::CommandAst,
}

impl JoinOp {
    pub fn build(node: &PipeCommandNode) -> Result<Operator> {
        let field = super::positional_texts(node)
            .into_iter()
            .next()
            .ok_or_else(|| Error::semantic("`join` requires a field"))?;
        let subquery = single_subquery(node, "join")?.clone();
        Ok(Operator::Join(JoinOp { field, subquery }))
    }

    pub fn execute(&self, table: Table, exec: &Executor) -> Result<Table> {
        let right = exec.execute_subquery(&self.subquery)?;
        let left_key = table.require_column("join", &self.field)?;
        let right_key = right.require_column("join", &self.field)?;

        let mut right_index: HashMap<String, usize> = HashMap::new();
        for (i, value) in right_key.values.iter().enumerate() {
            right_index.entry(value.as_str_repr()).or_insert(i);
        }

        let right_output_names: Vec<&str> = right.column_names().into_iter().filter(|n| *n != self.field).collect();

        let mut result = table.clone();
        for name in &right_output_names {
            let right_col = right.column(name).unwrap();
            let output_name = if table.has_column(name) { format!("{name}_right") } else { (*name).to_string() };
            let mut values = Vec::with_capacity(left_key.values.len());
            for left_value in &left_key.values {
                let key = left_value.as_str_repr();
                let resolved = right_index.get(&key).map(|&i| right_col.values[i].clone()).unwrap_or(Value::Null);
                values.push(resolved);
            }
            result.set_column(Column::new(output_name, right_col.dtype, values));
        }
        Ok(result)
    }
}

/// `append`/`union`: stacks the subquery's result below the current table,
/// aligning columns by name via [`Table::union`].
pub struct AppendOp {
    subquery: siftql_ast::CommandAst,
}

impl AppendOp {
    pub fn build(node: &PipeCommandNode) -> Result<Operator> {
        let subquery = single_subquery(node, "append")?.clone();
        Ok(Operator::Append(AppendOp { subquery }))
    }

    pub fn execute(&self, table: Table, exec: &Executor) -> Result<Table> {
        let other = exec.execute_subquery(&self.subquery)?;
        Ok(table.union(&other))
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
    fn join_enriches_matching_keys_and_nulls_unmatched_ones() {
        let registry = Registry::new();
        registry.set(
            "orders",
            Table::new(vec![Column::new(
                "customer_id",
                DType::Number,
                vec![Value::Number(1.0), Value::Number(2.0), Value::Number(99.0)],
            )]),
        );
        registry.set(
            "customers",
            Table::new(vec![
                Column::new("customer_id", DType::Number, vec![Value::Number(1.0), Value::Number(2.0)]),
                Column::new("name", DType::String, vec![Value::String("alice".into()), Value::String("bob".into())]),
            ]),
        );
        let result = run(
            &registry,
            "cache=orders | join customer_id [search index=\"customers\"]",
        );
        assert_eq!(result.row_count(), 3);
        assert_eq!(
            result.column("name").unwrap().values,
            vec![Value::String("alice".into()), Value::String("bob".into()), Value::Null]
        );
    }

    #[test]
    fn join_suffixes_colliding_right_hand_columns() {
        let registry = Registry::new();
        registry.set(
            "left",
            Table::new(vec![
                Column::new("id", DType::Number, vec![Value::Number(1.0)]),
                Column::new("status", DType::String, vec![Value::String("open".into())]),
            ]),
        );
        registry.set(
            "right",
            Table::new(vec![
                Column::new("id", DType::Number, vec![Value::Number(1.0)]),
                Column::new("status", DType::String, vec![Value::String("closed".into())]),
            ]),
        );
        let result = run(&registry, "cache=left | join id [search index=\"right\"]");
        assert_eq!(result.column("status").unwrap().values, vec![Value::String("open".into())]);
        assert_eq!(result.column("status_right").unwrap().values, vec![Value::String("closed".into())]);
    }

    #[test]
    fn append_stacks_rows_from_the_subquery_below() {
        let registry = Registry::new();
        registry.set("a", Table::new(vec![Column::new("x", DType::Number, vec![Value::Number(1.0)])]));
        registry.set("b", Table::new(vec![Column::new("x", DType::Number, vec![Value::Number(2.0), Value::Number(3.0)])]));
        let result = run(&registry, "cache=a | append [search index=\"b\"]");
        assert_eq!(result.column("x").unwrap().values, vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)]);
    }
}
