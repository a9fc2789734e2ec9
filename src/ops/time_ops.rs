//! Time-bucketing operators: `bucket`/`bin`, `transaction`.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use siftql_ast::PipeCommandNode;

use super::{keyword_text, positional_texts, Operator};
use crate::error::{Error, Result};
use crate::eval::time::{self, Span};
use crate::executor::Executor;
use crate::ops::retrieval::TIME_FIELD;
use crate::table::{Column, DType, Table, Value};

/// `bucket`/`bin field span=<N><unit>`: floors a datetime-coercible column to
/// the span boundary, in place.
pub struct BucketOp {
    field: String,
    span: Span,
}

impl BucketOp {
    pub fn build(node: &PipeCommandNode) -> Result<Operator> {
        let field = positional_texts(node).into_iter().next().ok_or_else(|| Error::semantic("`bucket`/`bin` requires a field"))?;
        let span_text = keyword_text(node, "span").ok_or_else(|| Error::semantic("`bucket`/`bin` requires `span=`"))?;
        let span = time::parse_span(&span_text)?;
        Ok(Operator::Bucket(BucketOp { field, span }))
    }

    pub fn execute(&self, table: Table, _exec: &Executor) -> Result<Table> {
        let column = table.require_column("bucket", &self.field)?;
        let values = column
            .values
            .iter()
            .map(|v| match v.as_datetime() {
                Some(dt) => Value::DateTime(time::floor_to_span(dt, self.span)),
                None => Value::Null,
            })
            .collect();
        let mut result = table.clone();
        result.set_column(Column::new(self.field.clone(), DType::DateTime, values));
        Ok(result)
    }
}

/// `transaction group_field maxspan=<N><unit>`: groups rows by `group_field`,
/// ordered by [`TIME_FIELD`], and splits a group into separate transactions
/// wherever the gap between consecutive events exceeds `maxspan`. Each
/// transaction collapses to one row: the group key, the transaction's start
/// and `_end_time`, its `duration` in seconds, an `event_count`, and the
/// first row's value for every other column.
pub struct TransactionOp {
    group_field: String,
    maxspan: chrono::Duration,
}

impl TransactionOp {
    pub fn build(node: &PipeCommandNode) -> Result<Operator> {
        let group_field =
            positional_texts(node).into_iter().next().ok_or_else(|| Error::semantic("`transaction` requires a field"))?;
        let maxspan_text = keyword_text(node, "maxspan").ok_or_else(|| Error::semantic("`transaction` requires `maxspan=`"))?;
        let maxspan = time::parse_span(&maxspan_text)?.to_duration();
        Ok(Operator::Transaction(TransactionOp { group_field, maxspan }))
    }

    pub fn execute(&self, table: Table, _exec: &Executor) -> Result<Table> {
        let group_col = table.require_column("transaction", &self.group_field)?;
        let time_col = table.require_column("transaction", TIME_FIELD)?;

        let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
        for i in 0..table.row_count() {
            groups.entry(group_col.values[i].as_str_repr()).or_default().push(i);
        }
        let mut group_keys: Vec<&String> = groups.keys().collect();
        group_keys.sort();

        // One run of consecutive events (by time, within one group_field
        // value) that never leaves a gap wider than `maxspan`.
        let mut runs: Vec<Vec<usize>> = Vec::new();
        for key in group_keys {
            let mut indices = groups[key].clone();
            indices.sort_by_key(|&i| time_col.values[i].as_datetime().unwrap_or(NaiveDateTime::MIN));

            let mut current: Vec<usize> = Vec::new();
            let mut last_time: Option<NaiveDateTime> = None;
            for i in indices {
                let this_time = time_col.values[i].as_datetime();
                if let (Some(prev), Some(now)) = (last_time, this_time) {
                    if now - prev > self.maxspan {
                        runs.push(std::mem::take(&mut current));
                    }
                }
                current.push(i);
                last_time = this_time.or(last_time);
            }
            if !current.is_empty() {
                runs.push(current);
            }
        }

        let other_names: Vec<&str> =
            table.column_names().into_iter().filter(|n| *n != TIME_FIELD && *n != self.group_field).collect();

        let mut group_values = Vec::with_capacity(runs.len());
        let mut start_values = Vec::with_capacity(runs.len());
        let mut end_values = Vec::with_capacity(runs.len());
        let mut duration_values = Vec::with_capacity(runs.len());
        let mut count_values = Vec::with_capacity(runs.len());
        let mut other_values: Vec<Vec<Value>> = other_names.iter().map(|_| Vec::with_capacity(runs.len())).collect();

        for run in &runs {
            let first = run[0];
            let last = *run.last().unwrap();
            let start = time_col.values[first].as_datetime();
            let end = time_col.values[last].as_datetime();

            group_values.push(group_col.values[first].clone());
            start_values.push(start.map(Value::DateTime).unwrap_or(Value::Null));
            end_values.push(end.map(Value::DateTime).unwrap_or(Value::Null));
            duration_values.push(match (start, end) {
                (Some(s), Some(e)) => Value::Number((e - s).num_seconds() as f64),
                _ => Value::Null,
            });
            count_values.push(Value::Number(run.len() as f64));
            for (slot, name) in other_values.iter_mut().zip(&other_names) {
                slot.push(table.column(name).unwrap().values[first].clone());
            }
        }

        let mut columns = vec![
            Column::new(self.group_field.clone(), group_col.dtype, group_values),
            Column::new(TIME_FIELD, DType::DateTime, start_values),
            Column::new("_end_time", DType::DateTime, end_values),
            Column::new("duration", DType::Number, duration_values),
            Column::new("event_count", DType::Number, count_values),
        ];
        for (name, values) in other_names.into_iter().zip(other_values) {
            columns.push(Column::new(name, table.column(name).unwrap().dtype, values));
        }
        Ok(Table::new(columns))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::registry::Registry;
    use crate::table::{Column, DType, Table, Value};
    use crate::{execute_with_registry, Context};

    fn run(registry: &Registry, query: &str) -> Table {
        execute_with_registry(query, &Context::default(), registry).unwrap()
    }

    #[test]
    fn bucket_floors_timestamps_to_the_span_boundary() {
        let registry = Registry::new();
        let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(10, 3, 0).unwrap();
        registry.set(
            "t",
            Table::new(vec![Column::new("ts", DType::DateTime, vec![Value::DateTime(base)])]),
        );
        let result = run(&registry, "cache=t | bucket ts span=5m");
        let bucketed = result.column("ts").unwrap().values[0].as_datetime().unwrap();
        assert_eq!(bucketed, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(10, 0, 0).unwrap());
    }

    #[test]
    fn transaction_splits_on_gaps_wider_than_maxspan() {
        let registry = Registry::new();
        let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(9, 0, 0).unwrap();
        let mut users = Vec::new();
        let mut times = Vec::new();
        for offset in [0, 1, 10] {
            users.push(Value::String("u1".into()));
            times.push(Value::DateTime(base + chrono::Duration::minutes(offset)));
        }
        registry.set(
            "t",
            Table::new(vec![Column::new("user", DType::String, users), Column::new("_time", DType::DateTime, times)]),
        );
        let result = run(&registry, "cache=t | transaction user maxspan=5m");
        assert_eq!(result.row_count(), 2);
        assert_eq!(result.column("event_count").unwrap().values, vec![Value::Number(2.0), Value::Number(1.0)]);
    }
}
