//! Aggregation operators: `stats`/`eventstats`, `top`/`rare`.

use std::collections::HashMap;

use itertools::Itertools;
use siftql_ast::{AggregationNode, PipeCommandNode};

use super::{keyword_bool, keyword_number, positional_texts, Operator};
use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::table::{Column, DType, Table, Value};

/// `stats`/`eventstats`: one or more `function(field) as alias` aggregations,
/// optionally grouped `by` fields. `stats` collapses to one row per group;
/// `eventstats` broadcasts the aggregate back onto every original row
/// instead of collapsing, keeping all original columns.
pub struct StatsOp {
    aggregations: Vec<AggregationNode>,
    by_fields: Vec<String>,
    broadcast: bool,
}

impl StatsOp {
    pub fn build(node: &PipeCommandNode) -> Result<Operator> {
        if node.aggregations.is_empty() {
            return Err(Error::semantic("`stats`/`eventstats` requires at least one aggregation"));
        }
        let broadcast = node.name.eq_ignore_ascii_case("eventstats");
        Ok(Operator::Stats(StatsOp {
            aggregations: node.aggregations.clone(),
            by_fields: node.by_fields.clone(),
            broadcast,
        }))
    }

    pub fn execute(&self, table: Table, _exec: &Executor) -> Result<Table> {
        for field in &self.by_fields {
            table.require_column("stats", field)?;
        }

        let groups = group_row_indices(&table, &self.by_fields);
        let mut group_keys: Vec<&Vec<String>> = groups.keys().collect();
        group_keys.sort();

        let mut aggregated: HashMap<Vec<String>, Vec<Value>> = HashMap::new();
        for key in &group_keys {
            let indices = &groups[*key];
            let mut row = Vec::with_capacity(self.aggregations.len());
            for agg in &self.aggregations {
                row.push(compute_aggregate(&table, agg, indices)?);
            }
            aggregated.insert((*key).clone(), row);
        }

        if self.broadcast {
            let mut result = table.clone();
            for (i, agg) in self.aggregations.iter().enumerate() {
                let mut values = vec![Value::Null; table.row_count()];
                for key in &group_keys {
                    let value = aggregated[*key][i].clone();
                    for &row_idx in &groups[*key] {
                        values[row_idx] = value.clone();
                    }
                }
                let dtype = values.iter().find(|v| !v.is_null()).map(Value::dtype).unwrap_or(DType::Number);
                result.set_column(Column::new(agg.output_name(), dtype, values));
            }
            return Ok(result);
        }

        let mut columns = Vec::with_capacity(self.by_fields.len() + self.aggregations.len());
        for (i, field) in self.by_fields.iter().enumerate() {
            let dtype = table.column(field).map(|c| c.dtype).unwrap_or(DType::String);
            let values = group_keys.iter().map(|key| Value::String(key[i].clone())).collect();
            columns.push(Column::new(field.clone(), dtype, values));
        }
        for (i, agg) in self.aggregations.iter().enumerate() {
            let values: Vec<Value> = group_keys.iter().map(|key| aggregated[*key][i].clone()).collect();
            let dtype = values.iter().find(|v| !v.is_null()).map(Value::dtype).unwrap_or(DType::Number);
            columns.push(Column::new(agg.output_name(), dtype, values));
        }
        Ok(Table::new(columns))
    }
}

/// Buckets row indices by the string representation of their `by_fields`
/// values, preserving the original row order within each bucket. Empty
/// `by_fields` produces a single group holding every row.
fn group_row_indices(table: &Table, by_fields: &[String]) -> HashMap<Vec<String>, Vec<usize>> {
    let mut groups: HashMap<Vec<String>, Vec<usize>> = HashMap::new();
    for i in 0..table.row_count() {
        let key: Vec<String> = by_fields.iter().map(|f| table.column(f).unwrap().values[i].as_str_repr()).collect();
        groups.entry(key).or_default().push(i);
    }
    groups
}

fn compute_aggregate(table: &Table, agg: &AggregationNode, indices: &[usize]) -> Result<Value> {
    let function = agg.function.to_ascii_lowercase();
    if function == "count" {
        return Ok(match &agg.field {
            Some(field) => {
                let column = table.require_column("stats", field)?;
                Value::Number(indices.iter().filter(|&&i| !column.values[i].is_null()).count() as f64)
            }
            None => Value::Number(indices.len() as f64),
        });
    }

    let field = agg
        .field
        .as_ref()
        .ok_or_else(|| Error::semantic(format!("`{function}` requires a field")).with_command("stats"))?;
    let column = table.require_column("stats", field)?;
    let values: Vec<&Value> = indices.iter().map(|&i| &column.values[i]).collect();
    let numbers: Vec<f64> = values.iter().filter_map(|v| v.as_number()).collect();

    Ok(match function.as_str() {
        "sum" => Value::Number(numbers.iter().sum()),
        "avg" | "mean" => {
            if numbers.is_empty() {
                Value::Null
            } else {
                Value::Number(numbers.iter().sum::<f64>() / numbers.len() as f64)
            }
        }
        "min" => values.iter().filter(|v| !v.is_null()).min_by(|a, b| a.compare(b)).map(|v| (*v).clone()).unwrap_or(Value::Null),
        "max" => values.iter().filter(|v| !v.is_null()).max_by(|a, b| a.compare(b)).map(|v| (*v).clone()).unwrap_or(Value::Null),
        "first" => values.first().map(|v| (*v).clone()).unwrap_or(Value::Null),
        "last" => values.last().map(|v| (*v).clone()).unwrap_or(Value::Null),
        "values" => {
            let unique: Vec<String> = values.iter().filter(|v| !v.is_null()).map(|v| v.as_str_repr()).unique().collect();
            Value::String(unique.join(", "))
        }
        "dc" | "distinct_count" => {
            let unique = values.iter().filter(|v| !v.is_null()).map(|v| v.as_str_repr()).unique().count();
            Value::Number(unique as f64)
        }
        "stdev" => {
            if numbers.len() < 2 {
                Value::Null
            } else {
                let mean = numbers.iter().sum::<f64>() / numbers.len() as f64;
                let variance = numbers.iter().map(|n| (n - mean).powi(2)).sum::<f64>() / (numbers.len() - 1) as f64;
                Value::Number(variance.sqrt())
            }
        }
        "perc50" | "perc75" | "perc90" | "perc95" | "perc99" => {
            let p: f64 = function.trim_start_matches("perc").parse().unwrap_or(50.0);
            Value::Number(percentile(&numbers, p)).into_null_if(numbers.is_empty())
        }
        other => return Err(Error::semantic(format!("unknown aggregation function `{other}`")).with_command("stats")),
    })
}

/// Linear-interpolation percentile over `numbers`, consistent with most
/// analytics engines' default percentile behavior.
fn percentile(numbers: &[f64], p: f64) -> f64 {
    let mut sorted = numbers.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (p / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let weight = rank - lower as f64;
        sorted[lower] * (1.0 - weight) + sorted[upper] * weight
    }
}

trait IntoNullIf {
    fn into_null_if(self, condition: bool) -> Value;
}

impl IntoNullIf for Value {
    fn into_null_if(self, condition: bool) -> Value {
        if condition {
            Value::Null
        } else {
            self
        }
    }
}

/// `top`/`rare`: the N most (or, for `rare`, least) frequent combinations of
/// `by` fields (or of every column, when `by` is omitted), with an added
/// `count` column and an optional `percent` column.
pub struct TopRareOp {
    fields: Vec<String>,
    limit: usize,
    ascending: bool,
    show_count: bool,
    show_percent: bool,
}

impl TopRareOp {
    pub fn build(node: &PipeCommandNode) -> Result<Operator> {
        let ascending = node.name.eq_ignore_ascii_case("rare");

        // A leading bare number (`top 5 field`) sets the limit; anything
        // after it, or everything when there's no leading number, names the
        // fields to group by (unless an explicit `by` clause already did).
        let texts = positional_texts(node);
        let (limit_from_positional, field_texts) = match texts.first().and_then(|t| t.parse::<f64>().ok()) {
            Some(n) => (Some(n), texts[1..].to_vec()),
            None => (None, texts),
        };
        let limit = keyword_number(node, "limit").or(limit_from_positional).map(|n| n.max(0.0) as usize).unwrap_or(10);
        let fields = if node.by_fields.is_empty() { field_texts } else { node.by_fields.clone() };
        let show_count = keyword_bool(node, "showcount").unwrap_or(true);
        let show_percent = keyword_bool(node, "showperc").unwrap_or(false);
        Ok(Operator::TopRare(TopRareOp { fields, limit, ascending, show_count, show_percent }))
    }

    pub fn execute(&self, table: Table, _exec: &Executor) -> Result<Table> {
        let fields: Vec<String> = if self.fields.is_empty() { table.column_names().into_iter().map(String::from).collect() } else { self.fields.clone() };
        for field in &fields {
            table.require_column("top", field)?;
        }

        let groups = group_row_indices(&table, &fields);
        let total = table.row_count().max(1);
        let mut counts: Vec<(Vec<String>, usize)> = groups.into_iter().map(|(key, indices)| (key, indices.len())).collect();
        counts.sort_by(|a, b| if self.ascending { a.1.cmp(&b.1) } else { b.1.cmp(&a.1) }.then_with(|| a.0.cmp(&b.0)));
        counts.truncate(self.limit);

        let mut columns = Vec::with_capacity(fields.len() + 2);
        for (i, field) in fields.iter().enumerate() {
            let dtype = table.column(field).map(|c| c.dtype).unwrap_or(DType::String);
            let values = counts.iter().map(|(key, _)| Value::String(key[i].clone())).collect();
            columns.push(Column::new(field.clone(), dtype, values));
        }
        if self.show_count {
            let values = counts.iter().map(|(_, count)| Value::Number(*count as f64)).collect();
            columns.push(Column::new("count", DType::Number, values));
        }
        if self.show_percent {
            let values = counts.iter().map(|(_, count)| Value::Number(*count as f64 * 100.0 / total as f64)).collect();
            columns.push(Column::new("percent", DType::Number, values));
        }
        Ok(Table::new(columns))
    }
}
