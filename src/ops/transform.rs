//! Whole-table reshaping operators: `sort`, `reverse`, `transpose`/`pivot`,
//! `fillnull`/`fillna`/`fill`.

use std::cmp::Ordering;
use std::collections::HashMap;

use siftql_ast::PipeCommandNode;

use super::{keyword_bool, keyword_text, positional_texts, split_field_list, Operator};
use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::table::{Column, DType, Table, Value};

/// `sort`: multi-key, `-field` for descending. Exposed to [`super::selection`]
/// so `dedup`'s `sortby=` can reuse the same ordering logic instead of
/// duplicating it.
pub struct SortOp {
    keys: Vec<(String, bool)>,
}

impl SortOp {
    pub fn build(node: &PipeCommandNode) -> Result<Operator> {
        let keys = positional_texts(node)
            .into_iter()
            .flat_map(|t| split_field_list(&t))
            .map(|f| match f.strip_prefix('-') {
                Some(rest) => (rest.to_string(), false),
                None => (f, true),
            })
            .collect();
        Ok(Operator::Sort(SortOp { keys }))
    }

    pub fn execute(&self, table: Table, _exec: &Executor) -> Result<Table> {
        sort_table(&table, &self.keys)
    }
}

/// Stable multi-key sort shared by `sort` and `dedup`'s `sortby=`. `Null`
/// always sorts to the end regardless of direction, per [`Value::compare`].
pub(crate) fn sort_table(table: &Table, keys: &[(String, bool)]) -> Result<Table> {
    if keys.is_empty() {
        return Ok(table.clone());
    }
    for (name, _) in keys {
        table.require_column("sort", name)?;
    }

    let mut indices: Vec<usize> = (0..table.row_count()).collect();
    indices.sort_by(|&a, &b| {
        for (name, ascending) in keys {
            let column = table.column(name).unwrap();
            let ordering = column.values[a].compare(&column.values[b]);
            let ordering = if *ascending { ordering } else { ordering.reverse() };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
    Ok(table.select_rows(&indices))
}

/// `reverse`: row order, unconditionally.
pub struct ReverseOp;

impl ReverseOp {
    pub fn build(_node: &PipeCommandNode) -> Result<Operator> {
        Ok(Operator::Reverse(ReverseOp))
    }

    pub fn execute(&self, table: Table, _exec: &Executor) -> Result<Table> {
        let indices: Vec<usize> = (0..table.row_count()).rev().collect();
        Ok(table.select_rows(&indices))
    }
}

/// `transpose`/`pivot`: rows become columns. Each original field name fills
/// the first output column (`field`); each original row becomes one output
/// column, named `row 1`, `row 2`, ... unless `header_field=` names a column
/// whose values should be used as headers instead, in which case that
/// column is excluded from the transposed data.
pub struct TransposeOp {
    header_field: Option<String>,
    include_header: bool,
}

impl TransposeOp {
    pub fn build(node: &PipeCommandNode) -> Result<Operator> {
        let header_field = keyword_text(node, "header_field");
        let include_header = keyword_bool(node, "include_header").unwrap_or(true);
        Ok(Operator::Transpose(TransposeOp { header_field, include_header }))
    }

    pub fn execute(&self, table: Table, _exec: &Executor) -> Result<Table> {
        if let Some(header_field) = &self.header_field {
            table.require_column("transpose", header_field)?;
        }

        let headers: Vec<String> = match &self.header_field {
            Some(field) => table.column(field).unwrap().values.iter().map(Value::as_str_repr).collect(),
            None => (1..=table.row_count()).map(|i| format!("row {i}")).collect(),
        };
        let source_names: Vec<&str> = table
            .column_names()
            .into_iter()
            .filter(|n| self.header_field.as_deref() != Some(*n))
            .collect();

        let mut columns = Vec::with_capacity(headers.len() + 1);
        if self.include_header {
            let field_names: Vec<Value> = source_names.iter().map(|n| Value::String(n.to_string())).collect();
            columns.push(Column::new("field", DType::String, field_names));
        }
        for (row_idx, header) in headers.into_iter().enumerate() {
            let values = source_names.iter().map(|n| table.column(n).unwrap().values[row_idx].clone()).collect();
            columns.push(Column::new(header, DType::String, values));
        }
        Ok(Table::new(columns))
    }
}

enum FillMethod {
    Literal(Value),
    ForwardFill,
    BackwardFill,
    Mean,
    Median,
    Mode,
}

/// `fillnull`/`fillna`/`fill`: a literal `value=`, or a `method=` among
/// `ffill`/`bfill`/`mean`/`median`/`mode`, applied to the named fields (or
/// every column when none are named).
pub struct FillNullOp {
    fields: Vec<String>,
    method: FillMethod,
}

impl FillNullOp {
    pub fn build(node: &PipeCommandNode) -> Result<Operator> {
        let fields = positional_texts(node);
        let method = match keyword_text(node, "method") {
            Some(m) => match m.to_ascii_lowercase().as_str() {
                "ffill" | "forward" => FillMethod::ForwardFill,
                "bfill" | "backward" => FillMethod::BackwardFill,
                "mean" | "average" => FillMethod::Mean,
                "median" => FillMethod::Median,
                "mode" => FillMethod::Mode,
                other => return Err(Error::semantic(format!("unknown `fillnull` method `{other}`"))),
            },
            None => {
                let value = keyword_text(node, "value").unwrap_or_else(|| "0".to_string());
                FillMethod::Literal(Value::String(value))
            }
        };
        Ok(Operator::FillNull(FillNullOp { fields, method }))
    }

    pub fn execute(&self, table: Table, _exec: &Executor) -> Result<Table> {
        let names: Vec<String> = if self.fields.is_empty() {
            table.column_names().into_iter().map(String::from).collect()
        } else {
            for f in &self.fields {
                table.require_column("fillnull", f)?;
            }
            self.fields.clone()
        };

        let mut result = table.clone();
        for name in &names {
            let column = table.column(name).unwrap();
            let filled = match &self.method {
                FillMethod::Literal(v) => column.values.iter().map(|x| if x.is_null() { v.clone() } else { x.clone() }).collect(),
                FillMethod::ForwardFill => forward_fill(&column.values),
                FillMethod::BackwardFill => backward_fill(&column.values),
                FillMethod::Mean => fill_with_stat(&column.values, Stat::Mean),
                FillMethod::Median => fill_with_stat(&column.values, Stat::Median),
                FillMethod::Mode => fill_with_mode(&column.values),
            };
            result.set_column(Column::new(name.clone(), column.dtype, filled));
        }
        Ok(result)
    }
}

fn forward_fill(values: &[Value]) -> Vec<Value> {
    let mut out = Vec::with_capacity(values.len());
    let mut last: Option<Value> = None;
    for v in values {
        if v.is_null() {
            out.push(last.clone().unwrap_or(Value::Null));
        } else {
            last = Some(v.clone());
            out.push(v.clone());
        }
    }
    out
}

fn backward_fill(values: &[Value]) -> Vec<Value> {
    let mut out = vec![Value::Null; values.len()];
    let mut next: Option<Value> = None;
    for (i, v) in values.iter().enumerate().rev() {
        if v.is_null() {
            out[i] = next.clone().unwrap_or(Value::Null);
        } else {
            next = Some(v.clone());
            out[i] = v.clone();
        }
    }
    out
}

enum Stat {
    Mean,
    Median,
}

fn fill_with_stat(values: &[Value], stat: Stat) -> Vec<Value> {
    let mut numbers: Vec<f64> = values.iter().filter_map(Value::as_number).collect();
    if numbers.is_empty() {
        return values.to_vec();
    }
    let replacement = match stat {
        Stat::Mean => numbers.iter().sum::<f64>() / numbers.len() as f64,
        Stat::Median => {
            numbers.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
            let mid = numbers.len() / 2;
            if numbers.len() % 2 == 0 { (numbers[mid - 1] + numbers[mid]) / 2.0 } else { numbers[mid] }
        }
    };
    values.iter().map(|v| if v.is_null() { Value::Number(replacement) } else { v.clone() }).collect()
}

fn fill_with_mode(values: &[Value]) -> Vec<Value> {
    let mut counts: HashMap<String, (usize, Value)> = HashMap::new();
    for v in values {
        if v.is_null() {
            continue;
        }
        let key = v.as_str_repr();
        counts.entry(key).or_insert((0, v.clone())).0 += 1;
    }
    let mode = counts
        .into_values()
        .max_by(|(count_a, value_a), (count_b, value_b)| count_a.cmp(count_b).then_with(|| value_b.compare(value_a)))
        .map(|(_, v)| v);
    match mode {
        Some(mode) => values.iter().map(|v| if v.is_null() { mode.clone() } else { v.clone() }).collect(),
        None => values.to_vec(),
    }
}
