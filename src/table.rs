//! The table type every operator consumes and produces.
//!
//! Out of scope of the pipeline language proper — §3 of the design treats any
//! columnar table with typed columns, null support, group-by, sort, merge,
//! regex string ops and datetime arithmetic as an interchangeable external
//! collaborator. This is a minimal `Vec`-columnar implementation of that
//! contract, not a general-purpose dataframe.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDateTime;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    String(String),
    Bool(bool),
    DateTime(NaiveDateTime),
    Null,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str_repr(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Number(n) => format_number(*n),
            Value::Bool(b) => b.to_string(),
            Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            Value::Null => String::new(),
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            Value::String(s) => crate::eval::time::parse_absolute(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Null => false,
            Value::DateTime(_) => true,
        }
    }

    pub fn dtype(&self) -> DType {
        match self {
            Value::Number(_) => DType::Number,
            Value::String(_) => DType::String,
            Value::Bool(_) => DType::Bool,
            Value::DateTime(_) => DType::DateTime,
            Value::Null => DType::String,
        }
    }

    /// Total ordering used by `sort`, treating `Null` as greater than
    /// anything else so it sinks to the end regardless of direction.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Greater,
            (_, Value::Null) => Ordering::Less,
            (Value::Number(a), Value::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            _ => self.as_str_repr().cmp(&other.as_str_repr()),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str_repr())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DType {
    Number,
    String,
    Bool,
    DateTime,
    Categorical,
}

#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub dtype: DType,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, dtype: DType, values: Vec<Value>) -> Self {
        Column { name: name.into(), dtype, values }
    }
}

/// A sequence of named columns sharing one row count. Columns are addressed
/// by name; there is no notion of a primary key or row identity beyond
/// position.
#[derive(Debug, Clone, Default)]
pub struct Table {
    columns: Vec<Column>,
    row_count: usize,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Self {
        let row_count = columns.first().map(|c| c.values.len()).unwrap_or(0);
        Table { columns, row_count }
    }

    pub fn empty() -> Self {
        Table { columns: Vec::new(), row_count: 0 }
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    pub fn require_column(&self, command: &str, name: &str) -> Result<&Column> {
        self.column(name).ok_or_else(|| Error::missing_column(command, name))
    }

    /// Reads one row as a name→value map. Convenient for row-at-a-time
    /// evaluation (`filter`, `eval`, `rex`); aggregation and sort work
    /// directly against columns instead.
    pub fn row(&self, index: usize) -> HashMap<&str, &Value> {
        self.columns.iter().map(|c| (c.name.as_str(), &c.values[index])).collect()
    }

    pub fn rows(&self) -> impl Iterator<Item = HashMap<&str, &Value>> {
        (0..self.row_count).map(move |i| self.row(i))
    }

    pub fn push_column(&mut self, column: Column) {
        self.row_count = self.row_count.max(column.values.len());
        self.columns.push(column);
    }

    pub fn set_column(&mut self, column: Column) {
        if let Some(existing) = self.columns.iter_mut().find(|c| c.name == column.name) {
            *existing = column;
        } else {
            self.push_column(column);
        }
    }

    pub fn remove_column(&mut self, name: &str) {
        self.columns.retain(|c| c.name != name);
    }

    /// Selects rows by index, preserving column order and dtypes.
    pub fn select_rows(&self, indices: &[usize]) -> Table {
        let columns = self
            .columns
            .iter()
            .map(|c| Column::new(c.name.clone(), c.dtype, indices.iter().map(|&i| c.values[i].clone()).collect()))
            .collect();
        Table { columns, row_count: indices.len() }
    }

    /// Keeps only the named columns, in the given order.
    pub fn select_columns(&self, names: &[&str]) -> Result<Table> {
        let mut columns = Vec::with_capacity(names.len());
        for name in names {
            let col = self
                .column(name)
                .ok_or_else(|| Error::missing_column("select", name))?;
            columns.push(col.clone());
        }
        Ok(Table { columns, row_count: self.row_count })
    }

    /// Stacks `other` below `self`, aligning columns by name. Columns present
    /// in only one side are filled with `Null` on the other.
    pub fn union(&self, other: &Table) -> Table {
        let mut names: Vec<String> = self.column_names().into_iter().map(String::from).collect();
        for name in other.column_names() {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }

        let mut columns = Vec::with_capacity(names.len());
        for name in &names {
            let left_dtype = self.column(name).map(|c| c.dtype);
            let right_dtype = other.column(name).map(|c| c.dtype);
            let dtype = left_dtype.or(right_dtype).unwrap_or(DType::String);

            let mut values = match self.column(name) {
                Some(c) => c.values.clone(),
                None => vec![Value::Null; self.row_count],
            };
            let right_values = match other.column(name) {
                Some(c) => c.values.clone(),
                None => vec![Value::Null; other.row_count],
            };
            values.extend(right_values);
            columns.push(Column::new(name.clone(), dtype, values));
        }

        Table { columns, row_count: self.row_count + other.row_count }
    }

    pub fn append_rows(&mut self, other: Table) {
        *self = self.union(&other);
    }
}
