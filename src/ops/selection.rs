//! Row-selection operators: `filter`/`where`, `head`/`tail`/`limit`,
//! `sample`, `dedup`/`distinct`/`unique`, `dropnull`/`dropna`.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use siftql_ast::PipeCommandNode;

use super::{keyword_bool, keyword_number, keyword_text, positional_texts, Operator};
use crate::error::{Error, Result};
use crate::eval::filter;
use crate::executor::Executor;
use crate::table::{Table, Value};

/// `filter`/`where`: re-parses the raw captured expression (§9) and keeps
/// only rows where it evaluates truthy.
pub struct FilterOp {
    raw_expression: String,
}

impl FilterOp {
    pub fn build(node: &PipeCommandNode) -> Result<Operator> {
        let raw_expression = positional_texts(node)
            .into_iter()
            .next()
            .ok_or_else(|| Error::semantic("`filter`/`where` requires a predicate"))?;
        Ok(Operator::Filter(FilterOp { raw_expression }))
    }

    pub fn execute(&self, table: Table, _exec: &Executor) -> Result<Table> {
        let mut keep = Vec::with_capacity(table.row_count());
        for row in table.rows() {
            keep.push(filter::matches(&self.raw_expression, &row).map_err(|e| e.with_command("filter"))?);
        }
        let indices: Vec<usize> = keep.iter().enumerate().filter(|(_, &k)| k).map(|(i, _)| i).collect();
        Ok(table.select_rows(&indices))
    }
}

/// `head`/`tail`/`limit` share one operator; `limit` behaves like `head`.
pub struct HeadTailOp {
    n: usize,
    from_tail: bool,
}

impl HeadTailOp {
    pub fn build(node: &PipeCommandNode) -> Result<Operator> {
        let n = positional_texts(node)
            .into_iter()
            .next()
            .and_then(|s| s.parse::<f64>().ok())
            .map(|n| n.max(0.0) as usize)
            .unwrap_or(10);
        let from_tail = node.name.eq_ignore_ascii_case("tail");
        Ok(Operator::HeadTail(HeadTailOp { n, from_tail }))
    }

    pub fn execute(&self, table: Table, _exec: &Executor) -> Result<Table> {
        let total = table.row_count();
        let n = self.n.min(total);
        let indices: Vec<usize> = if self.from_tail { (total - n..total).collect() } else { (0..n).collect() };
        Ok(table.select_rows(&indices))
    }
}

/// `sample`: random subset by count (`n=`) or fraction (`ratio=`), with an
/// optional `seed=` for reproducibility.
pub struct SampleOp {
    n: Option<usize>,
    ratio: Option<f64>,
    seed: Option<u64>,
}

impl SampleOp {
    pub fn build(node: &PipeCommandNode) -> Result<Operator> {
        let n = keyword_number(node, "n").map(|n| n.max(0.0) as usize);
        let ratio = keyword_number(node, "ratio");
        let seed = keyword_number(node, "seed").map(|s| s as u64);
        Ok(Operator::Sample(SampleOp { n, ratio, seed }))
    }

    pub fn execute(&self, table: Table, _exec: &Executor) -> Result<Table> {
        let total = table.row_count();
        let count = match (self.n, self.ratio) {
            (_, Some(ratio)) => ((total as f64) * ratio.clamp(0.0, 1.0)).round() as usize,
            (Some(n), None) => n,
            (None, None) => 10,
        }
        .min(total);

        let mut indices: Vec<usize> = (0..total).collect();
        match self.seed {
            Some(seed) => {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                indices.shuffle(&mut rng);
            }
            None => {
                let mut rng = rand::thread_rng();
                indices.shuffle(&mut rng);
            }
        }
        indices.truncate(count);
        indices.sort_unstable();
        Ok(table.select_rows(&indices))
    }
}

/// `dedup`/`distinct`/`unique`: drops duplicate rows by a key, optionally
/// only among consecutive rows, optionally after a `sortby=` pre-sort.
pub struct DedupOp {
    fields: Vec<String>,
    consecutive: bool,
    keep_last: bool,
    sortby: Vec<(String, bool)>,
}

impl DedupOp {
    pub fn build(node: &PipeCommandNode) -> Result<Operator> {
        let fields = positional_texts(node);
        let consecutive = keyword_bool(node, "consecutive").unwrap_or(false);
        let keep_last = keyword_text(node, "keep").is_some_and(|k| k.eq_ignore_ascii_case("last"));
        let sortby = keyword_text(node, "sortby")
            .map(|s| {
                super::split_field_list(&s)
                    .into_iter()
                    .map(|f| match f.strip_prefix('-') {
                        Some(rest) => (rest.to_string(), false),
                        None => (f, true),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(Operator::Dedup(DedupOp { fields, consecutive, keep_last, sortby }))
    }

    pub fn execute(&self, table: Table, exec: &Executor) -> Result<Table> {
        let table = if self.sortby.is_empty() {
            table
        } else {
            super::transform::sort_table(&table, &self.sortby)?
        };

        let key_names: Vec<&str> = if self.fields.is_empty() {
            table.column_names()
        } else {
            for f in &self.fields {
                table.require_column("dedup", f)?;
            }
            self.fields.iter().map(String::as_str).collect()
        };

        let row_key = |i: usize, table: &Table| -> Vec<String> {
            key_names.iter().map(|name| table.column(name).unwrap().values[i].as_str_repr()).collect()
        };

        let mut indices = Vec::new();
        if self.consecutive {
            let mut prev: Option<Vec<String>> = None;
            for i in 0..table.row_count() {
                let key = row_key(i, &table);
                if prev.as_ref() != Some(&key) {
                    indices.push(i);
                }
                prev = Some(key);
            }
        } else {
            let mut seen: HashMap<Vec<String>, usize> = HashMap::new();
            for i in 0..table.row_count() {
                let key = row_key(i, &table);
                if self.keep_last {
                    seen.insert(key, i);
                } else {
                    seen.entry(key).or_insert(i);
                }
            }
            indices = seen.into_values().collect();
            indices.sort_unstable();
        }
        let _ = exec;
        Ok(table.select_rows(&indices))
    }
}

/// `dropnull`/`dropna`: drop rows with nulls, per `how`/`thresh`/field list.
pub struct DropNullOp {
    fields: Vec<String>,
    how_all: bool,
    thresh: Option<usize>,
}

impl DropNullOp {
    pub fn build(node: &PipeCommandNode) -> Result<Operator> {
        let fields = positional_texts(node);
        let how_all = keyword_text(node, "how").is_some_and(|h| h.eq_ignore_ascii_case("all"));
        let thresh = keyword_number(node, "thresh").map(|n| n.max(0.0) as usize);
        Ok(Operator::DropNull(DropNullOp { fields, how_all, thresh }))
    }

    pub fn execute(&self, table: Table, _exec: &Executor) -> Result<Table> {
        let names: Vec<&str> =
            if self.fields.is_empty() { table.column_names() } else { self.fields.iter().map(String::as_str).collect() };
        for name in &names {
            table.require_column("dropnull", name)?;
        }

        let mut indices = Vec::with_capacity(table.row_count());
        for i in 0..table.row_count() {
            let values: Vec<&Value> = names.iter().map(|n| &table.column(n).unwrap().values[i]).collect();
            let non_null = values.iter().filter(|v| !v.is_null()).count();
            let keep = if let Some(thresh) = self.thresh {
                non_null >= thresh
            } else if self.how_all {
                non_null > 0
            } else {
                non_null == values.len()
            };
            if keep {
                indices.push(i);
            }
        }
        Ok(table.select_rows(&indices))
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

    fn dedup_source() -> Table {
        Table::new(vec![
            Column::new(
                "group",
                DType::String,
                vec![
                    Value::String("a".into()),
                    Value::String("a".into()),
                    Value::String("b".into()),
                    Value::String("a".into()),
                ],
            ),
            Column::new("n", DType::Number, vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0), Value::Number(4.0)]),
        ])
    }

    #[test]
    fn dedup_keeps_first_occurrence_by_default() {
        let registry = Registry::new();
        registry.set("t", dedup_source());
        let result = run(&registry, "cache=t | dedup group");
        assert_eq!(result.row_count(), 2);
        assert_eq!(result.column("n").unwrap().values, vec![Value::Number(1.0), Value::Number(3.0)]);
    }

    #[test]
    fn dedup_consecutive_only_drops_adjacent_duplicates() {
        let registry = Registry::new();
        registry.set("t", dedup_source());
        let result = run(&registry, "cache=t | dedup group consecutive=true");
        // a,a,b,a: consecutive a,a collapses; the later lone `a` survives
        // since it isn't adjacent to the first run.
        assert_eq!(result.row_count(), 3);
        assert_eq!(result.column("n").unwrap().values, vec![Value::Number(1.0), Value::Number(3.0), Value::Number(4.0)]);
    }

    #[test]
    fn dedup_on_all_columns_is_idempotent() {
        let registry = Registry::new();
        registry.set("t", dedup_source());
        let once = run(&registry, "cache=t | dedup");
        registry.set("once", once.clone());
        let twice = run(&registry, "cache=once | dedup");
        assert_eq!(once.row_count(), twice.row_count());
    }

    #[test]
    fn dropnull_how_any_drops_rows_with_any_null() {
        let registry = Registry::new();
        registry.set(
            "t",
            Table::new(vec![
                Column::new("a", DType::Number, vec![Value::Number(1.0), Value::Null, Value::Number(3.0)]),
                Column::new("b", DType::Number, vec![Value::Number(1.0), Value::Number(2.0), Value::Null]),
            ]),
        );
        let result = run(&registry, "cache=t | dropnull");
        assert_eq!(result.row_count(), 1);
    }

    #[test]
    fn head_and_tail_clamp_to_row_count() {
        let registry = Registry::new();
        registry.set("t", Table::new(vec![Column::new("x", DType::Number, vec![Value::Number(1.0), Value::Number(2.0)])]));
        assert_eq!(run(&registry, "cache=t | head 10").row_count(), 2);
        assert_eq!(
            run(&registry, "cache=t | tail 1").column("x").unwrap().values,
            vec![Value::Number(2.0)]
        );
    }

    #[test]
    fn sample_with_seed_is_deterministic() {
        let registry = Registry::new();
        registry.set(
            "t",
            Table::new(vec![Column::new(
                "x",
                DType::Number,
                (0..20).map(|i| Value::Number(i as f64)).collect(),
            )]),
        );
        let first = run(&registry, "cache=t | sample n=5 seed=42");
        let second = run(&registry, "cache=t | sample n=5 seed=42");
        assert_eq!(first.column("x").unwrap().values, second.column("x").unwrap().values);
        assert_eq!(first.row_count(), 5);
    }
}
