//! Column operators: `select`/`fields`/`table`/`project`, `rename`, `eval`,
//! `replace`, `rex`/`regex`/`extract`, `mvexpand`/`expand`/`explode`.

use regex::Regex;
use siftql_ast::{Argument, Expr, ExprKind, PipeCommandNode};

use super::{expr_text, keyword_number, keyword_text, positional_texts, Operator};
use crate::error::{Error, Result};
use crate::eval::{eval_expr, Row};
use crate::executor::Executor;
use crate::table::{Column, DType, Table, Value};

/// `select`/`fields`/`table`/`project`: keep named columns, or drop those
/// prefixed `-`. A command mixing inclusions and exclusions is rejected the
/// same way Splunk's `fields` is — include and exclude don't combine.
pub struct SelectOp {
    names: Vec<String>,
    exclude: bool,
}

impl SelectOp {
    pub fn build(node: &PipeCommandNode) -> Result<Operator> {
        let texts = positional_texts(node);
        if texts.is_empty() {
            return Err(Error::semantic("`select` requires at least one field"));
        }
        let exclude = texts[0].starts_with('-');
        let names = texts
            .into_iter()
            .map(|t| if let Some(rest) = t.strip_prefix('-') { rest.to_string() } else { t })
            .collect();
        Ok(Operator::Select(SelectOp { names, exclude }))
    }

    pub fn execute(&self, table: Table, _exec: &Executor) -> Result<Table> {
        if self.exclude {
            let mut result = table.clone();
            for name in &self.names {
                result.remove_column(name);
            }
            Ok(result)
        } else {
            let names: Vec<&str> = self.names.iter().map(String::as_str).collect();
            table.select_columns(&names).map_err(|e| e.with_command("select"))
        }
    }
}

/// `rename`: `old as new` / `old=new` pairs.
pub struct RenameOp {
    pairs: Vec<(String, String)>,
}

impl RenameOp {
    pub fn build(node: &PipeCommandNode) -> Result<Operator> {
        let pairs = node
            .arguments
            .iter()
            .filter_map(|a| match a {
                Argument::Keyword(old, new) => Some((old.clone(), expr_text(new))),
                _ => None,
            })
            .collect();
        Ok(Operator::Rename(RenameOp { pairs }))
    }

    pub fn execute(&self, table: Table, _exec: &Executor) -> Result<Table> {
        let mut result = table;
        for (old, new) in &self.pairs {
            let mut column = result.require_column("rename", old)?.clone();
            column.name = new.clone();
            result.remove_column(old);
            result.set_column(column);
        }
        Ok(result)
    }
}

/// `eval`/`calculate`/`compute`: ordered assignments, each seeing earlier
/// ones in the same command.
pub struct EvalOp {
    assignments: Vec<(String, Expr)>,
}

impl EvalOp {
    pub fn build(node: &PipeCommandNode) -> Result<Operator> {
        let assignments = node
            .arguments
            .iter()
            .filter_map(|a| match a {
                Argument::Keyword(field, expr) => Some((field.clone(), expr.clone())),
                _ => None,
            })
            .collect();
        Ok(Operator::Eval(EvalOp { assignments }))
    }

    pub fn execute(&self, table: Table, _exec: &Executor) -> Result<Table> {
        let mut result = table;
        for (field, expr) in &self.assignments {
            let mut values = Vec::with_capacity(result.row_count());
            for i in 0..result.row_count() {
                let row: Row = result.row(i);
                let value = eval_expr(expr, &row).map_err(|e| e.with_command("eval").with_field(field.clone()))?;
                values.push(value);
            }
            let dtype = values.iter().find(|v| !v.is_null()).map(|v| v.dtype()).unwrap_or(DType::String);
            // Writing the column back before the next assignment is what
            // makes earlier fields in the same command visible to later ones.
            result.set_column(Column::new(field.clone(), dtype, values));
        }
        Ok(result)
    }
}

/// `replace`: one `(field, old, new)` triple, or a `regex=`/`null` form.
pub struct ReplaceOp {
    field: String,
    regex: Option<String>,
    old: Option<Expr>,
    new: Expr,
}

impl ReplaceOp {
    pub fn build(node: &PipeCommandNode) -> Result<Operator> {
        let field = positional_texts(node).into_iter().next().ok_or_else(|| Error::semantic("`replace` requires a field"))?;
        let regex = keyword_text(node, "regex");
        let old = node.arguments.iter().find_map(|a| match a {
            Argument::Keyword(k, v) if k == "old" => Some(v.clone()),
            _ => None,
        });
        let new = node
            .arguments
            .iter()
            .find_map(|a| match a {
                Argument::Keyword(k, v) if k == "new" => Some(v.clone()),
                _ => None,
            })
            .ok_or_else(|| Error::semantic("`replace` requires `with <new_value>`"))?;
        Ok(Operator::Replace(ReplaceOp { field, regex, old, new }))
    }

    pub fn execute(&self, table: Table, _exec: &Executor) -> Result<Table> {
        let column = table.require_column("replace", &self.field)?;
        let new_value = literal_argument_value(&self.new)?;

        let mut values = column.values.clone();
        if let Some(pattern) = &self.regex {
            let re = Regex::new(pattern).map_err(|e| Error::semantic(format!("invalid regex `{pattern}`: {e}")))?;
            let replacement = new_value.as_str_repr();
            for v in values.iter_mut() {
                let text = v.as_str_repr();
                if re.is_match(&text) {
                    *v = Value::String(re.replace_all(&text, replacement.as_str()).into_owned());
                }
            }
        } else {
            match &self.old {
                None => {
                    for v in values.iter_mut() {
                        if v.is_null() {
                            *v = new_value.clone();
                        }
                    }
                }
                Some(old_expr) => {
                    let is_null_sentinel = matches!(&old_expr.kind, ExprKind::Ident(s) if s.eq_ignore_ascii_case("null"));
                    let old_value = literal_argument_value(old_expr)?;
                    for v in values.iter_mut() {
                        let matches = if is_null_sentinel { v.is_null() } else { *v == old_value };
                        if matches {
                            *v = new_value.clone();
                        }
                    }
                }
            }
        }
        let mut result = table.clone();
        result.set_column(Column::new(self.field.clone(), column.dtype, values));
        Ok(result)
    }
}

/// Resolves a `replace` old/new argument to a literal value. A bare
/// identifier (e.g. the unquoted `error` in `replace status error with
/// failed`) names itself rather than a column, unlike in `eval`/`filter`
/// expressions, so it is taken as a string literal instead of being run
/// through the row-aware interpreter.
fn literal_argument_value(expr: &Expr) -> Result<Value> {
    match &expr.kind {
        ExprKind::Ident(name) => Ok(Value::String(name.clone())),
        _ => eval_expr(expr, &Row::default()).map_err(|e| e.with_command("replace")),
    }
}

/// `rex`/`regex`/`extract`: named-capture extraction, or `mode=sed` /
/// leading `s/PATTERN/REPLACEMENT/` in-place replacement.
pub struct RexOp {
    field: String,
    pattern: String,
    sed_replacement: Option<String>,
}

impl RexOp {
    pub fn build(node: &PipeCommandNode) -> Result<Operator> {
        let field = keyword_text(node, "field").ok_or_else(|| Error::semantic("`rex` requires `field=`"))?;
        let mut pattern = keyword_text(node, "pattern")
            .or_else(|| positional_texts(node).into_iter().next())
            .ok_or_else(|| Error::semantic("`rex` requires a pattern"))?;
        let is_sed_mode = keyword_text(node, "mode").is_some_and(|m| m.eq_ignore_ascii_case("sed"));

        let mut sed_replacement = keyword_text(node, "replacement");
        if sed_replacement.is_none() && pattern.starts_with("s/") {
            if let Some((pat, repl)) = split_sed_form(&pattern) {
                pattern = pat;
                sed_replacement = Some(repl);
            }
        } else if is_sed_mode && sed_replacement.is_none() {
            return Err(Error::semantic("`rex mode=sed` requires `replacement=`"));
        }

        Ok(Operator::Rex(RexOp { field, pattern, sed_replacement }))
    }

    pub fn execute(&self, table: Table, _exec: &Executor) -> Result<Table> {
        let column = table.require_column("rex", &self.field)?;
        let re = Regex::new(&self.pattern).map_err(|e| Error::semantic(format!("invalid regex `{}`: {e}", self.pattern)))?;

        if let Some(replacement) = &self.sed_replacement {
            let mut values = Vec::with_capacity(column.values.len());
            for v in &column.values {
                values.push(Value::String(re.replace_all(&v.as_str_repr(), replacement.as_str()).into_owned()));
            }
            let mut result = table.clone();
            result.set_column(Column::new(self.field.clone(), DType::String, values));
            return Ok(result);
        }

        let names: Vec<String> = re.capture_names().flatten().map(String::from).collect();
        if names.is_empty() {
            return Err(Error::semantic("`rex` requires at least one named capture group, e.g. `(?<name>...)`"));
        }

        let mut extracted: Vec<Vec<Value>> = vec![Vec::with_capacity(column.values.len()); names.len()];
        for v in &column.values {
            let text = v.as_str_repr();
            match re.captures(&text) {
                Some(caps) => {
                    for (i, name) in names.iter().enumerate() {
                        extracted[i].push(caps.name(name).map(|m| Value::String(m.as_str().to_string())).unwrap_or(Value::Null));
                    }
                }
                None => {
                    for slot in extracted.iter_mut() {
                        slot.push(Value::Null);
                    }
                }
            }
        }

        let mut result = table.clone();
        for (name, values) in names.into_iter().zip(extracted) {
            result.set_column(Column::new(name, DType::String, values));
        }
        Ok(result)
    }
}

/// Splits a leading `s/PATTERN/REPLACEMENT/` form, honoring `\/` escapes.
fn split_sed_form(text: &str) -> Option<(String, String)> {
    let body = text.strip_prefix("s/")?;
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if next == '/' {
                    current.push('/');
                    chars.next();
                    continue;
                }
            }
            current.push('\\');
        } else if c == '/' {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    if parts.len() < 2 {
        return None;
    }
    Some((parts[0].clone(), parts[1].clone()))
}

/// `mvexpand`/`expand`/`explode`: one row per element of a delimiter-split
/// (or already-list-shaped, i.e. a single string we still split on the
/// default comma) field.
pub struct MvExpandOp {
    field: String,
    delim: String,
    limit: Option<usize>,
}

impl MvExpandOp {
    pub fn build(node: &PipeCommandNode) -> Result<Operator> {
        let field = keyword_text(node, "field")
            .or_else(|| positional_texts(node).into_iter().next())
            .ok_or_else(|| Error::semantic("`mvexpand` requires a field"))?;
        let delim = keyword_text(node, "delim").or_else(|| keyword_text(node, "delimiter")).unwrap_or_else(|| ",".to_string());
        let limit = keyword_number(node, "limit").map(|n| n.max(0.0) as usize);
        Ok(Operator::MvExpand(MvExpandOp { field, delim, limit }))
    }

    pub fn execute(&self, table: Table, _exec: &Executor) -> Result<Table> {
        table.require_column("mvexpand", &self.field)?;
        let names = table.column_names();

        let mut new_columns: Vec<Vec<Value>> = vec![Vec::new(); names.len()];
        let field_idx = names.iter().position(|n| *n == self.field).unwrap();

        for row_idx in 0..table.row_count() {
            let source_value = &table.column(&self.field).unwrap().values[row_idx];
            let mut parts: Vec<String> = if source_value.is_null() {
                vec![String::new()]
            } else {
                source_value.as_str_repr().split(self.delim.as_str()).map(|s| s.trim().to_string()).collect()
            };
            if let Some(limit) = self.limit {
                parts.truncate(limit.max(1));
            }
            for part in &parts {
                for (col_idx, name) in names.iter().enumerate() {
                    let value = if col_idx == field_idx {
                        Value::String(part.clone())
                    } else {
                        table.column(name).unwrap().values[row_idx].clone()
                    };
                    new_columns[col_idx].push(value);
                }
            }
        }

        let columns = names
            .into_iter()
            .zip(new_columns)
            .map(|(name, values)| {
                let dtype = if name == self.field { DType::String } else { table.column(name).unwrap().dtype };
                Column::new(name, dtype, values)
            })
            .collect();
        Ok(Table::new(columns))
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

    fn sample_table() -> Table {
        Table::new(vec![
            Column::new("a", DType::Number, vec![Value::Number(1.0), Value::Number(2.0)]),
            Column::new("b", DType::Number, vec![Value::Number(10.0), Value::Number(20.0)]),
        ])
    }

    #[test]
    fn select_keeps_only_named_columns() {
        let registry = Registry::new();
        registry.set("t", sample_table());
        let result = run(&registry, "cache=t | select a");
        assert_eq!(result.column_names(), vec!["a"]);
    }

    #[test]
    fn select_with_a_leading_dash_excludes_columns() {
        let registry = Registry::new();
        registry.set("t", sample_table());
        let result = run(&registry, "cache=t | select -b");
        assert_eq!(result.column_names(), vec!["a"]);
    }

    #[test]
    fn rename_errors_on_an_unknown_source_column() {
        let registry = Registry::new();
        registry.set("t", sample_table());
        let err = execute_with_registry("cache=t | rename missing as renamed", &Context::default(), &registry).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Resolution);
    }

    #[test]
    fn eval_assignments_see_earlier_assignments_in_the_same_command() {
        let registry = Registry::new();
        registry.set("t", sample_table());
        let result = run(&registry, "cache=t | eval c = a + b, d = c * 2");
        assert_eq!(result.column("c").unwrap().values, vec![Value::Number(11.0), Value::Number(22.0)]);
        assert_eq!(result.column("d").unwrap().values, vec![Value::Number(22.0), Value::Number(44.0)]);
    }

    #[test]
    fn eval_case_first_matching_condition_wins() {
        let registry = Registry::new();
        registry.set(
            "t",
            Table::new(vec![Column::new(
                "score",
                DType::Number,
                vec![Value::Number(95.0), Value::Number(85.0), Value::Number(50.0)],
            )]),
        );
        let result = run(&registry, r#"cache=t | eval grade = case(score>=90, "A", score>=80, "B", 1=1, "F")"#);
        assert_eq!(
            result.column("grade").unwrap().values,
            vec![Value::String("A".into()), Value::String("B".into()), Value::String("F".into())]
        );
    }

    #[test]
    fn replace_substitutes_a_literal_value() {
        let registry = Registry::new();
        registry.set(
            "t",
            Table::new(vec![Column::new(
                "status",
                DType::String,
                vec![Value::String("ok".into()), Value::String("error".into())],
            )]),
        );
        let result = run(&registry, r#"cache=t | replace status error with failed"#);
        assert_eq!(
            result.column("status").unwrap().values,
            vec![Value::String("ok".into()), Value::String("failed".into())]
        );
    }

    #[test]
    fn rex_extracts_named_capture_groups_and_nulls_on_no_match() {
        let registry = Registry::new();
        registry.set(
            "t",
            Table::new(vec![Column::new(
                "raw",
                DType::String,
                vec![Value::String("level=ERROR msg=boom".into()), Value::String("no level here".into())],
            )]),
        );
        let result = run(&registry, r#"cache=t | rex field=raw "level=(?<level>[A-Z]+)""#);
        assert_eq!(
            result.column("level").unwrap().values,
            vec![Value::String("ERROR".into()), Value::Null]
        );
    }

    #[test]
    fn mvexpand_produces_one_row_per_delimited_element() {
        let registry = Registry::new();
        registry.set(
            "t",
            Table::new(vec![
                Column::new("id", DType::Number, vec![Value::Number(1.0)]),
                Column::new("tags", DType::String, vec![Value::String("a,b,c".into())]),
            ]),
        );
        let result = run(&registry, "cache=t | mvexpand tags");
        assert_eq!(result.row_count(), 3);
        assert_eq!(
            result.column("tags").unwrap().values,
            vec![Value::String("a".into()), Value::String("b".into()), Value::String("c".into())]
        );
        assert_eq!(result.column("id").unwrap().values, vec![Value::Number(1.0); 3]);
    }
}
