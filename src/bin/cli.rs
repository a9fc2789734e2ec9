//! Command-line front end: run one query against tables loaded from JSON.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use chrono::NaiveDateTime;
use clap::Parser;
use serde_json::Value as JsonValue;
use siftql::table::{Column, DType, Table, Value};
use siftql::Context;

/// Run a SiftQL pipeline query over JSON-backed in-memory tables.
#[derive(Parser, Debug)]
#[command(name = "siftql", version, about)]
struct Cli {
    /// The query to run, e.g. `cache=events | stats count by user`. Reads
    /// from stdin when omitted.
    query: Option<String>,

    /// Load a named table from a JSON file of row objects, `name=path.json`.
    /// May be given more than once.
    #[arg(long = "load", value_name = "NAME=PATH")]
    loads: Vec<String>,

    /// Anchor `now` for relative-time resolution (`latest=`, `earliest=`,
    /// `bucket`, `transaction`), as `YYYY-MM-DD HH:MM:SS`. Defaults to the
    /// wall clock.
    #[arg(long, value_name = "TIMESTAMP")]
    now: Option<String>,

    /// Output format for the result table.
    #[arg(long, value_enum, default_value = "table")]
    format: OutputFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

fn main() -> Result<()> {
    color_eyre::install().ok();
    env_logger::init();
    let cli = Cli::parse();

    let query = match &cli.query {
        Some(q) => q.clone(),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf).context("reading query from stdin")?;
            buf
        }
    };

    let registry = siftql::Registry::new();
    for load in &cli.loads {
        let (name, path) = load.split_once('=').with_context(|| format!("`--load {load}` must be `name=path.json`"))?;
        let table = load_table(PathBuf::from(path))?;
        registry.set(name.to_string(), table);
    }

    let now = cli.now.as_deref().map(parse_anchor).transpose()?;
    let ctx = Context { now, extra: HashMap::new() };

    let result = siftql::execute_with_registry(&query, &ctx, &registry).map_err(|e| anyhow::anyhow!("{e}"))?;

    match cli.format {
        OutputFormat::Table => print_table(&result),
        OutputFormat::Json => print_json(&result)?,
    }
    Ok(())
}

fn parse_anchor(text: &str) -> Result<NaiveDateTime> {
    siftql::eval::time::parse_absolute(text).with_context(|| format!("couldn't parse `--now {text}` as `YYYY-MM-DD HH:MM:SS`"))
}

/// Loads a JSON array of flat row objects into a [`Table`], inferring each
/// column's type from its first non-null value.
fn load_table(path: PathBuf) -> Result<Table> {
    let text = fs::read_to_string(&path).with_context(|| format!("reading `{}`", path.display()))?;
    let rows: Vec<HashMap<String, JsonValue>> =
        serde_json::from_str(&text).with_context(|| format!("`{}` must be a JSON array of row objects", path.display()))?;

    let mut order: Vec<String> = Vec::new();
    for row in &rows {
        for key in row.keys() {
            if !order.contains(key) {
                order.push(key.clone());
            }
        }
    }

    let columns = order
        .into_iter()
        .map(|name| {
            let values: Vec<Value> = rows.iter().map(|row| row.get(&name).map(json_to_value).unwrap_or(Value::Null)).collect();
            let dtype = values.iter().find(|v| !v.is_null()).map(Value::dtype).unwrap_or(DType::String);
            Column::new(name, dtype, values)
        })
        .collect();
    Ok(Table::new(columns))
}

fn json_to_value(value: &JsonValue) -> Value {
    match value {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Number(n) => n.as_f64().map(Value::Number).unwrap_or(Value::Null),
        JsonValue::String(s) => Value::String(s.clone()),
        other => Value::String(other.to_string()),
    }
}

fn print_table(table: &Table) {
    let names = table.column_names();
    println!("{}", names.join("\t"));
    for row in 0..table.row_count() {
        let cells: Vec<String> = names.iter().map(|name| table.column(name).unwrap().values[row].as_str_repr()).collect();
        println!("{}", cells.join("\t"));
    }
}

fn print_json(table: &Table) -> Result<()> {
    let names = table.column_names();
    let mut rows = Vec::with_capacity(table.row_count());
    for row in 0..table.row_count() {
        let mut object = serde_json::Map::new();
        for name in &names {
            let value = &table.column(name).unwrap().values[row];
            let json = match value {
                Value::Null => JsonValue::Null,
                Value::Bool(b) => JsonValue::Bool(*b),
                Value::Number(n) => serde_json::Number::from_f64(*n).map(JsonValue::Number).unwrap_or(JsonValue::Null),
                Value::String(s) => JsonValue::String(s.clone()),
                Value::DateTime(dt) => JsonValue::String(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
            };
            object.insert((*name).to_string(), json);
        }
        rows.push(JsonValue::Object(object));
    }
    println!("{}", serde_json::to_string_pretty(&JsonValue::Array(rows))?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_json_rows_into_a_columnar_table() {
        let dir = std::env::temp_dir();
        let path = dir.join("siftql_cli_test_loads_json_rows_into_a_columnar_table.json");
        fs::write(&path, r#"[{"user": "ada", "amount": 10}, {"user": "lin", "amount": 20}]"#).unwrap();

        let table = load_table(path.clone()).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column("user").unwrap().values[0], Value::String("ada".into()));
        assert_eq!(table.column("amount").unwrap().values[1], Value::Number(20.0));
    }
}
