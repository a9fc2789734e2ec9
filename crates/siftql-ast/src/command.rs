use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::expr::Expr;
use crate::Span;

/// The root of a parsed command: exactly one source followed by zero or more
/// pipe commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandAst {
    pub source: SourceNode,
    pub pipeline: Vec<PipeCommandNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceNode {
    pub source_type: SourceType,
    pub name: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub params: HashMap<String, Expr>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_sources: Vec<SourceNode>,
    #[serde(skip)]
    pub span: Option<Span>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum SourceType {
    Cache,
    Search,
    Default,
    Multi,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipeCommandNode {
    pub name: String,
    pub arguments: Vec<Argument>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub by_fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aggregations: Vec<AggregationNode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subqueries: Vec<CommandAst>,
    #[serde(skip)]
    pub span: Option<Span>,
}

impl PipeCommandNode {
    pub fn new(name: impl Into<String>, span: Option<Span>) -> Self {
        PipeCommandNode {
            name: name.into(),
            arguments: Vec::new(),
            by_fields: Vec::new(),
            aggregations: Vec::new(),
            subqueries: Vec::new(),
            span,
        }
    }

    /// Finds the value of the first keyword argument named `key`.
    pub fn keyword(&self, key: &str) -> Option<&Expr> {
        self.arguments.iter().find_map(|a| match a {
            Argument::Keyword(k, v) if k == key => Some(v),
            _ => None,
        })
    }

    pub fn positionals(&self) -> impl Iterator<Item = &Expr> {
        self.arguments.iter().filter_map(|a| match a {
            Argument::Positional(v) => Some(v),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Argument {
    Positional(Expr),
    Keyword(String, Expr),
}

/// One entry of a `stats`/`eventstats` aggregation list, e.g.
/// `sum(amount) as total`. The alias is an explicit field (never smuggled
/// into the function name) so callers don't need to parse it back out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationNode {
    pub function: String,
    pub field: Option<String>,
    pub alias: Option<String>,
    #[serde(skip)]
    pub span: Option<Span>,
}

impl AggregationNode {
    /// The output column name: the explicit alias, or `<function>_<field>`,
    /// or just `<function>` when there's no field.
    pub fn output_name(&self) -> String {
        if let Some(alias) = &self.alias {
            return alias.clone();
        }
        match &self.field {
            Some(field) => format!("{}_{}", self.function, field),
            None => self.function.clone(),
        }
    }
}
