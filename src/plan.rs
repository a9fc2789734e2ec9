//! Planner: turns a parsed [`CommandAst`] into an ordered list of operator
//! objects.
//!
//! `create_plan` is a pure copy of the syntax tree into planning shape;
//! `optimize` runs a pluggable sequence of rewrite passes (both are stubs
//! today, per the open question on `head`/`sort` pushdown — see DESIGN.md);
//! `create_commands` instantiates one [`Operator`] per step via the command
//! registry.

use siftql_ast::{CommandAst, PipeCommandNode, SourceNode};

use crate::error::Result;
use crate::ops::{self, Operator};

#[derive(Debug, Clone)]
pub struct ExecutionStep {
    pub node: PipeCommandNode,
}

#[derive(Debug, Clone)]
pub struct Plan {
    pub source: SourceNode,
    pub steps: Vec<ExecutionStep>,
}

pub fn create_plan(ast: &CommandAst) -> Plan {
    Plan {
        source: ast.source.clone(),
        steps: ast.pipeline.iter().cloned().map(|node| ExecutionStep { node }).collect(),
    }
}

/// A rewrite pass over a [`Plan`] that must preserve result equivalence.
trait RewritePass {
    fn apply(&self, plan: Plan) -> Plan;
}

/// Reserved for coalescing consecutive `filter`/`where` steps into one
/// predicate. Not yet implemented — merging predicates changes short-circuit
/// error ordering (a later filter referencing a column the earlier one would
/// have dropped rows for) in ways that need their own test coverage first, so
/// this pass is an explicit no-op rather than a partial implementation.
struct FilterOptimizer;

impl RewritePass for FilterOptimizer {
    fn apply(&self, plan: Plan) -> Plan {
        plan
    }
}

/// Reserved for pushing `head`/`limit` earlier in the pipeline when nothing
/// between the source and the limit can change row count. Left a no-op,
/// matching the source implementation (see the open question on `head`/
/// `sort` interactions in DESIGN.md): pushing a limit past a `sort` would
/// change which rows survive, so the safe default is "semantic no-op" until
/// an optimization pass can prove it doesn't reorder-then-truncate.
struct HeadOptimizer;

impl RewritePass for HeadOptimizer {
    fn apply(&self, plan: Plan) -> Plan {
        plan
    }
}

pub fn optimize(plan: Plan) -> Plan {
    let passes: Vec<Box<dyn RewritePass>> = vec![Box::new(FilterOptimizer), Box::new(HeadOptimizer)];
    passes.into_iter().fold(plan, |plan, pass| pass.apply(plan))
}

pub fn create_commands(plan: &Plan) -> Result<Vec<Operator>> {
    plan.steps.iter().map(|step| ops::build(&step.node)).collect()
}
