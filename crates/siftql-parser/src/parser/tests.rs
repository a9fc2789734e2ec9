use siftql_ast::{Argument, BinOp, ExprKind, Literal, SourceType};

use super::{parse, parse_expression};

#[test]
fn parses_cache_source_with_pipeline() {
    let ast = parse("cache=orders | head 10").unwrap();
    assert_eq!(ast.source.source_type, SourceType::Cache);
    assert_eq!(ast.source.name, "orders");
    assert_eq!(ast.pipeline.len(), 1);
    assert_eq!(ast.pipeline[0].name, "head");
}

#[test]
fn parses_search_source_with_time_params() {
    let ast = parse(r#"search index="web" earliest=-24h latest=now"#).unwrap();
    assert_eq!(ast.source.source_type, SourceType::Search);
    assert_eq!(ast.source.name, "web");
    assert!(ast.source.params.contains_key("earliest"));
    assert!(ast.source.params.contains_key("latest"));
}

#[test]
fn parses_multi_source_or_group() {
    let ast = parse("(cache=a OR cache=b) | head 5").unwrap();
    assert_eq!(ast.source.source_type, SourceType::Multi);
    assert_eq!(ast.source.sub_sources.len(), 2);
}

#[test]
fn parses_stats_with_aliases_and_by() {
    let ast = parse("cache=orders | stats sum(amount) as total, count by region").unwrap();
    let stats = &ast.pipeline[0];
    assert_eq!(stats.aggregations.len(), 2);
    assert_eq!(stats.aggregations[0].function, "sum");
    assert_eq!(stats.aggregations[0].field.as_deref(), Some("amount"));
    assert_eq!(stats.aggregations[0].output_name(), "total");
    assert_eq!(stats.aggregations[1].output_name(), "count");
    assert_eq!(stats.by_fields, vec!["region".to_string()]);
}

#[test]
fn parses_sort_with_descending_prefix() {
    let ast = parse("cache=orders | sort -amount, region").unwrap();
    let sort = &ast.pipeline[0];
    let fields: Vec<String> = sort
        .positionals()
        .filter_map(|e| match &e.kind {
            ExprKind::Ident(s) => Some(s.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(fields, vec!["-amount".to_string(), "region".to_string()]);
}

#[test]
fn parses_join_with_subquery() {
    let ast = parse(r#"cache=orders | join customer_id [search index="customers" | head 1]"#).unwrap();
    let join = &ast.pipeline[0];
    assert_eq!(join.subqueries.len(), 1);
    assert_eq!(join.subqueries[0].source.name, "customers");
}

#[test]
fn filter_captures_raw_expression_for_later_reparse() {
    let ast = parse(r#"cache=orders | where amount > 100 and region = "west""#).unwrap();
    let filter = &ast.pipeline[0];
    let Some(Argument::Positional(expr)) = filter.arguments.first() else {
        panic!("expected a captured positional filter expression");
    };
    let ExprKind::Literal(Literal::String(raw)) = &expr.kind else {
        panic!("expected a string literal");
    };
    let reparsed = parse_expression(raw).unwrap();
    let ExprKind::Binary(bin) = &reparsed.kind else {
        panic!("expected a binary expression");
    };
    assert_eq!(bin.op, BinOp::And);
}

#[test]
fn filter_like_pattern_coalesces_wildcards() {
    let ast = parse("cache=orders | where uri like %api%").unwrap();
    let filter = &ast.pipeline[0];
    let Some(Argument::Positional(expr)) = filter.arguments.first() else {
        panic!("expected a captured filter expression");
    };
    let ExprKind::Literal(Literal::String(raw)) = &expr.kind else {
        panic!("expected a string literal");
    };
    assert!(raw.contains(r#"LIKE "%api%""#), "got: {raw}");
}

#[test]
fn filter_supports_in_and_not_in() {
    let reparsed = parse_expression(r#"status in ("ok", "warn")"#).unwrap();
    let ExprKind::FuncCall(call) = &reparsed.kind else {
        panic!("expected an `in` call");
    };
    assert_eq!(call.name, "in");
    assert_eq!(call.args.len(), 3);

    let negated = parse_expression("status not in (1, 2)").unwrap();
    assert!(matches!(negated.kind, ExprKind::Unary(_)));
}

#[test]
fn parses_eval_assignments() {
    let ast = parse("cache=orders | eval total = price * qty, tax = total * 0.1").unwrap();
    let eval = &ast.pipeline[0];
    assert_eq!(eval.arguments.len(), 2);
    assert!(matches!(eval.arguments[0], Argument::Keyword(ref k, _) if k == "total"));
}

#[test]
fn parses_bucket_span() {
    let ast = parse("cache=orders | bucket _time span=5m").unwrap();
    let bucket = &ast.pipeline[0];
    let Some(Argument::Keyword(_, expr)) = bucket.arguments.iter().find(|a| matches!(a, Argument::Keyword(k, _) if k == "span")) else {
        panic!("expected span keyword argument");
    };
    assert_eq!(expr.kind, ExprKind::Literal(Literal::String("5m".into())));
}

#[test]
fn parses_rename_pairs() {
    let ast = parse("cache=orders | rename src as source, dst=destination").unwrap();
    let rename = &ast.pipeline[0];
    assert_eq!(rename.arguments.len(), 2);
}

#[test]
fn parses_generic_command_with_wildcard_field_list() {
    let ast = parse("cache=orders | table user_*, amount").unwrap();
    let table = &ast.pipeline[0];
    assert_eq!(table.arguments.len(), 2);
}

#[test]
fn unterminated_subquery_is_a_syntax_error() {
    let err = parse("cache=orders | join id [search index=a | head 1").unwrap_err();
    assert_eq!(err.kind, siftql_ast::error::ErrorKind::Syntax);
}
