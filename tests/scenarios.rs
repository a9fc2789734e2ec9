//! End-to-end pipeline scenarios, one per concrete example named in the
//! engine's design brief. Each test builds its input table(s) in an isolated
//! [`Registry`] (never the process-wide default, so these can run
//! concurrently with each other and with `src/lib.rs`'s own doctest/unit
//! tests without racing over shared state) and asserts on the table
//! `execute_with_registry` returns.

use chrono::NaiveDate;

use siftql::table::{Column, DType, Table, Value};
use siftql::{execute_with_registry, Context, Registry};

fn s(text: &str) -> Value {
    Value::String(text.to_string())
}

fn n(value: f64) -> Value {
    Value::Number(value)
}

fn run(registry: &Registry, query: &str) -> Table {
    execute_with_registry(query, &Context::default(), registry)
        .unwrap_or_else(|e| panic!("query `{query}` failed: {e}"))
}

fn column_values(table: &Table, name: &str) -> Vec<Value> {
    table.column(name).unwrap_or_else(|| panic!("missing column `{name}`")).values.clone()
}

/// Input table `data` = `(name,department,salary,age)` with five employees.
/// `cache=data | stats count by department` groups into three departments
/// whose counts sum back to the original row count.
#[test]
fn scenario_1_stats_count_by_department() {
    let registry = Registry::new();
    registry.set(
        "data",
        Table::new(vec![
            Column::new(
                "name",
                DType::String,
                vec![s("Alice"), s("Bob"), s("Charlie"), s("David"), s("Eve")],
            ),
            Column::new(
                "department",
                DType::String,
                vec![s("Sales"), s("IT"), s("IT"), s("Sales"), s("HR")],
            ),
            Column::new("salary", DType::Number, vec![n(50000.0), n(60000.0), n(55000.0), n(52000.0), n(48000.0)]),
            Column::new("age", DType::Number, vec![n(30.0), n(25.0), n(35.0), n(28.0), n(32.0)]),
        ]),
    );

    let result = run(&registry, "cache=data | stats count by department");
    assert_eq!(result.row_count(), 3);

    let departments = column_values(&result, "department");
    let counts = column_values(&result, "count");
    let mut by_department: std::collections::HashMap<String, f64> = std::collections::HashMap::new();
    for (dept, count) in departments.iter().zip(&counts) {
        by_department.insert(dept.as_str_repr(), count.as_number().unwrap());
    }
    assert_eq!(by_department.get("IT"), Some(&2.0));
    assert_eq!(by_department.get("Sales"), Some(&2.0));
    assert_eq!(by_department.get("HR"), Some(&1.0));
    assert_eq!(counts.iter().filter_map(Value::as_number).sum::<f64>(), 5.0);
}

/// `cache=data | filter salary > 50000 | sort -salary | head 2` keeps exactly
/// Bob and Charlie, highest salary first.
#[test]
fn scenario_2_filter_sort_head() {
    let registry = Registry::new();
    registry.set(
        "data",
        Table::new(vec![
            Column::new(
                "name",
                DType::String,
                vec![s("Alice"), s("Bob"), s("Charlie"), s("David"), s("Eve")],
            ),
            Column::new(
                "department",
                DType::String,
                vec![s("Sales"), s("IT"), s("IT"), s("Sales"), s("HR")],
            ),
            Column::new("salary", DType::Number, vec![n(50000.0), n(60000.0), n(55000.0), n(52000.0), n(48000.0)]),
            Column::new("age", DType::Number, vec![n(30.0), n(25.0), n(35.0), n(28.0), n(32.0)]),
        ]),
    );

    let result = run(&registry, "cache=data | filter salary > 50000 | sort -salary | head 2");
    assert_eq!(result.row_count(), 2);
    assert_eq!(column_values(&result, "name"), vec![s("Bob"), s("Charlie")]);
    assert_eq!(column_values(&result, "salary"), vec![n(60000.0), n(55000.0)]);
    assert_eq!(column_values(&result, "age"), vec![n(25.0), n(35.0)]);
}

/// `orders` (50 rows, `customer_id` cycling over 10 customers) joined against
/// a subquery that collapses `customers` to one row per `customer_id`. Every
/// output row's `segment`/`region` must match that customer's row in
/// `customers`, and the join must be row-preserving (left join on a key that
/// exists on both sides, one match per key).
#[test]
fn scenario_3_join_against_a_subquery() {
    let registry = Registry::new();

    let customer_ids: Vec<Value> = (0..50).map(|i| n((i % 10) as f64)).collect();
    let amounts: Vec<Value> = (0..50).map(|i| n(10.0 + i as f64)).collect();
    let order_ids: Vec<Value> = (0..50).map(|i| n(i as f64)).collect();
    registry.set(
        "orders",
        Table::new(vec![
            Column::new("order_id", DType::Number, order_ids),
            Column::new("customer_id", DType::Number, customer_ids),
            Column::new("amount", DType::Number, amounts),
        ]),
    );

    let segments = ["gold", "silver", "bronze"];
    let regions = ["east", "west"];
    let customer_ids: Vec<Value> = (0..10).map(|i| n(i as f64)).collect();
    let segment_values: Vec<Value> = (0..10).map(|i| s(segments[i % segments.len()])).collect();
    let region_values: Vec<Value> = (0..10).map(|i| s(regions[i % regions.len()])).collect();
    registry.set(
        "customers",
        Table::new(vec![
            Column::new("customer_id", DType::Number, customer_ids),
            Column::new("segment", DType::String, segment_values.clone()),
            Column::new("region", DType::String, region_values.clone()),
        ]),
    );

    let result = run(
        &registry,
        "cache=orders | join customer_id [search index=\"customers\" | stats first(segment) as segment, first(region) as region by customer_id]",
    );

    assert_eq!(result.row_count(), 50);
    assert!(result.has_column("segment"));
    assert!(result.has_column("region"));

    let customer_id_col = column_values(&result, "customer_id");
    let segment_col = column_values(&result, "segment");
    let region_col = column_values(&result, "region");
    for ((customer_id, segment), region) in customer_id_col.iter().zip(&segment_col).zip(&region_col) {
        let idx = customer_id.as_number().unwrap() as usize;
        assert_eq!(*segment, segment_values[idx]);
        assert_eq!(*region, region_values[idx]);
    }
}

/// `test_data` with a mixed `status` column: `filter count <= 30 and status
/// == "ok" | head 2` keeps only rows matching both predicates.
#[test]
fn scenario_4_compound_filter() {
    let registry = Registry::new();
    registry.set(
        "test_data",
        Table::new(vec![
            Column::new("count", DType::Number, vec![n(10.0), n(20.0), n(30.0), n(40.0), n(50.0)]),
            Column::new("status", DType::String, vec![s("ok"), s("ok"), s("error"), s("ok"), s("ok")]),
        ]),
    );

    let result = run(&registry, r#"cache=test_data | filter count <= 30 and status == "ok" | head 2"#);
    assert_eq!(result.row_count(), 2);
    for (count, status) in column_values(&result, "count").iter().zip(column_values(&result, "status")) {
        assert!(count.as_number().unwrap() <= 30.0);
        assert_eq!(status, s("ok"));
    }
}

/// 100 synthetic log rows with a `uri` field carrying a query string and an
/// integer `status_code`. `rex` pulls the path out of `uri` into `endpoint`;
/// the pipeline keeps only 4xx rows whose `(endpoint, status_code)` combo
/// occurs more than 5 times.
#[test]
fn scenario_5_rex_then_grouped_count_filter() {
    let registry = Registry::new();

    let endpoints = ["/api/users", "/api/orders", "/api/payments"];
    let statuses = [200, 404, 404, 500, 404, 400];
    let mut uris = Vec::with_capacity(100);
    let mut codes = Vec::with_capacity(100);
    for i in 0..100 {
        let endpoint = endpoints[i % endpoints.len()];
        let status = statuses[i % statuses.len()];
        uris.push(s(&format!("{endpoint}?page={i}")));
        codes.push(n(status as f64));
    }
    registry.set(
        "logs",
        Table::new(vec![Column::new("uri", DType::String, uris), Column::new("status_code", DType::Number, codes)]),
    );

    let result = run(
        &registry,
        r#"cache=logs | rex field=uri "(?<endpoint>/[^?]+)" | where status_code >= 400 and status_code < 500 | stats count as error_count by endpoint, status_code | where error_count > 5"#,
    );

    assert!(result.row_count() > 0);
    for (error_count, status_code) in column_values(&result, "error_count").iter().zip(column_values(&result, "status_code")) {
        assert!(error_count.as_number().unwrap() > 5.0);
        let code = status_code.as_number().unwrap();
        assert!((400.0..500.0).contains(&code));
    }
}

/// Per-user event bursts: each user has two clusters of events, separated by
/// a gap well over `maxspan=5m`. `transaction user_id maxspan=5m` must yield
/// exactly one row per burst, with `duration` equal to `_end_time - _time` in
/// whole seconds and `event_count` matching the burst's row count.
#[test]
fn scenario_6_transaction_bursts() {
    let registry = Registry::new();

    let base = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(9, 0, 0).unwrap();
    let mut user_ids = Vec::new();
    let mut times = Vec::new();
    let mut actions = Vec::new();

    // user "u1": a 3-event burst at t=0,1m,2m, then a second burst starting
    // 20 minutes later (well past the 5-minute maxspan) with 2 events.
    for offset_minutes in [0, 1, 2, 20, 21] {
        user_ids.push(s("u1"));
        times.push(Value::DateTime(base + chrono::Duration::minutes(offset_minutes)));
        actions.push(s("click"));
    }
    // user "u2": a single 2-event burst.
    for offset_minutes in [5, 6] {
        user_ids.push(s("u2"));
        times.push(Value::DateTime(base + chrono::Duration::minutes(offset_minutes)));
        actions.push(s("view"));
    }

    registry.set(
        "events",
        Table::new(vec![
            Column::new("user_id", DType::String, user_ids),
            Column::new("_time", DType::DateTime, times),
            Column::new("action", DType::String, actions),
        ]),
    );

    let result = run(&registry, "cache=events | transaction user_id maxspan=5m");
    // 2 bursts for u1 + 1 burst for u2 = 3 transactions.
    assert_eq!(result.row_count(), 3);

    let durations = column_values(&result, "duration");
    let starts = column_values(&result, "_time");
    let ends = column_values(&result, "_end_time");
    let counts = column_values(&result, "event_count");
    for ((duration, start), end) in durations.iter().zip(&starts).zip(&ends) {
        let start_dt = start.as_datetime().unwrap();
        let end_dt = end.as_datetime().unwrap();
        assert_eq!(duration.as_number().unwrap(), (end_dt - start_dt).num_seconds() as f64);
    }
    assert!(counts.iter().all(|c| c.as_number().unwrap() >= 1.0));
    assert_eq!(counts.iter().filter_map(Value::as_number).sum::<f64>(), 7.0);
}

/// `head N | stats count` returns `min(N, len(T))`, one of the universal
/// invariants the design brief calls out explicitly.
#[test]
fn head_then_count_is_bounded_by_row_count() {
    let registry = Registry::new();
    registry.set(
        "small",
        Table::new(vec![Column::new("x", DType::Number, vec![n(1.0), n(2.0), n(3.0)])]),
    );

    let result = run(&registry, "cache=small | head 10 | stats count");
    assert_eq!(column_values(&result, "count"), vec![n(3.0)]);

    let result = run(&registry, "cache=small | head 2 | stats count");
    assert_eq!(column_values(&result, "count"), vec![n(2.0)]);
}

/// `reverse | reverse` is the identity on row order.
#[test]
fn double_reverse_is_identity() {
    let registry = Registry::new();
    registry.set(
        "ordered",
        Table::new(vec![Column::new("x", DType::Number, vec![n(1.0), n(2.0), n(3.0)])]),
    );

    let result = run(&registry, "cache=ordered | reverse | reverse");
    assert_eq!(column_values(&result, "x"), vec![n(1.0), n(2.0), n(3.0)]);
}
