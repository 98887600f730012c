//! End-to-end scenario tests against the literal fixtures spec.md §8 lists
//! (S1-S5; S6 and S7 exercise apex-symbols and apex-soql respectively and
//! live in those crates' own `tests/` directories).

use apex_log_core::Namespace;
use apex_log_parser::{parse, ParserOptions};
use pretty_assertions::assert_eq;

fn parse_default(text: &str) -> apex_log_parser::ApexLog {
    parse(text, ParserOptions::default())
}

/// S1 — basic execution envelope.
#[test]
fn s1_basic_execution_envelope() {
    let text = "\
09:18:22.6 (6574780)|EXECUTION_STARTED
09:18:22.6 (6586704)|CODE_UNIT_STARTED|[EXTERNAL]|066d|pse.VFRemote: pse.SenchaTCController invoke(saveTimecard)
09:19:13.82 (51592737891)|CODE_UNIT_FINISHED|pse.VFRemote: pse.SenchaTCController invoke(saveTimecard)
09:19:13.82 (51595120059)|EXECUTION_FINISHED
";
    let log = parse_default(text);
    assert_eq!(log.children.len(), 1);
    let root = log.node(log.children[0]);
    assert_eq!(root.event, "EXECUTION_STARTED");
    assert_eq!(root.children.len(), 1);
    let child = log.node(root.children[0]);
    assert_eq!(child.event, "CODE_UNIT_STARTED");
    assert!(log.log_issues.is_empty(), "{:?}", log.log_issues);
    assert_eq!(log.execution_end_time, 51595120059);
}

/// S2 — pseudo-exit on `WF_APPROVAL_SUBMIT` / `WF_PROCESS_FOUND`.
#[test]
fn s2_pseudo_exit_durations() {
    let text = "\
00:00:00.0 (1)|WF_APPROVAL_SUBMIT
00:00:00.0 (2)|WF_PROCESS_FOUND
00:00:00.0 (3)|WF_APPROVAL_SUBMIT
00:00:00.0 (4)|WF_PROCESS_FOUND
";
    let log = parse_default(text);
    assert_eq!(log.children.len(), 4);
    let durations: Vec<(i64, i64)> = log
        .children
        .iter()
        .map(|&id| {
            let node = log.node(id);
            (node.duration.self_nanos, node.duration.total)
        })
        .collect();
    assert_eq!(durations, vec![(1, 1), (1, 1), (1, 1), (0, 0)]);
}

/// S3 — managed-package merging: seven physical `ENTERING_MANAGED_PKG`
/// lines collapse into three run nodes, with one DML breaking the run
/// between the second and third.
#[test]
fn s3_managed_package_runs_merge_into_three_nodes() {
    let text = "\
00:00:00.0 (100)|EXECUTION_STARTED
00:00:00.0 (400)|ENTERING_MANAGED_PKG|ns
00:00:00.0 (500)|ENTERING_MANAGED_PKG|ns
00:00:00.0 (600)|ENTERING_MANAGED_PKG|ns
00:00:00.0 (700)|ENTERING_MANAGED_PKG|ns2
00:00:00.0 (725)|DML_BEGIN|[9]|Op:Insert|Type:Account|Rows:1
00:00:00.0 (730)|DML_END|[9]
00:00:00.0 (800)|ENTERING_MANAGED_PKG|ns2
00:00:00.0 (900)|ENTERING_MANAGED_PKG|ns2
00:00:00.0 (1000)|ENTERING_MANAGED_PKG|ns2
00:00:00.0 (1100)|EXECUTION_FINISHED
";
    let log = parse_default(text);
    let root = log.node(log.children[0]);
    assert_eq!(root.children.len(), 4, "{:?}", root.children);

    let first = log.node(root.children[0]);
    assert_eq!(first.namespace.as_str(), "ns");
    assert_eq!(first.timestamp, 400);
    assert_eq!(first.exit_stamp, 700);

    let second = log.node(root.children[1]);
    assert_eq!(second.namespace.as_str(), "ns2");
    assert_eq!(second.timestamp, 700);
    assert_eq!(second.exit_stamp, 725);

    let dml = log.node(root.children[2]);
    assert_eq!(dml.event, "DML_BEGIN");

    let third = log.node(root.children[3]);
    assert_eq!(third.namespace.as_str(), "ns2");
    assert_eq!(third.timestamp, 800);
    assert_eq!(third.exit_stamp, 1100);
}

/// S4 — SOQL with explain: `SOQL_EXECUTE_BEGIN` carries `aggregations`,
/// its child `SOQL_EXECUTE_EXPLAIN` carries the plan fields, and the row
/// count arrives on `SOQL_EXECUTE_END`.
#[test]
fn s4_soql_execute_with_explain_child() {
    let text = "\
00:00:00.0 (1)|EXECUTION_STARTED
00:00:00.0 (2)|SOQL_EXECUTE_BEGIN|[7]|Aggregations:2|SELECT Id FROM Obj
00:00:00.0 (3)|SOQL_EXECUTE_EXPLAIN|[895]|TableScan on Obj : [F1, F2], cardinality: 2, sobjectCardinality: 2, relativeCost 1.3
00:00:00.0 (4)|SOQL_EXECUTE_END|[7]|Rows:50
00:00:00.0 (5)|EXECUTION_FINISHED
";
    let log = parse_default(text);
    let root = log.node(log.children[0]);
    let soql = log.node(root.children[0]);
    assert_eq!(soql.event, "SOQL_EXECUTE_BEGIN");
    assert_eq!(soql.aggregations, Some(2));
    assert_eq!(soql.sobject_type.as_deref(), Some("Obj"));
    assert_eq!(soql.soql_row_count.self_count, 50);
    assert_eq!(soql.soql_row_count.total, 50);
    assert_eq!(soql.soql_count.self_count, 1);
    assert_eq!(soql.soql_count.total, 1);
    assert_eq!(soql.row_count, Some(50));

    assert_eq!(soql.children.len(), 1);
    let explain = log.node(soql.children[0]);
    assert_eq!(explain.event, "SOQL_EXECUTE_EXPLAIN");
    assert_eq!(explain.fields, vec!["F1".to_string(), "F2".to_string()]);
    assert_eq!(explain.leading_operation_type.as_deref(), Some("TableScan"));
    assert_eq!(explain.relative_cost, Some(1.3));
    assert_eq!(explain.cardinality, Some(2));
    assert_eq!(explain.sobject_cardinality, Some(2));
}

/// S5 — governor limits: two `LIMIT_USAGE_FOR_NS` blocks sum into
/// `aggregate`, and the root's `cpu_time` is the `(default)` block's
/// `Maximum CPU time`, converted from milliseconds to nanoseconds.
#[test]
fn s5_governor_limits_by_namespace_and_aggregate() {
    let text = "\
00:00:00.0 (100)|CUMULATIVE_LIMIT_USAGE
00:00:00.0 (100)|LIMIT_USAGE_FOR_NS|(default)
  Number of SOQL queries: 1 out of 100
  Maximum CPU time: 500 out of 10000
00:00:00.0 (100)|LIMIT_USAGE_FOR_NS|myNS
  Number of SOQL queries: 3 out of 100
00:00:00.0 (100)|CUMULATIVE_LIMIT_USAGE_END
00:00:00.0 (200)|EXECUTION_STARTED
00:00:00.0 (300)|EXECUTION_FINISHED
";
    let log = parse_default(text);
    let default_ns = Namespace::default_namespace();
    let my_ns = Namespace::new("myNS");
    assert_eq!(log.governor_limits.by_namespace.len(), 2);
    assert_eq!(log.governor_limits.by_namespace[&default_ns].soql_queries.used, 1);
    assert_eq!(log.governor_limits.by_namespace[&my_ns].soql_queries.used, 3);
    assert_eq!(log.governor_limits.aggregate.soql_queries.used, 4);
    assert_eq!(log.cpu_time, 500_000_000);
}
