use apex_log_parser::{parse, ParserOptions};
use apex_soql::{aggregate_database_access, lint, AccessKind};
use pretty_assertions::assert_eq;

/// spec.md §8 S7: unbounded query, leading-wildcard LIKE, and ORDER BY
/// without LIMIT each fire independently; a bounded, non-wildcard query with
/// a LIMIT produces no findings.
#[test]
fn s7_unbounded_query_is_flagged() {
    let findings = lint("SELECT Id, Name FROM Account", None).unwrap();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].summary, "Unbounded query");
}

#[test]
fn s7_leading_wildcard_like_is_flagged() {
    let findings = lint("SELECT Id FROM Contact WHERE Name LIKE '%smith' LIMIT 50", None).unwrap();
    assert!(findings.iter().any(|f| f.summary == "Leading wildcard LIKE"));
}

#[test]
fn s7_order_by_without_limit_is_flagged() {
    let findings = lint("SELECT Id FROM Opportunity WHERE StageName = 'Open' ORDER BY CreatedDate DESC", None).unwrap();
    assert!(findings.iter().any(|f| f.summary == "ORDER BY without LIMIT"));
}

#[test]
fn s7_bounded_selective_limited_query_has_no_findings() {
    let findings = lint("SELECT Id FROM Account WHERE Name = 'Acme' LIMIT 10", None).unwrap();
    assert!(findings.is_empty(), "{findings:?}");
}

#[test]
fn aggregates_repeated_soql_and_dml_across_a_parsed_log() {
    let text = "\
00:00:00.1 (1000)|EXECUTION_STARTED
00:00:00.1 (1100)|CODE_UNIT_STARTED|[EXTERNAL]|066d|MyBatch.execute()
00:00:00.1 (1200)|SOQL_EXECUTE_BEGIN|[10]|Aggregations:0|SELECT Id FROM Account WHERE Name = 'Acme'
00:00:00.1 (1300)|SOQL_EXECUTE_END|[10]|Rows:5
00:00:00.1 (1400)|SOQL_EXECUTE_BEGIN|[10]|Aggregations:0|SELECT Id FROM Account WHERE Name = 'Globex'
00:00:00.1 (1500)|SOQL_EXECUTE_END|[10]|Rows:3
00:00:00.1 (1600)|DML_BEGIN|[20]|Op:Insert|Type:Account|Rows:1
00:00:00.1 (1700)|DML_END|[20]
00:00:00.1 (1800)|CODE_UNIT_FINISHED|MyBatch.execute()
00:00:00.1 (1900)|EXECUTION_FINISHED
";
    let log = parse(text, ParserOptions::default());
    let summaries = aggregate_database_access(&log);

    let soql = summaries
        .iter()
        .find(|s| s.kind == AccessKind::Soql)
        .expect("one SOQL fingerprint for both Account queries");
    assert_eq!(soql.count, 2);
    assert_eq!(soql.total_rows, 8);

    let dml = summaries.iter().find(|s| s.kind == AccessKind::Dml).expect("one DML fingerprint");
    assert_eq!(dml.count, 1);
    assert_eq!(dml.total_rows, 1);
    assert_eq!(dml.fingerprint, "Insert Account");
}
