//! Declarative SOQL lint rules (spec.md §4.9).
//!
//! Each rule is a small, independent function over the parsed query (plus,
//! for one rule, the enclosing tree node); [`lint`] runs the fixed rule set
//! and returns every finding that fired. Findings are purely additive —
//! there is no notion of a rule suppressing another.

use apex_log_core::Severity;
use apex_log_parser::TreeNode;

use crate::error::SoqlSyntaxError;
use crate::parser::{parse_soql, SoqlQuery};

/// One lint result (spec.md §4.9): a fixed rule's name, a human-readable
/// message, and its severity.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Finding {
    pub summary: &'static str,
    pub message: String,
    pub severity: Severity,
}

/// Parses `query_text` and runs the fixed SOQL rule set over it.
///
/// `enclosing` is the tree node the query was executed under, if known; only
/// the trigger-selectivity rule consults it (spec.md §4.9's rule table).
pub fn lint(query_text: &str, enclosing: Option<&TreeNode>) -> Result<Vec<Finding>, SoqlSyntaxError> {
    let query = parse_soql(query_text)?;

    let mut findings = Vec::new();
    findings.extend(rule_unbounded_query(&query));
    findings.extend(rule_leading_wildcard_like(&query));
    findings.extend(rule_negative_operator(&query));
    findings.extend(rule_order_by_without_limit(&query));
    findings.extend(rule_last_modified_date_upper_bound(&query));
    findings.extend(rule_trigger_non_selectivity(&query, enclosing));
    Ok(findings)
}

fn is_selective(query: &SoqlQuery) -> bool {
    query.where_clause.is_some() || query.limit_value().is_some()
}

fn rule_unbounded_query(query: &SoqlQuery) -> Option<Finding> {
    if query.where_clause.is_none() && query.limit_value().is_none() {
        Some(Finding {
            summary: "Unbounded query",
            message: format!(
                "Query against {} has no WHERE clause and no LIMIT; it may scan and return an unbounded number of rows",
                query.from_object()
            ),
            severity: Severity::Warning,
        })
    } else {
        None
    }
}

fn rule_leading_wildcard_like(query: &SoqlQuery) -> Option<Finding> {
    let where_clause = query.where_clause.as_deref()?;
    if contains_leading_wildcard_like(where_clause) {
        Some(Finding {
            summary: "Leading wildcard LIKE",
            message: "LIKE comparisons starting with '%' cannot use an index and force a full scan".to_string(),
            severity: Severity::Warning,
        })
    } else {
        None
    }
}

fn contains_leading_wildcard_like(where_clause: &str) -> bool {
    let lower = where_clause.to_ascii_lowercase();
    let mut search_from = 0;
    while let Some(rel) = lower[search_from..].find("like") {
        let idx = search_from + rel;
        let rest = lower[idx + "like".len()..].trim_start();
        if rest.starts_with("'%") {
            return true;
        }
        search_from = idx + "like".len();
    }
    false
}

fn rule_negative_operator(query: &SoqlQuery) -> Option<Finding> {
    let where_clause = query.where_clause.as_deref()?;
    if contains_negative_operator(where_clause) {
        Some(Finding {
            summary: "Negative operator",
            message: "Negative comparisons (!=, <>, NOT, NOT IN, EXCLUDES) typically cannot use an index".to_string(),
            severity: Severity::Warning,
        })
    } else {
        None
    }
}

fn contains_negative_operator(where_clause: &str) -> bool {
    if where_clause.contains("!=") || where_clause.contains("<>") {
        return true;
    }
    let lower = where_clause.to_ascii_lowercase();
    contains_word(&lower, "not") || contains_word(&lower, "excludes")
}

fn contains_word(haystack: &str, word: &str) -> bool {
    let bytes = haystack.as_bytes();
    let mut search_from = 0;
    while let Some(rel) = haystack[search_from..].find(word) {
        let idx = search_from + rel;
        let before_ok = idx == 0 || !bytes[idx - 1].is_ascii_alphanumeric() && bytes[idx - 1] != b'_';
        let after = idx + word.len();
        let after_ok = after >= bytes.len() || !bytes[after].is_ascii_alphanumeric() && bytes[after] != b'_';
        if before_ok && after_ok {
            return true;
        }
        search_from = idx + word.len();
    }
    false
}

fn rule_order_by_without_limit(query: &SoqlQuery) -> Option<Finding> {
    if query.is_ordered() && query.limit_value().is_none() {
        Some(Finding {
            summary: "ORDER BY without LIMIT",
            message: "An ORDER BY with no LIMIT sorts and returns every matching row".to_string(),
            severity: Severity::Info,
        })
    } else {
        None
    }
}

fn rule_last_modified_date_upper_bound(query: &SoqlQuery) -> Option<Finding> {
    let where_clause = query.where_clause.as_deref()?;
    let lower = where_clause.to_ascii_lowercase();
    if let Some(idx) = lower.find("lastmodifieddate") {
        let rest = lower[idx + "lastmodifieddate".len()..].trim_start();
        if rest.starts_with("<=") || (rest.starts_with('<') && !rest.starts_with("<>")) {
            return Some(Finding {
                summary: "LastModifiedDate upper bound",
                message: "An upper bound on LastModifiedDate excludes rows modified after the filter was last widened; confirm this is intentional".to_string(),
                severity: Severity::Info,
            });
        }
    }
    None
}

/// spec.md §4.9's rule table: "lint called with a parent node whose `text`
/// matches `… on … trigger event …`, and the query is not selective by the
/// same criteria as [the unbounded-query rule]."
fn rule_trigger_non_selectivity(query: &SoqlQuery, enclosing: Option<&TreeNode>) -> Option<Finding> {
    let node = enclosing?;
    if !looks_like_trigger_context(&node.text) {
        return None;
    }
    if is_selective(query) {
        return None;
    }
    Some(Finding {
        summary: "Trigger non-selectivity",
        message: format!(
            "Query against {} runs inside a trigger with no WHERE/LIMIT; unselective queries in triggers multiply with batch size",
            query.from_object()
        ),
        severity: Severity::Warning,
    })
}

fn looks_like_trigger_context(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    lower.contains(" on ") && lower.contains("trigger event")
}

#[cfg(test)]
mod tests {
    use super::*;
    use apex_log_core::{Counter, Duration, Namespace};
    use pretty_assertions::assert_eq;

    fn summaries(findings: &[Finding]) -> Vec<&'static str> {
        findings.iter().map(|f| f.summary).collect()
    }

    fn node_with_text(text: &str) -> TreeNode {
        TreeNode {
            event: "CODE_UNIT_STARTED",
            text: text.to_string(),
            suffix: None,
            namespace: Namespace::default_namespace(),
            timestamp: 0,
            exit_stamp: 0,
            duration: Duration::ZERO,
            is_exit: false,
            exit_types: &[],
            soql_count: Counter::ZERO,
            soql_row_count: Counter::ZERO,
            dml_count: Counter::ZERO,
            dml_row_count: Counter::ZERO,
            sosl_count: Counter::ZERO,
            sosl_row_count: Counter::ZERO,
            total_thrown_count: Counter::ZERO,
            code_unit_type: None,
            aggregations: None,
            row_count: None,
            sobject_type: None,
            fields: Vec::new(),
            cardinality: None,
            sobject_cardinality: None,
            relative_cost: None,
            leading_operation_type: None,
            parent: None,
            children: Vec::new(),
            closed_implicitly: false,
        }
    }

    /// spec.md §8 S7.
    #[test]
    fn unbounded_query_is_flagged() {
        let findings = lint("SELECT Id FROM T", None).unwrap();
        assert!(summaries(&findings).contains(&"Unbounded query"));
    }

    #[test]
    fn leading_wildcard_like_is_flagged() {
        let findings = lint("SELECT Id FROM T WHERE Name LIKE '%x'", None).unwrap();
        assert!(summaries(&findings).contains(&"Leading wildcard LIKE"));
    }

    #[test]
    fn order_by_without_limit_is_flagged() {
        let findings = lint("SELECT Id FROM T ORDER BY F", None).unwrap();
        assert!(summaries(&findings).contains(&"ORDER BY without LIMIT"));
    }

    #[test]
    fn order_by_with_limit_is_clean() {
        let findings = lint("SELECT Id FROM T ORDER BY F LIMIT 10", None).unwrap();
        assert!(findings.is_empty(), "{findings:?}");
    }

    #[test]
    fn negative_operator_variants_are_all_flagged() {
        for query in [
            "SELECT Id FROM T WHERE Status != 'Closed' LIMIT 1",
            "SELECT Id FROM T WHERE Status <> 'Closed' LIMIT 1",
            "SELECT Id FROM T WHERE NOT Status = 'Closed' LIMIT 1",
        ] {
            let findings = lint(query, None).unwrap();
            assert!(summaries(&findings).contains(&"Negative operator"), "{query}");
        }
    }

    #[test]
    fn last_modified_date_upper_bound_is_flagged() {
        let findings = lint("SELECT Id FROM T WHERE LastModifiedDate < 2024-01-01T00:00:00Z LIMIT 10", None).unwrap();
        assert!(summaries(&findings).contains(&"LastModifiedDate upper bound"));
    }

    #[test]
    fn trigger_context_escalates_an_otherwise_unbounded_query() {
        let trigger_node = node_with_text("AccountTrigger on Account trigger event BeforeInsert");
        let findings = lint("SELECT Id FROM Account", Some(&trigger_node)).unwrap();
        assert!(summaries(&findings).contains(&"Trigger non-selectivity"));
    }

    #[test]
    fn selective_query_in_a_trigger_does_not_escalate() {
        let trigger_node = node_with_text("AccountTrigger on Account trigger event BeforeInsert");
        let findings = lint("SELECT Id FROM Account WHERE Id != null LIMIT 10", Some(&trigger_node)).unwrap();
        assert!(!summaries(&findings).contains(&"Trigger non-selectivity"));
    }
}
