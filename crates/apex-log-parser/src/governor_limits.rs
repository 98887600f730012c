//! Governor-limit usage blocks (`CUMULATIVE_LIMIT_USAGE` ... `_END`).
//!
//! These blocks have no scoping relationship to the execution tree — they're
//! a snapshot dumped at checkpoints, not part of the entry/exit stack — and
//! their metric lines aren't pipe-delimited at all (spec.md §4.5). Rather
//! than teach [`crate::tokenizer::LineTokenizer`] a second line grammar,
//! [`GovernorLimitsCollector`] runs as an independent pass over the raw text
//! first; [`crate::parse`] then hides the consumed lines from the tokenizer
//! entirely, the same way the teacher's `nova-classfile` reader isolates the
//! constant pool from the bytecode stream before either is interpreted.

use std::collections::BTreeMap;

use apex_log_core::Namespace;
use serde::Serialize;

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Serialize)]
pub struct LimitValue {
    pub used: u64,
    pub limit: u64,
}

impl LimitValue {
    fn add(&mut self, other: LimitValue) {
        self.used = self.used.saturating_add(other.used);
        self.limit = self.limit.saturating_add(other.limit);
    }
}

/// One namespace's worth of limit usage (spec.md §4.5). Field names mirror
/// the metric labels that appear in the log, not the internal Salesforce
/// limit identifiers.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GovernorLimitSet {
    pub soql_queries: LimitValue,
    pub soql_rows: LimitValue,
    pub sosl_queries: LimitValue,
    pub dml_statements: LimitValue,
    pub publish_immediate_dml: LimitValue,
    pub dml_rows: LimitValue,
    /// Milliseconds, as printed in the log — *not* the nanoseconds used by
    /// `ApexLog::cpu_time` (see DESIGN.md for the unit mismatch this
    /// preserves rather than silently reconciles).
    pub cpu_time: LimitValue,
    pub heap_size: LimitValue,
    pub callouts: LimitValue,
    pub email_invocations: LimitValue,
    pub future_calls: LimitValue,
    pub queueable_jobs: LimitValue,
    pub mobile_push_apex_calls: LimitValue,
}

impl GovernorLimitSet {
    fn add(&mut self, other: &GovernorLimitSet) {
        self.soql_queries.add(other.soql_queries);
        self.soql_rows.add(other.soql_rows);
        self.sosl_queries.add(other.sosl_queries);
        self.dml_statements.add(other.dml_statements);
        self.publish_immediate_dml.add(other.publish_immediate_dml);
        self.dml_rows.add(other.dml_rows);
        self.cpu_time.add(other.cpu_time);
        self.heap_size.add(other.heap_size);
        self.callouts.add(other.callouts);
        self.email_invocations.add(other.email_invocations);
        self.future_calls.add(other.future_calls);
        self.queueable_jobs.add(other.queueable_jobs);
        self.mobile_push_apex_calls.add(other.mobile_push_apex_calls);
    }

    fn apply_metric(&mut self, label: &str, value: LimitValue) {
        match label {
            "Number of SOQL queries" => self.soql_queries = value,
            "Number of query rows" => self.soql_rows = value,
            "Number of SOSL queries" => self.sosl_queries = value,
            "Number of DML statements" => self.dml_statements = value,
            "Number of Publish Immediate DML" => self.publish_immediate_dml = value,
            "Number of DML rows" => self.dml_rows = value,
            "Maximum CPU time" => self.cpu_time = value,
            "Maximum heap size" => self.heap_size = value,
            "Number of callouts" => self.callouts = value,
            "Number of Email Invocations" => self.email_invocations = value,
            "Number of future calls" => self.future_calls = value,
            "Number of queueable jobs added to the queue" => self.queueable_jobs = value,
            "Number of Mobile Apex push calls" => self.mobile_push_apex_calls = value,
            _ => {}
        }
    }
}

/// All governor-limit snapshots recorded in a log, keyed by namespace, plus
/// the cross-namespace sum the original tool exposes as `aggregate`.
///
/// Per spec.md §9's Open Question: `aggregate.<metric>.limit` is a sum of
/// per-namespace limits that are usually identical ceilings, which makes the
/// summed figure not meaningfully a "limit" at all. We reproduce that
/// behavior unchanged rather than silently fixing it — see DESIGN.md.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GovernorLimits {
    pub by_namespace: BTreeMap<Namespace, GovernorLimitSet>,
    pub aggregate: GovernorLimitSet,
}

pub struct GovernorLimitsCollector;

impl GovernorLimitsCollector {
    /// Scans `text` for `CUMULATIVE_LIMIT_USAGE` blocks, returning the
    /// collected limits and a copy of `text` with every consumed line
    /// blanked out (preserving line count, so nothing downstream needs to
    /// renumber anything — blank lines are simply skipped by the tokenizer).
    pub fn collect(text: &str) -> (GovernorLimits, String) {
        let mut limits = GovernorLimits::default();
        let mut filtered = String::with_capacity(text.len());

        let mut in_block = false;
        let mut current_ns: Option<Namespace> = None;

        for line in text.lines() {
            let trimmed_start = line.trim_start();
            let is_indented_metric = in_block
                && current_ns.is_some()
                && !trimmed_start.is_empty()
                && line.starts_with(char::is_whitespace);

            if is_indented_metric {
                if let Some((label, value)) = parse_metric_line(trimmed_start) {
                    let ns = current_ns.clone().unwrap();
                    limits.by_namespace.entry(ns).or_default().apply_metric(label, value);
                }
                filtered.push('\n');
                continue;
            }

            let event_name = line.split('|').nth(1).unwrap_or("");
            match event_name {
                "CUMULATIVE_LIMIT_USAGE" => {
                    in_block = true;
                    filtered.push('\n');
                }
                "LIMIT_USAGE_FOR_NS" if in_block => {
                    let ns_field = line.split('|').nth(2).unwrap_or("").trim();
                    current_ns = Some(parse_ns_field(ns_field));
                    filtered.push('\n');
                }
                "CUMULATIVE_LIMIT_USAGE_END" => {
                    in_block = false;
                    current_ns = None;
                    filtered.push('\n');
                }
                _ => {
                    filtered.push_str(line);
                    filtered.push('\n');
                }
            }
        }

        for set in limits.by_namespace.values() {
            limits.aggregate.add(set);
        }

        (limits, filtered)
    }
}

fn parse_ns_field(field: &str) -> Namespace {
    if field.is_empty() || field.eq_ignore_ascii_case("(default)") {
        Namespace::default_namespace()
    } else {
        Namespace::new(field)
    }
}

/// Parses `"Number of SOQL queries: 1 out of 100"` into the label and the
/// used/limit pair. Lines that don't match (blank separators, unrecognized
/// future metrics) are ignored rather than surfaced as parsing errors —
/// these lines are supplementary detail, not structural.
fn parse_metric_line(line: &str) -> Option<(&str, LimitValue)> {
    let (label, rest) = line.split_once(':')?;
    let rest = rest.trim();
    let (used_str, limit_str) = rest.split_once(" out of ")?;
    let used = used_str.trim().parse().ok()?;
    let limit = limit_str.trim().parse().ok()?;
    Some((label.trim(), LimitValue { used, limit }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn collects_default_namespace_block_and_blanks_consumed_lines() {
        let text = "\
09:00:00.1 (100)|CUMULATIVE_LIMIT_USAGE
09:00:00.1 (100)|LIMIT_USAGE_FOR_NS|(default)
  Number of SOQL queries: 1 out of 100
  Number of DML statements: 2 out of 150
  Maximum CPU time: 500 out of 10000
09:00:00.1 (100)|CUMULATIVE_LIMIT_USAGE_END
09:00:00.2 (200)|EXECUTION_STARTED
";
        let (limits, filtered) = GovernorLimitsCollector::collect(text);
        let default_ns = Namespace::default_namespace();
        let set = limits.by_namespace.get(&default_ns).unwrap();
        assert_eq!(set.soql_queries, LimitValue { used: 1, limit: 100 });
        assert_eq!(set.dml_statements, LimitValue { used: 2, limit: 150 });
        assert_eq!(set.cpu_time, LimitValue { used: 500, limit: 10000 });
        assert_eq!(limits.aggregate.soql_queries, LimitValue { used: 1, limit: 100 });
        assert!(filtered.contains("EXECUTION_STARTED"));
        assert!(!filtered.contains("CUMULATIVE_LIMIT_USAGE"));
        assert!(!filtered.contains("Number of SOQL queries"));
    }

    #[test]
    fn aggregates_multiple_namespaces() {
        let text = "\
09:00:00.1 (100)|CUMULATIVE_LIMIT_USAGE
09:00:00.1 (100)|LIMIT_USAGE_FOR_NS|(default)
  Number of SOQL queries: 1 out of 100
09:00:00.1 (100)|LIMIT_USAGE_FOR_NS|ns2
  Number of SOQL queries: 3 out of 100
09:00:00.1 (100)|CUMULATIVE_LIMIT_USAGE_END
";
        let (limits, _) = GovernorLimitsCollector::collect(text);
        assert_eq!(limits.by_namespace.len(), 2);
        assert_eq!(limits.aggregate.soql_queries, LimitValue { used: 4, limit: 200 });
    }
}
