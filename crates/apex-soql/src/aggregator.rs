//! Aggregates database access across a parsed log by query/DML "shape"
//! (spec.md §2/§4: `DatabaseAggregator`).
//!
//! Two statements with the same object and clause structure but different
//! literal values (`WHERE Id = '001...'` vs `WHERE Id = '001...2'`) are the
//! same shape to an operator trying to find a hot query; this groups them
//! under one fingerprint rather than reporting each literal variant
//! separately, the standard technique APM tools use for query fingerprinting.

use std::collections::HashMap;

use apex_log_core::Nanos;
use apex_log_parser::ApexLog;

use crate::parser::parse_soql;

/// Per-fingerprint rollup reported by [`aggregate_database_access`].
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DatabaseAccessSummary {
    pub kind: AccessKind,
    /// Object/clause shape with literals blanked, or the DML `Op Type` text.
    pub fingerprint: String,
    pub count: u64,
    pub total_rows: u64,
    pub total_time_nanos: Nanos,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum AccessKind {
    Soql,
    Dml,
}

#[derive(Default)]
struct Accumulator {
    count: u64,
    total_rows: u64,
    total_time_nanos: Nanos,
}

/// Walks every `SOQL_EXECUTE_BEGIN`/`DML_BEGIN` node in `log` and rolls them
/// up by fingerprint. Order of the returned summaries is unspecified.
pub fn aggregate_database_access(log: &ApexLog) -> Vec<DatabaseAccessSummary> {
    let mut by_key: HashMap<(AccessKind, String), Accumulator> = HashMap::new();

    for (_, node) in log.nodes() {
        let (kind, fingerprint, rows) = match node.event {
            "SOQL_EXECUTE_BEGIN" => (AccessKind::Soql, soql_fingerprint(&node.text), node.soql_row_count.self_count),
            "DML_BEGIN" => (AccessKind::Dml, node.text.clone(), node.dml_row_count.self_count),
            _ => continue,
        };

        let entry = by_key.entry((kind, fingerprint)).or_default();
        entry.count += 1;
        entry.total_rows += rows;
        entry.total_time_nanos += node.duration.total;
    }

    by_key
        .into_iter()
        .map(|((kind, fingerprint), acc)| DatabaseAccessSummary {
            kind,
            fingerprint,
            count: acc.count,
            total_rows: acc.total_rows,
            total_time_nanos: acc.total_time_nanos,
        })
        .collect()
}

/// Builds a fingerprint for a SOQL statement: the target object plus its
/// clause text with every literal blanked, falling back to the blanked raw
/// text if the statement doesn't parse (a malformed query still has a shape
/// worth counting).
fn soql_fingerprint(raw_query: &str) -> String {
    match parse_soql(raw_query) {
        Ok(query) => format!("{}:{}", query.from_object(), blank_literals(&query.raw)),
        Err(_) => format!("<unparsed>:{}", blank_literals(raw_query)),
    }
}

/// Replaces every quoted string literal with `?` and every standalone
/// numeric literal with `#`, leaving identifiers, operators, and bind
/// variables (`:var`) untouched.
fn blank_literals(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\'' {
            out.push('?');
            i += 1;
            while i < bytes.len() && bytes[i] != b'\'' {
                i += 1;
            }
            if i < bytes.len() {
                i += 1;
            }
        } else if b.is_ascii_digit() && (i == 0 || !is_ident_byte(bytes[i - 1])) {
            out.push('#');
            i += 1;
            while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                i += 1;
            }
        } else {
            out.push(b as char);
            i += 1;
        }
    }
    out
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn blanks_string_and_numeric_literals() {
        assert_eq!(blank_literals("WHERE Id = '001x' AND Amount > 100"), "WHERE Id = ? AND Amount > #");
    }

    #[test]
    fn leaves_bind_variables_and_identifiers_alone() {
        assert_eq!(blank_literals("WHERE Id = :accountId"), "WHERE Id = :accountId");
    }

    #[test]
    fn same_shape_different_literals_share_a_fingerprint() {
        assert_eq!(
            soql_fingerprint("SELECT Id FROM Account WHERE Name = 'Acme'"),
            soql_fingerprint("SELECT Id FROM Account WHERE Name = 'Globex'"),
        );
    }

    #[test]
    fn different_objects_do_not_share_a_fingerprint() {
        assert_ne!(
            soql_fingerprint("SELECT Id FROM Account"),
            soql_fingerprint("SELECT Id FROM Contact"),
        );
    }
}
