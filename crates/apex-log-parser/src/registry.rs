//! The static event-name → behavior table (spec.md §4.2).
//!
//! Dispatch is a single exhaustive `match` over the event-name string rather
//! than a runtime-built `HashMap`, following the teacher's preference for
//! `match`-driven tables in hot paths (e.g. `nova-classfile`'s constant-pool
//! tag dispatch). [`EventDescriptor`] carries everything [`crate::builder::TreeBuilder`]
//! needs to know about a tag without special-casing it by name again.

use apex_log_core::{parse_object_namespace, Namespace};

use crate::line_record::{LineDetails, LineRecord};
use crate::tree::{LineRef, TreeNode};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ScopeRole {
    Entry,
    Exit,
    Leaf,
}

pub type OnEnd = fn(&mut TreeNode, &LineRecord);

/// Like [`OnEnd`], but also receives the text of the nearest enclosing
/// `CODE_UNIT_STARTED`, if any. Only `FLOW_START_INTERVIEWS_BEGIN` needs this
/// (spec.md §4.2: classify the interview as Flow vs Process Builder from the
/// enclosing code unit) — the arena has no parent-pointer shortcut for the
/// original's "walk up to my enclosing code unit" the way its GC'd graph did,
/// so the builder resolves this once per close and hands it down.
pub type OnEndWithAncestor = fn(&mut TreeNode, &LineRecord, Option<&str>);

#[derive(Copy, Clone)]
pub struct EventDescriptor {
    pub name: &'static str,
    pub role: ScopeRole,
    pub exit_types: &'static [&'static str],
    /// Entry tags with no textual exit counterpart (spec.md §4.2/§4.3).
    pub pseudo_exit: bool,
    /// Lines that may start stack unwinding without an `Unexpected-End`.
    pub discontinuity: bool,
    /// `true` only for `FLOW_VALUE_ASSIGNMENT`: subsequent lines lacking a
    /// valid timestamp prefix are folded into this record's `text`.
    pub multiline_tail: bool,
    pub parse_fields: fn(fields: &[&str]) -> (String, Namespace, LineDetails),
    /// Runs once, right after the node is opened. Only `DML_BEGIN` uses this
    /// — its row count is printed on the *begin* line, unlike SOQL/SOSL
    /// where it's only known once the matching end line arrives.
    pub on_start: Option<OnEnd>,
    pub on_end: Option<OnEnd>,
    /// Mutually exclusive with `on_end` in practice (only
    /// `FLOW_START_INTERVIEWS_BEGIN` sets this one) but kept as a separate
    /// field rather than folding ancestor lookup into every `on_end` call,
    /// since every other hook has no use for it.
    pub on_end_with_ancestor: Option<OnEndWithAncestor>,
}

/// Splits a leading `[N]` / `[EXTERNAL]` bracket off of a field list, as used
/// by most (but not all — `CODE_UNIT_FINISHED`, `ENTERING_MANAGED_PKG` don't
/// carry one) event types.
pub fn split_leading_line_ref(fields: &[&str]) -> (Option<LineRef>, &[&str]) {
    match fields.first() {
        Some(first) if first.starts_with('[') && first.ends_with(']') => {
            let inner = &first[1..first.len() - 1];
            let parsed = if inner == "EXTERNAL" {
                LineRef::External
            } else {
                match inner.parse::<u32>() {
                    Ok(n) => LineRef::Known(n),
                    Err(_) => return (None, fields),
                }
            };
            (Some(parsed), &fields[1..])
        }
        _ => (None, fields),
    }
}

fn join_remaining(fields: &[&str]) -> String {
    fields.join("|")
}

fn plain(fields: &[&str]) -> (String, Namespace, LineDetails) {
    let (_, rest) = split_leading_line_ref(fields);
    (join_remaining(rest), Namespace::default_namespace(), LineDetails::default())
}

/// `ns.Type:...` / `ns.Trigger on ...` -> `ns`, provided there's at least
/// one more dotted segment (spec.md §4.2).
fn namespace_from_code_unit_text(text: &str) -> Namespace {
    match text.split_once('.') {
        Some((prefix, rest)) if !prefix.is_empty() && !rest.is_empty() => Namespace::new(prefix),
        _ => Namespace::default_namespace(),
    }
}

fn code_unit_started(fields: &[&str]) -> (String, Namespace, LineDetails) {
    let (_, rest) = split_leading_line_ref(fields);
    // `[id, text]` once the line-ref bracket is stripped; older/newer log
    // versions sometimes omit the id, so fall back to treating the whole
    // remainder as text.
    let text = match rest.len() {
        0 => String::new(),
        1 => rest[0].to_string(),
        _ => rest[1..].join("|"),
    };
    let namespace = namespace_from_code_unit_text(&text);
    (text, namespace, LineDetails::default())
}

pub fn classify_code_unit(text: &str) -> &'static str {
    let lower = text.to_ascii_lowercase();
    if lower.contains("vfremote") {
        "VisualforceRemoting"
    } else if lower.contains(" on ") && lower.contains("trigger") {
        "Trigger"
    } else if lower.starts_with("execute_anonymous_apex") {
        "Anonymous"
    } else if lower.starts_with("__sfdc_trigger") {
        "Trigger"
    } else {
        "Method"
    }
}

fn on_end_code_unit_started(node: &mut TreeNode, exit: &LineRecord) {
    node.code_unit_type = Some(classify_code_unit(&exit.text).to_string());
}

fn code_unit_finished(fields: &[&str]) -> (String, Namespace, LineDetails) {
    let text = fields.join("|");
    let namespace = namespace_from_code_unit_text(&text);
    (text, namespace, LineDetails::default())
}

fn entering_managed_pkg(fields: &[&str]) -> (String, Namespace, LineDetails) {
    let ns_text = fields.first().copied().unwrap_or("");
    let namespace = if ns_text.is_empty() {
        Namespace::default_namespace()
    } else {
        Namespace::new(ns_text)
    };
    (ns_text.to_string(), namespace, LineDetails::default())
}

fn soql_execute_begin(fields: &[&str]) -> (String, Namespace, LineDetails) {
    let (_, rest) = split_leading_line_ref(fields);
    let mut details = LineDetails::default();
    let mut text_parts = Vec::new();
    for field in rest {
        if let Some(n) = field.strip_prefix("Aggregations:") {
            details.aggregations = n.trim().parse().ok();
        } else {
            text_parts.push(*field);
        }
    }
    let text = text_parts.join("|");
    details.sobject_type = extract_soql_from_object(&text);
    (text, Namespace::default_namespace(), details)
}

/// Pulls the object name out of a SOQL statement's top-level `FROM` clause
/// (spec.md §3's `sObjectType`), e.g. `SELECT Id FROM Account WHERE ...` ->
/// `Account`. Deliberately shallow: this only needs the first word after the
/// first `FROM`, not a full parse of the statement.
fn extract_soql_from_object(query_text: &str) -> Option<String> {
    let lower = query_text.to_ascii_lowercase();
    let mut search_from = 0;
    while let Some(rel) = lower[search_from..].find("from") {
        let idx = search_from + rel;
        let before_ok = idx == 0 || !lower.as_bytes()[idx - 1].is_ascii_alphanumeric() && lower.as_bytes()[idx - 1] != b'_';
        let after = idx + "from".len();
        let after_ok = lower.as_bytes().get(after).is_some_and(|b| b.is_ascii_whitespace());
        if before_ok && after_ok {
            let rest = query_text[after..].trim_start();
            let end = rest
                .char_indices()
                .find(|(_, c)| !(c.is_alphanumeric() || *c == '_'))
                .map(|(i, _)| i)
                .unwrap_or(rest.len());
            if end > 0 {
                return Some(rest[..end].to_string());
            }
        }
        search_from = idx + "from".len();
    }
    None
}

fn soql_execute_end(fields: &[&str]) -> (String, Namespace, LineDetails) {
    let (_, rest) = split_leading_line_ref(fields);
    let mut details = LineDetails::default();
    for field in rest {
        if let Some(n) = field.strip_prefix("Rows:") {
            details.row_count = n.trim().parse().ok();
        }
    }
    (String::new(), Namespace::default_namespace(), details)
}

fn on_end_soql_execute_begin(node: &mut TreeNode, exit: &LineRecord) {
    let rows = exit.details.row_count.unwrap_or(0);
    node.soql_row_count = apex_log_core::Counter::leaf(rows);
    node.soql_count = apex_log_core::Counter::leaf(1);
    node.row_count = exit.details.row_count;
}

/// Parses a `SOQL_EXECUTE_EXPLAIN` payload of the form:
/// `TableScan on Obj : [F1, F2], cardinality: 2, sobjectCardinality: 2, relativeCost 1.3`
pub fn parse_soql_explain(text: &str) -> LineDetails {
    let mut details = LineDetails::default();

    if let Some(on_idx) = text.find(" on ") {
        details.leading_operation_type = Some(text[..on_idx].trim().to_string());
    }

    if let (Some(start), Some(end)) = (text.find('['), text.find(']')) {
        if end > start {
            details.fields = text[start + 1..end]
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
    }

    if let Some(idx) = text.find("sobjectCardinality:") {
        let rest = &text[idx + "sobjectCardinality:".len()..];
        details.sobject_cardinality = first_number(rest).and_then(|n| n.parse().ok());
    }
    if let Some(idx) = text.find("cardinality:") {
        // Guard against also matching the tail of `sobjectCardinality:` by
        // checking the preceding byte isn't part of that longer word.
        let preceding_is_sobject = text[..idx].ends_with("sobject");
        if !preceding_is_sobject {
            let rest = &text[idx + "cardinality:".len()..];
            details.cardinality = first_number(rest).and_then(|n| n.parse().ok());
        }
    }
    if let Some(idx) = text.find("relativeCost") {
        let rest = &text[idx + "relativeCost".len()..];
        details.relative_cost = first_number(rest).and_then(|n| n.parse().ok());
    }

    details
}

fn first_number(s: &str) -> Option<&str> {
    let s = s.trim_start();
    let end = s
        .char_indices()
        .take_while(|(_, c)| c.is_ascii_digit() || *c == '.')
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    if end == 0 {
        None
    } else {
        Some(&s[..end])
    }
}

fn soql_execute_explain(fields: &[&str]) -> (String, Namespace, LineDetails) {
    let (_, rest) = split_leading_line_ref(fields);
    let text = rest.join("|");
    let details = parse_soql_explain(&text);
    (text, Namespace::default_namespace(), details)
}

fn sosl_execute_begin(fields: &[&str]) -> (String, Namespace, LineDetails) {
    let (_, rest) = split_leading_line_ref(fields);
    (rest.join("|"), Namespace::default_namespace(), LineDetails::default())
}

fn sosl_execute_end(fields: &[&str]) -> (String, Namespace, LineDetails) {
    let (_, rest) = split_leading_line_ref(fields);
    let mut details = LineDetails::default();
    for field in rest {
        if let Some(n) = field.strip_prefix("Rows:") {
            details.row_count = n.trim().parse().ok();
        }
    }
    (String::new(), Namespace::default_namespace(), details)
}

fn on_end_sosl_execute_begin(node: &mut TreeNode, exit: &LineRecord) {
    let rows = exit.details.row_count.unwrap_or(0);
    node.sosl_row_count = apex_log_core::Counter::leaf(rows);
    node.sosl_count = apex_log_core::Counter::leaf(1);
    node.row_count = exit.details.row_count;
}

fn dml_begin(fields: &[&str]) -> (String, Namespace, LineDetails) {
    let (_, rest) = split_leading_line_ref(fields);
    let mut details = LineDetails::default();
    let mut object_ns = None;
    for field in rest {
        if let Some(v) = field.strip_prefix("Op:") {
            details.dml_op = Some(v.to_string());
        } else if let Some(v) = field.strip_prefix("Type:") {
            details.dml_type = Some(v.to_string());
            object_ns = Some(parse_object_namespace(v));
        } else if let Some(v) = field.strip_prefix("Rows:") {
            details.dml_rows = v.trim().parse().ok();
        }
    }
    let namespace = object_ns.unwrap_or_else(Namespace::default_namespace);
    let text = match (&details.dml_op, &details.dml_type) {
        (Some(op), Some(ty)) => format!("{op} {ty}"),
        (Some(op), None) => op.clone(),
        (None, Some(ty)) => ty.clone(),
        (None, None) => String::new(),
    };
    (text, namespace, details)
}

fn on_start_dml_begin(node: &mut TreeNode, entry: &LineRecord) {
    node.dml_count = apex_log_core::Counter::leaf(1);
    node.dml_row_count = apex_log_core::Counter::leaf(entry.details.dml_rows.unwrap_or(0));
}

fn dml_end(fields: &[&str]) -> (String, Namespace, LineDetails) {
    let (_, rest) = split_leading_line_ref(fields);
    (rest.join("|"), Namespace::default_namespace(), LineDetails::default())
}

fn exception_thrown(fields: &[&str]) -> (String, Namespace, LineDetails) {
    let (_, rest) = split_leading_line_ref(fields);
    (rest.join("|"), Namespace::default_namespace(), LineDetails::default())
}

fn fatal_error(fields: &[&str]) -> (String, Namespace, LineDetails) {
    (fields.join("|"), Namespace::default_namespace(), LineDetails::default())
}

fn method_signature(fields: &[&str]) -> (String, Namespace, LineDetails) {
    let (_, rest) = split_leading_line_ref(fields);
    let text = match rest.len() {
        0 => String::new(),
        1 => rest[0].to_string(),
        _ => rest.last().copied().unwrap_or("").to_string(),
    };
    (text, Namespace::default_namespace(), LineDetails::default())
}

fn variable_scope_begin(fields: &[&str]) -> (String, Namespace, LineDetails) {
    let (_, rest) = split_leading_line_ref(fields);
    (rest.join("|"), Namespace::default_namespace(), LineDetails::default())
}

fn user_debug(fields: &[&str]) -> (String, Namespace, LineDetails) {
    let (_, rest) = split_leading_line_ref(fields);
    let text = if rest.len() > 1 { rest[1..].join("|") } else { rest.join("|") };
    (text, Namespace::default_namespace(), LineDetails::default())
}

fn flow_record(fields: &[&str]) -> (String, Namespace, LineDetails) {
    let (_, rest) = split_leading_line_ref(fields);
    let mut details = LineDetails::default();
    details.suffix = rest.last().map(|s| s.to_string());
    (rest.join("|"), Namespace::default_namespace(), details)
}

/// Classifies a `FLOW_START_INTERVIEWS_BEGIN` scope as a Flow or a Process
/// Builder process (spec.md §4.2), based on the enclosing `CODE_UNIT_STARTED`
/// text rather than its `codeUnitType` — that field is itself only populated
/// by `CODE_UNIT_FINISHED`, which for a properly nested interview hasn't
/// happened yet when the interview closes. Process Builder invocations run
/// under a `CODE_UNIT_STARTED` naming a workflow rule; anything else that
/// starts an interview is a plain Flow.
fn on_end_flow_start_interviews_begin(node: &mut TreeNode, _exit: &LineRecord, ancestor_code_unit_text: Option<&str>) {
    let is_process_builder = ancestor_code_unit_text
        .map(|text| text.to_ascii_lowercase().contains("workflow"))
        .unwrap_or(false);
    node.code_unit_type = Some(if is_process_builder { "ProcessBuilder" } else { "Flow" }.to_string());
}

fn wf_pseudo(fields: &[&str]) -> (String, Namespace, LineDetails) {
    let (_, rest) = split_leading_line_ref(fields);
    (rest.join("|"), Namespace::default_namespace(), LineDetails::default())
}

const SOQL_EXIT: &[&str] = &["SOQL_EXECUTE_END"];
const SOSL_EXIT: &[&str] = &["SOSL_EXECUTE_END"];
const DML_EXIT: &[&str] = &["DML_END"];
const EXECUTION_EXIT: &[&str] = &["EXECUTION_FINISHED"];
const CODE_UNIT_EXIT: &[&str] = &["CODE_UNIT_FINISHED"];
const METHOD_EXIT: &[&str] = &["METHOD_EXIT"];
const CONSTRUCTOR_EXIT: &[&str] = &["CONSTRUCTOR_EXIT"];
const FLOW_INTERVIEW_EXIT: &[&str] = &["FLOW_START_INTERVIEWS_END"];
const NO_EXIT: &[&str] = &[];

/// Looks up the static descriptor for a recognized event-name tag. Returns
/// `None` for anything not in the table, which the tokenizer reports as
/// `Unsupported log event name: <name>` (spec.md §4.1).
pub fn lookup(name: &str) -> Option<EventDescriptor> {
    let d = |name, role, exit_types, pseudo_exit, discontinuity, multiline_tail, parse_fields, on_end| {
        EventDescriptor {
            name,
            role,
            exit_types,
            pseudo_exit,
            discontinuity,
            multiline_tail,
            parse_fields,
            on_start: None,
            on_end,
            on_end_with_ancestor: None,
        }
    };
    use ScopeRole::*;
    Some(match name {
        "EXECUTION_STARTED" => d("EXECUTION_STARTED", Entry, EXECUTION_EXIT, false, false, false, plain, None),
        "EXECUTION_FINISHED" => d("EXECUTION_FINISHED", Exit, NO_EXIT, false, false, false, plain, None),
        "CODE_UNIT_STARTED" => d(
            "CODE_UNIT_STARTED",
            Entry,
            CODE_UNIT_EXIT,
            false,
            false,
            false,
            code_unit_started,
            Some(on_end_code_unit_started),
        ),
        "CODE_UNIT_FINISHED" => d("CODE_UNIT_FINISHED", Exit, NO_EXIT, false, false, false, code_unit_finished, None),
        "WF_APPROVAL_SUBMIT" => d("WF_APPROVAL_SUBMIT", Entry, NO_EXIT, true, false, false, wf_pseudo, None),
        "WF_PROCESS_FOUND" => d("WF_PROCESS_FOUND", Entry, NO_EXIT, true, false, false, wf_pseudo, None),
        "WF_NEXT_APPROVER" => d("WF_NEXT_APPROVER", Entry, NO_EXIT, true, false, false, wf_pseudo, None),
        "ENTERING_MANAGED_PKG" => d(
            "ENTERING_MANAGED_PKG",
            Entry,
            NO_EXIT,
            true,
            false,
            false,
            entering_managed_pkg,
            None,
        ),
        "SOQL_EXECUTE_BEGIN" => d(
            "SOQL_EXECUTE_BEGIN",
            Entry,
            SOQL_EXIT,
            false,
            false,
            false,
            soql_execute_begin,
            Some(on_end_soql_execute_begin),
        ),
        "SOQL_EXECUTE_END" => d("SOQL_EXECUTE_END", Exit, NO_EXIT, false, false, false, soql_execute_end, None),
        "SOQL_EXECUTE_EXPLAIN" => d("SOQL_EXECUTE_EXPLAIN", Leaf, NO_EXIT, false, false, false, soql_execute_explain, None),
        "SOSL_EXECUTE_BEGIN" => d(
            "SOSL_EXECUTE_BEGIN",
            Entry,
            SOSL_EXIT,
            false,
            false,
            false,
            sosl_execute_begin,
            Some(on_end_sosl_execute_begin),
        ),
        "SOSL_EXECUTE_END" => d("SOSL_EXECUTE_END", Exit, NO_EXIT, false, false, false, sosl_execute_end, None),
        "DML_BEGIN" => EventDescriptor {
            name: "DML_BEGIN",
            role: Entry,
            exit_types: DML_EXIT,
            pseudo_exit: false,
            discontinuity: false,
            multiline_tail: false,
            parse_fields: dml_begin,
            on_start: Some(on_start_dml_begin),
            on_end: None,
            on_end_with_ancestor: None,
        },
        "DML_END" => d("DML_END", Exit, NO_EXIT, false, false, false, dml_end, None),
        "EXCEPTION_THROWN" => d("EXCEPTION_THROWN", Leaf, NO_EXIT, false, true, false, exception_thrown, None),
        "FATAL_ERROR" => d("FATAL_ERROR", Leaf, NO_EXIT, false, true, false, fatal_error, None),
        "METHOD_ENTRY" => d("METHOD_ENTRY", Entry, METHOD_EXIT, false, false, false, method_signature, None),
        "METHOD_EXIT" => d("METHOD_EXIT", Exit, NO_EXIT, false, false, false, method_signature, None),
        "CONSTRUCTOR_ENTRY" => d("CONSTRUCTOR_ENTRY", Entry, CONSTRUCTOR_EXIT, false, false, false, method_signature, None),
        "CONSTRUCTOR_EXIT" => d("CONSTRUCTOR_EXIT", Exit, NO_EXIT, false, false, false, method_signature, None),
        "VARIABLE_SCOPE_BEGIN" => d("VARIABLE_SCOPE_BEGIN", Leaf, NO_EXIT, false, false, false, variable_scope_begin, None),
        "USER_DEBUG" => d("USER_DEBUG", Leaf, NO_EXIT, false, false, false, user_debug, None),
        "FLOW_START_INTERVIEWS_BEGIN" => EventDescriptor {
            name: "FLOW_START_INTERVIEWS_BEGIN",
            role: Entry,
            exit_types: FLOW_INTERVIEW_EXIT,
            pseudo_exit: false,
            discontinuity: false,
            multiline_tail: false,
            parse_fields: flow_record,
            on_start: None,
            on_end: None,
            on_end_with_ancestor: Some(on_end_flow_start_interviews_begin),
        },
        "FLOW_START_INTERVIEWS_END" => d("FLOW_START_INTERVIEWS_END", Exit, NO_EXIT, false, false, false, flow_record, None),
        "FLOW_VALUE_ASSIGNMENT" => d("FLOW_VALUE_ASSIGNMENT", Leaf, NO_EXIT, false, false, true, flow_record, None),
        _ => return None,
    })
}

/// Event names consumed directly by [`crate::governor_limits`] rather than
/// fed through the tree builder — see that module for why these are handled
/// as a separate pass over the raw line stream.
pub fn is_governor_limits_marker(name: &str) -> bool {
    matches!(name, "CUMULATIVE_LIMIT_USAGE" | "CUMULATIVE_LIMIT_USAGE_END")
}
