//! The frozen, time-ordered tree produced by [`crate::parse`].
//!
//! The original tool represents the tree with bidirectional (GC'd)
//! parent/child pointers. Rust re-expresses that as an arena: [`ApexLog`]
//! owns a flat `Vec<TreeNode>`, and every cross-reference ([`TreeNode::parent`],
//! [`TreeNode::children`]) is a [`NodeId`] — a plain `Copy` index that is only
//! ever meaningful for the `ApexLog` that produced it.

use apex_log_core::{Counter, Duration, Namespace, Nanos, Severity};
use serde::Serialize;

/// Index into [`ApexLog`]'s node arena.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

/// A line number as it appears in a debug log line, or the `[EXTERNAL]`
/// sentinel used for frames outside any known Apex source file.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LineRef {
    Known(u32),
    External,
}

/// A timed scope (or leaf event) in the execution tree (spec.md §3).
#[derive(Debug, Clone, Serialize)]
pub struct TreeNode {
    pub event: &'static str,
    pub text: String,
    pub suffix: Option<String>,
    pub namespace: Namespace,

    pub timestamp: Nanos,
    pub exit_stamp: Nanos,
    pub duration: Duration,

    pub is_exit: bool,
    #[serde(skip)]
    pub exit_types: &'static [&'static str],

    pub soql_count: Counter,
    pub soql_row_count: Counter,
    pub dml_count: Counter,
    pub dml_row_count: Counter,
    pub sosl_count: Counter,
    pub sosl_row_count: Counter,
    pub total_thrown_count: Counter,

    pub code_unit_type: Option<String>,

    /// `SOQL_EXECUTE_BEGIN`'s `Aggregations:N` field (spec.md §3).
    pub aggregations: Option<u32>,
    /// Raw row count from the matching `*_END` line, alongside (not instead
    /// of) `soql_row_count`/`sosl_row_count`'s `{self,total}` view of it.
    pub row_count: Option<u64>,
    /// `SOQL_EXECUTE_BEGIN`'s target object, parsed from its `FROM` clause.
    pub sobject_type: Option<String>,
    /// `SOQL_EXECUTE_EXPLAIN` fields: the scanned columns, the query plan's
    /// leading operation, and its cost estimate.
    pub fields: Vec<String>,
    pub cardinality: Option<u64>,
    pub sobject_cardinality: Option<u64>,
    pub relative_cost: Option<f64>,
    pub leading_operation_type: Option<String>,

    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,

    /// True if this node's close was inferred rather than matched against a
    /// true exit line (§4.3 "Unexpected-End" / pseudo-exit / end-of-input).
    pub closed_implicitly: bool,
}

impl TreeNode {
    pub(crate) fn new_open(
        event: &'static str,
        text: String,
        namespace: Namespace,
        timestamp: Nanos,
        exit_types: &'static [&'static str],
    ) -> Self {
        TreeNode {
            event,
            text,
            suffix: None,
            namespace,
            timestamp,
            exit_stamp: timestamp,
            duration: Duration::ZERO,
            is_exit: false,
            exit_types,
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
}

/// One entry in [`ApexLog::debug_levels`]: a `CATEGORY,LEVEL` pair parsed
/// from the log's first line.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct DebugLevel {
    pub category: String,
    pub level: String,
}

/// A recorded, non-fatal problem with the log itself (spec.md §4.6/§7).
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct LogIssue {
    pub summary: String,
    pub description: Option<String>,
    pub severity: Severity,
    pub line: Option<LineRef>,
}

use crate::governor_limits::GovernorLimits;

/// Root container for a parsed log (spec.md §3).
#[derive(Debug, Clone, Serialize)]
pub struct ApexLog {
    pub(crate) nodes: Vec<TreeNode>,
    pub children: Vec<NodeId>,

    pub debug_levels: Vec<DebugLevel>,
    pub log_issues: Vec<LogIssue>,
    pub parsing_errors: Vec<String>,
    pub governor_limits: GovernorLimits,
    pub namespaces: Vec<Namespace>,
    pub cpu_time: Nanos,
    pub execution_end_time: Nanos,
    pub exit_stamp: Nanos,
}

impl ApexLog {
    pub(crate) fn empty() -> Self {
        ApexLog {
            nodes: Vec::new(),
            children: Vec::new(),
            debug_levels: Vec::new(),
            log_issues: Vec::new(),
            parsing_errors: Vec::new(),
            governor_limits: GovernorLimits::default(),
            namespaces: Vec::new(),
            cpu_time: 0,
            execution_end_time: 0,
            exit_stamp: 0,
        }
    }

    pub(crate) fn push_node(&mut self, node: TreeNode) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id.0 as usize]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut TreeNode {
        &mut self.nodes[id.0 as usize]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Iterates every node in arena order (not tree order).
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &TreeNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeId(i as u32), n))
    }
}
