//! The passes that run once the raw tree is fully built (spec.md §4.4).
//!
//! Order matters: duration/counter aggregation and namespace propagation
//! both read the tree's shape, so they run first; managed-package run
//! merging changes that shape (it deletes sibling nodes), so it runs last.

use apex_log_core::{Namespace, Nanos};

use crate::tree::{ApexLog, NodeId};

pub fn run(log: &mut ApexLog) {
    let roots = log.children.clone();
    for &root in &roots {
        aggregate(log, root);
    }
    propagate_namespace_siblings(log, &roots, None);
    merge_managed_package_runs(log);
    collect_namespaces(log);
}

/// Bottom-up pass computing each node's `duration` (self = span minus the
/// sum of children's total) and rolling up the SOQL/DML/SOSL/exception
/// counters the same way.
fn aggregate(log: &mut ApexLog, id: NodeId) {
    let children: Vec<NodeId> = log.node(id).children.clone();
    for &child in &children {
        aggregate(log, child);
    }

    let mut children_total_nanos: Nanos = 0;
    let mut soql_count = log.node(id).soql_count;
    let mut soql_row_count = log.node(id).soql_row_count;
    let mut dml_count = log.node(id).dml_count;
    let mut dml_row_count = log.node(id).dml_row_count;
    let mut sosl_count = log.node(id).sosl_count;
    let mut sosl_row_count = log.node(id).sosl_row_count;
    let mut total_thrown_count = log.node(id).total_thrown_count;

    for &child in &children {
        let c = log.node(child);
        children_total_nanos += c.duration.total;
        soql_count.absorb_child_total(&c.soql_count);
        soql_row_count.absorb_child_total(&c.soql_row_count);
        dml_count.absorb_child_total(&c.dml_count);
        dml_row_count.absorb_child_total(&c.dml_row_count);
        sosl_count.absorb_child_total(&c.sosl_count);
        sosl_row_count.absorb_child_total(&c.sosl_row_count);
        total_thrown_count.absorb_child_total(&c.total_thrown_count);
    }

    let node = log.node_mut(id);
    let span = (node.exit_stamp - node.timestamp).max(0);
    node.duration.total = span;
    node.duration.self_nanos = (span - children_total_nanos).max(0);
    node.soql_count = soql_count;
    node.soql_row_count = soql_row_count;
    node.dml_count = dml_count;
    node.dml_row_count = dml_row_count;
    node.sosl_count = sosl_count;
    node.sosl_row_count = sosl_row_count;
    node.total_thrown_count = total_thrown_count;
}

/// Sweeps one sibling list left to right, threading a "current namespace"
/// value the way the original's namespace resolver threads a running
/// current-package field while it walks the log: a node with its own
/// explicit (non-default) namespace updates `current` for the siblings that
/// follow it (e.g. an `ENTERING_MANAGED_PKG` marker); a node with no
/// namespace of its own inherits whatever `current` is at that point. Either
/// way, the node's *effective* namespace becomes the starting `current` for
/// a recursive sweep of its own children.
fn propagate_namespace_siblings(log: &mut ApexLog, siblings: &[NodeId], inherited: Option<&Namespace>) {
    let mut current = inherited.cloned().unwrap_or_default();
    for &id in siblings {
        let node = log.node_mut(id);
        if node.namespace.is_default() {
            node.namespace = current.clone();
        } else {
            current = node.namespace.clone();
        }
        let children: Vec<NodeId> = log.node(id).children.clone();
        propagate_namespace_siblings(log, &children, Some(&current));
    }
}

/// Collapses contiguous runs of `ENTERING_MANAGED_PKG` siblings that share a
/// namespace into the first node of the run, reparenting the run's children
/// under it and extending its span to cover the whole run (spec.md §4.4).
/// A run breaks the moment a different node — even one for the same
/// namespace at a non-adjacent position — sits between two pseudo entries.
///
/// Merged-away nodes stay in the arena as unreferenced entries rather than
/// being physically removed, so no other `NodeId` anywhere has to be
/// renumbered.
fn merge_managed_package_runs(log: &mut ApexLog) {
    let merged_roots = merge_run(log, log.children.clone());
    log.children = merged_roots;

    let all_ids: Vec<NodeId> = (0..log.node_count() as u32).map(NodeId).collect();
    for id in all_ids {
        let children = log.node(id).children.clone();
        let merged = merge_run(log, children);
        log.node_mut(id).children = merged;
    }
}

/// Merges one sibling list in place, left to right. `result` only ever grows
/// by absorbing a node into the run's head, so later runs in the same list
/// see the already-merged head as their `result.last()`.
fn merge_run(log: &mut ApexLog, siblings: Vec<NodeId>) -> Vec<NodeId> {
    let mut result: Vec<NodeId> = Vec::with_capacity(siblings.len());

    for id in siblings {
        let is_managed_pkg = log.node(id).event == "ENTERING_MANAGED_PKG";
        let continues_run = is_managed_pkg
            && result
                .last()
                .is_some_and(|&last| log.node(last).event == "ENTERING_MANAGED_PKG" && log.node(last).namespace == log.node(id).namespace);

        if continues_run {
            let last = *result.last().expect("continues_run implies a prior node");
            let moved_children = std::mem::take(&mut log.node_mut(id).children);
            let exit_stamp = log.node(id).exit_stamp;
            let duration_total = log.node(id).duration.total;
            let duration_self = log.node(id).duration.self_nanos;

            let absorbed_node = log.node(id);
            let absorbed_soql_count = absorbed_node.soql_count;
            let absorbed_soql_row_count = absorbed_node.soql_row_count;
            let absorbed_dml_count = absorbed_node.dml_count;
            let absorbed_dml_row_count = absorbed_node.dml_row_count;
            let absorbed_sosl_count = absorbed_node.sosl_count;
            let absorbed_sosl_row_count = absorbed_node.sosl_row_count;
            let absorbed_total_thrown_count = absorbed_node.total_thrown_count;

            let head = log.node_mut(last);
            head.exit_stamp = exit_stamp;
            head.duration.total += duration_total;
            head.duration.self_nanos += duration_self;
            head.soql_count.absorb_child_total(&absorbed_soql_count);
            head.soql_row_count.absorb_child_total(&absorbed_soql_row_count);
            head.dml_count.absorb_child_total(&absorbed_dml_count);
            head.dml_row_count.absorb_child_total(&absorbed_dml_row_count);
            head.sosl_count.absorb_child_total(&absorbed_sosl_count);
            head.sosl_row_count.absorb_child_total(&absorbed_sosl_row_count);
            head.total_thrown_count.absorb_child_total(&absorbed_total_thrown_count);

            for &moved in &moved_children {
                log.node_mut(moved).parent = Some(last);
            }
            log.node_mut(last).children.extend(moved_children);
        } else {
            result.push(id);
        }
    }

    result
}

/// Distinct namespaces in first-appearance order over a depth-first walk
/// from the roots.
fn collect_namespaces(log: &mut ApexLog) {
    let mut seen = Vec::new();
    let roots = log.children.clone();
    for root in roots {
        walk_namespaces(log, root, &mut seen);
    }
    log.namespaces = seen;
}

fn walk_namespaces(log: &ApexLog, id: NodeId, seen: &mut Vec<Namespace>) {
    let ns = &log.node(id).namespace;
    if !seen.contains(ns) {
        seen.push(ns.clone());
    }
    for &child in &log.node(id).children {
        walk_namespaces(log, child, seen);
    }
}
