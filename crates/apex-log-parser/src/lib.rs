#![forbid(unsafe_code)]
//! Parses an Apex debug log into a time-ordered tree, suitable for driving a
//! flamechart view, plus the governor-limit snapshots and structural issues
//! recorded along the way.
//!
//! [`parse`] never fails: a malformed or truncated log still produces an
//! `ApexLog`, with anomalies recorded in [`ApexLog::parsing_errors`] and
//! [`ApexLog::log_issues`] rather than surfaced as an `Err`. The log itself
//! is the thing a debugging tool wants to show regardless of how messy its
//! source was.

mod builder;
mod governor_limits;
mod line_record;
mod post_process;
mod registry;
mod tokenizer;
mod tree;

pub use builder::ParserOptions;
pub use governor_limits::{GovernorLimitSet, GovernorLimits, LimitValue};
pub use tree::{ApexLog, DebugLevel, LineRef, LogIssue, NodeId, TreeNode};

use governor_limits::GovernorLimitsCollector;
use tokenizer::LineTokenizer;

/// Parses the full text of an Apex debug log.
///
/// Governor-limit usage blocks are extracted by an independent pass over
/// the raw text before the rest of the log ever reaches the tokenizer (see
/// [`governor_limits`] for why), then the remaining lines are tokenized and
/// assembled into a tree, and finally durations, counters, namespaces, and
/// managed-package runs are resolved in [`post_process`].
pub fn parse(text: &str, options: ParserOptions) -> ApexLog {
    let span = tracing::info_span!("apex_log_parser::parse", input_bytes = text.len());
    let _enter = span.enter();

    let (governor_limits, filtered_text) = GovernorLimitsCollector::collect(text);
    let retain_raw_text = options.retain_raw_text;

    let mut log = builder::TreeBuilder::new(&options).build(LineTokenizer::new(&filtered_text));

    log.cpu_time = governor_limits_cpu_time_nanos(&governor_limits);
    log.governor_limits = governor_limits;

    if !retain_raw_text {
        shrink_node_text(&mut log);
    }

    tracing::debug!(
        nodes = log.node_count(),
        issues = log.log_issues.len(),
        parsing_errors = log.parsing_errors.len(),
        "parsed apex debug log"
    );

    log
}

/// `GovernorLimits.aggregate.cpu_time.used` is milliseconds, as printed in
/// the log; `ApexLog::cpu_time` is nanoseconds, matching every other
/// duration on the tree. The conversion lives here, at the one place both
/// units are in scope, rather than silently happening inside either type.
fn governor_limits_cpu_time_nanos(limits: &GovernorLimits) -> apex_log_core::Nanos {
    (limits.aggregate.cpu_time.used as apex_log_core::Nanos).saturating_mul(1_000_000)
}

fn shrink_node_text(log: &mut ApexLog) {
    for i in 0..log.node_count() as u32 {
        let node = log.node_mut(NodeId(i));
        node.text.clear();
        node.text.shrink_to_fit();
    }
}
