use serde::Serialize;

/// A timestamp or duration expressed in nanoseconds, matching the log's
/// native time unit (the first pipe-delimited field of every line).
pub type Nanos = i64;

/// Self/total pair shared by every per-node timing and counter in the tree
/// (spec.md §3: "Counters (all `{self,total}`)").
///
/// Keeping `self`/`total` behind one type (rather than two bare fields on
/// each counter) means the bottom-up aggregation in the post-processor can
/// only ever add a child's `total` into a parent's `total` — there is no
/// field name to typo into the wrong slot.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Serialize)]
pub struct Counter {
    #[serde(rename = "self")]
    pub self_count: u64,
    pub total: u64,
}

impl Counter {
    pub const ZERO: Counter = Counter {
        self_count: 0,
        total: 0,
    };

    pub fn leaf(self_count: u64) -> Self {
        Counter {
            self_count,
            total: self_count,
        }
    }

    /// Folds a child's `total` into this (parent) counter's `total`, leaving
    /// `self_count` untouched. Used by the post-processor's bottom-up pass.
    pub fn absorb_child_total(&mut self, child: &Counter) {
        self.total = self.total.saturating_add(child.total);
    }
}

/// Self/total duration pair, in nanoseconds.
///
/// `total = exit_stamp - timestamp`; `self = total - sum(child total)`,
/// clamped to zero (spec.md §4.4).
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Serialize)]
pub struct Duration {
    #[serde(rename = "self")]
    pub self_nanos: Nanos,
    pub total: Nanos,
}

impl Duration {
    pub const ZERO: Duration = Duration {
        self_nanos: 0,
        total: 0,
    };
}
