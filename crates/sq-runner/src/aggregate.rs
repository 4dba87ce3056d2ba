//! Result Aggregator: flatten per-window rows in window order.

use sq_core::row::Row;

/// The rows produced for one node of the decomposition tree.
#[derive(Debug, Clone, Default)]
pub struct Branch {
    pub rows: Vec<Row>,
    /// False when some window below this node was still truncated.
    pub complete: bool,
}

impl Branch {
    pub fn new(rows: Vec<Row>, complete: bool) -> Self {
        Self { rows, complete }
    }
}

/// Concatenate `branches` left to right. The merge is complete only if every
/// branch is.
pub fn merge(branches: Vec<Branch>) -> Branch {
    let total = branches.iter().map(|b| b.rows.len()).sum();
    let mut merged = Branch {
        rows: Vec::with_capacity(total),
        complete: true,
    };
    for branch in branches {
        merged.complete &= branch.complete;
        merged.rows.extend(branch.rows);
    }
    merged
}
