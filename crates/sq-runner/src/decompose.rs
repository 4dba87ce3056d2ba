//! Recursive Decomposition Engine: re-query truncated windows as smaller
//! sub-windows until each returns fewer than `limit` rows or the depth budget
//! runs out.

use std::sync::Arc;

use async_recursion::async_recursion;
use sq_core::query::QuerySpec;
use sq_core::window::{divide, Division};
use tracing::{debug, info};

use crate::aggregate::{self, Branch};
use crate::context::RunContext;
use crate::pool;
use crate::RunnerError;

/// Where a node sits in the decomposition tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The caller's query: may split by `delta` and fans children out to the pool.
    Root,
    /// A sub-window: always splits by `slots` and recurses in place.
    Nested,
}

/// Query `spec`, splitting it while truncated and `budget` allows.
///
/// A truncated node's own rows are replaced by its children's rows. A node
/// that is truncated with no budget left keeps what it fetched and reports
/// itself incomplete.
#[async_recursion]
pub async fn load(
    ctx: Arc<RunContext>,
    spec: QuerySpec,
    depth: u32,
    budget: u32,
    dispatch: Dispatch,
) -> Result<Branch, RunnerError> {
    ctx.enter_window();
    let attempt = ctx
        .executor
        .execute(ctx.run_id, &spec, depth, &ctx.spans)
        .await?;

    if attempt.complete {
        return Ok(Branch::new(attempt.rows, true));
    }
    if budget == 0 {
        debug!(
            run_id = %ctx.run_id,
            depth,
            rows = attempt.rows.len(),
            "window truncated with no depth budget left"
        );
        return Ok(Branch::new(attempt.rows, false));
    }

    let window = spec.time_range().resolve(ctx.resolver.as_ref())?;
    let division = match (dispatch, ctx.delta) {
        (Dispatch::Root, Some(delta)) => Division::Delta(delta),
        _ => Division::Slots(ctx.slots),
    };
    let children: Vec<QuerySpec> = divide(window.start, window.end, division)?
        .into_iter()
        .map(|w| spec.child(w))
        .collect();

    info!(
        run_id = %ctx.run_id,
        depth,
        window = %window,
        sub_windows = children.len(),
        ?division,
        "window truncated at {} rows, splitting",
        spec.limit()
    );

    let branches = match dispatch {
        Dispatch::Root => {
            pool::run_all(ctx.workers, children, |child| {
                load(ctx.clone(), child, depth + 1, budget - 1, Dispatch::Nested)
            })
            .await?
        }
        Dispatch::Nested => {
            let mut branches = Vec::with_capacity(children.len());
            for child in children {
                branches.push(load(ctx.clone(), child, depth + 1, budget - 1, Dispatch::Nested).await?);
            }
            branches
        }
    };

    Ok(aggregate::merge(branches))
}
