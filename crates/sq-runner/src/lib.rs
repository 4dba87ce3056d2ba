//! sq-runner: Decomposition engine with retrying query execution, recursive
//! window splitting and a bounded root-level worker pool.

pub mod aggregate;
pub mod context;
pub mod decompose;
pub mod executor;
pub mod pool;
pub mod retry;

use std::sync::Arc;

use sq_client::{ClientError, ExecutionClient};
use sq_core::request::{DecompositionRequest, QueryOutcome};
use sq_core::trace::AttemptSpan;
use sq_core::window::WindowResolver;
use sq_core::CoreError;
use thiserror::Error;
use tracing::{info, warn};

pub use context::RunContext;
pub use decompose::Dispatch;
pub use executor::{ExecutorSettings, QueryExecutor};
pub use retry::RetryPolicy;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RunnerError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid filter: {0}")]
    Filter(String),
    #[error("unsupported time range: {0}")]
    UnsupportedRange(String),
    #[error("remote service error: {0}")]
    RemoteService(String),
    #[error("query timed out: result={result_id}, waited={waited_ms}ms")]
    QueryTimeout { result_id: String, waited_ms: u64 },
    #[error("worker failed: {0}")]
    Worker(String),
}

impl RunnerError {
    /// Remote failures and timeouts are retried; everything else is a caller bug.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RunnerError::RemoteService(_) | RunnerError::QueryTimeout { .. }
        )
    }
}

impl From<CoreError> for RunnerError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidArgument(msg) => RunnerError::InvalidArgument(msg),
            CoreError::UnsupportedRange(msg) => RunnerError::UnsupportedRange(msg),
            other @ (CoreError::InvalidFilter(_)
            | CoreError::InvalidFilterValue { .. }
            | CoreError::InvalidOperator(_)) => RunnerError::Filter(other.to_string()),
        }
    }
}

impl From<ClientError> for RunnerError {
    fn from(err: ClientError) -> Self {
        RunnerError::RemoteService(err.to_string())
    }
}

/// Run one decomposition and return its outcome.
pub async fn run(
    client: Arc<dyn ExecutionClient>,
    request: &DecompositionRequest,
    settings: ExecutorSettings,
    resolver: Arc<dyn WindowResolver>,
) -> Result<QueryOutcome, RunnerError> {
    let (outcome, _spans) = run_traced(client, request, settings, resolver).await?;
    Ok(outcome)
}

/// Like [`run`], also returning every attempt span in recording order.
pub async fn run_traced(
    client: Arc<dyn ExecutionClient>,
    request: &DecompositionRequest,
    settings: ExecutorSettings,
    resolver: Arc<dyn WindowResolver>,
) -> Result<(QueryOutcome, Vec<AttemptSpan>), RunnerError> {
    request.validate()?;
    let spec = request.to_spec()?;
    let ctx = Arc::new(RunContext::new(client, settings, resolver, request)?);
    let run_id = ctx.run_id;

    info!(
        %run_id,
        time_range = ?spec.time_range(),
        limit = spec.limit(),
        max_depth = request.max_depth,
        "starting decomposition run"
    );

    let branch = decompose::load(ctx.clone(), spec, 0, request.max_depth, Dispatch::Root).await?;

    if !branch.complete {
        warn!(
            %run_id,
            rows = branch.rows.len(),
            "query depth exhausted: more events exist than were retrieved"
        );
    }

    let spans = ctx.spans.snapshot().await;
    let outcome = QueryOutcome {
        run_id,
        complete: branch.complete,
        attempts: spans.len(),
        windows_queried: ctx.windows_queried(),
        rows: branch.rows,
    };

    info!(
        %run_id,
        rows = outcome.rows.len(),
        complete = outcome.complete,
        attempts = outcome.attempts,
        windows = outcome.windows_queried,
        "decomposition run finished"
    );
    Ok((outcome, spans))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_runner_errors() {
        assert_eq!(
            RunnerError::from(CoreError::invalid_argument("slots must be at least 1")),
            RunnerError::InvalidArgument("slots must be at least 1".into())
        );
        assert!(matches!(
            RunnerError::from(CoreError::InvalidFilterValue { kind: "Bogus".into() }),
            RunnerError::Filter(msg) if msg.contains("Bogus")
        ));
        assert!(matches!(
            RunnerError::from(CoreError::UnsupportedRange("CURRENT_QUARTER".into())),
            RunnerError::UnsupportedRange(_)
        ));
    }

    #[test]
    fn transient_classification() {
        assert!(RunnerError::from(ClientError::connection("refused")).is_transient());
        assert!(RunnerError::QueryTimeout {
            result_id: "1".into(),
            waited_ms: 10
        }
        .is_transient());
        assert!(!RunnerError::InvalidArgument("x".into()).is_transient());
        assert!(!RunnerError::Worker("panicked".into()).is_transient());
    }
}
