//! Query Executor: one submit/poll/fetch/close cycle per attempt, retried on
//! transient failures.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use sq_client::{ExecutionClient, ResultId, SubmitParams};
use sq_core::query::QuerySpec;
use sq_core::row::Row;
use sq_core::trace::{AttemptSpan, AttemptStatus};
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::context::SpanLog;
use crate::retry::RetryPolicy;
use crate::RunnerError;

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct ExecutorSettings {
    /// Delay between two status polls.
    pub poll_interval_ms: u64,
    /// Budget for one result to become ready.
    pub wait_timeout_ms: u64,
    pub retry: RetryPolicy,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 200,
            wait_timeout_ms: 120_000,
            retry: RetryPolicy::default(),
        }
    }
}

impl ExecutorSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }
}

/// Rows of one successful attempt.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub rows: Vec<Row>,
    /// True when fewer than `limit` rows came back.
    pub complete: bool,
}

#[derive(Clone)]
pub struct QueryExecutor {
    client: Arc<dyn ExecutionClient>,
    settings: ExecutorSettings,
}

impl QueryExecutor {
    pub fn new(client: Arc<dyn ExecutionClient>, settings: ExecutorSettings) -> Self {
        Self { client, settings }
    }

    /// Run `spec` until it succeeds, fails permanently or the retry budget is
    /// spent. Every try is recorded in `log`.
    pub async fn execute(
        &self,
        run_id: Uuid,
        spec: &QuerySpec,
        depth: u32,
        log: &SpanLog,
    ) -> Result<Attempt, RunnerError> {
        let policy = &self.settings.retry;
        let mut retry = 0u32;

        loop {
            let mut span = AttemptSpan::start(run_id, spec.time_range().clone(), depth, retry + 1);
            let result = self.attempt(spec, &mut span).await;
            log.push(span).await;

            match result {
                Ok(attempt) => return Ok(attempt),
                Err(err) if err.is_transient() && policy.allows_retry(retry) => {
                    let delay = policy.delay_for(retry);
                    warn!(
                        %run_id,
                        depth,
                        attempt = retry + 1,
                        delay_ms = delay.as_millis() as u64,
                        "query attempt failed, retrying: {err}"
                    );
                    sleep(delay).await;
                    retry += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// A single try. The result identifier is closed on every path once submitted.
    async fn attempt(&self, spec: &QuerySpec, span: &mut AttemptSpan) -> Result<Attempt, RunnerError> {
        let (kind, params) = SubmitParams::from_spec(spec);

        let result_id = match self.client.submit(kind, &params).await {
            Ok(id) => id,
            Err(err) => {
                let err = RunnerError::from(err);
                span.finish(AttemptStatus::Failed, Some(err.to_string()));
                return Err(err);
            }
        };
        debug!(result_id = %result_id, ?kind, time_range = %params.time_range, "query submitted");
        span.result_id = Some(result_id.to_string());
        span.status = AttemptStatus::Submitted;

        let fetched = self.wait_and_fetch(&result_id, spec.limit(), span).await;

        let closed = match self.client.close(&result_id).await {
            Ok(()) => true,
            Err(err) => {
                warn!(result_id = %result_id, "failed to close query result: {err}");
                false
            }
        };

        match fetched {
            Ok(rows) => {
                span.rows = rows.len();
                let status = if closed {
                    AttemptStatus::Closed
                } else {
                    AttemptStatus::Complete
                };
                span.finish(status, None);
                let complete = rows.len() < spec.limit() as usize;
                Ok(Attempt { rows, complete })
            }
            Err(err) => {
                let status = match err {
                    RunnerError::QueryTimeout { .. } => AttemptStatus::TimedOut,
                    _ => AttemptStatus::Failed,
                };
                span.finish(status, Some(err.to_string()));
                Err(err)
            }
        }
    }

    async fn wait_and_fetch(
        &self,
        result_id: &ResultId,
        limit: u32,
        span: &mut AttemptSpan,
    ) -> Result<Vec<Row>, RunnerError> {
        span.status = AttemptStatus::Polling;
        self.wait_for(result_id).await?;

        let page = self.client.fetch_rows(result_id, 0, limit).await?;
        let duplicates = page.duplicate_columns();
        if !duplicates.is_empty() {
            warn!(
                result_id = %result_id,
                columns = ?duplicates,
                "result echoes duplicate column names; field lookups may be ambiguous"
            );
        }
        let rows = page.into_rows();
        debug!(result_id = %result_id, rows = rows.len(), limit, "rows fetched");
        Ok(rows)
    }

    async fn wait_for(&self, result_id: &ResultId) -> Result<(), RunnerError> {
        let started = Instant::now();
        let budget = self.settings.wait_timeout();

        loop {
            let status = self.client.poll_status(result_id).await?;
            if status.complete {
                return Ok(());
            }
            let waited = started.elapsed();
            if waited >= budget {
                return Err(RunnerError::QueryTimeout {
                    result_id: result_id.to_string(),
                    waited_ms: waited.as_millis() as u64,
                });
            }
            sleep(self.settings.poll_interval()).await;
        }
    }
}
