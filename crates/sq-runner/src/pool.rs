//! Worker Pool: run root-level sub-queries concurrently, bounded by `workers`.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{error, warn};

use crate::RunnerError;

/// Spawn one task per item, at most `workers` running at a time, and return
/// their results in item order. The first failure in item order is returned
/// once every task has finished.
pub async fn run_all<T, R, F, Fut>(workers: usize, items: Vec<T>, task: F) -> Result<Vec<R>, RunnerError>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<R, RunnerError>> + Send + 'static,
    R: Send + 'static,
{
    if items.is_empty() {
        return Ok(Vec::new());
    }
    if workers > items.len() {
        warn!(
            workers,
            windows = items.len(),
            "more workers than sub-windows; only {} will run",
            items.len()
        );
    }

    let permits = workers.clamp(1, items.len());
    let semaphore = Arc::new(Semaphore::new(permits));
    let mut handles = Vec::with_capacity(items.len());

    for item in items {
        let semaphore = semaphore.clone();
        let fut = task(item);
        handles.push(tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|e| RunnerError::Worker(e.to_string()))?;
            fut.await
        }));
    }

    let mut results = Vec::with_capacity(handles.len());
    let mut first_error = None;
    for handle in handles {
        match handle.await {
            Ok(Ok(value)) => results.push(value),
            Ok(Err(e)) => {
                first_error.get_or_insert(e);
            }
            Err(e) => {
                error!("Worker join error: {e}");
                first_error.get_or_insert(RunnerError::Worker(e.to_string()));
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(results),
    }
}
