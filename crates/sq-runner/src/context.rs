//! Run Context: state shared by every node of one decomposition run.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Duration;
use sq_client::ExecutionClient;
use sq_core::request::DecompositionRequest;
use sq_core::trace::AttemptSpan;
use sq_core::window::WindowResolver;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::executor::{ExecutorSettings, QueryExecutor};
use crate::RunnerError;

/// Append-only collection of attempt spans, shared across workers.
#[derive(Debug, Clone, Default)]
pub struct SpanLog {
    spans: Arc<RwLock<Vec<AttemptSpan>>>,
}

impl SpanLog {
    pub async fn push(&self, span: AttemptSpan) {
        self.spans.write().await.push(span);
    }

    pub async fn snapshot(&self) -> Vec<AttemptSpan> {
        self.spans.read().await.clone()
    }
}

pub struct RunContext {
    pub run_id: Uuid,
    pub executor: QueryExecutor,
    pub resolver: Arc<dyn WindowResolver>,
    /// Sub-windows per split.
    pub slots: u32,
    /// Fixed split length, honoured at the root only.
    pub delta: Option<Duration>,
    /// Concurrent root-level sub-queries.
    pub workers: usize,
    pub spans: SpanLog,
    windows: AtomicUsize,
}

impl RunContext {
    pub fn new(
        client: Arc<dyn ExecutionClient>,
        settings: ExecutorSettings,
        resolver: Arc<dyn WindowResolver>,
        request: &DecompositionRequest,
    ) -> Result<Self, RunnerError> {
        Ok(Self {
            run_id: Uuid::new_v4(),
            executor: QueryExecutor::new(client, settings),
            resolver,
            slots: request.slots,
            delta: request.delta()?,
            workers: request.workers,
            spans: SpanLog::default(),
            windows: AtomicUsize::new(0),
        })
    }

    /// Count one more window entering the engine.
    pub fn enter_window(&self) {
        self.windows.fetch_add(1, Ordering::Relaxed);
    }

    pub fn windows_queried(&self) -> usize {
        self.windows.load(Ordering::Relaxed)
    }
}
