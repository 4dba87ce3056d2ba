//! Decomposition run surface: what a caller asks for and what it gets back.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::filter::FilterTree;
use crate::query::{Order, QuerySpec, DEFAULT_LIMIT};
use crate::row::Row;
use crate::window::{parse_delta, TimeRange, TimeWindow};
use crate::CoreError;

pub const DEFAULT_SLOTS: u32 = 10;
pub const DEFAULT_WORKERS: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DecompositionRequest {
    /// Projected fields, in addition to the mandatory ones.
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub order: Order,
    /// Row cap for every single attempt.
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub filters: Vec<FilterTree>,
    #[serde(default)]
    pub time_range: TimeRange,
    /// How many times a truncated window may be split recursively.
    #[serde(default)]
    pub max_depth: u32,
    /// Sub-windows per split.
    #[serde(default = "default_slots")]
    pub slots: u32,
    /// Root-only fixed split length, e.g. `"2h"`.
    #[serde(default)]
    pub delta: Option<String>,
    /// Concurrent root-level sub-queries.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

fn default_slots() -> u32 {
    DEFAULT_SLOTS
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

impl DecompositionRequest {
    pub fn new(time_range: TimeRange) -> Self {
        Self {
            fields: Vec::new(),
            order: Order::default(),
            limit: DEFAULT_LIMIT,
            filters: Vec::new(),
            time_range,
            max_depth: 0,
            slots: DEFAULT_SLOTS,
            delta: None,
            workers: DEFAULT_WORKERS,
        }
    }

    pub fn with_fields<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_filters(mut self, filters: Vec<FilterTree>) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_slots(mut self, slots: u32) -> Self {
        self.slots = slots;
        self
    }

    pub fn with_delta(mut self, delta: impl Into<String>) -> Self {
        self.delta = Some(delta.into());
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Reject parameters that cannot drive a run.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.slots < 1 {
            return Err(CoreError::invalid_argument("slots must be at least 1"));
        }
        if self.workers < 1 {
            return Err(CoreError::invalid_argument("workers must be at least 1"));
        }
        if let TimeRange::Custom(window) = &self.time_range {
            TimeWindow::new(window.start, window.end)?;
        }
        self.delta()?;
        Ok(())
    }

    pub fn delta(&self) -> Result<Option<Duration>, CoreError> {
        self.delta.as_deref().map(parse_delta).transpose()
    }

    /// The root query specification.
    pub fn to_spec(&self) -> Result<QuerySpec, CoreError> {
        QuerySpec::new(
            self.time_range.clone(),
            self.fields.as_slice(),
            self.order.clone(),
            self.limit,
            self.filters.clone(),
        )
    }
}

/// Result of a decomposition run.
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub run_id: Uuid,
    /// Rows of every queried window, left to right.
    pub rows: Vec<Row>,
    /// False when the depth budget ran out on some truncated window.
    pub complete: bool,
    /// Total attempts made, retries included.
    pub attempts: usize,
    /// Distinct windows queried, root included.
    pub windows_queried: usize,
}
