//! Query Specification: one bounded, filtered, field-projected event query.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::str::FromStr;

use crate::catalog::{self, MANDATORY_FIELDS};
use crate::filter::FilterTree;
use crate::window::{TimeRange, TimeWindow};
use crate::CoreError;

pub const DEFAULT_LIMIT: u32 = 500;

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Ascending => "ASCENDING",
            Direction::Descending => "DESCENDING",
        }
    }
}

impl FromStr for Direction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ASCENDING" => Ok(Direction::Ascending),
            "DESCENDING" => Ok(Direction::Descending),
            other => Err(CoreError::invalid_argument(format!(
                "order direction must be ASCENDING or DESCENDING, not {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub direction: Direction,
    pub field: String,
}

impl Order {
    pub fn new(direction: Direction, field: impl Into<String>) -> Self {
        Self {
            direction,
            field: field.into(),
        }
    }
}

impl Default for Order {
    fn default() -> Self {
        Self::new(Direction::Descending, "LastTime")
    }
}

// ---------------------------------------------------------------------------
// QuerySpec
// ---------------------------------------------------------------------------

/// Immutable description of one query. Children produced by decomposition
/// always carry a [`TimeRange::Custom`] window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    time_range: TimeRange,
    fields: Vec<String>,
    order: Order,
    limit: u32,
    filters: Vec<FilterTree>,
}

impl QuerySpec {
    pub fn new<S: AsRef<str>>(
        time_range: TimeRange,
        fields: &[S],
        order: Order,
        limit: u32,
        filters: Vec<FilterTree>,
    ) -> Result<Self, CoreError> {
        if limit == 0 {
            return Err(CoreError::invalid_argument("limit must be positive"));
        }
        Ok(Self {
            time_range,
            fields: normalize_fields(fields),
            order,
            limit,
            filters,
        })
    }

    /// A query over `window` inheriting everything else from `self`.
    pub fn child(&self, window: TimeWindow) -> Self {
        Self {
            time_range: TimeRange::Custom(window),
            fields: self.fields.clone(),
            order: self.order.clone(),
            limit: self.limit,
            filters: self.filters.clone(),
        }
    }

    pub fn time_range(&self) -> &TimeRange {
        &self.time_range
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn order(&self) -> &Order {
        &self.order
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn filters(&self) -> &[FilterTree] {
        &self.filters
    }

    /// Filters as sent: the catch-all predicate stands in for an empty list.
    pub fn wire_filters(&self) -> Vec<Value> {
        if self.filters.is_empty() {
            vec![FilterTree::catch_all().to_wire()]
        } else {
            self.filters.iter().map(FilterTree::to_wire).collect()
        }
    }

    pub fn wire_fields(&self) -> Vec<Value> {
        self.fields.iter().map(|name| json!({ "name": name })).collect()
    }
}

/// Mandatory fields first, then the caller's, all as nicknames, first occurrence wins.
fn normalize_fields<S: AsRef<str>>(fields: &[S]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(MANDATORY_FIELDS.len() + fields.len());
    let requested = MANDATORY_FIELDS
        .iter()
        .copied()
        .chain(fields.iter().map(AsRef::as_ref));
    for name in requested {
        let nickname = catalog::to_nickname(name);
        if !out.iter().any(|f| f == nickname) {
            out.push(nickname.to_string());
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
