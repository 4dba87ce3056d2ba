//! Wire types for the submit/poll/fetch/close calls.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::fmt;

use sq_core::query::QuerySpec;
use sq_core::row::Row;
use sq_core::window::TimeRange;

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

/// Which submission shape to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// Relative range named by the caller, resolved by the service.
    Event,
    /// Explicit start/end instants.
    EventCustomTime,
}

/// Parameters of one submission.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitParams {
    pub time_range: String,
    pub custom_start: Option<String>,
    pub custom_end: Option<String>,
    pub order_direction: String,
    pub order_field: String,
    pub fields: Vec<Value>,
    pub filters: Vec<Value>,
    pub limit: u32,
    pub offset: u32,
    pub include_total: bool,
}

impl SubmitParams {
    /// Choose the shape from whether the query carries a custom window.
    pub fn from_spec(spec: &QuerySpec) -> (QueryKind, Self) {
        let (kind, time_range, custom_start, custom_end) = match spec.time_range() {
            TimeRange::Custom(window) => (
                QueryKind::EventCustomTime,
                "CUSTOM".to_string(),
                Some(window.wire_start()),
                Some(window.wire_end()),
            ),
            TimeRange::Named(name) => (QueryKind::Event, name.clone(), None, None),
        };

        let params = Self {
            time_range,
            custom_start,
            custom_end,
            order_direction: spec.order().direction.as_str().to_string(),
            order_field: spec.order().field.clone(),
            fields: spec.wire_fields(),
            filters: spec.wire_filters(),
            limit: spec.limit(),
            offset: 0,
            include_total: false,
        };
        (kind, params)
    }

    /// The `config` object of a query execution request.
    pub fn to_config(&self, kind: QueryKind) -> Value {
        let mut config = json!({
            "timeRange": self.time_range,
            "order": [{
                "direction": self.order_direction,
                "field": { "name": self.order_field },
            }],
            "fields": self.fields,
            "filters": self.filters,
            "limit": self.limit,
            "offset": self.offset,
            "includeTotal": self.include_total,
        });
        if kind == QueryKind::EventCustomTime {
            config["customStart"] = json!(self.custom_start);
            config["customEnd"] = json!(self.custom_end);
        }
        json!({ "config": config })
    }
}

// ---------------------------------------------------------------------------
// Result handle and status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResultId(pub String);

impl ResultId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Accepts `123`, `"123"` or `{"value": 123}`.
    pub fn from_json(raw: &Value) -> Option<Self> {
        match raw {
            Value::String(s) => Some(Self(s.clone())),
            Value::Number(n) => Some(Self(n.to_string())),
            Value::Object(map) => map.get("value").and_then(Self::from_json),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryStatus {
    pub complete: bool,
}

// ---------------------------------------------------------------------------
// Fetched page
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowValues {
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultPage {
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub rows: Vec<RowValues>,
}

impl ResultPage {
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Column names echoed more than once, in first-seen order.
    pub fn duplicate_columns(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut dups = Vec::new();
        for column in &self.columns {
            if !seen.insert(column.name.as_str()) && !dups.contains(&column.name) {
                dups.push(column.name.clone());
            }
        }
        dups
    }

    pub fn into_rows(self) -> Vec<Row> {
        let names = self.column_names();
        self.rows
            .into_iter()
            .map(|row| Row::from_columns(&names, row.values))
            .collect()
    }
}
