//! Filter Tree: boolean predicate structure sent with every query.
//!
//! A tree is either a field predicate (`EsmFieldFilter`) or an AND/OR group
//! (`EsmFilterGroup`) embedding its children's wire forms verbatim.

mod builder;

pub use builder::DOCUMENTED_FILTERS;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

use crate::CoreError;

// ---------------------------------------------------------------------------
// Tree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterTree {
    Field(FieldFilter),
    Group(GroupFilter),
}

impl FilterTree {
    /// `(field, values)` shorthand, defaulted to the `IN` operator.
    pub fn pair<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<FilterValue>,
    {
        FilterTree::Field(FieldFilter::new(field, values))
    }

    pub fn all(filters: Vec<FilterTree>) -> Self {
        FilterTree::Group(GroupFilter::new(filters, Logic::And))
    }

    pub fn any(filters: Vec<FilterTree>) -> Self {
        FilterTree::Group(GroupFilter::new(filters, Logic::Or))
    }

    /// Permissive predicate used when a query carries no filters.
    pub fn catch_all() -> Self {
        FilterTree::Field(FieldFilter {
            field: "SrcIP".into(),
            operator: Operator::In,
            values: vec![FilterValue::basic("0.0.0.0/0")],
        })
    }

    /// Serialize to the remote service's filter format.
    pub fn to_wire(&self) -> Value {
        match self {
            FilterTree::Field(f) => json!({
                "type": "EsmFieldFilter",
                "field": { "name": f.field },
                "operator": f.operator.as_str(),
                "values": f.values.iter().map(FilterValue::to_wire).collect::<Vec<_>>(),
            }),
            FilterTree::Group(g) => json!({
                "type": "EsmFilterGroup",
                "filters": g.filters.iter().map(FilterTree::to_wire).collect::<Vec<_>>(),
                "logic": g.logic.as_str(),
            }),
        }
    }

    /// Field names referenced anywhere in the tree.
    pub fn field_names(&self) -> Vec<&str> {
        match self {
            FilterTree::Field(f) => vec![f.field.as_str()],
            FilterTree::Group(g) => g.filters.iter().flat_map(FilterTree::field_names).collect(),
        }
    }
}

impl From<FieldFilter> for FilterTree {
    fn from(filter: FieldFilter) -> Self {
        FilterTree::Field(filter)
    }
}

impl From<GroupFilter> for FilterTree {
    fn from(group: GroupFilter) -> Self {
        FilterTree::Group(group)
    }
}

impl<S: Into<String>, V: Into<FilterValue>> From<(S, Vec<V>)> for FilterTree {
    fn from((field, values): (S, Vec<V>)) -> Self {
        FilterTree::pair(field, values)
    }
}

impl Serialize for FilterTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_wire().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FilterTree {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        FilterTree::from_json(&raw).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Leaf and group
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFilter {
    pub field: String,
    pub operator: Operator,
    pub values: Vec<FilterValue>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupFilter {
    pub filters: Vec<FilterTree>,
    pub logic: Logic,
}

impl GroupFilter {
    pub fn new(filters: Vec<FilterTree>, logic: Logic) -> Self {
        Self { filters, logic }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Logic {
    And,
    Or,
}

impl Logic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Logic::And => "AND",
            Logic::Or => "OR",
        }
    }
}

impl FromStr for Logic {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AND" => Ok(Logic::And),
            "OR" => Ok(Logic::Or),
            other => Err(CoreError::InvalidFilter(format!(
                "group logic must be AND or OR, not {other}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    In,
    NotIn,
    GreaterThan,
    LessThan,
    GreaterOrEqualsThan,
    LessOrEqualsThan,
    NumericEquals,
    NumericNotEquals,
    DoesNotEqual,
    Equals,
    Contains,
    DoesNotContain,
    Regex,
}

impl Operator {
    pub const ALL: [Operator; 13] = [
        Operator::In,
        Operator::NotIn,
        Operator::GreaterThan,
        Operator::LessThan,
        Operator::GreaterOrEqualsThan,
        Operator::LessOrEqualsThan,
        Operator::NumericEquals,
        Operator::NumericNotEquals,
        Operator::DoesNotEqual,
        Operator::Equals,
        Operator::Contains,
        Operator::DoesNotContain,
        Operator::Regex,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::In => "IN",
            Operator::NotIn => "NOT_IN",
            Operator::GreaterThan => "GREATER_THAN",
            Operator::LessThan => "LESS_THAN",
            Operator::GreaterOrEqualsThan => "GREATER_OR_EQUALS_THAN",
            Operator::LessOrEqualsThan => "LESS_OR_EQUALS_THAN",
            Operator::NumericEquals => "NUMERIC_EQUALS",
            Operator::NumericNotEquals => "NUMERIC_NOT_EQUALS",
            Operator::DoesNotEqual => "DOES_NOT_EQUAL",
            Operator::Equals => "EQUALS",
            Operator::Contains => "CONTAINS",
            Operator::DoesNotContain => "DOES_NOT_CONTAIN",
            Operator::Regex => "REGEX",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operator::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| CoreError::InvalidOperator(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Values: exactly one kind per entry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    /// Inline literal (`EsmBasicValue`).
    Basic(String),
    /// Reference list (`EsmCompoundValue`).
    Compound(Vec<String>),
    /// Named server-side list (`EsmWatchlistValue`).
    Watchlist(u64),
    /// Indirect variable reference (`EsmVariableValue`).
    Variable(u64),
}

impl FilterValue {
    pub fn basic(value: impl ToString) -> Self {
        FilterValue::Basic(value.to_string())
    }

    /// Wire type tag.
    pub fn kind(&self) -> &'static str {
        match self {
            FilterValue::Basic(_) => "EsmBasicValue",
            FilterValue::Compound(_) => "EsmCompoundValue",
            FilterValue::Watchlist(_) => "EsmWatchlistValue",
            FilterValue::Variable(_) => "EsmVariableValue",
        }
    }

    pub fn to_wire(&self) -> Value {
        match self {
            FilterValue::Basic(v) => json!({ "type": self.kind(), "value": v }),
            FilterValue::Compound(vs) => json!({ "type": self.kind(), "values": vs }),
            FilterValue::Watchlist(id) => json!({ "type": self.kind(), "watchlist": id }),
            FilterValue::Variable(id) => json!({ "type": self.kind(), "variable": id }),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Basic(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Basic(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::basic(value)
    }
}

impl From<u64> for FilterValue {
    fn from(value: u64) -> Self {
        FilterValue::basic(value)
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        FilterValue::basic(value)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
