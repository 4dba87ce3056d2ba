//! Filter construction from typed pairs or untyped JSON/TOML input.

use serde_json::Value;

use super::{FieldFilter, FilterTree, FilterValue, GroupFilter, Logic, Operator};
use crate::CoreError;

/// Field names known to be filterable; others still work but are logged.
pub const DOCUMENTED_FILTERS: &[&str] = &[
    "Action",
    "AlertID",
    "AppID",
    "ASNGeoDst",
    "ASNGeoSrc",
    "CommandID",
    "DSID",
    "DSIDSigID",
    "DstIP",
    "DstMac",
    "DstPort",
    "FirstTime",
    "GUIDDst",
    "GUIDSrc",
    "HostID",
    "ID",
    "IPSID",
    "IPSIDAlertID",
    "LastTime",
    "NormID",
    "Protocol",
    "SessionID",
    "SigID",
    "SrcIP",
    "SrcMac",
    "SrcPort",
    "UserIDDst",
    "UserIDSrc",
    "Web_Domain",
    "ZoneDst",
    "ZoneSrc",
];

impl FieldFilter {
    /// Leaf predicate with the `IN` operator.
    pub fn new<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<FilterValue>,
    {
        let field = field.into();
        if !DOCUMENTED_FILTERS.contains(&field.as_str()) {
            tracing::warn!(field = %field, "filtering on an undocumented field name");
        }
        let values: Vec<FilterValue> = values.into_iter().map(Into::into).collect();
        for value in &values {
            if !matches!(value, FilterValue::Basic(_)) {
                tracing::warn!(kind = value.kind(), "filter value kind other than EsmBasicValue is not tested");
            }
        }
        Self {
            field,
            operator: Operator::In,
            values,
        }
    }

    pub fn with_operator(mut self, operator: Operator) -> Self {
        self.operator = operator;
        self
    }
}

impl FilterTree {
    /// Build a tree from loosely typed input.
    ///
    /// Accepts a `[field, value-or-values]` pair (an `IN` predicate), or an
    /// object already in wire shape (`EsmFieldFilter` / `EsmFilterGroup`).
    pub fn from_json(raw: &Value) -> Result<Self, CoreError> {
        match raw {
            Value::Array(items) if items.len() == 2 => {
                let field = items[0].as_str().ok_or_else(|| {
                    CoreError::InvalidFilter(format!("pair field must be a string, not {}", items[0]))
                })?;
                let values = parse_values(&items[1])?;
                Ok(FilterTree::Field(FieldFilter::new(field, values)))
            }
            Value::Object(map) => match map.get("type").and_then(Value::as_str) {
                Some("EsmFieldFilter") => parse_field_filter(raw).map(FilterTree::Field),
                Some("EsmFilterGroup") => parse_group(raw).map(FilterTree::Group),
                _ => Err(shape_error(raw)),
            },
            _ => Err(shape_error(raw)),
        }
    }

    /// Parse a list of filters, as found in a query description.
    pub fn from_json_list(raw: &Value) -> Result<Vec<Self>, CoreError> {
        match raw {
            Value::Array(items) => items.iter().map(FilterTree::from_json).collect(),
            other => Err(CoreError::InvalidFilter(format!(
                "filters must be a list, not {other}"
            ))),
        }
    }
}

fn shape_error(raw: &Value) -> CoreError {
    CoreError::InvalidFilter(format!(
        "filters must be a (field, values) pair, a field filter or a group filter, not {raw}"
    ))
}

fn parse_field_filter(raw: &Value) -> Result<FieldFilter, CoreError> {
    let field = raw
        .pointer("/field/name")
        .and_then(Value::as_str)
        .ok_or_else(|| CoreError::InvalidFilter(format!("field filter without field.name: {raw}")))?;
    let operator = match raw.get("operator") {
        None => Operator::In,
        Some(Value::String(op)) => op.parse()?,
        Some(other) => return Err(CoreError::InvalidOperator(other.to_string())),
    };
    let values = match raw.get("values") {
        Some(values) => parse_values(values)?,
        None => Vec::new(),
    };
    Ok(FieldFilter::new(field, values).with_operator(operator))
}

fn parse_group(raw: &Value) -> Result<GroupFilter, CoreError> {
    let logic = match raw.get("logic") {
        None => Logic::And,
        Some(Value::String(logic)) => logic.parse()?,
        Some(other) => {
            return Err(CoreError::InvalidFilter(format!(
                "group logic must be a string, not {other}"
            )))
        }
    };
    let filters = match raw.get("filters") {
        Some(children) => FilterTree::from_json_list(children)?,
        None => Vec::new(),
    };
    Ok(GroupFilter::new(filters, logic))
}

fn parse_values(raw: &Value) -> Result<Vec<FilterValue>, CoreError> {
    match raw {
        Value::Array(items) => items.iter().map(parse_value).collect(),
        single => parse_value(single).map(|v| vec![v]),
    }
}

fn parse_value(raw: &Value) -> Result<FilterValue, CoreError> {
    match raw {
        Value::String(s) => Ok(FilterValue::Basic(s.clone())),
        Value::Number(n) => Ok(FilterValue::basic(n)),
        Value::Bool(b) => Ok(FilterValue::basic(bool_literal(*b))),
        Value::Object(map) => {
            let kind = map
                .get("type")
                .and_then(Value::as_str)
                .ok_or_else(|| CoreError::InvalidFilter(format!("typed value without type: {raw}")))?;
            let missing = |key: &str| {
                CoreError::InvalidFilter(format!("{kind} value requires a '{key}' attribute"))
            };
            match kind {
                "EsmBasicValue" => {
                    let value = map.get("value").ok_or_else(|| missing("value"))?;
                    Ok(FilterValue::Basic(scalar_string(value)?))
                }
                "EsmCompoundValue" => {
                    let values = map
                        .get("values")
                        .and_then(Value::as_array)
                        .ok_or_else(|| missing("values"))?;
                    Ok(FilterValue::Compound(
                        values.iter().map(scalar_string).collect::<Result<_, _>>()?,
                    ))
                }
                "EsmWatchlistValue" => map
                    .get("watchlist")
                    .and_then(Value::as_u64)
                    .map(FilterValue::Watchlist)
                    .ok_or_else(|| missing("watchlist")),
                "EsmVariableValue" => map
                    .get("variable")
                    .and_then(Value::as_u64)
                    .map(FilterValue::Variable)
                    .ok_or_else(|| missing("variable")),
                other => Err(CoreError::InvalidFilterValue {
                    kind: other.to_string(),
                }),
            }
        }
        other => Err(CoreError::InvalidFilter(format!(
            "filter values must be strings, numbers or typed value records, not {other}"
        ))),
    }
}

fn scalar_string(raw: &Value) -> Result<String, CoreError> {
    match raw {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(bool_literal(*b).to_string()),
        other => Err(CoreError::InvalidFilter(format!(
            "expected a literal value, not {other}"
        ))),
    }
}

/// Booleans are capitalised on the wire.
fn bool_literal(b: bool) -> &'static str {
    if b {
        "True"
    } else {
        "False"
    }
}
