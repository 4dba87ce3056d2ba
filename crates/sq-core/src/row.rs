//! Result rows: ordered field/value records addressable by wire name or nickname.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::catalog;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    entries: Vec<(String, Value)>,
}

impl Row {
    pub fn new(entries: Vec<(String, Value)>) -> Self {
        Self { entries }
    }

    /// Zip column names with one row's values. Extra values are dropped,
    /// missing ones are left out.
    pub fn from_columns(columns: &[String], values: Vec<Value>) -> Self {
        Self {
            entries: columns.iter().cloned().zip(values).collect(),
        }
    }

    fn contains_exact(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// The stored key answering `key`, if any.
    pub fn find_key(&self, key: &str) -> Option<String> {
        catalog::resolve_key(key, |candidate| self.contains_exact(candidate))
    }

    /// Look up by wire name, nickname, or bare column name under a known table.
    pub fn get(&self, key: &str) -> Option<&Value> {
        let resolved = self.find_key(key)?;
        self.entries
            .iter()
            .find(|(k, _)| *k == resolved)
            .map(|(_, v)| v)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.find_key(key).is_some()
    }

    /// Update the entry answering `key`, or append a new one.
    pub fn insert(&mut self, key: &str, value: Value) {
        match self.find_key(key) {
            Some(resolved) => {
                if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == resolved) {
                    slot.1 = value;
                }
            }
            None => self.entries.push((key.to_string(), value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let resolved = self.find_key(key)?;
        let idx = self.entries.iter().position(|(k, _)| *k == resolved)?;
        Some(self.entries.remove(idx).1)
    }

    /// `Alert.IPSIDAlertID`, when the row carries it.
    pub fn event_id(&self) -> Option<&str> {
        self.get_str("IPSIDAlertID")
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Row {
        Row::from_columns(
            &[
                "Rule.msg".to_string(),
                "Alert.LastTime".to_string(),
                "Alert.IPSIDAlertID".to_string(),
                "Alert.BIN(7)".to_string(),
            ],
            vec![
                json!("Login failed"),
                json!("2024-03-14T10:00:00Z"),
                json!("144116287587483648|5124"),
                json!("jdoe"),
            ],
        )
    }

    #[test]
    fn lookup_by_any_name() {
        let row = sample();
        assert_eq!(row.get_str("Alert.BIN(7)"), Some("jdoe"));
        assert_eq!(row.get_str("UserIDSrc"), Some("jdoe"));
        assert_eq!(row.get_str("LastTime"), Some("2024-03-14T10:00:00Z"));
        assert_eq!(row.event_id(), Some("144116287587483648|5124"));
        assert!(row.contains("msg"));
        assert!(!row.contains("DstIP"));
    }

    #[test]
    fn insert_updates_resolved_entry() {
        let mut row = sample();
        row.insert("UserIDSrc", json!("root"));
        assert_eq!(row.get_str("Alert.BIN(7)"), Some("root"));
        assert_eq!(row.len(), 4);

        row.insert("note", json!("checked"));
        assert_eq!(row.len(), 5);
        assert_eq!(row.remove("note"), Some(json!("checked")));
    }

    #[test]
    fn serializes_in_column_order() {
        let row = sample();
        let text = serde_json::to_string(&row).unwrap();
        assert!(text.starts_with("{\"Rule.msg\""));
    }
}
