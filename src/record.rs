//! Record model shared by extraction and normalization.
//!
//! A [`Record`] is an ordered column -> [`Value`] mapping. Extraction fills one
//! with raw values; normalization reshapes the same record in place, step by
//! step, so a record is "raw" or "normalized" only by what has been applied.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number};

/// How a missing value is written to tabular output.
pub const MISSING_CELL: &str = "Not specified";

/// Handle to one scrapable entity: a detail-page URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemRef(String);

impl ItemRef {
    pub fn new(reference: impl Into<String>) -> Self {
        ItemRef(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// A lookup or parse that produced nothing. The only sentinel.
    Missing,
    Text(String),
    Number(f64),
    List(Vec<String>),
    /// Ordered key -> value pairs, keys unique.
    Map(Vec<(String, String)>),
    Record(Record),
    Items(Vec<Record>),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn from_option(value: Option<String>) -> Self {
        value.map(Value::Text).unwrap_or(Value::Missing)
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as J;
        match self {
            Value::Missing => J::Null,
            Value::Text(s) => J::String(s.clone()),
            Value::Number(n) => Number::from_f64(*n).map(J::Number).unwrap_or(J::Null),
            Value::List(items) => J::Array(items.iter().cloned().map(J::String).collect()),
            Value::Map(pairs) => J::Object(
                pairs
                    .iter()
                    .map(|(k, v)| (k.clone(), J::String(v.clone())))
                    .collect::<Map<_, _>>(),
            ),
            Value::Record(record) => record.to_json(),
            Value::Items(items) => J::Array(items.iter().map(Record::to_json).collect()),
        }
    }

    /// Text for one CSV cell. Nested values are written as JSON.
    pub fn to_cell(&self) -> String {
        match self {
            Value::Missing => MISSING_CELL.to_string(),
            Value::Text(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            nested => nested.to_json().to_string(),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Record(r)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// A record holding every expected key, all missing. Returned when a
    /// whole item could not be scraped.
    pub fn placeholder(keys: &[&str]) -> Self {
        let mut record = Record::new();
        for key in keys {
            record.insert(*key, Value::Missing);
        }
        record
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Replaces the value in place if the key exists, otherwise appends.
    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| k == key) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((key.to_string(), value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.fields.iter_mut().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Removes the column, keeping the order of the others.
    pub fn take(&mut self, key: &str) -> Option<Value> {
        let pos = self.fields.iter().position(|(k, _)| k == key)?;
        Some(self.fields.remove(pos).1)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Top-level fields whose lookup failed.
    pub fn unresolved(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(_, v)| v.is_missing())
            .map(|(k, _)| k.as_str())
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect::<Map<_, _>>(),
        )
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_replaces_in_place() {
        let mut r = Record::new().with("a", "1").with("b", "2");
        r.insert("a", "3");
        assert_eq!(r.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(r.get("a"), Some(&Value::text("3")));
    }

    #[test]
    fn take_preserves_remaining_order() {
        let mut r = Record::new().with("a", "1").with("b", "2").with("c", "3");
        assert_eq!(r.take("b"), Some(Value::text("2")));
        assert_eq!(r.keys().collect::<Vec<_>>(), vec!["a", "c"]);
        assert_eq!(r.take("b"), None);
    }

    #[test]
    fn placeholder_has_every_key_unresolved() {
        let r = Record::placeholder(&["name", "rating"]);
        assert_eq!(r.len(), 2);
        assert_eq!(r.unresolved(), vec!["name", "rating"]);
    }

    #[test]
    fn cells_render_missing_and_nested_values() {
        assert_eq!(Value::Missing.to_cell(), "Not specified");
        assert_eq!(Value::Number(2.6).to_cell(), "2.6");
        assert_eq!(Value::Number(0.0).to_cell(), "0");
        assert_eq!(
            Value::List(vec!["North Indian".into(), "Chinese".into()]).to_cell(),
            r#"["North Indian","Chinese"]"#
        );
        let nested = Record::new().with("latitude", "28.6").with("longitude", Value::Missing);
        assert_eq!(Value::Record(nested).to_cell(), r#"{"latitude":"28.6","longitude":null}"#);
    }

    #[test]
    fn journal_form_round_trips() {
        let r = Record::new()
            .with("url", "https://example.com/r/1")
            .with("rating", Value::List(vec!["4.2".into()]))
            .with("dish_data", Value::Items(vec![Record::new().with("name", "Dal")]));
        let line = serde_json::to_string(&r).unwrap();
        let back: Record = serde_json::from_str(&line).unwrap();
        assert_eq!(back, r);
    }
}
