use super::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Column name to value mapping, in the order columns were first set or read.
pub type Fields = IndexMap<String, Value>;

/// A mutable row of an entity table.
///
/// The current values and the snapshot of the last persisted values live in
/// separate fields, so a column can never collide with the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    values: Fields,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    original_values: Option<Fields>,
}

impl Record {
    /// Creates an empty record that has never been persisted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a record from a row just read from the store.
    ///
    /// The snapshot equals the values as read.
    pub fn loaded(values: Fields) -> Self {
        Self {
            original_values: Some(values.clone()),
            values,
        }
    }

    /// Builder-style setter.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(column.into(), value.into())
    }

    /// Removes `column`, keeping the order of the others.
    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.values.shift_remove(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    pub fn values(&self) -> &Fields {
        &self.values
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Values as they were when the record was last loaded or written.
    pub fn original_values(&self) -> Option<&Fields> {
        self.original_values.as_ref()
    }

    pub fn has_snapshot(&self) -> bool {
        self.original_values.is_some()
    }

    /// Replaces the snapshot with the current values.
    pub(crate) fn refresh_snapshot(&mut self) {
        self.original_values = Some(self.values.clone());
    }

    /// Drops the snapshot; the record no longer corresponds to a stored row.
    pub(crate) fn forget_snapshot(&mut self) {
        self.original_values = None;
    }

    pub fn into_values(self) -> Fields {
        self.values
    }
}

impl<K, V> FromIterator<(K, V)> for Record
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let values = iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            values,
            original_values: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_has_no_snapshot() {
        let record = Record::new().with("name", "Ada");
        assert!(!record.has_snapshot());
        assert_eq!(record.get("name"), Some(&Value::Text("Ada".into())));
    }

    #[test]
    fn test_loaded_record_snapshot_matches_values() {
        let mut fields = Fields::new();
        fields.insert("id".to_string(), Value::Integer(1));
        let record = Record::loaded(fields.clone());
        assert_eq!(record.original_values(), Some(&fields));
        assert_eq!(record.values(), &fields);
    }

    #[test]
    fn test_snapshot_is_not_a_column() {
        let mut record = Record::loaded(Fields::new());
        record.set("originalValues", "data");
        assert_eq!(record.len(), 1);
        assert!(record.original_values().is_some_and(|s| s.is_empty()));
    }

    #[test]
    fn test_columns_keep_insertion_order() {
        let mut record = Record::new()
            .with("name", "Ada")
            .with("id", 1)
            .with("email", "ada@x.io");
        let columns: Vec<&str> = record.columns().collect();
        assert_eq!(columns, vec!["name", "id", "email"]);

        record.remove("id");
        record.set("name", "Ada Lovelace");
        let columns: Vec<&str> = record.columns().collect();
        assert_eq!(columns, vec!["name", "email"]);
    }

    #[test]
    fn test_equality_ignores_column_order() {
        let a = Record::new().with("id", 1).with("name", "Ada");
        let b = Record::new().with("name", "Ada").with("id", 1);
        assert_eq!(a, b);
    }

    #[test]
    fn test_refresh_and_forget_snapshot() {
        let mut record: Record = [("id", Value::Integer(3))].into_iter().collect();
        record.refresh_snapshot();
        assert_eq!(record.original_values(), Some(record.values()));
        record.forget_snapshot();
        assert!(!record.has_snapshot());
    }
}
