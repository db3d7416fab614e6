use crate::core::{Record, Value};
use std::fmt;

/// Write a record needs, derived from its snapshot state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordStatus {
    /// No snapshot: the record was never loaded or written.
    New,
    Unchanged,
    Updated,
    /// Requested by the caller regardless of the snapshot.
    Deleted,
}

impl RecordStatus {
    pub fn needs_write(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => write!(f, "NEW"),
            Self::Unchanged => write!(f, "UNCHANGED"),
            Self::Updated => write!(f, "UPDATED"),
            Self::Deleted => write!(f, "DELETED"),
        }
    }
}

/// Compares a record with its snapshot.
///
/// Only snapshotted columns are compared; a snapshotted column that was
/// removed from the record compares as NULL.
pub fn classify(record: &Record, force_delete: bool) -> RecordStatus {
    if force_delete {
        return RecordStatus::Deleted;
    }

    let Some(original) = record.original_values() else {
        return RecordStatus::New;
    };

    let changed = original
        .iter()
        .any(|(column, before)| record.get(column).unwrap_or(&Value::Null) != before);

    if changed {
        RecordStatus::Updated
    } else {
        RecordStatus::Unchanged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Fields;
    use proptest::prelude::*;

    fn loaded() -> Record {
        let mut fields = Fields::new();
        fields.insert("id".to_string(), Value::Integer(1));
        fields.insert("name".to_string(), Value::Text("Ada".into()));
        fields.insert("nickname".to_string(), Value::Null);
        Record::loaded(fields)
    }

    #[test]
    fn test_new_without_snapshot() {
        assert_eq!(classify(&Record::new().with("name", "Ada"), false), RecordStatus::New);
    }

    #[test]
    fn test_unchanged_after_load() {
        assert_eq!(classify(&loaded(), false), RecordStatus::Unchanged);
    }

    #[test]
    fn test_updated_on_value_change() {
        let mut record = loaded();
        record.set("name", "Grace");
        assert_eq!(classify(&record, false), RecordStatus::Updated);
    }

    #[test]
    fn test_value_equality_not_identity() {
        let mut record = loaded();
        record.set("name", String::from("Ada"));
        record.set("id", Value::Double(1.0));
        assert_eq!(classify(&record, false), RecordStatus::Unchanged);
    }

    #[test]
    fn test_large_integer_to_nearby_double_is_a_change() {
        let mut fields = Fields::new();
        fields.insert("id".to_string(), Value::Integer(9_007_199_254_740_993));
        let mut record = Record::loaded(fields);
        record.set("id", Value::Double(9_007_199_254_740_992.0));
        assert_eq!(classify(&record, false), RecordStatus::Updated);
    }

    #[test]
    fn test_removed_column_compares_as_null() {
        let mut record = loaded();
        record.remove("nickname");
        assert_eq!(classify(&record, false), RecordStatus::Unchanged);
        record.remove("name");
        assert_eq!(classify(&record, false), RecordStatus::Updated);
    }

    #[test]
    fn test_columns_outside_snapshot_ignored() {
        let mut record = loaded();
        record.set("extra", 5);
        assert_eq!(classify(&record, false), RecordStatus::Unchanged);
    }

    #[test]
    fn test_force_delete_overrides() {
        assert_eq!(classify(&loaded(), true), RecordStatus::Deleted);
        assert_eq!(classify(&Record::new(), true), RecordStatus::Deleted);
    }

    proptest! {
        #[test]
        fn prop_classification_is_stable(values in proptest::collection::btree_map("[a-z]{1,6}", any::<i64>(), 0..8)) {
            let fields: Fields = values.into_iter().map(|(k, v)| (k, Value::Integer(v))).collect();
            let record = Record::loaded(fields);
            for _ in 0..3 {
                prop_assert_eq!(classify(&record, false), RecordStatus::Unchanged);
            }
        }
    }
}
