use crate::core::{Fields, Record, Value};

pub type Row = Vec<Value>;

/// Rows produced by a read, with the column names in result order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl QueryResult {
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Turns every row into a record whose snapshot equals the row as read.
    pub fn into_records(self) -> Vec<Record> {
        let columns = self.columns;
        self.rows
            .into_iter()
            .map(|row| {
                let fields: Fields = columns.iter().cloned().zip(row).collect();
                Record::loaded(fields)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::{RecordStatus, classify};

    #[test]
    fn test_into_records_snapshots_each_row() {
        let result = QueryResult::new(
            vec!["name".to_string(), "id".to_string()],
            vec![
                vec![Value::Text("Ada".into()), Value::Integer(1)],
                vec![Value::Null, Value::Integer(2)],
            ],
        );
        assert_eq!(result.row_count(), 2);

        let records = result.into_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].get("name"), Some(&Value::Null));
        // Columns come back in result order, not sorted
        let columns: Vec<&str> = records[0].columns().collect();
        assert_eq!(columns, vec!["name", "id"]);
        for record in &records {
            assert_eq!(classify(record, false), RecordStatus::Unchanged);
        }
    }

    #[test]
    fn test_empty_result() {
        let result = QueryResult::empty();
        assert!(result.is_empty());
        assert!(result.into_records().is_empty());
    }
}
