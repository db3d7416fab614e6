use crate::core::{DbError, ParamType, Result, Value};
use crate::result::Row;
use crate::schema::{ColumnDef, TableDescriptor};
use std::collections::{BTreeMap, HashSet};

/// In-memory table with key, unique and not-null constraints.
///
/// Rows keep a stable internal id so a rolled back delete puts the row
/// back where it was.
#[derive(Debug, Clone)]
pub struct MemoryTable {
    name: String,
    columns: Vec<ColumnDef>,
    primary_key: Vec<String>,
    auto_increment: Option<String>,
    unique: Vec<Vec<String>>,
    not_null: HashSet<String>,
    rows: BTreeMap<u64, Row>,
    next_row_id: u64,
    /// `None` once the counter has passed `i64::MAX`.
    next_auto_value: Option<i64>,
}

impl MemoryTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            auto_increment: None,
            unique: Vec::new(),
            not_null: HashSet::new(),
            rows: BTreeMap::new(),
            next_row_id: 0,
            next_auto_value: Some(1),
        }
    }

    /// Mirrors a descriptor: same columns, key and auto-increment column.
    pub fn from_descriptor(descriptor: &TableDescriptor) -> Self {
        let mut table = Self::new(descriptor.table_name());
        for column in descriptor.columns() {
            table = table.column(&column.name, column.param_type);
        }
        let key: Vec<&str> = descriptor.primary_key().iter().map(|c| c.name.as_str()).collect();
        table = table.primary_key(&key);
        if let Some(column) = descriptor.auto_increment() {
            table = table.auto_increment(column);
        }
        table
    }

    pub fn column(mut self, name: &str, param_type: ParamType) -> Self {
        self.columns.push(ColumnDef::new(name, param_type));
        self
    }

    pub fn primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn auto_increment(mut self, column: &str) -> Self {
        self.auto_increment = Some(column.to_string());
        self
    }

    /// Adds a unique constraint over `columns`. Rows with a NULL in any of
    /// them never conflict.
    pub fn unique(mut self, columns: &[&str]) -> Self {
        self.unique.push(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn not_null(mut self, column: &str) -> Self {
        self.not_null.insert(column.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Current rows in insertion order.
    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.rows.values()
    }

    /// Checks that every constraint names a declared column.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(DbError::ConfigurationError(format!(
                "Table '{}' has no columns",
                self.name
            )));
        }
        let constrained = self
            .primary_key
            .iter()
            .chain(self.unique.iter().flatten())
            .chain(self.not_null.iter())
            .chain(self.auto_increment.iter());
        for column in constrained {
            if self.column_index(column).is_none() {
                return Err(DbError::ConfigurationError(format!(
                    "Constraint on unknown column '{}' in table '{}'",
                    column, self.name
                )));
            }
        }
        if let Some(column) = &self.auto_increment
            && let Some(def) = self.columns.iter().find(|c| &c.name == column)
            && def.param_type != ParamType::Integer
        {
            return Err(DbError::ConfigurationError(format!(
                "Auto-increment column '{}' must be an integer",
                column
            )));
        }
        Ok(())
    }

    /// Inserts a row built from `(column index, value)` pairs.
    ///
    /// Returns the internal row id and the auto-increment value stored, if
    /// the table has an auto-increment column.
    pub(crate) fn insert(&mut self, assigned: Vec<(usize, Value)>) -> std::result::Result<(u64, Option<i64>), String> {
        let mut row: Row = vec![Value::Null; self.columns.len()];
        for (index, value) in assigned {
            row[index] = self.coerce(index, value)?;
        }

        let mut stored_auto = None;
        if let Some(index) = self.auto_index() {
            let value = match &row[index] {
                Value::Null => self.next_auto_value.ok_or_else(|| {
                    format!("auto-increment counter of '{}' is exhausted", self.name)
                })?,
                Value::Integer(explicit) => *explicit,
                other => return Err(format!("auto-increment value {} is not an integer", other)),
            };
            row[index] = Value::Integer(value);
            stored_auto = Some(value);
        }

        self.check_row(&row, None)?;

        if let Some(value) = stored_auto {
            self.next_auto_value = match (self.next_auto_value, value.checked_add(1)) {
                (Some(current), Some(after)) => Some(current.max(after)),
                _ => None,
            };
        }
        let row_id = self.next_row_id;
        self.next_row_id += 1;
        self.rows.insert(row_id, row);
        Ok((row_id, stored_auto))
    }

    /// Ids of the rows for which `predicate` holds.
    pub(crate) fn matching(&self, predicate: impl Fn(&Row) -> bool) -> Vec<u64> {
        self.rows
            .iter()
            .filter(|(_, row)| predicate(row))
            .map(|(id, _)| *id)
            .collect()
    }

    pub(crate) fn row(&self, row_id: u64) -> Option<&Row> {
        self.rows.get(&row_id)
    }

    /// Applies `(column index, value)` assignments to one row, returning the
    /// row as it was.
    pub(crate) fn update(&mut self, row_id: u64, assigned: &[(usize, Value)]) -> std::result::Result<Row, String> {
        let Some(old) = self.rows.get(&row_id).cloned() else {
            return Err(format!("row {} vanished from '{}'", row_id, self.name));
        };
        let mut new = old.clone();
        for (index, value) in assigned {
            new[*index] = self.coerce(*index, value.clone())?;
        }
        self.check_row(&new, Some(row_id))?;
        self.rows.insert(row_id, new);
        Ok(old)
    }

    pub(crate) fn delete(&mut self, row_id: u64) -> Option<Row> {
        self.rows.remove(&row_id)
    }

    /// Puts `row` back under `row_id` without constraint checks.
    pub(crate) fn restore(&mut self, row_id: u64, row: Row) {
        self.rows.insert(row_id, row);
    }

    fn auto_index(&self) -> Option<usize> {
        self.auto_increment.as_deref().and_then(|c| self.column_index(c))
    }

    fn coerce(&self, index: usize, value: Value) -> std::result::Result<Value, String> {
        let column = &self.columns[index];
        match (column.param_type, value) {
            (ParamType::Double, Value::Integer(i)) => Ok(Value::Double(i as f64)),
            (ParamType::Blob, Value::Text(s)) => Ok(Value::Blob(s.into_bytes())),
            (ty, value) if ty.accepts(&value) => Ok(value),
            (ty, value) => Err(format!(
                "column '{}' of type {} cannot hold {} value {}",
                column.name,
                ty,
                value.type_name(),
                value
            )),
        }
    }

    fn check_row(&self, row: &Row, ignore: Option<u64>) -> std::result::Result<(), String> {
        for (index, column) in self.columns.iter().enumerate() {
            let required = self.not_null.contains(&column.name) || self.primary_key.contains(&column.name);
            if required && row[index].is_null() {
                return Err(format!("column '{}' cannot be NULL", column.name));
            }
        }

        let key = std::iter::once(("PRIMARY", &self.primary_key));
        let unique = self.unique.iter().map(|columns| ("UNIQUE", columns));
        for (kind, columns) in key.chain(unique) {
            if columns.is_empty() {
                continue;
            }
            let indexes: Vec<usize> = columns.iter().filter_map(|c| self.column_index(c)).collect();
            if indexes.iter().any(|&i| row[i].is_null()) {
                continue;
            }
            let duplicate = self.rows.iter().any(|(id, other)| {
                Some(*id) != ignore && indexes.iter().all(|&i| other[i] == row[i])
            });
            if duplicate {
                let rendered: Vec<String> = indexes.iter().map(|&i| row[i].to_string()).collect();
                return Err(format!(
                    "duplicate entry ({}) for {} key ({}) of '{}'",
                    rendered.join(", "),
                    kind,
                    columns.join(", "),
                    self.name
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> MemoryTable {
        MemoryTable::new("users")
            .column("id", ParamType::Integer)
            .column("email", ParamType::String)
            .column("score", ParamType::Double)
            .primary_key(&["id"])
            .auto_increment("id")
            .unique(&["email"])
    }

    #[test]
    fn test_auto_increment_fills_and_advances() {
        let mut table = users();
        let (_, first) = table.insert(vec![(1, Value::from("a@x.io"))]).unwrap();
        let (_, explicit) = table.insert(vec![(0, Value::Integer(10)), (1, Value::from("b@x.io"))]).unwrap();
        let (_, next) = table.insert(vec![(1, Value::from("c@x.io"))]).unwrap();

        assert_eq!(first, Some(1));
        assert_eq!(explicit, Some(10));
        assert_eq!(next, Some(11));
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_auto_increment_exhausted_after_max_key() {
        let mut table = users();
        let (_, stored) = table.insert(vec![(0, Value::Integer(i64::MAX))]).unwrap();
        assert_eq!(stored, Some(i64::MAX));

        let err = table.insert(vec![(1, Value::from("a@x.io"))]).unwrap_err();
        assert!(err.contains("exhausted"));
        assert_eq!(table.len(), 1);

        // Explicit keys still work
        let (_, stored) = table.insert(vec![(0, Value::Integer(7))]).unwrap();
        assert_eq!(stored, Some(7));
        assert!(table.insert(vec![]).is_err());
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let mut table = users();
        table.insert(vec![(0, Value::Integer(1))]).unwrap();
        let err = table.insert(vec![(0, Value::Integer(1))]).unwrap_err();
        assert!(err.contains("PRIMARY"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_unique_ignores_null() {
        let mut table = users();
        table.insert(vec![]).unwrap();
        table.insert(vec![]).unwrap();

        table.insert(vec![(1, Value::from("a@x.io"))]).unwrap();
        let err = table.insert(vec![(1, Value::from("a@x.io"))]).unwrap_err();
        assert!(err.contains("UNIQUE"));
    }

    #[test]
    fn test_key_column_cannot_be_null() {
        let mut table = MemoryTable::new("tags")
            .column("name", ParamType::String)
            .primary_key(&["name"]);
        let err = table.insert(vec![]).unwrap_err();
        assert!(err.contains("cannot be NULL"));
    }

    #[test]
    fn test_type_coercion() {
        let mut table = users();
        let (row_id, _) = table.insert(vec![(2, Value::Integer(3))]).unwrap();
        assert_eq!(table.row(row_id).unwrap()[2], Value::Double(3.0));

        let err = table.insert(vec![(2, Value::from("high"))]).unwrap_err();
        assert!(err.contains("score"));
    }

    #[test]
    fn test_update_checks_constraints_against_other_rows() {
        let mut table = users();
        let (first, _) = table.insert(vec![(1, Value::from("a@x.io"))]).unwrap();
        table.insert(vec![(1, Value::from("b@x.io"))]).unwrap();

        // Rewriting a row with its own values is not a conflict
        table.update(first, &[(1, Value::from("a@x.io"))]).unwrap();
        assert!(table.update(first, &[(1, Value::from("b@x.io"))]).is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_constraint_column() {
        let table = users().not_null("nickname");
        assert!(matches!(table.validate(), Err(DbError::ConfigurationError(_))));
    }
}
