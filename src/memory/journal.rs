// ============================================================================
// Change Journal
// ============================================================================
//
// Every row change made while autocommit is off is recorded here so that a
// rollback can undo it. Commit simply forgets the journal.
//
// ============================================================================

use super::table::MemoryTable;
use crate::result::Row;
use std::collections::HashMap;

/// A single reversible row change.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Change {
    Inserted { table: String, row_id: u64 },
    Updated { table: String, row_id: u64, old_row: Row },
    Deleted { table: String, row_id: u64, old_row: Row },
}

impl Change {
    pub fn table_name(&self) -> &str {
        match self {
            Change::Inserted { table, .. } | Change::Updated { table, .. } | Change::Deleted { table, .. } => table,
        }
    }

    /// Reverses this change on `table`.
    fn undo(self, table: &mut MemoryTable) {
        match self {
            Change::Inserted { row_id, .. } => {
                table.delete(row_id);
            }
            Change::Updated { row_id, old_row, .. } | Change::Deleted { row_id, old_row, .. } => {
                table.restore(row_id, old_row);
            }
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Journal {
    changes: Vec<Change>,
}

impl Journal {
    pub fn record(&mut self, change: Change) {
        self.changes.push(change);
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn clear(&mut self) {
        self.changes.clear();
    }

    /// Undoes every recorded change, newest first, and empties the journal.
    ///
    /// Auto-increment counters are left where they are, so rolled back keys
    /// are not handed out again.
    pub fn rollback(&mut self, tables: &mut HashMap<String, MemoryTable>) -> usize {
        let undone = self.changes.len();
        while let Some(change) = self.changes.pop() {
            if let Some(table) = tables.get_mut(change.table_name()) {
                change.undo(table);
            }
        }
        undone
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ParamType, Value};

    fn tables() -> HashMap<String, MemoryTable> {
        let table = MemoryTable::new("notes")
            .column("id", ParamType::Integer)
            .column("body", ParamType::String)
            .primary_key(&["id"]);
        HashMap::from([("notes".to_string(), table)])
    }

    #[test]
    fn test_rollback_restores_in_reverse_order() {
        let mut tables = tables();
        let mut journal = Journal::default();
        let notes = tables.get_mut("notes").unwrap();

        let (kept, _) = notes.insert(vec![(0, Value::Integer(1)), (1, Value::from("a"))]).unwrap();

        let (added, _) = notes.insert(vec![(0, Value::Integer(2))]).unwrap();
        journal.record(Change::Inserted { table: "notes".into(), row_id: added });

        let old_row = notes.update(kept, &[(1, Value::from("b"))]).unwrap();
        journal.record(Change::Updated { table: "notes".into(), row_id: kept, old_row });

        let old_row = notes.delete(kept).unwrap();
        journal.record(Change::Deleted { table: "notes".into(), row_id: kept, old_row });

        assert_eq!(journal.len(), 3);
        assert_eq!(journal.rollback(&mut tables), 3);
        assert_eq!(journal.len(), 0);

        let notes = &tables["notes"];
        assert_eq!(notes.len(), 1);
        assert_eq!(notes.row(kept).unwrap()[1], Value::from("a"));
    }
}
