// ============================================================================
// Statement Synthesizer
// ============================================================================
//
// Pure functions from a TableDescriptor to SQL text with positional `?`
// placeholders and the ordered parameter list that feeds them.
//
// ============================================================================

use super::ParameterSpec;
use crate::core::{DbError, Result};
use crate::schema::{ColumnDef, TableDescriptor};

/// SQL text plus the ordered parameters its placeholders read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedStatement {
    pub sql: String,
    pub parameters: ParameterSpec,
}

pub struct StatementBuilder<'a> {
    descriptor: &'a TableDescriptor,
}

impl<'a> StatementBuilder<'a> {
    pub fn new(descriptor: &'a TableDescriptor) -> Self {
        Self { descriptor }
    }

    /// `SELECT * FROM t WHERE k1=? AND k2=?;` with the key columns as parameters.
    pub fn build_select_by_key(&self) -> SynthesizedStatement {
        let sql = format!(
            "SELECT * FROM {} WHERE {};",
            self.descriptor.table_name(),
            key_predicate(self.descriptor.primary_key())
        );

        SynthesizedStatement {
            sql,
            parameters: self.key_parameters(),
        }
    }

    pub fn build_select_all(&self) -> SynthesizedStatement {
        SynthesizedStatement {
            sql: format!("SELECT * FROM {};", self.descriptor.table_name()),
            parameters: ParameterSpec::new(),
        }
    }

    /// Inserts every declared column, in declaration order.
    pub fn build_insert(&self) -> SynthesizedStatement {
        let columns = self.descriptor.columns();
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        let placeholders = vec!["?"; columns.len()];

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({});",
            self.descriptor.table_name(),
            names.join(", "),
            placeholders.join(", ")
        );

        let mut parameters = ParameterSpec::new();
        parameters.extend(columns);

        SynthesizedStatement { sql, parameters }
    }

    /// Sets every non-key column and matches on the key.
    ///
    /// A table whose columns are all key columns has nothing to SET and is
    /// rejected as a configuration error.
    pub fn build_update(&self) -> Result<SynthesizedStatement> {
        let non_key: Vec<&ColumnDef> = self.descriptor.non_key_columns().collect();
        if non_key.is_empty() {
            return Err(DbError::ConfigurationError(format!(
                "table '{}': every column is part of the primary key, UPDATE would have an empty SET clause",
                self.descriptor.table_name()
            )));
        }

        let assignments: Vec<String> = non_key.iter().map(|c| format!("{}=?", c.name)).collect();

        let sql = format!(
            "UPDATE {} SET {} WHERE {};",
            self.descriptor.table_name(),
            assignments.join(", "),
            key_predicate(self.descriptor.primary_key())
        );

        let mut parameters = ParameterSpec::new();
        parameters.extend(non_key);
        parameters.extend(self.descriptor.primary_key());

        Ok(SynthesizedStatement { sql, parameters })
    }

    pub fn build_delete(&self) -> SynthesizedStatement {
        let sql = format!(
            "DELETE FROM {} WHERE {};",
            self.descriptor.table_name(),
            key_predicate(self.descriptor.primary_key())
        );

        SynthesizedStatement {
            sql,
            parameters: self.key_parameters(),
        }
    }

    fn key_parameters(&self) -> ParameterSpec {
        let mut parameters = ParameterSpec::new();
        parameters.extend(self.descriptor.primary_key());
        parameters
    }
}

fn key_predicate(keys: &[ColumnDef]) -> String {
    keys.iter()
        .map(|k| format!("{}=?", k.name))
        .collect::<Vec<_>>()
        .join(" AND ")
}
