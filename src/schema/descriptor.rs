// ============================================================================
// Table Descriptor
// ============================================================================
//
// Static per-entity metadata: table name, ordered columns with their
// parameter types, the primary key subset and the optional auto-increment
// column. A descriptor can only be obtained through validation, so every
// descriptor reaching the statement builder is structurally sound.
//
// ============================================================================

use crate::core::{DbError, ParamType, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

lazy_static! {
    static ref SQL_IDENTIFIER: Regex =
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid");
}

/// A column name together with the parameter kind it binds as.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TableDescriptorBuilder", into = "TableDescriptorBuilder")]
pub struct TableDescriptor {
    table_name: String,
    columns: Vec<ColumnDef>,
    primary_key: Vec<ColumnDef>,
    auto_increment: Option<String>,
}

impl TableDescriptor {
    pub fn builder(table_name: impl Into<String>) -> TableDescriptorBuilder {
        TableDescriptorBuilder::new(table_name)
    }

    /// Parses and validates a descriptor declared as JSON.
    ///
    /// ```
    /// # use recordkeeper::TableDescriptor;
    /// let descriptor = TableDescriptor::from_json(r#"{
    ///     "table": "users",
    ///     "columns": [
    ///         {"name": "id", "type": "integer"},
    ///         {"name": "name", "type": "string"}
    ///     ],
    ///     "primary_key": [{"name": "id", "type": "integer"}],
    ///     "auto_increment": "id"
    /// }"#).unwrap();
    /// assert_eq!(descriptor.table_name(), "users");
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        let builder: TableDescriptorBuilder = serde_json::from_str(json)?;
        builder.build()
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// All columns in declaration order.
    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    /// Primary key columns in key order.
    pub fn primary_key(&self) -> &[ColumnDef] {
        &self.primary_key
    }

    pub fn auto_increment(&self) -> Option<&str> {
        self.auto_increment.as_deref()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|col| col.name == name)
    }

    pub fn is_key_column(&self, name: &str) -> bool {
        self.primary_key.iter().any(|col| col.name == name)
    }

    /// Columns outside the primary key, in declaration order.
    pub fn non_key_columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns
            .iter()
            .filter(|col| !self.is_key_column(&col.name))
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

/// Collects a descriptor declaration and validates it on [`build`](Self::build).
///
/// This is also the JSON shape of a descriptor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableDescriptorBuilder {
    #[serde(rename = "table")]
    table_name: String,
    columns: Vec<ColumnDef>,
    primary_key: Vec<ColumnDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    auto_increment: Option<String>,
}

impl TableDescriptorBuilder {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            ..Self::default()
        }
    }

    pub fn column(mut self, name: impl Into<String>, param_type: ParamType) -> Self {
        self.columns.push(ColumnDef::new(name, param_type));
        self
    }

    pub fn primary_key(mut self, name: impl Into<String>, param_type: ParamType) -> Self {
        self.primary_key.push(ColumnDef::new(name, param_type));
        self
    }

    pub fn auto_increment(mut self, name: impl Into<String>) -> Self {
        self.auto_increment = Some(name.into());
        self
    }

    pub fn build(self) -> Result<TableDescriptor> {
        validate_identifier("table", &self.table_name)?;

        if self.columns.is_empty() {
            return Err(config_error(&self.table_name, "no columns declared"));
        }

        let mut seen = HashSet::new();
        for col in &self.columns {
            validate_identifier("column", &col.name)?;
            if !seen.insert(col.name.as_str()) {
                return Err(config_error(
                    &self.table_name,
                    &format!("column '{}' declared twice", col.name),
                ));
            }
        }

        if self.primary_key.is_empty() {
            return Err(config_error(&self.table_name, "primary key is empty"));
        }

        let mut seen_keys = HashSet::new();
        for key in &self.primary_key {
            if !seen_keys.insert(key.name.as_str()) {
                return Err(config_error(
                    &self.table_name,
                    &format!("primary key column '{}' declared twice", key.name),
                ));
            }
            let Some(col) = self.columns.iter().find(|c| c.name == key.name) else {
                return Err(config_error(
                    &self.table_name,
                    &format!("primary key column '{}' is not a column", key.name),
                ));
            };
            if col.param_type != key.param_type {
                return Err(config_error(
                    &self.table_name,
                    &format!(
                        "primary key column '{}' has type '{}' but the column is '{}'",
                        key.name, key.param_type, col.param_type
                    ),
                ));
            }
        }

        if let Some(auto) = &self.auto_increment {
            let Some(key) = self.primary_key.iter().find(|k| &k.name == auto) else {
                return Err(config_error(
                    &self.table_name,
                    &format!("auto-increment column '{}' is not in the primary key", auto),
                ));
            };
            if key.param_type != ParamType::Integer {
                return Err(config_error(
                    &self.table_name,
                    &format!("auto-increment column '{}' must be an integer", auto),
                ));
            }
        }

        Ok(TableDescriptor {
            table_name: self.table_name,
            columns: self.columns,
            primary_key: self.primary_key,
            auto_increment: self.auto_increment,
        })
    }
}

impl TryFrom<TableDescriptorBuilder> for TableDescriptor {
    type Error = DbError;

    fn try_from(builder: TableDescriptorBuilder) -> Result<Self> {
        builder.build()
    }
}

impl From<TableDescriptor> for TableDescriptorBuilder {
    fn from(descriptor: TableDescriptor) -> Self {
        Self {
            table_name: descriptor.table_name,
            columns: descriptor.columns,
            primary_key: descriptor.primary_key,
            auto_increment: descriptor.auto_increment,
        }
    }
}

fn validate_identifier(kind: &str, name: &str) -> Result<()> {
    if SQL_IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(DbError::ConfigurationError(format!(
            "{} name '{}' is not a plain SQL identifier",
            kind, name
        )))
    }
}

fn config_error(table: &str, message: &str) -> DbError {
    DbError::ConfigurationError(format!("table '{}': {}", table, message))
}
