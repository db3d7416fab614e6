use crate::core::{DbError, ParamType, Record, Result, Value};
use crate::schema::ColumnDef;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What to bind when a statement needs a column the record does not carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingValuePolicy {
    /// Bind NULL in place of the missing column. Partial records are accepted,
    /// but a missing key column silently becomes `NULL` in a WHERE clause.
    #[default]
    Lenient,
    /// Fail with [`DbError::MissingParameter`].
    Strict,
}

/// Ordered parameter list of a synthesized statement: one type code per
/// placeholder followed by the column each placeholder reads from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterSpec {
    type_codes: String,
    columns: Vec<String>,
}

impl ParameterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, column: &ColumnDef) {
        self.type_codes.push(column.param_type.code());
        self.columns.push(column.name.clone());
    }

    pub(crate) fn extend<'a>(&mut self, columns: impl IntoIterator<Item = &'a ColumnDef>) {
        for column in columns {
            self.push(column);
        }
    }

    /// Concatenated type codes, e.g. `"ssi"`.
    pub fn type_codes(&self) -> &str {
        &self.type_codes
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn param_types(&self) -> impl Iterator<Item = ParamType> + '_ {
        self.type_codes.chars().filter_map(ParamType::from_code)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Looks up every listed column in `record`, in order. Absent columns
    /// bind as NULL and are listed in [`Resolved::missing`]; whether that is
    /// acceptable is decided by the caller's [`MissingValuePolicy`].
    pub fn resolve(&self, record: &Record) -> Resolved {
        let mut values = Vec::with_capacity(self.columns.len());
        let mut missing = Vec::new();

        for column in &self.columns {
            match record.get(column) {
                Some(value) => values.push(value.clone()),
                None => {
                    values.push(Value::Null);
                    missing.push(column.clone());
                }
            }
        }

        Resolved {
            parameters: BoundParameters {
                type_codes: self.type_codes.clone(),
                values,
            },
            missing,
        }
    }

    /// Binds caller-supplied values positionally, e.g. key values for a lookup.
    pub fn bind(&self, values: Vec<Value>) -> Result<BoundParameters> {
        if values.len() != self.columns.len() {
            return Err(DbError::InvalidKey(format!(
                "expected {} values for ({}), got {}",
                self.columns.len(),
                self.columns.join(", "),
                values.len()
            )));
        }
        Ok(BoundParameters {
            type_codes: self.type_codes.clone(),
            values,
        })
    }
}

/// Outcome of resolving a parameter list against a record.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub parameters: BoundParameters,
    /// Columns that were absent and bound as NULL.
    pub missing: Vec<String>,
}

/// Type codes and concrete values handed to the connection for one execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundParameters {
    type_codes: String,
    values: Vec<Value>,
}

impl BoundParameters {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Pairs explicit type codes with values. The lengths must agree.
    pub fn new(type_codes: impl Into<String>, values: Vec<Value>) -> Result<Self> {
        let type_codes = type_codes.into();
        if type_codes.chars().count() != values.len() {
            return Err(DbError::InvalidKey(format!(
                "type codes '{}' do not match {} values",
                type_codes,
                values.len()
            )));
        }
        if let Some(bad) = type_codes.chars().find(|c| ParamType::from_code(*c).is_none()) {
            return Err(DbError::InvalidKey(format!("unknown parameter type code '{}'", bad)));
        }
        Ok(Self { type_codes, values })
    }

    /// Binds each value with the type code matching its own kind.
    pub fn from_values(values: Vec<Value>) -> Self {
        let type_codes = values.iter().map(|v| v.natural_param_type().code()).collect();
        Self { type_codes, values }
    }

    pub fn type_codes(&self) -> &str {
        &self.type_codes
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (ParamType, &Value)> {
        self.type_codes
            .chars()
            .filter_map(ParamType::from_code)
            .zip(self.values.iter())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Display for BoundParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .iter()
            .map(|(ty, value)| format!("{}: {}", ty, value))
            .collect();
        write!(f, "[{}]", rendered.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ParameterSpec {
        let mut spec = ParameterSpec::new();
        spec.push(&ColumnDef::new("name", ParamType::String));
        spec.push(&ColumnDef::new("id", ParamType::Integer));
        spec
    }

    #[test]
    fn test_type_codes_follow_column_order() {
        let spec = spec();
        assert_eq!(spec.type_codes(), "si");
        assert_eq!(spec.columns(), &["name".to_string(), "id".to_string()]);
    }

    #[test]
    fn test_resolution_binds_null_for_missing() {
        let record = Record::new().with("name", "Ada");
        let resolved = spec().resolve(&record);
        assert_eq!(
            resolved.parameters.values(),
            &[Value::Text("Ada".into()), Value::Null]
        );
        assert_eq!(resolved.missing, vec!["id".to_string()]);
    }

    #[test]
    fn test_complete_record_has_nothing_missing() {
        let record = Record::new().with("name", "Ada").with("id", 3);
        let resolved = spec().resolve(&record);
        assert!(resolved.missing.is_empty());
        assert_eq!(resolved.parameters.to_string(), "[s: 'Ada', i: 3]");
    }

    #[test]
    fn test_bind_checks_arity() {
        assert!(spec().bind(vec![Value::Integer(1)]).is_err());
        let bound = spec().bind(vec!["x".into(), Value::Integer(1)]).unwrap();
        assert_eq!(bound.to_string(), "[s: 'x', i: 1]");
    }

    #[test]
    fn test_bound_parameters_validate_codes() {
        assert!(BoundParameters::new("iq", vec![Value::Null, Value::Null]).is_err());
        assert!(BoundParameters::new("i", vec![]).is_err());
        let bound = BoundParameters::from_values(vec![Value::Integer(1), "a".into()]);
        assert_eq!(bound.type_codes(), "is");
    }
}
