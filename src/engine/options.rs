use crate::sql::MissingValuePolicy;
use serde::{Deserialize, Serialize};

/// Outcome of a multi-row read that matched nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyReadPolicy {
    /// Fail with `RecordNotFound`, even for a full-table scan.
    #[default]
    Error,
    /// Return an empty list.
    EmptyResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    pub missing_values: MissingValuePolicy,
    pub empty_reads: EmptyReadPolicy,
}

impl EngineOptions {
    pub fn missing_values(mut self, policy: MissingValuePolicy) -> Self {
        self.missing_values = policy;
        self
    }

    pub fn empty_reads(mut self, policy: EmptyReadPolicy) -> Self {
        self.empty_reads = policy;
        self
    }
}
