use crate::connection::ConnectionError;
use std::fmt;
use thiserror::Error;

/// Point in a write batch at which the connection refused a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStage {
    /// The statement could not be prepared (malformed SQL, unknown table or column).
    Prepare,
    /// The statement was prepared but failed to run (constraint or runtime failure).
    Execute,
    /// Every statement ran but the transaction could not be committed.
    Commit,
}

impl fmt::Display for WriteStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prepare => write!(f, "prepare"),
            Self::Execute => write!(f, "execute"),
            Self::Commit => write!(f, "commit"),
        }
    }
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("No unique record found in '{table}' ({matched} rows matched)")]
    RecordNotFound { table: String, matched: usize },

    #[error("Update failed during {stage} of `{sql}` with parameters {parameters}: {reason}")]
    UpdateFailed {
        stage: WriteStage,
        sql: String,
        parameters: String,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Column '{column}' required by a statement on '{table}' is missing from the record")]
    MissingParameter { table: String, column: String },

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Query `{sql}` with parameters {parameters} failed: {reason}")]
    QueryFailed {
        sql: String,
        parameters: String,
        reason: String,
    },

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    IoError(String),
}

impl DbError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RecordNotFound { .. })
    }

    /// Stage at which a write batch failed, if this is an update failure.
    pub fn write_stage(&self) -> Option<WriteStage> {
        match self {
            Self::UpdateFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, DbError>;

impl<T> From<std::sync::PoisonError<T>> for DbError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for DbError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_failed_message_carries_statement() {
        let err = DbError::UpdateFailed {
            stage: WriteStage::Execute,
            sql: "DELETE FROM users WHERE id=?;".to_string(),
            parameters: "[i: 7]".to_string(),
            reason: "constraint".to_string(),
        };

        let message = err.to_string();
        assert!(message.contains("execute"));
        assert!(message.contains("DELETE FROM users WHERE id=?;"));
        assert!(message.contains("[i: 7]"));
        assert_eq!(err.write_stage(), Some(WriteStage::Execute));
    }

    #[test]
    fn test_not_found_classification() {
        let err = DbError::RecordNotFound {
            table: "users".to_string(),
            matched: 0,
        };
        assert!(err.is_not_found());
        assert_eq!(err.write_stage(), None);
    }
}
