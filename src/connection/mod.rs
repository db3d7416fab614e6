pub mod config;
pub mod provider;

use crate::result::QueryResult;
use crate::sql::BoundParameters;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Failure reported by a store connection.
///
/// Preparation and execution failures stay distinct so callers can tell a
/// malformed statement from a constraint or runtime failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("prepare failed: {0}")]
    Prepare(String),

    #[error("execute failed: {0}")]
    Execute(String),

    #[error("transaction control failed: {0}")]
    Transaction(String),

    #[error("unknown statement handle {0}")]
    UnknownStatement(u64),

    #[error("connection is closed")]
    Closed,

    #[error("could not open connection: {0}")]
    Open(String),
}

/// Opaque handle to a statement prepared on a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatementHandle(u64);

impl StatementHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Blocking connection to a relational store.
///
/// The engine drives one connection from one caller at a time. Placeholders
/// are positional `?` and parameters arrive with one type code each.
pub trait Connection: Send {
    /// Prepares `sql`; a malformed statement fails here.
    fn prepare(&mut self, sql: &str) -> Result<StatementHandle, ConnectionError>;

    /// Binds `parameters` and runs the statement.
    ///
    /// Returns the number of rows affected by a write, or produced by a read.
    fn execute(
        &mut self,
        statement: StatementHandle,
        parameters: &BoundParameters,
    ) -> Result<u64, ConnectionError>;

    /// Rows produced by the last execution of a read statement.
    fn fetch(&mut self, statement: StatementHandle) -> Result<QueryResult, ConnectionError>;

    /// Key generated by the most recent insert on this connection.
    fn last_insert_id(&self) -> i64;

    /// Disabling autocommit opens a transaction; enabling it commits the
    /// open transaction, if any.
    fn set_autocommit(&mut self, enabled: bool) -> Result<(), ConnectionError>;

    fn rollback(&mut self) -> Result<(), ConnectionError>;

    fn close(&mut self, statement: StatementHandle);
}

/// A connection shared between the repositories of one database.
pub type SharedConnection = Arc<Mutex<dyn Connection>>;

pub fn shared<C: Connection + 'static>(connection: C) -> SharedConnection {
    Arc::new(Mutex::new(connection))
}

impl<C: Connection + ?Sized> Connection for Box<C> {
    fn prepare(&mut self, sql: &str) -> Result<StatementHandle, ConnectionError> {
        (**self).prepare(sql)
    }

    fn execute(
        &mut self,
        statement: StatementHandle,
        parameters: &BoundParameters,
    ) -> Result<u64, ConnectionError> {
        (**self).execute(statement, parameters)
    }

    fn fetch(&mut self, statement: StatementHandle) -> Result<QueryResult, ConnectionError> {
        (**self).fetch(statement)
    }

    fn last_insert_id(&self) -> i64 {
        (**self).last_insert_id()
    }

    fn set_autocommit(&mut self, enabled: bool) -> Result<(), ConnectionError> {
        (**self).set_autocommit(enabled)
    }

    fn rollback(&mut self) -> Result<(), ConnectionError> {
        (**self).rollback()
    }

    fn close(&mut self, statement: StatementHandle) {
        (**self).close(statement)
    }
}
