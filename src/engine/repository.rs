use super::batch::{self, PlannedWrite};
use super::{EmptyReadPolicy, EngineOptions, Records, UpdateSummary};
use crate::connection::{Connection, SharedConnection};
use crate::core::{DbError, Record, Result, Value};
use crate::result::QueryResult;
use crate::schema::TableDescriptor;
use crate::sql::{BoundParameters, StatementBuilder};
use crate::tracking::RecordStatus;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info_span};

/// Persists the records of one table through a shared connection.
///
/// # Examples
///
/// ```
/// use recordkeeper::{ParamType, Record, Repository, TableDescriptor, Value};
/// use recordkeeper::memory::{MemoryDatabase, MemoryTable};
///
/// # fn main() -> recordkeeper::Result<()> {
/// let users = TableDescriptor::builder("users")
///     .column("id", ParamType::Integer)
///     .column("name", ParamType::String)
///     .primary_key("id", ParamType::Integer)
///     .auto_increment("id")
///     .build()?;
///
/// let database = MemoryDatabase::new();
/// database.create_table(MemoryTable::from_descriptor(&users))?;
/// let repository = Repository::new(users, database.connect());
///
/// let mut ada = Record::new().with("name", "Ada");
/// repository.update(&mut ada)?;
/// assert_eq!(ada.get("id"), Some(&Value::Integer(1)));
///
/// let loaded = repository.load_from_id([1])?;
/// assert_eq!(loaded.get("name"), Some(&Value::Text("Ada".into())));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Repository {
    descriptor: Arc<TableDescriptor>,
    connection: SharedConnection,
    options: EngineOptions,
}

impl fmt::Debug for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("table", &self.descriptor.table_name())
            .field("options", &self.options)
            .finish()
    }
}

impl Repository {
    pub fn new(descriptor: TableDescriptor, connection: SharedConnection) -> Self {
        Self {
            descriptor: Arc::new(descriptor),
            connection,
            options: EngineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn descriptor(&self) -> &TableDescriptor {
        &self.descriptor
    }

    pub fn table_name(&self) -> &str {
        self.descriptor.table_name()
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn connection(&self) -> &SharedConnection {
        &self.connection
    }

    /// Writes every new, changed or deleted record in one transaction.
    ///
    /// Unchanged records are skipped; when nothing needs writing the
    /// connection is not touched. On success new records receive their
    /// generated key and every written record gets a fresh snapshot. On
    /// failure the batch is rolled back and no record is modified.
    pub fn update<'a>(&self, records: impl Into<Records<'a>>) -> Result<UpdateSummary> {
        self.write(records.into(), false)
    }

    /// Deletes every record, whatever its snapshot says.
    pub fn delete<'a>(&self, records: impl Into<Records<'a>>) -> Result<UpdateSummary> {
        self.write(records.into(), true)
    }

    fn write(&self, mut records: Records<'_>, force_delete: bool) -> Result<UpdateSummary> {
        let records = records.as_mut_slice();
        let (writes, unchanged) = batch::plan(
            &self.descriptor,
            records,
            force_delete,
            self.options.missing_values,
        )?;

        let mut summary = UpdateSummary {
            unchanged,
            ..UpdateSummary::default()
        };
        if writes.is_empty() {
            return Ok(summary);
        }

        let span = info_span!(
            "update_batch",
            table = self.descriptor.table_name(),
            records = records.len(),
            writes = writes.len()
        );
        let _guard = span.enter();

        let outcomes = {
            let mut connection = self.connection.lock()?;
            batch::execute(
                &mut *connection,
                self.descriptor.table_name(),
                &writes,
                self.descriptor.auto_increment().is_some(),
            )?
        };

        for (write, outcome) in writes.iter().zip(outcomes) {
            let Some(index) = write.record else { continue };
            let record = &mut records[index];
            match write.status {
                Some(RecordStatus::New) => {
                    if let (Some(column), Some(id)) = (self.descriptor.auto_increment(), outcome.insert_id) {
                        record.set(column, Value::Integer(id));
                    }
                    record.refresh_snapshot();
                    summary.inserted += 1;
                }
                Some(RecordStatus::Updated) => {
                    record.refresh_snapshot();
                    summary.updated += 1;
                }
                Some(RecordStatus::Deleted) => {
                    record.forget_snapshot();
                    summary.deleted += 1;
                }
                Some(RecordStatus::Unchanged) | None => {}
            }
        }

        debug!(
            inserted = summary.inserted,
            updated = summary.updated,
            deleted = summary.deleted,
            unchanged = summary.unchanged,
            "batch committed"
        );
        Ok(summary)
    }

    /// Loads the single record whose primary key equals `key`, given in key order.
    ///
    /// Zero matching rows is `RecordNotFound`; so is more than one, which
    /// means the stored key is not unique.
    pub fn load_from_id<K: Into<Value>>(&self, key: impl IntoIterator<Item = K>) -> Result<Record> {
        let statement = StatementBuilder::new(&self.descriptor).build_select_by_key();
        let parameters = statement
            .parameters
            .bind(key.into_iter().map(Into::into).collect())?;
        self.query_single(&statement.sql, &parameters)
    }

    /// Loads every row of the table.
    pub fn load_all(&self) -> Result<Vec<Record>> {
        let statement = StatementBuilder::new(&self.descriptor).build_select_all();
        self.query(&statement.sql, &BoundParameters::empty())
    }

    /// Runs an arbitrary parameterized read against this repository's connection.
    ///
    /// Every returned record carries a snapshot of the row as read. An empty
    /// result follows [`EmptyReadPolicy`].
    pub fn query(&self, sql: &str, parameters: &BoundParameters) -> Result<Vec<Record>> {
        let result = self.read(sql, parameters)?;
        if result.is_empty() && self.options.empty_reads == EmptyReadPolicy::Error {
            return Err(self.not_found(0));
        }
        Ok(result.into_records())
    }

    /// Like [`query`](Self::query) but requires exactly one row.
    pub fn query_single(&self, sql: &str, parameters: &BoundParameters) -> Result<Record> {
        let result = self.read(sql, parameters)?;
        let matched = result.row_count();
        if matched != 1 {
            return Err(self.not_found(matched));
        }
        result
            .into_records()
            .pop()
            .ok_or_else(|| self.not_found(0))
    }

    /// Runs one parameterized write in its own transaction.
    ///
    /// Returns the number of affected rows.
    pub fn execute_sql(&self, sql: &str, parameters: &BoundParameters) -> Result<u64> {
        let write = PlannedWrite {
            record: None,
            status: None,
            sql: sql.to_string(),
            parameters: parameters.clone(),
        };

        let mut connection = self.connection.lock()?;
        let outcomes = batch::execute(
            &mut *connection,
            self.descriptor.table_name(),
            std::slice::from_ref(&write),
            false,
        )?;
        Ok(outcomes.first().map(|o| o.affected).unwrap_or(0))
    }

    fn read(&self, sql: &str, parameters: &BoundParameters) -> Result<QueryResult> {
        debug!(table = self.descriptor.table_name(), sql, parameters = %parameters, "executing read");

        let mut connection = self.connection.lock()?;
        let connection: &mut dyn Connection = &mut *connection;

        let query_failed = |reason: String| DbError::QueryFailed {
            sql: sql.to_string(),
            parameters: parameters.to_string(),
            reason,
        };

        let handle = connection
            .prepare(sql)
            .map_err(|err| query_failed(err.to_string()))?;
        let result = connection
            .execute(handle, parameters)
            .and_then(|_| connection.fetch(handle));
        connection.close(handle);

        result.map_err(|err| query_failed(err.to_string()))
    }

    fn not_found(&self, matched: usize) -> DbError {
        DbError::RecordNotFound {
            table: self.descriptor.table_name().to_string(),
            matched,
        }
    }
}
