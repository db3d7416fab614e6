use crate::connection::{Connection, ConnectionError};
use crate::core::{DbError, Record, Result, WriteStage};
use crate::schema::TableDescriptor;
use crate::sql::{BoundParameters, MissingValuePolicy, StatementBuilder, SynthesizedStatement};
use crate::tracking::{RecordStatus, classify};
use tracing::{debug, warn};

/// One statement of a write batch.
#[derive(Debug)]
pub(crate) struct PlannedWrite {
    /// Position of the source record, for record-backed writes.
    pub record: Option<usize>,
    pub status: Option<RecordStatus>,
    pub sql: String,
    pub parameters: BoundParameters,
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct WriteOutcome {
    pub affected: u64,
    pub insert_id: Option<i64>,
}

/// Statements synthesized once per batch, on first use.
#[derive(Default)]
struct StatementCache {
    insert: Option<SynthesizedStatement>,
    update: Option<SynthesizedStatement>,
    delete: Option<SynthesizedStatement>,
}

impl StatementCache {
    fn get(&mut self, builder: &StatementBuilder<'_>, status: RecordStatus) -> Result<&SynthesizedStatement> {
        let slot = match status {
            RecordStatus::New => &mut self.insert,
            RecordStatus::Updated => &mut self.update,
            RecordStatus::Deleted => &mut self.delete,
            RecordStatus::Unchanged => {
                return Err(DbError::ConfigurationError(
                    "unchanged records have no statement".to_string(),
                ));
            }
        };

        if slot.is_none() {
            let statement = match status {
                RecordStatus::New => builder.build_insert(),
                RecordStatus::Updated => builder.build_update()?,
                _ => builder.build_delete(),
            };
            *slot = Some(statement);
        }

        slot.as_ref()
            .ok_or_else(|| DbError::ConfigurationError("statement cache is empty".to_string()))
    }
}

/// Classifies every record and builds the statements for those needing a write.
///
/// Returns the planned writes and the number of unchanged records.
pub(crate) fn plan(
    descriptor: &TableDescriptor,
    records: &[Record],
    force_delete: bool,
    policy: MissingValuePolicy,
) -> Result<(Vec<PlannedWrite>, usize)> {
    let builder = StatementBuilder::new(descriptor);
    let mut cache = StatementCache::default();
    let mut writes = Vec::new();
    let mut unchanged = 0;

    for (index, record) in records.iter().enumerate() {
        let status = classify(record, force_delete);
        if !status.needs_write() {
            unchanged += 1;
            continue;
        }

        let statement = cache.get(&builder, status)?;
        let resolved = statement.parameters.resolve(record);

        for column in &resolved.missing {
            // The store fills a missing auto-increment key on insert
            let generated = status == RecordStatus::New
                && descriptor.auto_increment() == Some(column.as_str());
            if generated {
                continue;
            }
            if policy == MissingValuePolicy::Strict {
                return Err(DbError::MissingParameter {
                    table: descriptor.table_name().to_string(),
                    column: column.clone(),
                });
            }
            if descriptor.is_key_column(column) {
                warn!(
                    table = descriptor.table_name(),
                    column = column.as_str(),
                    status = %status,
                    "key column missing from record, binding NULL"
                );
            } else {
                debug!(
                    table = descriptor.table_name(),
                    column = column.as_str(),
                    "column missing from record, binding NULL"
                );
            }
        }

        writes.push(PlannedWrite {
            record: Some(index),
            status: Some(status),
            sql: statement.sql.clone(),
            parameters: resolved.parameters,
        });
    }

    Ok((writes, unchanged))
}

/// Runs `writes` as one transaction.
///
/// Autocommit is switched off before the first statement and back on after
/// the last one, which commits. Any failure rolls the whole batch back.
pub(crate) fn execute(
    connection: &mut dyn Connection,
    table: &str,
    writes: &[PlannedWrite],
    capture_keys: bool,
) -> Result<Vec<WriteOutcome>> {
    connection.set_autocommit(false)?;

    let mut outcomes = Vec::with_capacity(writes.len());
    for write in writes {
        debug!(
            table,
            sql = write.sql.as_str(),
            parameters = %write.parameters,
            "executing write"
        );

        let handle = match connection.prepare(&write.sql) {
            Ok(handle) => handle,
            Err(err) => return Err(abort(connection, WriteStage::Prepare, write, err)),
        };
        let executed = connection.execute(handle, &write.parameters);
        connection.close(handle);

        let affected = match executed {
            Ok(affected) => affected,
            Err(err) => return Err(abort(connection, WriteStage::Execute, write, err)),
        };

        if affected == 0 && matches!(write.status, Some(RecordStatus::Updated | RecordStatus::Deleted)) {
            warn!(table, sql = write.sql.as_str(), parameters = %write.parameters, "write matched no rows");
        }

        let insert_id = (capture_keys && write.status == Some(RecordStatus::New))
            .then(|| connection.last_insert_id());
        outcomes.push(WriteOutcome { affected, insert_id });
    }

    if let Err(err) = connection.set_autocommit(true) {
        let parameters = BoundParameters::empty();
        let failed = PlannedWrite {
            record: None,
            status: None,
            sql: "COMMIT".to_string(),
            parameters,
        };
        return Err(abort(connection, WriteStage::Commit, &failed, err));
    }

    Ok(outcomes)
}

fn abort(
    connection: &mut dyn Connection,
    stage: WriteStage,
    write: &PlannedWrite,
    cause: ConnectionError,
) -> DbError {
    warn!(
        stage = %stage,
        sql = write.sql.as_str(),
        parameters = %write.parameters,
        error = %cause,
        "write batch failed, rolling back"
    );

    if let Err(err) = connection.rollback() {
        warn!(error = %err, "rollback failed");
    }
    if let Err(err) = connection.set_autocommit(true) {
        warn!(error = %err, "could not restore autocommit after rollback");
    }

    DbError::UpdateFailed {
        stage,
        sql: write.sql.clone(),
        parameters: write.parameters.to_string(),
        reason: cause.to_string(),
    }
}
