use super::journal::{Change, Journal};
use super::statement::{self, Command, CompiledStatement, Condition, Projection};
use super::table::MemoryTable;
use crate::connection::provider::ConnectionProvider;
use crate::connection::config::ConnectionConfig;
use crate::connection::{Connection, ConnectionError, SharedConnection, StatementHandle, shared};
use crate::core::{DbError, Result, Value};
use crate::result::{QueryResult, Row};
use crate::sql::BoundParameters;
use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

type Tables = HashMap<String, MemoryTable>;

/// A set of in-memory tables shared by every connection opened on it.
///
/// Connections see each other's uncommitted writes; there is no isolation
/// beyond the per-connection rollback journal.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_table(&self, table: MemoryTable) -> Result<()> {
        table.validate()?;
        let mut tables = self.tables.write()?;
        if tables.contains_key(table.name()) {
            return Err(DbError::ConfigurationError(format!(
                "Table '{}' already exists",
                table.name()
            )));
        }
        tables.insert(table.name().to_string(), table);
        Ok(())
    }

    pub fn drop_table(&self, name: &str) -> Result<bool> {
        Ok(self.tables.write()?.remove(name).is_some())
    }

    pub fn table_names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.tables.read()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    /// Copy of every row currently stored in `table`.
    pub fn rows(&self, table: &str) -> Result<Vec<Row>> {
        let tables = self.tables.read()?;
        let table = tables
            .get(table)
            .ok_or_else(|| DbError::ConfigurationError(format!("Unknown table '{}'", table)))?;
        Ok(table.rows().cloned().collect())
    }

    pub fn row_count(&self, table: &str) -> Result<usize> {
        Ok(self.rows(table)?.len())
    }

    /// Opens a new connection, wrapped for sharing between repositories.
    pub fn connect(&self) -> SharedConnection {
        shared(self.open())
    }

    pub fn open(&self) -> MemoryConnection {
        MemoryConnection::new(Arc::clone(&self.tables))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    Active,
    InTransaction,
    Closed,
}

struct Prepared {
    sql: String,
    compiled: CompiledStatement,
    result: Option<QueryResult>,
}

/// Connection to a [`MemoryDatabase`].
///
/// Accepts the single-table `SELECT`, `INSERT`, `UPDATE` and `DELETE`
/// statements the engine synthesizes, with WHERE clauses made of
/// `column = value` terms joined by `AND`. A NULL on either side of `=`
/// never matches.
pub struct MemoryConnection {
    tables: Arc<RwLock<Tables>>,
    state: ConnectionState,
    statements: HashMap<u64, Prepared>,
    next_statement: u64,
    journal: Journal,
    last_insert_id: i64,
}

impl MemoryConnection {
    fn new(tables: Arc<RwLock<Tables>>) -> Self {
        Self {
            tables,
            state: ConnectionState::Active,
            statements: HashMap::new(),
            next_statement: 1,
            journal: Journal::default(),
            last_insert_id: 0,
        }
    }

    pub fn is_in_transaction(&self) -> bool {
        self.state == ConnectionState::InTransaction
    }

    pub fn is_active(&self) -> bool {
        self.state != ConnectionState::Closed
    }

    /// Number of statements prepared and not yet closed.
    pub fn open_statements(&self) -> usize {
        self.statements.len()
    }

    /// Rolls back any open transaction and refuses further work.
    pub fn disconnect(&mut self) {
        if self.state == ConnectionState::InTransaction
            && let Err(err) = self.rollback()
        {
            debug!("rollback on disconnect failed: {}", err);
        }
        self.statements.clear();
        self.state = ConnectionState::Closed;
    }

    fn ensure_open(&self) -> std::result::Result<(), ConnectionError> {
        if self.state == ConnectionState::Closed {
            return Err(ConnectionError::Closed);
        }
        Ok(())
    }

    fn run(
        &mut self,
        command: &Command,
        parameters: &[Value],
    ) -> std::result::Result<(u64, Option<QueryResult>), ConnectionError> {
        let journaling = self.state == ConnectionState::InTransaction;
        let tables = Arc::clone(&self.tables);
        let mut tables = tables
            .write()
            .map_err(|_| ConnectionError::Execute("database lock poisoned".to_string()))?;
        let table_name = command.table();
        let table = tables
            .get_mut(table_name)
            .ok_or_else(|| ConnectionError::Execute(format!("table '{}' no longer exists", table_name)))?;

        match command {
            Command::Select { projection, filter, .. } => {
                let predicate = RowFilter::new(table, filter, parameters)?;
                let indexes: Vec<usize> = match projection {
                    Projection::All => (0..table.columns().len()).collect(),
                    Projection::Columns(names) => names.iter().filter_map(|n| table.column_index(n)).collect(),
                };
                let columns = indexes.iter().map(|&i| table.columns()[i].name.clone()).collect();
                let rows: Vec<Row> = table
                    .matching(|row| predicate.matches(row))
                    .into_iter()
                    .filter_map(|id| table.row(id))
                    .map(|row| indexes.iter().map(|&i| row[i].clone()).collect())
                    .collect();
                let produced = rows.len() as u64;
                Ok((produced, Some(QueryResult::new(columns, rows))))
            }
            Command::Insert { columns, values, .. } => {
                let assigned = columns
                    .iter()
                    .zip(values)
                    .map(|(column, operand)| Ok((index_of(table, column)?, operand.resolve(parameters).clone())))
                    .collect::<std::result::Result<Vec<_>, ConnectionError>>()?;
                let (row_id, stored_auto) = table.insert(assigned).map_err(ConnectionError::Execute)?;
                self.last_insert_id = stored_auto.unwrap_or(0);
                if journaling {
                    self.journal.record(Change::Inserted {
                        table: table_name.to_string(),
                        row_id,
                    });
                }
                Ok((1, None))
            }
            Command::Update { assignments, filter, .. } => {
                let predicate = RowFilter::new(table, filter, parameters)?;
                let assigned = assignments
                    .iter()
                    .map(|(column, operand)| Ok((index_of(table, column)?, operand.resolve(parameters).clone())))
                    .collect::<std::result::Result<Vec<_>, ConnectionError>>()?;

                let targets = table.matching(|row| predicate.matches(row));
                let mut undo = Vec::with_capacity(targets.len());
                for row_id in &targets {
                    match table.update(*row_id, &assigned) {
                        Ok(old_row) => undo.push((*row_id, old_row)),
                        Err(reason) => {
                            // A statement is all or nothing, even outside a transaction
                            for (row_id, old_row) in undo {
                                table.restore(row_id, old_row);
                            }
                            return Err(ConnectionError::Execute(reason));
                        }
                    }
                }
                if journaling {
                    for (row_id, old_row) in undo {
                        self.journal.record(Change::Updated {
                            table: table_name.to_string(),
                            row_id,
                            old_row,
                        });
                    }
                }
                Ok((targets.len() as u64, None))
            }
            Command::Delete { filter, .. } => {
                let predicate = RowFilter::new(table, filter, parameters)?;
                let targets = table.matching(|row| predicate.matches(row));
                for row_id in &targets {
                    if let Some(old_row) = table.delete(*row_id)
                        && journaling
                    {
                        self.journal.record(Change::Deleted {
                            table: table_name.to_string(),
                            row_id: *row_id,
                            old_row,
                        });
                    }
                }
                Ok((targets.len() as u64, None))
            }
        }
    }
}

impl Connection for MemoryConnection {
    fn prepare(&mut self, sql: &str) -> std::result::Result<StatementHandle, ConnectionError> {
        self.ensure_open()?;
        let compiled = statement::compile(sql).map_err(ConnectionError::Prepare)?;

        {
            let tables = self
                .tables
                .read()
                .map_err(|_| ConnectionError::Prepare("database lock poisoned".to_string()))?;
            let table = tables
                .get(compiled.command.table())
                .ok_or_else(|| ConnectionError::Prepare(format!("unknown table '{}'", compiled.command.table())))?;
            if let Some(column) = compiled
                .command
                .referenced_columns()
                .into_iter()
                .find(|c| table.column_index(c).is_none())
            {
                return Err(ConnectionError::Prepare(format!(
                    "unknown column '{}' in table '{}'",
                    column,
                    table.name()
                )));
            }
        }

        let id = self.next_statement;
        self.next_statement += 1;
        self.statements.insert(
            id,
            Prepared {
                sql: sql.to_string(),
                compiled,
                result: None,
            },
        );
        Ok(StatementHandle::new(id))
    }

    fn execute(
        &mut self,
        statement: StatementHandle,
        parameters: &BoundParameters,
    ) -> std::result::Result<u64, ConnectionError> {
        self.ensure_open()?;
        let prepared = self
            .statements
            .get(&statement.id())
            .ok_or(ConnectionError::UnknownStatement(statement.id()))?;

        if parameters.len() != prepared.compiled.placeholders {
            return Err(ConnectionError::Execute(format!(
                "statement expects {} parameters, {} bound",
                prepared.compiled.placeholders,
                parameters.len()
            )));
        }
        for (position, (param_type, value)) in parameters.iter().enumerate() {
            if !param_type.accepts(value) {
                return Err(ConnectionError::Execute(format!(
                    "parameter {} bound as '{}' cannot carry {} value {}",
                    position + 1,
                    param_type,
                    value.type_name(),
                    value
                )));
            }
        }

        debug!("executing `{}` with {}", prepared.sql, parameters);
        let command = prepared.compiled.command.clone();
        let (affected, result) = self.run(&command, parameters.values())?;

        if let Some(prepared) = self.statements.get_mut(&statement.id()) {
            prepared.result = result;
        }
        Ok(affected)
    }

    fn fetch(&mut self, statement: StatementHandle) -> std::result::Result<QueryResult, ConnectionError> {
        self.ensure_open()?;
        let prepared = self
            .statements
            .get(&statement.id())
            .ok_or(ConnectionError::UnknownStatement(statement.id()))?;
        prepared
            .result
            .clone()
            .ok_or_else(|| ConnectionError::Execute(format!("`{}` has produced no rows to fetch", prepared.sql)))
    }

    fn last_insert_id(&self) -> i64 {
        self.last_insert_id
    }

    fn set_autocommit(&mut self, enabled: bool) -> std::result::Result<(), ConnectionError> {
        self.ensure_open()?;
        match (enabled, self.state) {
            (false, ConnectionState::Active) => {
                self.state = ConnectionState::InTransaction;
                debug!("transaction started");
            }
            (true, ConnectionState::InTransaction) => {
                debug!("transaction committed ({} changes)", self.journal.len());
                self.journal.clear();
                self.state = ConnectionState::Active;
            }
            _ => {}
        }
        Ok(())
    }

    fn rollback(&mut self) -> std::result::Result<(), ConnectionError> {
        self.ensure_open()?;
        let tables = Arc::clone(&self.tables);
        let mut tables = tables
            .write()
            .map_err(|_| ConnectionError::Transaction("database lock poisoned".to_string()))?;
        let undone = self.journal.rollback(&mut tables);
        debug!("transaction rolled back ({} changes undone)", undone);
        Ok(())
    }

    fn close(&mut self, statement: StatementHandle) {
        self.statements.remove(&statement.id());
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Opens [`MemoryConnection`]s for configs whose driver is `memory`.
///
/// Each configured database name maps to its own [`MemoryDatabase`],
/// created empty on first use.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    databases: Mutex<HashMap<String, MemoryDatabase>>,
}

impl MemoryProvider {
    pub const DRIVER: &'static str = "memory";

    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an existing database under `name`.
    pub fn with_database(self, name: &str, database: MemoryDatabase) -> Self {
        if let Ok(mut databases) = self.databases.lock() {
            databases.insert(name.to_string(), database);
        }
        self
    }

    pub fn database(&self, name: &str) -> Result<MemoryDatabase> {
        let mut databases = self.databases.lock()?;
        Ok(databases.entry(name.to_string()).or_default().clone())
    }
}

impl ConnectionProvider for MemoryProvider {
    fn open(&self, config: &ConnectionConfig) -> Result<SharedConnection> {
        if config.driver != Self::DRIVER {
            return Err(ConnectionError::Open(format!(
                "driver '{}' is not served by the memory provider",
                config.driver
            ))
            .into());
        }
        Ok(self.database(&config.database)?.connect())
    }
}

// The table may have been replaced since the statement was prepared
fn index_of(table: &MemoryTable, column: &str) -> std::result::Result<usize, ConnectionError> {
    table
        .column_index(column)
        .ok_or_else(|| ConnectionError::Execute(format!("unknown column '{}' in table '{}'", column, table.name())))
}

/// Conjunction of `column = value` terms with their values bound.
struct RowFilter {
    terms: Vec<(usize, Value)>,
}

impl RowFilter {
    fn new(
        table: &MemoryTable,
        filter: &[Condition],
        parameters: &[Value],
    ) -> std::result::Result<Self, ConnectionError> {
        let terms = filter
            .iter()
            .map(|condition| {
                Ok((
                    index_of(table, &condition.column)?,
                    condition.operand.resolve(parameters).clone(),
                ))
            })
            .collect::<std::result::Result<Vec<_>, ConnectionError>>()?;
        Ok(Self { terms })
    }

    fn matches(&self, row: &Row) -> bool {
        self.terms.iter().all(|(index, expected)| {
            let actual = &row[*index];
            !expected.is_null() && !actual.is_null() && actual == expected
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ParamType;

    fn database() -> MemoryDatabase {
        let database = MemoryDatabase::new();
        database
            .create_table(
                MemoryTable::new("users")
                    .column("id", ParamType::Integer)
                    .column("name", ParamType::String)
                    .column("email", ParamType::String)
                    .primary_key(&["id"])
                    .auto_increment("id")
                    .unique(&["email"]),
            )
            .unwrap();
        database
    }

    fn run(connection: &mut MemoryConnection, sql: &str, parameters: BoundParameters) -> std::result::Result<u64, ConnectionError> {
        let handle = connection.prepare(sql)?;
        let affected = connection.execute(handle, &parameters);
        connection.close(handle);
        affected
    }

    fn params(codes: &str, values: Vec<Value>) -> BoundParameters {
        BoundParameters::new(codes, values).unwrap()
    }

    #[test]
    fn test_insert_select_round_trip() {
        let database = database();
        let mut connection = database.open();

        let inserted = run(
            &mut connection,
            "INSERT INTO users (id, name, email) VALUES (?, ?, ?);",
            params("iss", vec![Value::Null, "Ada".into(), "ada@x.io".into()]),
        )
        .unwrap();
        assert_eq!(inserted, 1);
        assert_eq!(connection.last_insert_id(), 1);

        let handle = connection.prepare("SELECT * FROM users WHERE id=?;").unwrap();
        assert_eq!(connection.execute(handle, &params("i", vec![Value::Integer(1)])).unwrap(), 1);
        let result = connection.fetch(handle).unwrap();
        connection.close(handle);

        assert_eq!(result.columns, vec!["id", "name", "email"]);
        assert_eq!(result.rows[0][1], Value::from("Ada"));
        assert_eq!(connection.open_statements(), 0);
    }

    #[test]
    fn test_prepare_rejects_unknown_names() {
        let database = database();
        let mut connection = database.open();

        let err = connection.prepare("SELECT * FROM accounts;").unwrap_err();
        assert!(matches!(err, ConnectionError::Prepare(msg) if msg.contains("accounts")));

        let err = connection.prepare("UPDATE users SET nickname=? WHERE id=?;").unwrap_err();
        assert!(matches!(err, ConnectionError::Prepare(msg) if msg.contains("nickname")));

        let err = connection.prepare("DROP TABLE users;").unwrap_err();
        assert!(matches!(err, ConnectionError::Prepare(_)));
    }

    #[test]
    fn test_null_never_matches() {
        let database = database();
        let mut connection = database.open();
        run(
            &mut connection,
            "INSERT INTO users (name) VALUES (?);",
            params("s", vec!["nobody".into()]),
        )
        .unwrap();

        let deleted = run(
            &mut connection,
            "DELETE FROM users WHERE email=?;",
            params("s", vec![Value::Null]),
        )
        .unwrap();
        assert_eq!(deleted, 0);
        assert_eq!(database.row_count("users").unwrap(), 1);
    }

    #[test]
    fn test_parameter_checks() {
        let database = database();
        let mut connection = database.open();

        let err = run(
            &mut connection,
            "DELETE FROM users WHERE id=?;",
            BoundParameters::empty(),
        )
        .unwrap_err();
        assert!(matches!(err, ConnectionError::Execute(_)));

        let err = run(
            &mut connection,
            "DELETE FROM users WHERE id=?;",
            params("i", vec!["seven".into()]),
        )
        .unwrap_err();
        assert!(matches!(err, ConnectionError::Execute(msg) if msg.contains("parameter 1")));
    }

    #[test]
    fn test_rollback_undoes_transaction() {
        let database = database();
        let mut connection = database.open();
        run(
            &mut connection,
            "INSERT INTO users (name, email) VALUES (?, ?);",
            params("ss", vec!["Ada".into(), "ada@x.io".into()]),
        )
        .unwrap();

        connection.set_autocommit(false).unwrap();
        assert!(connection.is_in_transaction());
        run(
            &mut connection,
            "UPDATE users SET name=? WHERE id=?;",
            params("si", vec!["Grace".into(), Value::Integer(1)]),
        )
        .unwrap();
        run(
            &mut connection,
            "INSERT INTO users (name, email) VALUES (?, ?);",
            params("ss", vec!["Linus".into(), "linus@x.io".into()]),
        )
        .unwrap();
        assert_eq!(database.row_count("users").unwrap(), 2);

        connection.rollback().unwrap();
        connection.set_autocommit(true).unwrap();

        let rows = database.rows("users").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][1], Value::from("Ada"));

        // Rolled back keys are not reused
        run(
            &mut connection,
            "INSERT INTO users (name) VALUES (?);",
            params("s", vec!["Barbara".into()]),
        )
        .unwrap();
        assert_eq!(connection.last_insert_id(), 3);
    }

    #[test]
    fn test_failed_update_leaves_rows_untouched() {
        let database = database();
        let mut connection = database.open();
        for (name, email) in [("a", "a@x.io"), ("b", "b@x.io")] {
            run(
                &mut connection,
                "INSERT INTO users (name, email) VALUES (?, ?);",
                params("ss", vec![name.into(), email.into()]),
            )
            .unwrap();
        }

        let err = run(
            &mut connection,
            "UPDATE users SET email=? WHERE name=?;",
            params("ss", vec!["a@x.io".into(), "b".into()]),
        )
        .unwrap_err();
        assert!(matches!(err, ConnectionError::Execute(msg) if msg.contains("UNIQUE")));
        assert_eq!(database.rows("users").unwrap()[1][2], Value::from("b@x.io"));
    }

    #[test]
    fn test_closed_connection() {
        let database = database();
        let mut connection = database.open();
        connection.disconnect();
        assert!(!connection.is_active());
        assert_eq!(connection.prepare("SELECT * FROM users;").unwrap_err(), ConnectionError::Closed);
    }

    #[test]
    fn test_provider_serves_memory_driver_only() {
        let provider = MemoryProvider::new();
        let config = ConnectionConfig::new("u", "p").driver("memory").database("app");
        assert!(provider.open(&config).is_ok());

        let mysql = ConnectionConfig::new("u", "p").database("app");
        assert!(matches!(
            provider.open(&mysql),
            Err(DbError::Connection(ConnectionError::Open(_)))
        ));
    }
}
