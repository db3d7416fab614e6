// ============================================================================
// recordkeeper
// ============================================================================
//
// Generic record persistence: a table descriptor says what a table looks
// like, records carry their values plus a snapshot of what was last read or
// written, and the engine works out which INSERT, UPDATE or DELETE each
// record needs and runs them as one transaction.
//
// ============================================================================

pub mod connection;
pub mod core;
pub mod engine;
pub mod memory;
pub mod result;
pub mod schema;
pub mod sql;
pub mod tracking;

// Re-export main types for convenience
pub use core::{DbError, Fields, ParamType, Record, Result, Value, WriteStage};
pub use result::QueryResult;
pub use schema::{ColumnDef, Entity, TableDescriptor, TableDescriptorBuilder};
pub use sql::{BoundParameters, MissingValuePolicy, StatementBuilder, SynthesizedStatement};
pub use tracking::{RecordStatus, classify};

pub use engine::{EmptyReadPolicy, EngineOptions, Records, Repository, UpdateSummary};

// Re-export connection API
pub use connection::{
    Connection, ConnectionError, SharedConnection, StatementHandle,
    config::ConnectionConfig,
    provider::{Configurations, ConnectionProvider, RepositoryFactory, StaticConfigurations},
    shared,
};

pub use memory::{MemoryConnection, MemoryDatabase, MemoryProvider, MemoryTable};
