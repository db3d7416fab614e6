// ============================================================================
// In-Memory Store
// ============================================================================
//
// A small relational store that speaks the statement dialect produced by the
// synthesizer: single-table CRUD with positional `?` placeholders. Used by
// tests and by applications that want the engine without a server.
//
// ============================================================================

mod connection;
mod journal;
mod statement;
mod table;

pub use connection::{MemoryConnection, MemoryDatabase, MemoryProvider};
pub use table::MemoryTable;
