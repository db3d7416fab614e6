// ============================================================================
// Persistence Engine
// ============================================================================
//
// Classifies records, synthesizes their statements and runs every write of
// one call inside a single transaction. Snapshots and generated keys are
// applied only after the whole batch committed.
//
// ============================================================================

mod batch;
pub mod options;
pub mod records;
mod repository;

pub use options::{EmptyReadPolicy, EngineOptions};
pub use records::{Records, UpdateSummary};
pub use repository::Repository;
