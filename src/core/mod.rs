pub mod error;
pub mod record;
pub mod value;

pub use error::{DbError, Result, WriteStage};
pub use record::{Fields, Record};
pub use value::{ParamType, Value};
