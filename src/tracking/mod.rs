pub mod classifier;

pub use classifier::{RecordStatus, classify};
