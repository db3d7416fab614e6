pub mod params;
pub mod synthesizer;

pub use params::{BoundParameters, MissingValuePolicy, ParameterSpec, Resolved};
pub use synthesizer::{StatementBuilder, SynthesizedStatement};
