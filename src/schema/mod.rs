pub mod descriptor;
pub mod entity;

pub use descriptor::{ColumnDef, TableDescriptor, TableDescriptorBuilder};
pub use entity::Entity;
