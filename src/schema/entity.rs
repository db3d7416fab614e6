use super::TableDescriptor;
use crate::core::Result;

/// An entity type persisted through a [`Repository`](crate::Repository).
///
/// The descriptor is declared once per type; the factory uses `DATABASE` to
/// pick the connection.
///
/// ```
/// use recordkeeper::{Entity, ParamType, Result, TableDescriptor};
///
/// struct Users;
///
/// impl Entity for Users {
///     const DATABASE: &'static str = "main";
///
///     fn descriptor() -> Result<TableDescriptor> {
///         TableDescriptor::builder("users")
///             .column("id", ParamType::Integer)
///             .column("name", ParamType::String)
///             .primary_key("id", ParamType::Integer)
///             .auto_increment("id")
///             .build()
///     }
/// }
/// ```
pub trait Entity {
    /// Name of the configured database holding this entity's table.
    const DATABASE: &'static str;

    /// Declares the table; validation failures surface as configuration errors.
    fn descriptor() -> Result<TableDescriptor>;
}
