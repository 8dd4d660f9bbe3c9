//! MySQL implementation of the sqlgate introspection boundary.

pub mod introspect;

pub use introspect::MySqlIntrospector;
