//! Core abstractions shared by every destination engine.
//!
//! - [`types`] / [`value`]: semantic types and converted values
//! - [`convert`]: text to value converters
//! - [`schema`]: column metadata and reconciliation
//! - [`typemap`]: per-dialect SQL type tables
//! - [`identifier`]: identifier quoting and table identities
//! - [`traits`]: dialect, driver, session and writer traits

pub mod convert;
pub mod identifier;
pub mod schema;
pub mod traits;
pub mod typemap;
pub mod types;
pub mod value;

pub use convert::ValueConverter;
pub use identifier::TableIdentity;
pub use schema::{
    reconcile_by_name, reconcile_by_position, ColumnDefinition, InsertColumnDefinition,
    InsertSchema, Reconciliation, Schema,
};
pub use traits::{
    Dialect, InsertMethod, InsertSession, RowWriter, TargetDriver, WriterOptions,
};
pub use typemap::TypeMapping;
pub use types::SemanticType;
pub use value::SqlValue;
