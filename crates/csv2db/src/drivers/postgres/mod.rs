//! PostgreSQL driver.
//!
//! - [`PostgresDialect`]: SQL syntax and type table
//! - [`PostgresDriver`]: pooled catalog and DDL operations
//! - [`PostgresSession`]: transaction plus prepared statement for the batched writer
//! - [`PostgresCopyWriter`]: COPY FROM STDIN writer

mod copy;
mod dialect;
mod driver;
mod session;

pub use copy::PostgresCopyWriter;
pub use dialect::{PostgresDialect, PG_MAX_BIND_PARAMS};
pub use driver::{PostgresDriver, DEFAULT_SCHEMA};
pub use session::PostgresSession;
