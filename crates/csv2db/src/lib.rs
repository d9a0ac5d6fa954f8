//! # csv2db
//!
//! Bulk loader for delimited text files into PostgreSQL and MySQL tables.
//!
//! The library covers:
//!
//! - **Schema reconciliation** of the CSV header (or column count) against
//!   the destination table, by name or by position
//! - **Typed conversion** of text cells into database parameters
//! - **Batched transactional inserts** with a per-row-count statement cache,
//!   or PostgreSQL `COPY`
//! - **Background writing** behind a bounded queue so reading never waits on
//!   the database except under backpressure
//!
//! ## Example
//!
//! ```rust,no_run
//! use csv2db::{LoadConfig, Loader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), csv2db::LoadError> {
//!     let config = LoadConfig {
//!         db_url: Some("postgres://loader@localhost/warehouse".into()),
//!         table: Some("public.people".into()),
//!         input: Some("people.csv".into()),
//!         ..Default::default()
//!     };
//!     let loader = Loader::connect(config.resolve()?).await?;
//!     let result = loader.run().await?;
//!     println!("Loaded {} rows", result.rows_loaded);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod loader;
pub mod source;
pub mod writer;

// Re-exports for convenient access
pub use config::{LoadConfig, LoadSettings, PresetStore, TableMode, DEFAULT_PRESET};
pub use core::{
    InsertMethod, InsertSchema, RowWriter, Schema, SemanticType, SqlValue, TableIdentity,
    TargetDriver,
};
pub use drivers::{connect, url_credentials, ConnectOptions, DbKind, SslMode};
pub use error::{LoadError, Result};
pub use loader::{LoadResult, Loader};
