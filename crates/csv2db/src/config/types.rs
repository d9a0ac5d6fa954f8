//! Load configuration types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::traits::InsertMethod;
use crate::drivers::SslMode;

/// What to do with the destination table before loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TableMode {
    /// Create the table when it does not exist.
    Create,
    /// Delete every row of an existing table.
    DeleteAll,
    /// Truncate an existing table.
    Truncate,
    /// Drop an existing table and create it from the input.
    DropAndCreate,
    /// Load into the table as it is; it must exist.
    #[default]
    AsIs,
}

impl TableMode {
    pub const ALL: [TableMode; 5] = [
        TableMode::Create,
        TableMode::DeleteAll,
        TableMode::Truncate,
        TableMode::DropAndCreate,
        TableMode::AsIs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TableMode::Create => "create",
            TableMode::DeleteAll => "delete-all",
            TableMode::Truncate => "truncate",
            TableMode::DropAndCreate => "drop-and-create",
            TableMode::AsIs => "as-is",
        }
    }

    /// Whether a missing table may be created.
    pub fn creates_missing(&self) -> bool {
        matches!(self, TableMode::Create | TableMode::DropAndCreate)
    }
}

impl fmt::Display for TableMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TableMode {
    type Err = crate::error::LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TableMode::ALL
            .iter()
            .find(|mode| mode.as_str() == s.to_lowercase())
            .copied()
            .ok_or_else(|| {
                let names: Vec<&str> = TableMode::ALL.iter().map(TableMode::as_str).collect();
                crate::error::LoadError::Config(format!(
                    "Unsupported table mode '{}'. Available are: {}",
                    s,
                    names.join(", ")
                ))
            })
    }
}

/// One load run, as given by flags or a preset.
///
/// Every field is optional so that flags and presets can be layered with
/// [`LoadConfig::fill_missing_from`]; defaults are applied by
/// [`LoadConfig::resolve`](super::LoadConfig::resolve).
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Connection URL, `postgres://...` or `mysql://...`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_url: Option<String>,

    /// User, overriding the one in the URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Password, overriding the one in the URL. Never written to presets.
    #[serde(skip_serializing)]
    pub password: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_mode: Option<SslMode>,

    /// Destination schema (PostgreSQL) or database (MySQL).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Destination table, optionally `schema.table`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_mode: Option<TableMode>,

    /// Input file path, `--` for stdin.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,

    /// First record holds column names (default: true).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_header: Option<bool>,

    /// Field delimiter, one ASCII character (default: `,`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<String>,

    /// Input encoding label (default: `utf-8`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,

    /// Flush once more than this many rows are buffered, so each INSERT
    /// carries `batch_size + 1` rows. Derived from the parameter limit if not set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,

    /// Rows queued between reader and writer (default: 4096).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_capacity: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub insert_method: Option<InsertMethod>,
}

impl fmt::Debug for LoadConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadConfig")
            .field("db_url", &self.db_url.as_deref().map(crate::drivers::redact_url))
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("ssl_mode", &self.ssl_mode)
            .field("schema", &self.schema)
            .field("table", &self.table)
            .field("table_mode", &self.table_mode)
            .field("input", &self.input)
            .field("has_header", &self.has_header)
            .field("delimiter", &self.delimiter)
            .field("encoding", &self.encoding)
            .field("batch_size", &self.batch_size)
            .field("queue_capacity", &self.queue_capacity)
            .field("insert_method", &self.insert_method)
            .finish()
    }
}

impl LoadConfig {
    /// Take every field left unset here from `preset`.
    pub fn fill_missing_from(&mut self, preset: &LoadConfig) {
        fn fill<T: Clone>(field: &mut Option<T>, preset: &Option<T>) {
            if field.is_none() {
                field.clone_from(preset);
            }
        }

        fill(&mut self.db_url, &preset.db_url);
        fill(&mut self.user, &preset.user);
        fill(&mut self.password, &preset.password);
        fill(&mut self.ssl_mode, &preset.ssl_mode);
        fill(&mut self.schema, &preset.schema);
        fill(&mut self.table, &preset.table);
        fill(&mut self.table_mode, &preset.table_mode);
        fill(&mut self.input, &preset.input);
        fill(&mut self.has_header, &preset.has_header);
        fill(&mut self.delimiter, &preset.delimiter);
        fill(&mut self.encoding, &preset.encoding);
        fill(&mut self.batch_size, &preset.batch_size);
        fill(&mut self.queue_capacity, &preset.queue_capacity);
        fill(&mut self.insert_method, &preset.insert_method);
    }

    /// Copy suitable for storing as a preset: no password, no input file.
    pub fn to_preset(&self) -> LoadConfig {
        LoadConfig {
            password: None,
            input: None,
            ..self.clone()
        }
    }
}
