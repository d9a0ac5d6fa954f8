//! Configuration validation and resolution.

use super::{LoadConfig, LoadSettings};
use crate::core::identifier::split_table_ref;
use crate::core::traits::WriterOptions;
use crate::drivers::{ConnectOptions, DbKind, DEFAULT_MAX_CONNECTIONS};
use crate::error::{LoadError, Result};
use crate::source::{encoding_for_label, SourceOptions, STDIN_INPUT};
use crate::writer::DEFAULT_QUEUE_CAPACITY;

const DEFAULT_DELIMITER: &str = ",";
const DEFAULT_ENCODING: &str = "utf-8";

/// Validate the configuration and apply defaults.
pub fn resolve(config: &LoadConfig) -> Result<LoadSettings> {
    let url = config
        .db_url
        .as_deref()
        .filter(|url| !url.is_empty())
        .ok_or_else(|| LoadError::Config("db_url is required".into()))?;
    DbKind::from_url(url)?;

    let table_ref = config
        .table
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| LoadError::Config("table is required".into()))?;
    let (qualifier, table) = split_table_ref(table_ref);
    let schema = match (qualifier, config.schema.as_deref().filter(|s| !s.is_empty())) {
        (Some(q), Some(s)) if q != s => {
            return Err(LoadError::Config(format!(
                "table '{}' names schema '{}' but schema is set to '{}'",
                table_ref, q, s
            )))
        }
        (Some(q), _) => Some(q.to_string()),
        (None, s) => s.map(str::to_string),
    };
    if table.is_empty() || schema.as_deref() == Some("") {
        return Err(LoadError::Config(format!("invalid table name '{}'", table_ref)));
    }

    let delimiter = parse_delimiter(config.delimiter.as_deref().unwrap_or(DEFAULT_DELIMITER))?;
    let encoding = encoding_for_label(config.encoding.as_deref().unwrap_or(DEFAULT_ENCODING))?;

    if let Some(0) = config.batch_size {
        return Err(LoadError::Config("batch_size must be at least 1".into()));
    }
    if let Some(0) = config.queue_capacity {
        return Err(LoadError::Config("queue_capacity must be at least 1".into()));
    }

    Ok(LoadSettings {
        connect: ConnectOptions {
            url: url.to_string(),
            user: config.user.clone(),
            password: config.password.clone(),
            ssl_mode: config.ssl_mode.unwrap_or_default(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        },
        schema,
        table: table.to_string(),
        table_mode: config.table_mode.unwrap_or_default(),
        has_header: config.has_header.unwrap_or(true),
        source: SourceOptions {
            input: config
                .input
                .clone()
                .unwrap_or_else(|| STDIN_INPUT.to_string()),
            delimiter,
            encoding,
        },
        writer: WriterOptions {
            batch_size: config.batch_size,
            insert_method: config.insert_method.unwrap_or_default(),
        },
        queue_capacity: config.queue_capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY),
    })
}

fn parse_delimiter(delimiter: &str) -> Result<u8> {
    match delimiter {
        "\\t" | "tab" => Ok(b'\t'),
        d if d.len() == 1 && d.is_ascii() && d != "\"" && d != "\n" && d != "\r" => {
            Ok(d.as_bytes()[0])
        }
        "" => Err(LoadError::Config("CSV delimiter must not be empty".into())),
        d => Err(LoadError::Config(format!(
            "CSV delimiter should be a single ASCII character: '{}'",
            d
        ))),
    }
}
